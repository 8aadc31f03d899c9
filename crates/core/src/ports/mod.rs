mod pagination;
mod repository;
mod window;

pub use pagination::*;
pub use repository::*;
pub use window::*;
