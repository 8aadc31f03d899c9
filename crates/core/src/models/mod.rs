//! Domain models representing the state recorded for tenant agents.
//!
//! These models are storage-agnostic and represent the canonical
//! form of vault data within the domain layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

// =============================================================================
// Sort Keys & Entity Types
// =============================================================================

/// Pagination sort key.
///
/// Derived from the item's creation instant in milliseconds and used to
/// order a tenant's collection. Zero means "unset": it is never stored and
/// never appears in a cursor, so a zero boundary always means "no
/// boundary". Stored keys lie in [`SortKey::MIN`]..=[`SortKey::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(pub u64);

impl SortKey {
    /// Smallest storable key.
    pub const MIN: SortKey = SortKey(1);
    /// Largest storable key (the relational backend keeps keys in a signed
    /// 64-bit column).
    pub const MAX: SortKey = SortKey(i64::MAX as u64);

    /// Milliseconds since the Unix epoch, clamped to [`SortKey::MIN`].
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let millis = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        Self(millis.max(Self::MIN.0))
    }

    /// Whether a backend can store this key.
    pub fn is_storable(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self)
    }

    /// Raw key value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Whether this key is the "no boundary" sentinel.
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SortKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Paginated entity types.
///
/// The name is stamped into every cursor so that a cursor issued for one
/// collection cannot be replayed against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Connection,
    Credential,
    Proof,
    Message,
    Event,
    Job,
}

impl EntityType {
    /// All paginated entity types.
    pub const ALL: [EntityType; 6] = [
        Self::Connection,
        Self::Credential,
        Self::Proof,
        Self::Message,
        Self::Event,
        Self::Job,
    ];

    /// Type tag used in cursors and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "Connection",
            Self::Credential => "Credential",
            Self::Proof => "Proof",
            Self::Message => "Message",
            Self::Event => "Event",
            Self::Job => "Job",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common accessors for every paginated item.
pub trait Item: Clone + Send + Sync + 'static {
    /// Entity type stamped into this item's cursors.
    const ENTITY: EntityType;

    /// Item identifier, unique within the tenant.
    fn id(&self) -> &str;

    /// Pagination sort key.
    fn sort_key(&self) -> SortKey;

    /// Creation time.
    fn created(&self) -> DateTime<Utc>;

    fn set_sort_key(&mut self, key: SortKey);

    /// Key a writer stores: the explicit key, or the creation time in
    /// milliseconds when unset.
    fn assigned_sort_key(&self) -> SortKey {
        if self.sort_key().is_unset() {
            SortKey::from_datetime(self.created())
        } else {
            self.sort_key()
        }
    }

    /// [`Item::assigned_sort_key`], rejected when no backend can store it.
    fn storable_sort_key(&self, operation: &'static str) -> StorageResult<SortKey> {
        let key = self.assigned_sort_key();
        if key.is_storable() {
            Ok(key)
        } else {
            Err(StorageError::ConstraintViolation {
                operation,
                message: format!("sort key {key} of {} {} is out of range", Self::ENTITY, self.id()),
            })
        }
    }

    /// Position in a collection: sort key, then id for equal keys.
    fn position(&self) -> (SortKey, &str) {
        (self.sort_key(), self.id())
    }
}

macro_rules! impl_item {
    ($($ty:ident => $entity:ident),* $(,)?) => {
        $(
            impl Item for $ty {
                const ENTITY: EntityType = EntityType::$entity;

                fn id(&self) -> &str {
                    &self.id
                }

                fn sort_key(&self) -> SortKey {
                    self.sort_key
                }

                fn created(&self) -> DateTime<Utc> {
                    self.created
                }

                fn set_sort_key(&mut self, key: SortKey) {
                    self.sort_key = key;
                }
            }
        )*
    };
}

// =============================================================================
// Stored Enumerations
// =============================================================================

/// Error returned when a stored enum value is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Macro to generate enums persisted as lowercase strings.
///
/// Generates:
/// - `as_str()` - Storage representation
/// - `FromStr` parsing back from storage
/// - `Display` trait implementation
macro_rules! stored_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            /// Storage representation.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)*
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

stored_enum!(
    /// Our side of a credential exchange.
    CredentialRole { Issuer => "issuer", Holder => "holder" }
);

stored_enum!(
    /// Our side of a proof exchange.
    ProofRole { Prover => "prover", Verifier => "verifier" }
);

stored_enum!(
    /// Protocol a job is tracking.
    ProtocolType {
        Connection => "connection",
        Credential => "credential",
        Proof => "proof",
        BasicMessage => "basic_message",
    }
);

stored_enum!(
    /// Lifecycle state of a protocol job.
    JobStatus { Waiting => "waiting", Pending => "pending", Complete => "complete" }
);

stored_enum!(
    /// Outcome of a protocol job.
    JobResult { None => "none", Success => "success", Failure => "failure" }
);

// =============================================================================
// Tenants
// =============================================================================

/// Tenant agent owning a set of collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Tenant identifier scoping every other item.
    pub tenant_id: String,
    /// Agent identifier on the external agency.
    pub agent_id: String,
    /// Human-readable label.
    pub label: String,
    /// When the tenant was registered.
    pub created: DateTime<Utc>,
}

// =============================================================================
// Pairwise Connections
// =============================================================================

/// Pairwise connection with another agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub tenant_id: String,
    pub our_did: String,
    pub their_did: String,
    pub their_endpoint: String,
    pub their_label: String,
    /// Whether we sent the invitation.
    pub invited: bool,
    pub approved: Option<DateTime<Utc>>,
    /// Soft archive marker; archived connections stay in pagination.
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub sort_key: SortKey,
}

// =============================================================================
// Credentials
// =============================================================================

/// Single credential attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValue {
    pub id: String,
    pub name: String,
    pub value: String,
}

/// Credential issued by or to this tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: String,
    pub role: CredentialRole,
    pub schema_id: String,
    pub cred_def_id: String,
    /// Attributes in offer order.
    pub attributes: Vec<CredentialValue>,
    pub initiated_by_us: bool,
    pub approved: Option<DateTime<Utc>>,
    pub issued: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub sort_key: SortKey,
}

// =============================================================================
// Proofs
// =============================================================================

/// Single requested proof attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofAttribute {
    pub id: String,
    pub name: String,
    pub cred_def_id: String,
    /// Revealed value, filled in once the proof is presented.
    pub value: String,
}

/// Proof requested by or from this tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: String,
    pub role: ProofRole,
    /// Attributes in request order.
    pub attributes: Vec<ProofAttribute>,
    pub result: bool,
    pub provable: Option<DateTime<Utc>>,
    pub initiated_by_us: bool,
    pub approved: Option<DateTime<Utc>>,
    pub verified: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub sort_key: SortKey,
}

// =============================================================================
// Messages & Events
// =============================================================================

/// Basic message exchanged over a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: String,
    pub message: String,
    pub sent_by_me: bool,
    /// Delivery outcome; `None` until the agency reports it.
    pub delivered: Option<bool>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub sort_key: SortKey,
}

/// User-facing notification about a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub tenant_id: String,
    pub connection_id: Option<String>,
    pub job_id: Option<String>,
    pub description: String,
    pub read: bool,
    pub created: DateTime<Utc>,
    pub sort_key: SortKey,
}

// =============================================================================
// Jobs
// =============================================================================

/// Protocol job tracked for the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub tenant_id: String,
    pub protocol_type: ProtocolType,
    /// Identifier of the connection/credential/proof/message the protocol
    /// produced, once known.
    pub protocol_id: Option<String>,
    pub connection_id: Option<String>,
    pub status: JobStatus,
    pub result: JobResult,
    pub initiated_by_us: bool,
    pub updated: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub sort_key: SortKey,
}

impl_item!(
    Connection => Connection,
    Credential => Credential,
    Proof => Proof,
    Message => Message,
    Event => Event,
    Job => Job,
);

// =============================================================================
// Updates
// =============================================================================

/// Timestamp changes for a credential exchange.
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub approved: Option<DateTime<Utc>>,
    pub issued: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
}

impl CredentialUpdate {
    /// Apply the update in place.
    pub fn apply(&self, credential: &mut Credential) {
        if let Some(at) = self.approved {
            credential.approved = Some(at);
        }
        if let Some(at) = self.issued {
            credential.issued = Some(at);
        }
        if let Some(at) = self.failed {
            credential.failed = Some(at);
        }
    }
}

/// Changes for a proof exchange.
///
/// `values` maps attribute ids to revealed values. `None` fields leave the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofUpdate {
    pub approved: Option<DateTime<Utc>>,
    pub verified: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
    pub result: Option<bool>,
    pub values: Vec<(String, String)>,
}

impl ProofUpdate {
    /// Apply the update in place.
    pub fn apply(&self, proof: &mut Proof) {
        if let Some(at) = self.approved {
            proof.approved = Some(at);
        }
        if let Some(at) = self.verified {
            proof.verified = Some(at);
        }
        if let Some(at) = self.failed {
            proof.failed = Some(at);
        }
        if let Some(result) = self.result {
            proof.result = result;
        }
        for (attr_id, value) in &self.values {
            if let Some(attr) = proof.attributes.iter_mut().find(|a| &a.id == attr_id) {
                attr.value = value.clone();
            }
        }
    }
}

/// Status change for a protocol job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub result: JobResult,
    pub protocol_id: Option<String>,
    pub updated: DateTime<Utc>,
}

impl JobUpdate {
    /// Apply the update in place.
    pub fn apply(&self, job: &mut Job) {
        job.status = self.status;
        job.result = self.result;
        if self.protocol_id.is_some() {
            job.protocol_id = self.protocol_id.clone();
        }
        job.updated = self.updated;
    }
}

// =============================================================================
// Tests
// =============================================================================
