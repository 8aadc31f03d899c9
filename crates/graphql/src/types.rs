//! GraphQL type definitions.

use async_graphql::{EmptyMutation, EmptySubscription, Schema, SimpleObject};
use chrono::{DateTime, Utc};

use vault_core::models;
use vault_core::ports::Page;

use crate::schema::VaultQuery;

/// The vault GraphQL schema type.
pub type VaultSchema = Schema<VaultQuery, EmptyMutation, EmptySubscription>;

/// Tenant the current request is scoped to.
///
/// Inserted as request data by the HTTP handler from the `x-tenant-id`
/// header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(pub String);

// -----------------------------------------------------------------------------
// Object Types
// -----------------------------------------------------------------------------

/// Tenant agent.
#[derive(SimpleObject)]
pub struct Agent {
    pub tenant_id: String,
    pub agent_id: String,
    pub label: String,
    pub created: DateTime<Utc>,
}

impl From<models::Agent> for Agent {
    fn from(a: models::Agent) -> Self {
        Self {
            tenant_id: a.tenant_id,
            agent_id: a.agent_id,
            label: a.label,
            created: a.created,
        }
    }
}

/// Pairwise connection.
#[derive(SimpleObject)]
pub struct Connection {
    pub id: String,
    pub our_did: String,
    pub their_did: String,
    pub their_endpoint: String,
    pub their_label: String,
    pub invited: bool,
    pub approved: Option<DateTime<Utc>>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl From<models::Connection> for Connection {
    fn from(c: models::Connection) -> Self {
        Self {
            id: c.id,
            our_did: c.our_did,
            their_did: c.their_did,
            their_endpoint: c.their_endpoint,
            their_label: c.their_label,
            invited: c.invited,
            approved: c.approved,
            archived: c.archived,
            created: c.created,
        }
    }
}

/// Credential attribute.
#[derive(SimpleObject)]
pub struct CredentialValue {
    pub id: String,
    pub name: String,
    pub value: String,
}

/// Credential.
#[derive(SimpleObject)]
pub struct Credential {
    pub id: String,
    pub connection_id: String,
    /// `issuer` or `holder`.
    pub role: String,
    pub schema_id: String,
    pub cred_def_id: String,
    pub attributes: Vec<CredentialValue>,
    pub initiated_by_us: bool,
    pub approved: Option<DateTime<Utc>>,
    pub issued: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl From<models::Credential> for Credential {
    fn from(c: models::Credential) -> Self {
        Self {
            id: c.id,
            connection_id: c.connection_id,
            role: c.role.to_string(),
            schema_id: c.schema_id,
            cred_def_id: c.cred_def_id,
            attributes: c
                .attributes
                .into_iter()
                .map(|v| CredentialValue {
                    id: v.id,
                    name: v.name,
                    value: v.value,
                })
                .collect(),
            initiated_by_us: c.initiated_by_us,
            approved: c.approved,
            issued: c.issued,
            failed: c.failed,
            archived: c.archived,
            created: c.created,
        }
    }
}

/// Requested proof attribute.
#[derive(SimpleObject)]
pub struct ProofAttribute {
    pub id: String,
    pub name: String,
    pub cred_def_id: String,
    pub value: String,
}

/// Proof.
#[derive(SimpleObject)]
pub struct Proof {
    pub id: String,
    pub connection_id: String,
    /// `prover` or `verifier`.
    pub role: String,
    pub attributes: Vec<ProofAttribute>,
    pub result: bool,
    pub provable: Option<DateTime<Utc>>,
    pub initiated_by_us: bool,
    pub approved: Option<DateTime<Utc>>,
    pub verified: Option<DateTime<Utc>>,
    pub failed: Option<DateTime<Utc>>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl From<models::Proof> for Proof {
    fn from(p: models::Proof) -> Self {
        Self {
            id: p.id,
            connection_id: p.connection_id,
            role: p.role.to_string(),
            attributes: p
                .attributes
                .into_iter()
                .map(|a| ProofAttribute {
                    id: a.id,
                    name: a.name,
                    cred_def_id: a.cred_def_id,
                    value: a.value,
                })
                .collect(),
            result: p.result,
            provable: p.provable,
            initiated_by_us: p.initiated_by_us,
            approved: p.approved,
            verified: p.verified,
            failed: p.failed,
            archived: p.archived,
            created: p.created,
        }
    }
}

/// Basic message.
#[derive(SimpleObject)]
pub struct Message {
    pub id: String,
    pub connection_id: String,
    pub message: String,
    pub sent_by_me: bool,
    pub delivered: Option<bool>,
    pub archived: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl From<models::Message> for Message {
    fn from(m: models::Message) -> Self {
        Self {
            id: m.id,
            connection_id: m.connection_id,
            message: m.message,
            sent_by_me: m.sent_by_me,
            delivered: m.delivered,
            archived: m.archived,
            created: m.created,
        }
    }
}

/// Notification event.
#[derive(SimpleObject)]
pub struct Event {
    pub id: String,
    pub connection_id: Option<String>,
    pub job_id: Option<String>,
    pub description: String,
    pub read: bool,
    pub created: DateTime<Utc>,
}

impl From<models::Event> for Event {
    fn from(e: models::Event) -> Self {
        Self {
            id: e.id,
            connection_id: e.connection_id,
            job_id: e.job_id,
            description: e.description,
            read: e.read,
            created: e.created,
        }
    }
}

/// Protocol job.
#[derive(SimpleObject)]
pub struct Job {
    pub id: String,
    pub protocol_type: String,
    pub protocol_id: Option<String>,
    pub connection_id: Option<String>,
    pub status: String,
    pub result: String,
    pub initiated_by_us: bool,
    pub updated: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl From<models::Job> for Job {
    fn from(j: models::Job) -> Self {
        Self {
            id: j.id,
            protocol_type: j.protocol_type.to_string(),
            protocol_id: j.protocol_id,
            connection_id: j.connection_id,
            status: j.status.to_string(),
            result: j.result.to_string(),
            initiated_by_us: j.initiated_by_us,
            updated: j.updated,
            created: j.created,
        }
    }
}

// -----------------------------------------------------------------------------
// Connection Types (Relay-style pagination)
// -----------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Generate Relay-style connection types (Edge + Connection) with From impl.
macro_rules! define_connection {
    ($node:ident, $edge:ident, $connection:ident) => {
        #[derive(SimpleObject)]
        pub struct $edge {
            pub node: $node,
            pub cursor: String,
        }

        #[derive(SimpleObject)]
        pub struct $connection {
            pub edges: Vec<$edge>,
            pub nodes: Vec<$node>,
            pub page_info: PageInfo,
            pub total_count: Option<i64>,
        }

        impl From<Page<models::$node>> for $connection {
            fn from(page: Page<models::$node>) -> Self {
                Self {
                    edges: page
                        .edges
                        .into_iter()
                        .map(|e| $edge {
                            node: $node::from(e.node),
                            cursor: e.cursor.value,
                        })
                        .collect(),
                    nodes: page.nodes.into_iter().map($node::from).collect(),
                    page_info: PageInfo {
                        has_next_page: page.page_info.has_next_page,
                        has_previous_page: page.page_info.has_previous_page,
                        start_cursor: page.page_info.start_cursor.map(|c| c.value),
                        end_cursor: page.page_info.end_cursor.map(|c| c.value),
                    },
                    total_count: page.total_count,
                }
            }
        }
    };
}

define_connection!(Connection, ConnectionEdge, ConnectionConnection);
define_connection!(Credential, CredentialEdge, CredentialConnection);
define_connection!(Proof, ProofEdge, ProofConnection);
define_connection!(Message, MessageEdge, MessageConnection);
define_connection!(Event, EventEdge, EventConnection);
define_connection!(Job, JobEdge, JobConnection);
