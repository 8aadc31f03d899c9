//! Every pagination scenario runs against the SQLite and in-memory
//! backends, and the resulting pages must be identical.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use vault_core::error::StorageError;
use vault_core::models::{
    Agent, Connection, Credential, CredentialRole, CredentialUpdate, CredentialValue, EntityType,
    Event, Item, Job, JobResult, JobStatus, JobUpdate, Message, Proof, ProofAttribute, ProofRole,
    ProofUpdate, ProtocolType, SortKey,
};
use vault_core::ports::{BatchRequest, Cursor, JobFilter, Page, Repositories, ScopeFilter};
use vault_core::services::QueryService;
use vault_storage::{Database, MemRepositories, SqlRepositories};

const TENANT: &str = "tenant-1";
const OTHER_TENANT: &str = "tenant-2";

type Outcome<T> = Result<Page<T>, &'static str>;

// =============================================================================
// Fixtures
// =============================================================================

fn at(key: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + key as i64).unwrap()
}

fn connection_for(key: u64) -> &'static str {
    if key % 2 == 0 { "conn-even" } else { "conn-odd" }
}

fn connection(tenant: &str, key: u64) -> Connection {
    Connection {
        id: format!("connection-{key}"),
        tenant_id: tenant.to_string(),
        our_did: format!("did:our:{key}"),
        their_did: format!("did:their:{key}"),
        their_endpoint: format!("http://agent-{key}.example"),
        their_label: format!("Agent {key}"),
        invited: key % 3 == 0,
        approved: Some(at(key)),
        archived: None,
        created: at(key),
        sort_key: SortKey(key),
    }
}

fn credential(tenant: &str, key: u64) -> Credential {
    // 0, 1 or 2 attributes so parents with no joined rows are covered
    let attributes = (0..key % 3)
        .map(|i| CredentialValue {
            id: format!("value-{key}-{i}"),
            name: format!("attr{i}"),
            value: format!("v{key}.{i}"),
        })
        .collect();
    Credential {
        id: format!("credential-{key}"),
        tenant_id: tenant.to_string(),
        connection_id: connection_for(key).to_string(),
        role: if key % 2 == 0 { CredentialRole::Issuer } else { CredentialRole::Holder },
        schema_id: "schema:1".to_string(),
        cred_def_id: "creddef:1".to_string(),
        attributes,
        initiated_by_us: key % 2 == 0,
        approved: None,
        issued: None,
        failed: None,
        archived: None,
        created: at(key),
        sort_key: SortKey(key),
    }
}

fn proof(tenant: &str, key: u64) -> Proof {
    let attributes = (0..(key % 4))
        .map(|i| ProofAttribute {
            id: format!("attr-{key}-{i}"),
            name: format!("field{i}"),
            cred_def_id: "creddef:1".to_string(),
            value: String::new(),
        })
        .collect();
    Proof {
        id: format!("proof-{key}"),
        tenant_id: tenant.to_string(),
        connection_id: connection_for(key).to_string(),
        role: ProofRole::Verifier,
        attributes,
        result: false,
        provable: None,
        initiated_by_us: true,
        approved: None,
        verified: None,
        failed: None,
        archived: None,
        created: at(key),
        sort_key: SortKey(key),
    }
}

fn message(tenant: &str, key: u64) -> Message {
    Message {
        id: format!("message-{key}"),
        tenant_id: tenant.to_string(),
        connection_id: connection_for(key).to_string(),
        message: format!("hello {key}"),
        sent_by_me: key % 2 == 1,
        delivered: None,
        archived: None,
        created: at(key),
        sort_key: SortKey(key),
    }
}

fn event(tenant: &str, key: u64) -> Event {
    Event {
        id: format!("event-{key}"),
        tenant_id: tenant.to_string(),
        connection_id: (key % 5 != 0).then(|| connection_for(key).to_string()),
        job_id: Some(format!("job-{key}")),
        description: format!("event {key}"),
        read: false,
        created: at(key),
        sort_key: SortKey(key),
    }
}

fn job(tenant: &str, key: u64) -> Job {
    let status = match key % 3 {
        0 => JobStatus::Complete,
        1 => JobStatus::Waiting,
        _ => JobStatus::Pending,
    };
    Job {
        id: format!("job-{key}"),
        tenant_id: tenant.to_string(),
        protocol_type: ProtocolType::Credential,
        protocol_id: None,
        connection_id: Some(connection_for(key).to_string()),
        status,
        result: if status == JobStatus::Complete { JobResult::Success } else { JobResult::None },
        initiated_by_us: true,
        updated: at(key),
        created: at(key),
        sort_key: SortKey(key),
    }
}

/// Write the fixture through the repository write operations.
///
/// Keys 1..=15 for the main tenant, written out of order so the in-memory
/// collections exercise ordered insertion, plus a few items for a second
/// tenant that must never leak.
async fn seed(repos: &dyn Repositories) {
    repos
        .agents()
        .add_agent(&Agent {
            tenant_id: TENANT.to_string(),
            agent_id: "agent-1".to_string(),
            label: "First tenant".to_string(),
            created: at(0),
        })
        .await
        .unwrap();

    let mut keys: Vec<u64> = (1..=15).collect();
    keys.swap(3, 11);

    for tenant in [TENANT, OTHER_TENANT] {
        let keys: Vec<u64> = if tenant == TENANT { keys.clone() } else { vec![2, 7, 16] };
        for &key in &keys {
            repos.connections().add_connection(&connection(tenant, key)).await.unwrap();
            repos.credentials().add_credential(&credential(tenant, key)).await.unwrap();
            repos.proofs().add_proof(&proof(tenant, key)).await.unwrap();
            repos.messages().add_message(&message(tenant, key)).await.unwrap();
            repos.events().add_event(&event(tenant, key)).await.unwrap();
            repos.jobs().add_job(&job(tenant, key)).await.unwrap();
        }
    }
}

async fn sql_service() -> QueryService {
    let db = Database::in_memory().await.unwrap();
    let repos = SqlRepositories::new(&db);
    seed(&repos).await;
    QueryService::new(Arc::new(repos))
}

async fn memory_service() -> QueryService {
    let repos = MemRepositories::new();
    seed(&repos).await;
    QueryService::new(Arc::new(repos))
}

/// Run `query` against both backends, assert equal results, return one.
async fn both<T, F, Fut>(query: F) -> T
where
    F: Fn(QueryService) -> Fut,
    Fut: Future<Output = T>,
    T: PartialEq + Debug,
{
    let sql = query(sql_service().await).await;
    let memory = query(memory_service().await).await;
    assert_eq!(sql, memory, "backends disagree");
    sql
}

fn c(key: u64, entity: EntityType) -> Cursor {
    Cursor::encode(SortKey(key), entity)
}

fn keys<T: Item>(page: &Page<T>) -> Vec<u64> {
    page.nodes.iter().map(|n| n.sort_key().value()).collect()
}

fn flags<T>(page: &Page<T>) -> (bool, bool) {
    (page.page_info.has_next_page, page.page_info.has_previous_page)
}

async fn connections(svc: QueryService, request: BatchRequest) -> Outcome<Connection> {
    svc.list_connections(TENANT, &request).await.map_err(|e| e.code())
}

/// Entity-independent view of a page.
#[derive(Debug, PartialEq)]
struct Listing {
    ids: Vec<String>,
    keys: Vec<u64>,
    flags: (bool, bool),
    total: Option<i64>,
}

impl<T: Item> From<Page<T>> for Listing {
    fn from(page: Page<T>) -> Self {
        Self {
            ids: page.nodes.iter().map(|n| n.id().to_string()).collect(),
            keys: keys(&page),
            flags: flags(&page),
            total: page.total_count,
        }
    }
}

fn fixture_id(entity: EntityType, key: u64) -> String {
    format!("{}-{key}", entity.as_str().to_lowercase())
}

/// List any entity of the main tenant, optionally scoped to a connection.
///
/// Connections have no scope; `scope` is ignored for them.
async fn list(
    svc: QueryService,
    entity: EntityType,
    scope: Option<&str>,
    request: BatchRequest,
) -> Result<Listing, &'static str> {
    let filter = ScopeFilter {
        connection_id: scope.map(str::to_string),
    };
    let outcome = match entity {
        EntityType::Connection => svc.list_connections(TENANT, &request).await.map(Listing::from),
        EntityType::Credential => {
            svc.list_credentials(TENANT, &filter, &request).await.map(Listing::from)
        }
        EntityType::Proof => svc.list_proofs(TENANT, &filter, &request).await.map(Listing::from),
        EntityType::Message => {
            svc.list_messages(TENANT, &filter, &request).await.map(Listing::from)
        }
        EntityType::Event => svc.list_events(TENANT, &filter, &request).await.map(Listing::from),
        EntityType::Job => {
            let filter = JobFilter {
                connection_id: filter.connection_id,
                completed: None,
            };
            svc.list_jobs(TENANT, &filter, &request).await.map(Listing::from)
        }
    };
    outcome.map_err(|e| e.code())
}

// =============================================================================
// Scenarios
// =============================================================================

/// Cursor scenarios over the unfiltered fixture: request, keys, flags.
fn cursor_scenarios(entity: EntityType) -> Vec<(BatchRequest, Vec<u64>, (bool, bool))> {
    vec![
        (BatchRequest::first(5), vec![1, 2, 3, 4, 5], (true, false)),
        (BatchRequest::first(5).after(c(5, entity)), vec![6, 7, 8, 9, 10], (true, true)),
        (BatchRequest::last(5).before(c(11, entity)), vec![6, 7, 8, 9, 10], (true, true)),
        (BatchRequest::last(3).after(c(10, entity)), vec![13, 14, 15], (false, true)),
        (BatchRequest::first(3).before(c(6, entity)), vec![1, 2, 3], (true, false)),
        (BatchRequest::first(5).after(c(99, entity)), vec![], (false, true)),
        (BatchRequest::last(5).before(c(1, entity)), vec![], (true, false)),
    ]
}

#[tokio::test]
async fn cursor_scenarios_agree_for_every_entity() {
    for entity in EntityType::ALL {
        for (request, expected, expected_flags) in cursor_scenarios(entity) {
            let listing = both(|svc| list(svc, entity, None, request.clone())).await.unwrap();
            assert_eq!(listing.keys, expected, "{entity} {request:?}");
            assert_eq!(listing.flags, expected_flags, "{entity} {request:?}");
            assert_eq!(listing.total, Some(15), "{entity} {request:?}");
            let ids: Vec<String> = expected.iter().map(|k| fixture_id(entity, *k)).collect();
            assert_eq!(listing.ids, ids, "{entity} {request:?}");
        }
    }
}

#[tokio::test]
async fn filtered_cursor_scenarios_agree() {
    // conn-even holds the even keys; events keyed by a multiple of 5 carry
    // no connection at all.
    let scoped = [
        EntityType::Credential,
        EntityType::Proof,
        EntityType::Message,
        EntityType::Event,
        EntityType::Job,
    ];

    for entity in scoped {
        let events = entity == EntityType::Event;
        let cases = [
            (BatchRequest::first(2).after(c(4, entity)), vec![6, 8], (true, true)),
            (
                BatchRequest::last(2).before(c(12, entity)),
                if events { vec![6, 8] } else { vec![8, 10] },
                (true, true),
            ),
            (
                BatchRequest::last(3).after(c(8, entity)),
                if events { vec![12, 14] } else { vec![10, 12, 14] },
                (false, true),
            ),
            (BatchRequest::first(3).before(c(7, entity)), vec![2, 4, 6], (true, false)),
            (BatchRequest::first(2).after(c(14, entity)), vec![], (false, true)),
        ];

        for (request, expected, expected_flags) in cases {
            let listing = both(|svc| list(svc, entity, Some("conn-even"), request.clone()))
                .await
                .unwrap();
            assert_eq!(listing.keys, expected, "{entity} {request:?}");
            assert_eq!(listing.flags, expected_flags, "{entity} {request:?}");
            assert_eq!(listing.total, Some(if events { 6 } else { 7 }), "{entity}");
        }
    }
}

#[tokio::test]
async fn first_covers_everything() {
    let page = both(|svc| connections(svc, BatchRequest::first(15))).await.unwrap();
    assert_eq!(keys(&page), (1..=15).collect::<Vec<_>>());
    assert_eq!(flags(&page), (false, false));
}

#[tokio::test]
async fn tail_symmetry() {
    for k in [1, 5, 14, 15, 16, 100] {
        let page = both(|svc| connections(svc, BatchRequest::last(k))).await.unwrap();
        let n = 15u64.min(k as u64);
        assert_eq!(keys(&page), (16 - n..=15).collect::<Vec<_>>(), "last={k}");
        assert_eq!(flags(&page), (false, k < 15));
    }
}

#[tokio::test]
async fn tail_after_cursor() {
    let request = BatchRequest::last(3).after(c(10, EntityType::Connection));
    let page = both(|svc| connections(svc, request.clone())).await.unwrap();
    assert_eq!(keys(&page), vec![13, 14, 15]);
    assert_eq!(flags(&page), (false, true));
}

#[tokio::test]
async fn first_before_cursor() {
    let request = BatchRequest::first(3).before(c(6, EntityType::Connection));
    let page = both(|svc| connections(svc, request.clone())).await.unwrap();
    assert_eq!(keys(&page), vec![1, 2, 3]);
    assert_eq!(flags(&page), (true, false));
}

#[tokio::test]
async fn cursors_past_either_end() {
    let past = BatchRequest::first(5).after(c(99, EntityType::Connection));
    let page = both(|svc| connections(svc, past.clone())).await.unwrap();
    assert!(page.edges.is_empty());
    assert_eq!(page.page_info.start_cursor, None);
    assert_eq!(flags(&page), (false, true));

    let before = BatchRequest::last(5).before(c(1, EntityType::Connection));
    let page = both(|svc| connections(svc, before.clone())).await.unwrap();
    assert!(page.nodes.is_empty());
    assert_eq!(flags(&page), (true, false));
}

#[tokio::test]
async fn edges_match_nodes_and_cursors() {
    let page = both(|svc| connections(svc, BatchRequest::first(4))).await.unwrap();
    assert_eq!(page.edges.len(), page.nodes.len());
    for (edge, node) in page.edges.iter().zip(&page.nodes) {
        assert_eq!(&edge.node, node);
        assert_eq!(edge.cursor.decode(EntityType::Connection).unwrap(), node.sort_key);
    }
    assert_eq!(page.page_info.start_cursor, Some(c(1, EntityType::Connection)));
    assert_eq!(page.page_info.end_cursor, Some(c(4, EntityType::Connection)));
}

#[tokio::test]
async fn walking_forward_and_back_visits_every_item() {
    for svc in [sql_service().await, memory_service().await] {
        let mut seen = Vec::new();
        let mut request = BatchRequest::first(4);
        loop {
            let page = svc.list_connections(TENANT, &request).await.unwrap();
            seen.extend(keys(&page));
            match page.page_info.end_cursor {
                Some(end) if page.page_info.has_next_page => {
                    request = BatchRequest::first(4).after(end);
                }
                _ => break,
            }
        }
        assert_eq!(seen, (1..=15).collect::<Vec<_>>(), "{}", svc.backend());

        let mut seen = Vec::new();
        let mut request = BatchRequest::last(4);
        loop {
            let page = svc.list_connections(TENANT, &request).await.unwrap();
            let mut chunk = keys(&page);
            chunk.extend(seen);
            seen = chunk;
            match page.page_info.start_cursor {
                Some(start) if page.page_info.has_previous_page => {
                    request = BatchRequest::last(4).before(start);
                }
                _ => break,
            }
        }
        assert_eq!(seen, (1..=15).collect::<Vec<_>>(), "{}", svc.backend());
    }
}

// =============================================================================
// Joined entities and filters
// =============================================================================

#[tokio::test]
async fn credentials_keep_attributes_across_pages() {
    for request in [
        BatchRequest::first(4),
        BatchRequest::first(4).after(c(4, EntityType::Credential)),
        BatchRequest::last(4),
        BatchRequest::last(4).before(c(9, EntityType::Credential)),
    ] {
        let page = both(|svc| {
            let request = request.clone();
            async move {
                svc.list_credentials(TENANT, &ScopeFilter::default(), &request)
                    .await
                    .map_err(|e| e.code())
            }
        })
        .await
        .unwrap();

        assert_eq!(page.nodes.len(), 4, "page size counts parents, not rows");
        for cred in &page.nodes {
            assert_eq!(cred.attributes.len() as u64, cred.sort_key.value() % 3);
        }
    }
}

#[tokio::test]
async fn proofs_keep_attribute_order() {
    let page = both(|svc| async move {
        svc.list_proofs(TENANT, &ScopeFilter::default(), &BatchRequest::last(6))
            .await
            .map_err(|e| e.code())
    })
    .await
    .unwrap();

    assert_eq!(keys(&page), (10..=15).collect::<Vec<_>>());
    let proof_15 = page.nodes.last().unwrap();
    let ids: Vec<&str> = proof_15.attributes.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["attr-15-0", "attr-15-1", "attr-15-2"]);
}

#[tokio::test]
async fn filtered_windowing() {
    let filter = ScopeFilter::connection("conn-even");

    let page = both(|svc| {
        let filter = filter.clone();
        async move {
            svc.list_messages(TENANT, &filter, &BatchRequest::first(3))
                .await
                .map_err(|e| e.code())
        }
    })
    .await
    .unwrap();
    assert_eq!(keys(&page), vec![2, 4, 6]);
    assert_eq!(flags(&page), (true, false));
    assert_eq!(page.total_count, Some(7));

    let request = BatchRequest::last(3).before(c(8, EntityType::Credential));
    let page = both(|svc| {
        let (filter, request) = (filter.clone(), request.clone());
        async move {
            svc.list_credentials(TENANT, &filter, &request)
                .await
                .map_err(|e| e.code())
        }
    })
    .await
    .unwrap();
    assert_eq!(keys(&page), vec![2, 4, 6]);
    assert_eq!(flags(&page), (true, false));
}

#[tokio::test]
async fn events_without_connection_are_excluded_by_scope() {
    let page = both(|svc| async move {
        svc.list_events(TENANT, &ScopeFilter::connection("conn-odd"), &BatchRequest::first(10))
            .await
            .map_err(|e| e.code())
    })
    .await
    .unwrap();
    assert_eq!(keys(&page), vec![1, 3, 7, 9, 11, 13]);
    assert_eq!(page.total_count, Some(6));
}

#[tokio::test]
async fn jobs_completed_filter() {
    let completed = JobFilter {
        completed: Some(true),
        ..Default::default()
    };
    let page = both(|svc| {
        let filter = completed.clone();
        async move {
            svc.list_jobs(TENANT, &filter, &BatchRequest::first(10))
                .await
                .map_err(|e| e.code())
        }
    })
    .await
    .unwrap();
    assert_eq!(keys(&page), vec![3, 6, 9, 12, 15]);

    let open = JobFilter {
        connection_id: Some("conn-odd".to_string()),
        completed: Some(false),
    };
    let page = both(|svc| {
        let filter = open.clone();
        async move {
            svc.list_jobs(TENANT, &filter, &BatchRequest::last(2))
                .await
                .map_err(|e| e.code())
        }
    })
    .await
    .unwrap();
    assert_eq!(keys(&page), vec![11, 13]);
    assert_eq!(flags(&page), (false, true));
}

#[tokio::test]
async fn tenants_never_leak() {
    let page = both(|svc| async move {
        svc.list_connections(OTHER_TENANT, &BatchRequest::first(10))
            .await
            .map_err(|e| e.code())
    })
    .await
    .unwrap();
    assert_eq!(keys(&page), vec![2, 7, 16]);
    assert!(page.nodes.iter().all(|n| n.tenant_id == OTHER_TENANT));

    let page = both(|svc| async move {
        svc.list_jobs("nobody", &JobFilter::default(), &BatchRequest::first(10))
            .await
            .map_err(|e| e.code())
    })
    .await
    .unwrap();
    assert!(page.nodes.is_empty());
    assert_eq!(page.total_count, Some(0));
}

// =============================================================================
// Rejected requests
// =============================================================================

#[tokio::test]
async fn rejected_requests_share_codes() {
    let cases = [
        (BatchRequest::default(), "MISSING_PAGE_SIZE"),
        (
            BatchRequest {
                first: Some(1),
                last: Some(1),
                ..Default::default()
            },
            "MISSING_PAGE_SIZE",
        ),
        (BatchRequest::first(0), "INVALID_PAGE_SIZE"),
        (BatchRequest::last(101), "INVALID_PAGE_SIZE"),
        (BatchRequest::first(5).after("not a cursor"), "INVALID_CURSOR"),
        (BatchRequest::first(5).after(c(3, EntityType::Job)), "INVALID_CURSOR"),
        (
            BatchRequest::first(5)
                .after(c(3, EntityType::Connection))
                .before(c(9, EntityType::Connection)),
            "CONFLICTING_CURSORS",
        ),
    ];

    for (request, code) in cases {
        let outcome = both(|svc| connections(svc, request.clone())).await;
        assert_eq!(outcome, Err(code));
    }
}

// =============================================================================
// Lookups and writes
// =============================================================================

#[tokio::test]
async fn lookups_agree() {
    let found = both(|svc| async move {
        (
            svc.get_agent(TENANT).await.map(|a| a.agent_id).map_err(|e| e.code()),
            svc.get_credential(TENANT, "credential-14").await.map_err(|e| e.code()),
            svc.get_proof(TENANT, "proof-7").await.map_err(|e| e.code()),
            svc.get_job(OTHER_TENANT, "job-16").await.map(|j| j.sort_key).map_err(|e| e.code()),
        )
    })
    .await;
    assert_eq!(found.0, Ok("agent-1".to_string()));
    assert_eq!(found.1.unwrap().attributes.len(), 2);
    assert_eq!(found.2.unwrap().attributes.len(), 3);
    assert_eq!(found.3, Ok(SortKey(16)));

    let missing = both(|svc| async move {
        (
            svc.get_agent(OTHER_TENANT).await.map_err(|e| e.code()).err(),
            svc.get_connection(TENANT, "nope").await.map_err(|e| e.code()).err(),
            svc.get_message(OTHER_TENANT, "message-1").await.map_err(|e| e.code()).err(),
            svc.get_event(TENANT, "event-99").await.map_err(|e| e.code()).err(),
        )
    })
    .await;
    assert_eq!(missing, (Some("NOT_FOUND"), Some("NOT_FOUND"), Some("NOT_FOUND"), Some("NOT_FOUND")));
}

#[tokio::test]
async fn updates_agree_and_keep_position() {
    let outcome = both(|svc| async move {
        let repos = svc.repositories();
        let connection = repos
            .connections()
            .archive_connection(TENANT, "connection-3", at(100))
            .await
            .unwrap();
        let credential = repos
            .credentials()
            .update_credential(
                TENANT,
                "credential-5",
                &CredentialUpdate {
                    issued: Some(at(101)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let proof = repos
            .proofs()
            .update_proof(
                TENANT,
                "proof-6",
                &ProofUpdate {
                    verified: Some(at(102)),
                    result: Some(true),
                    values: vec![("attr-6-1".to_string(), "revealed".to_string())],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let message = repos
            .messages()
            .mark_message_delivered(TENANT, "message-8", true)
            .await
            .unwrap();
        let event = repos.events().mark_event_read(TENANT, "event-9").await.unwrap();
        let job = repos
            .jobs()
            .update_job(
                TENANT,
                "job-10",
                &JobUpdate {
                    status: JobStatus::Complete,
                    result: JobResult::Failure,
                    protocol_id: Some("credential-10".to_string()),
                    updated: at(103),
                },
            )
            .await
            .unwrap();

        let page = svc
            .list_connections(TENANT, &BatchRequest::first(3))
            .await
            .unwrap();

        (connection, credential, proof, message, event, job, page)
    })
    .await;

    let (connection, credential, proof, message, event, job, page) = outcome;
    assert_eq!(connection.archived, Some(at(100)));
    assert_eq!(credential.issued, Some(at(101)));
    assert_eq!(credential.sort_key, SortKey(5));
    assert!(proof.result);
    assert_eq!(proof.attributes[1].value, "revealed");
    assert_eq!(proof.attributes[0].value, "");
    assert_eq!(message.delivered, Some(true));
    assert!(event.read);
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.protocol_id.as_deref(), Some("credential-10"));

    // archived connections stay in place
    assert_eq!(keys(&page), vec![1, 2, 3]);
    assert!(page.nodes[2].archived.is_some());
}

#[tokio::test]
async fn missing_updates_and_duplicates_agree() {
    for svc in [sql_service().await, memory_service().await] {
        let repos = svc.repositories();

        let err = repos.events().mark_event_read(TENANT, "event-404").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: EntityType::Event, .. }));

        let err = repos
            .messages()
            .mark_message_delivered(OTHER_TENANT, "message-1", true)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));

        let err = repos.jobs().add_job(&job(TENANT, 4)).await.unwrap_err();
        assert!(
            matches!(err, StorageError::ConstraintViolation { operation: "add_job", .. }),
            "{}: {err}",
            svc.backend()
        );

        let err = repos.credentials().add_credential(&credential(TENANT, 2)).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation { .. }));
    }
}

#[tokio::test]
async fn unset_sort_key_comes_from_creation_time() {
    let page = both(|svc| async move {
        let mut unkeyed = message(OTHER_TENANT, 20);
        unkeyed.sort_key = SortKey(0);
        svc.repositories().messages().add_message(&unkeyed).await.unwrap();

        svc.list_messages(OTHER_TENANT, &ScopeFilter::default(), &BatchRequest::last(1))
            .await
            .map_err(|e| e.code())
    })
    .await
    .unwrap();

    let created = at(20).timestamp_millis() as u64;
    assert_eq!(keys(&page), vec![created]);
    assert_eq!(page.edges[0].cursor, c(created, EntityType::Message));
}

#[tokio::test]
async fn equal_keys_are_ordered_by_id() {
    const TIES: &str = "tenant-ties";

    let outcome = both(|svc| async move {
        let repos = svc.repositories();
        for (id, key) in [("zeta", 7), ("alpha", 7), ("early", 3), ("late", 9)] {
            let credential = Credential {
                id: id.to_string(),
                ..credential(TIES, key)
            };
            repos.credentials().add_credential(&credential).await.unwrap();
            let message = Message {
                id: id.to_string(),
                ..message(TIES, key)
            };
            repos.messages().add_message(&message).await.unwrap();
        }

        let all = ScopeFilter::default();
        let mut listings = Vec::new();
        for request in [
            BatchRequest::first(10),
            BatchRequest::first(2),
            BatchRequest::last(2),
            BatchRequest::first(10).after(c(3, EntityType::Credential)),
            BatchRequest::last(10).before(c(9, EntityType::Credential)),
        ] {
            let page = svc.list_credentials(TIES, &all, &request).await.unwrap();
            listings.push(Listing::from(page));
        }
        let messages = svc
            .list_messages(TIES, &all, &BatchRequest::last(3))
            .await
            .map(Listing::from)
            .map_err(|e| e.code());
        (listings, messages)
    })
    .await;

    let (credentials, messages) = outcome;
    let ids: Vec<Vec<&str>> = credentials
        .iter()
        .map(|l| l.ids.iter().map(String::as_str).collect())
        .collect();
    assert_eq!(ids[0], vec!["early", "alpha", "zeta", "late"]);
    assert_eq!(ids[1], vec!["early", "alpha"]);
    assert_eq!(ids[2], vec!["zeta", "late"]);
    assert_eq!(ids[3], vec!["alpha", "zeta", "late"]);
    assert_eq!(ids[4], vec!["early", "alpha", "zeta"]);
    assert_eq!(credentials[1].flags, (true, false));
    assert_eq!(messages.unwrap().ids, vec!["alpha", "zeta", "late"]);
}

#[tokio::test]
async fn sort_keys_outside_the_storable_range_are_rejected() {
    for svc in [sql_service().await, memory_service().await] {
        let repos = svc.repositories();

        let oversized = Event {
            sort_key: SortKey(u64::MAX),
            ..event(OTHER_TENANT, 30)
        };
        let err = repos.events().add_event(&oversized).await.unwrap_err();
        assert!(
            matches!(err, StorageError::ConstraintViolation { operation: "add_event", .. }),
            "{}: {err}",
            svc.backend()
        );

        let largest = Event {
            sort_key: SortKey::MAX,
            ..event(OTHER_TENANT, 31)
        };
        repos.events().add_event(&largest).await.unwrap();

        let page = svc
            .list_events(OTHER_TENANT, &ScopeFilter::default(), &BatchRequest::last(1))
            .await
            .unwrap();
        assert_eq!(keys(&page), vec![SortKey::MAX.value()], "{}", svc.backend());
        assert_eq!(page.total_count, Some(4), "{}", svc.backend());
        assert_eq!(
            page.edges[0].cursor.decode(EntityType::Event).unwrap(),
            SortKey::MAX
        );

        let zero = BatchRequest::first(1).after(c(0, EntityType::Event));
        let err = svc
            .list_events(OTHER_TENANT, &ScopeFilter::default(), &zero)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_CURSOR");
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_consistent_snapshots_while_writing() {
    let repos = Arc::new(MemRepositories::new());
    seed(repos.as_ref()).await;
    let svc = QueryService::new(repos.clone());

    let writer = {
        let repos = repos.clone();
        tokio::spawn(async move {
            for key in 16..=200 {
                repos.messages().add_message(&message(TENANT, key)).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let svc = svc.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let page = svc
                    .list_messages(TENANT, &ScopeFilter::default(), &BatchRequest::first(10))
                    .await
                    .unwrap();
                assert_eq!(keys(&page), (1..=10).collect::<Vec<_>>());

                let tail = svc
                    .list_messages(TENANT, &ScopeFilter::default(), &BatchRequest::last(5))
                    .await
                    .unwrap();
                let tail_keys = keys(&tail);
                assert_eq!(tail_keys.len(), 5);
                assert!(tail_keys.windows(2).all(|w| w[0] + 1 == w[1]));
                // keys are contiguous from 1, so the newest key is the total
                assert_eq!(tail.total_count, Some(tail_keys[4] as i64));
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    let total = svc
        .list_messages(TENANT, &ScopeFilter::default(), &BatchRequest::first(1))
        .await
        .unwrap()
        .total_count;
    assert_eq!(total, Some(200));
}
