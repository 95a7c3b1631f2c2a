//! Outbox repository contract, checked against both backends
//!
//! The Postgres variants need a running database (`DATABASE_URL`) and are
//! ignored by default:
//!
//! ```sh
//! cargo test -p outbox --test outbox_repository_test -- --ignored
//! ```

mod common;

use chrono::{DateTime, Duration, Utc};
use common::clean_pg_store;
use outbox::{
    InMemoryStore, OutboxError, OutboxMessage, OutboxRepository, PgStore, TransactionalStore,
};
use serial_test::serial;
use uuid::Uuid;

async fn insert<S, Sess>(store: &S, message: &OutboxMessage)
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let mut session = store.begin().await.unwrap();
    store.add(&mut session, message).await.unwrap();
    store.commit(session).await.unwrap();
}

// ============================================================================
// Scenarios
// ============================================================================

async fn round_trip_preserves_type_content_and_retry_count<S, Sess>(store: &S)
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let payload = r#"{"order_id":"o-1","total":42}"#;
    let message = OutboxMessage::new("X", payload, Utc::now());
    insert(store, &message).await;

    let pending = store.get_unprocessed(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, message.id);
    assert_eq!(pending[0].event_type, "X");
    assert_eq!(pending[0].content, payload);
    assert_eq!(pending[0].retry_count, 0);
}

async fn oldest_first_up_to_batch_size<S, Sess>(store: &S)
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let t3 = Utc::now();
    let t2 = t3 - Duration::seconds(10);
    let t1 = t3 - Duration::seconds(20);

    // Inserted out of order on purpose
    let m3 = OutboxMessage::new("t", "3", t3);
    let m1 = OutboxMessage::new("t", "1", t1);
    let m2 = OutboxMessage::new("t", "2", t2);
    for m in [&m3, &m1, &m2] {
        insert(store, m).await;
    }

    let ids: Vec<Uuid> = store
        .get_unprocessed(2)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec![m1.id, m2.id]);
}

/// Marks one fresh message processed twice and returns its id
async fn mark_processed_twice<S, Sess>(store: &S) -> Uuid
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let message = OutboxMessage::new("t", "{}", Utc::now());
    insert(store, &message).await;

    store.mark_as_processed(message.id).await.unwrap();
    store.mark_as_processed(message.id).await.unwrap();

    assert!(store.get_unprocessed(10).await.unwrap().is_empty());
    message.id
}

async fn failures_accumulate_without_processing<S, Sess>(store: &S) -> Uuid
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let message = OutboxMessage::new("t", "{}", Utc::now());
    insert(store, &message).await;

    store.mark_as_failed(message.id, "first", 1).await.unwrap();
    store.mark_as_failed(message.id, "second", 2).await.unwrap();

    let pending = store.get_unprocessed(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].retry_count, 2);

    // Ceiling reached: hidden from polling, listed for operators
    assert!(store.get_retryable(10, 2).await.unwrap().is_empty());
    assert_eq!(store.get_retryable(10, 3).await.unwrap().len(), 1);

    let exhausted = store.get_exhausted(10, 2).await.unwrap();
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].error.as_deref(), Some("second"));
    assert!(exhausted[0].processed_on.is_none());

    store.reset_retries(message.id).await.unwrap();
    assert_eq!(store.get_retryable(10, 2).await.unwrap().len(), 1);

    message.id
}

async fn unknown_ids_are_not_found<S, Sess>(store: &S)
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let missing = Uuid::new_v4();
    assert!(matches!(
        store.mark_as_processed(missing).await,
        Err(OutboxError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        store.mark_as_failed(missing, "e", 1).await,
        Err(OutboxError::NotFound(_))
    ));
    assert!(matches!(
        store.reset_retries(missing).await,
        Err(OutboxError::NotFound(_))
    ));
}

async fn non_positive_batch_selects_nothing<S, Sess>(store: &S)
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    insert(store, &OutboxMessage::new("t", "{}", Utc::now())).await;

    for size in [0, -1] {
        assert!(store.get_unprocessed(size).await.unwrap().is_empty());
        assert!(store.get_retryable(size, 3).await.unwrap().is_empty());
        assert!(store.get_exhausted(size, 0).await.unwrap().is_empty());
    }
}

async fn rolled_back_session_adds_nothing<S, Sess>(store: &S)
where
    S: TransactionalStore<Session = Sess> + OutboxRepository<Session = Sess>,
    Sess: Send,
{
    let mut session = store.begin().await.unwrap();
    store
        .add(&mut session, &OutboxMessage::new("t", "{}", Utc::now()))
        .await
        .unwrap();
    drop(session);

    assert!(store.get_unprocessed(10).await.unwrap().is_empty());
}

// ============================================================================
// In-memory backend
// ============================================================================

#[tokio::test]
async fn test_memory_round_trip() {
    round_trip_preserves_type_content_and_retry_count(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_oldest_first() {
    oldest_first_up_to_batch_size(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_mark_processed_idempotent() {
    let store = InMemoryStore::new();
    let id = mark_processed_twice(&store).await;
    let first = store.outbox_message(id).unwrap().processed_on;
    assert!(first.is_some());

    store.mark_as_processed(id).await.unwrap();
    assert_eq!(store.outbox_message(id).unwrap().processed_on, first);
}

#[tokio::test]
async fn test_memory_failures_accumulate() {
    let store = InMemoryStore::new();
    let id = failures_accumulate_without_processing(&store).await;

    let row = store.outbox_message(id).unwrap();
    assert_eq!(row.retry_count, 0);
    assert!(row.error.is_none());
}

#[tokio::test]
async fn test_memory_retry_count_never_decreases_through_mark_failed() {
    let store = InMemoryStore::new();
    let message = OutboxMessage::new("t", "{}", Utc::now());
    insert(&store, &message).await;

    store.mark_as_failed(message.id, "late", 3).await.unwrap();
    store.mark_as_failed(message.id, "stale", 1).await.unwrap();

    let row = store.outbox_message(message.id).unwrap();
    assert_eq!(row.retry_count, 3);
    assert_eq!(row.error.as_deref(), Some("stale"));
}

#[tokio::test]
async fn test_memory_unknown_ids() {
    unknown_ids_are_not_found(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_non_positive_batch() {
    non_positive_batch_selects_nothing(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_rollback() {
    rolled_back_session_adds_nothing(&InMemoryStore::new()).await;
}

// ============================================================================
// Postgres backend
// ============================================================================

async fn pg_processed_on(store: &PgStore, id: Uuid) -> Option<DateTime<Utc>> {
    let (processed_on,): (Option<DateTime<Utc>>,) =
        sqlx::query_as("SELECT processed_on FROM outbox_messages WHERE id = $1")
            .bind(id)
            .fetch_one(store.pool())
            .await
            .unwrap();
    processed_on
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_round_trip() {
    round_trip_preserves_type_content_and_retry_count(&clean_pg_store().await).await;
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_oldest_first() {
    oldest_first_up_to_batch_size(&clean_pg_store().await).await;
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_mark_processed_idempotent() {
    let store = clean_pg_store().await;
    let id = mark_processed_twice(&store).await;
    let first = pg_processed_on(&store, id).await;
    assert!(first.is_some());

    store.mark_as_processed(id).await.unwrap();
    assert_eq!(pg_processed_on(&store, id).await, first);
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_failures_accumulate() {
    let store = clean_pg_store().await;
    failures_accumulate_without_processing(&store).await;
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_unknown_ids() {
    unknown_ids_are_not_found(&clean_pg_store().await).await;
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_rollback() {
    rolled_back_session_adds_nothing(&clean_pg_store().await).await;
}

#[tokio::test]
#[ignore] // Requires Postgres
#[serial]
async fn test_pg_non_positive_batch() {
    non_positive_batch_selects_nothing(&clean_pg_store().await).await;
}
