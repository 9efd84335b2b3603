//! Postgres store and lock tests.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::time::Duration;

use sqlx::PgPool;

use engager_worker::lock::{PgRunLock, RunLock};
use engager_worker::store::{AccountStore, PgStore, RequestStore};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

async fn test_store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = PgStore::connect(&url).await.ok()?;
    store.migrate().await.ok()?;

    sqlx::query("TRUNCATE accounts, engagement_requests, worker_locks")
        .execute(store.pool())
        .await
        .ok()?;

    Some(store)
}

fn pool(store: &PgStore) -> PgPool {
    store.pool().clone()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn pending_requests_disappear_once_engaged() {
    let Some(store) = test_store().await else {
        return;
    };

    let account_id = store.upsert_account("100", "cipher-1").await.unwrap();
    let request = store
        .create_request("https://x.com/a/status/1")
        .await
        .unwrap();
    assert!(request.is_pending());

    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);

    store
        .set_engaged_accounts(request.id, &[account_id])
        .await
        .unwrap();

    assert!(store.list_pending().await.unwrap().is_empty());
    let all = store.list_requests().await.unwrap();
    assert_eq!(all[0].engaged_account_ids, vec![account_id]);
}

#[tokio::test]
async fn empty_overwrite_keeps_request_pending() {
    let Some(store) = test_store().await else {
        return;
    };

    let request = store
        .create_request("https://x.com/a/status/2")
        .await
        .unwrap();
    store.set_engaged_accounts(request.id, &[]).await.unwrap();

    assert_eq!(store.list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_replaces_credential_for_same_external_id() {
    let Some(store) = test_store().await else {
        return;
    };

    let first = store.upsert_account("100", "cipher-1").await.unwrap();
    let second = store.upsert_account("100", "cipher-2").await.unwrap();
    assert_eq!(first, second);

    store.update_credential(first, "cipher-3").await.unwrap();
    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].encrypted_credential, "cipher-3");
}

#[tokio::test]
async fn updating_unknown_account_is_an_error() {
    let Some(store) = test_store().await else {
        return;
    };

    let result = store
        .update_credential(uuid::Uuid::new_v4(), "cipher")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn pg_lock_excludes_a_second_holder() {
    let Some(store) = test_store().await else {
        return;
    };

    let one = PgRunLock::new(pool(&store), "engagement-pass", Duration::from_secs(1800));
    let two = PgRunLock::new(pool(&store), "engagement-pass", Duration::from_secs(1800));

    assert!(one.try_acquire().await.unwrap());
    assert!(!two.try_acquire().await.unwrap());

    // Releasing someone else's lock is a no-op
    two.release().await.unwrap();
    assert!(!two.try_acquire().await.unwrap());

    one.release().await.unwrap();
    assert!(two.try_acquire().await.unwrap());
    two.release().await.unwrap();
}

#[tokio::test]
async fn stale_pg_lock_is_reclaimed() {
    let Some(store) = test_store().await else {
        return;
    };

    let crashed = PgRunLock::new(pool(&store), "engagement-pass", Duration::from_secs(1800));
    assert!(crashed.try_acquire().await.unwrap());

    sqlx::query("UPDATE worker_locks SET acquired_at = now() - interval '1 hour'")
        .execute(store.pool())
        .await
        .unwrap();

    let next = PgRunLock::new(pool(&store), "engagement-pass", Duration::from_secs(1800));
    assert!(next.try_acquire().await.unwrap());
    next.release().await.unwrap();
}
