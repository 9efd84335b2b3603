// Persistence seams for the worker.
//
// AccountStore and RequestStore are the only way the worker touches storage.
// PgStore implements both against Postgres; testing::MemoryStore implements
// both in memory so a full pass runs without a database.

pub mod postgres;

pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use engager_common::{Account, EngagementRequest};

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Every registered account, oldest first.
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Replace the stored (encrypted) credential of one account.
    async fn update_credential(&self, account_id: Uuid, encrypted_credential: &str) -> Result<()>;

    /// Register an account or replace the credential of an existing one,
    /// keyed by its remote user id. Returns the account id.
    async fn upsert_account(
        &self,
        external_account_id: &str,
        encrypted_credential: &str,
    ) -> Result<Uuid>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Requests whose engaged list is empty, oldest first.
    async fn list_pending(&self) -> Result<Vec<EngagementRequest>>;

    /// Overwrite the engaged list of one request.
    async fn set_engaged_accounts(&self, request_id: Uuid, account_ids: &[Uuid]) -> Result<()>;

    /// Queue a new pending request.
    async fn create_request(&self, target_url: &str) -> Result<EngagementRequest>;

    /// All requests, newest first.
    async fn list_requests(&self) -> Result<Vec<EngagementRequest>>;
}
