//! Postgres implementation of the account and request stores.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use engager_common::{Account, EngagementRequest};

use super::{AccountStore, RequestStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    external_account_id: String,
    encrypted_credential: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            external_account_id: row.external_account_id,
            encrypted_credential: row.encrypted_credential,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    target_url: String,
    engaged_account_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<RequestRow> for EngagementRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.id,
            target_url: row.target_url,
            engaged_account_ids: row.engaged_account_ids,
            created_at: row.created_at,
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, external_account_id, encrypted_credential
            FROM accounts
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn update_credential(&self, account_id: Uuid, encrypted_credential: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET encrypted_credential = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(encrypted_credential)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("account {account_id} not found");
        }
        Ok(())
    }

    async fn upsert_account(
        &self,
        external_account_id: &str,
        encrypted_credential: &str,
    ) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO accounts (id, external_account_id, encrypted_credential)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_account_id)
            DO UPDATE SET encrypted_credential = EXCLUDED.encrypted_credential,
                          updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(external_account_id)
        .bind(encrypted_credential)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl RequestStore for PgStore {
    async fn list_pending(&self) -> Result<Vec<EngagementRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, target_url, engaged_account_ids, created_at
            FROM engagement_requests
            WHERE cardinality(engaged_account_ids) = 0
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EngagementRequest::from).collect())
    }

    async fn set_engaged_accounts(&self, request_id: Uuid, account_ids: &[Uuid]) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE engagement_requests
            SET engaged_account_ids = $2
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(account_ids)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("engagement request {request_id} not found");
        }
        Ok(())
    }

    async fn create_request(&self, target_url: &str) -> Result<EngagementRequest> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            INSERT INTO engagement_requests (id, target_url)
            VALUES ($1, $2)
            RETURNING id, target_url, engaged_account_ids, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(target_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_requests(&self) -> Result<Vec<EngagementRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT id, target_url, engaged_account_ids, created_at
            FROM engagement_requests
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EngagementRequest::from).collect())
    }
}
