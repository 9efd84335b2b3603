use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Run-level mutual exclusion around one engagement pass.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Try to take the lock. Returns false if another pass holds it.
    async fn try_acquire(&self) -> Result<bool>;

    /// Release the lock taken by `try_acquire`.
    async fn release(&self) -> Result<()>;
}

/// Single-flight guard for one process.
#[derive(Debug, Default)]
pub struct LocalRunLock {
    held: AtomicBool,
}

impl LocalRunLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLock for LocalRunLock {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok())
    }

    async fn release(&self) -> Result<()> {
        self.held.store(false, Ordering::Release);
        Ok(())
    }
}

/// Lock row in `worker_locks`, shared by every worker pointed at the same database.
/// Locks older than `stale_after` are reclaimed so a killed process cannot
/// wedge the worker.
pub struct PgRunLock {
    pool: PgPool,
    name: String,
    holder: Uuid,
    stale_after: Duration,
}

impl PgRunLock {
    pub fn new(pool: PgPool, name: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            pool,
            name: name.into(),
            holder: Uuid::new_v4(),
            stale_after,
        }
    }
}

#[async_trait]
impl RunLock for PgRunLock {
    async fn try_acquire(&self) -> Result<bool> {
        let reclaimed = sqlx::query(
            "DELETE FROM worker_locks
             WHERE name = $1
               AND acquired_at < now() - make_interval(secs => $2)",
        )
        .bind(&self.name)
        .bind(self.stale_after.as_secs_f64())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if reclaimed > 0 {
            info!(lock = self.name.as_str(), "Reclaimed stale worker lock");
        }

        // Atomic check-and-create
        let acquired = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO worker_locks (name, holder, acquired_at)
             VALUES ($1, $2, now())
             ON CONFLICT (name) DO NOTHING
             RETURNING holder",
        )
        .bind(&self.name)
        .bind(self.holder)
        .fetch_optional(&self.pool)
        .await?;

        Ok(acquired.is_some())
    }

    async fn release(&self) -> Result<()> {
        sqlx::query("DELETE FROM worker_locks WHERE name = $1 AND holder = $2")
            .bind(&self.name)
            .bind(self.holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_lock_is_single_flight() {
        let lock = LocalRunLock::new();
        assert!(lock.try_acquire().await.unwrap());
        assert!(!lock.try_acquire().await.unwrap());
        lock.release().await.unwrap();
        assert!(lock.try_acquire().await.unwrap());
    }
}
