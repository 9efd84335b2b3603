//! The engagement pass: every pending request, every account, one aggregate
//! write per request.
//!
//! Per request the accounts are fanned out (bounded by `max_concurrency`),
//! each one validated and then engaged independently. The request's engaged
//! list is written once, after every account task has resolved. A failure on
//! one request never stops the pass; it is logged and counted.

use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use engager_common::{Account, ClientIdentity, EngagementRequest};

use crate::api::EngagementApi;
use crate::codec::CredentialCodec;
use crate::executor::EngagementExecutor;
use crate::lock::RunLock;
use crate::post_id::extract_post_id;
use crate::refresher::CredentialRefresher;
use crate::store::{AccountStore, RequestStore};
use crate::types::{EngagementOutcome, PassOutcome, PassReport, PassStats, Unusable};
use crate::validator::CredentialValidator;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Everything a worker needs from the outside.
pub struct WorkerDeps {
    pub api: Arc<dyn EngagementApi>,
    pub accounts: Arc<dyn AccountStore>,
    pub requests: Arc<dyn RequestStore>,
    pub codec: CredentialCodec,
    pub identity: Option<ClientIdentity>,
    pub lock: Arc<dyn RunLock>,
}

pub struct EngagementWorker {
    accounts: Arc<dyn AccountStore>,
    requests: Arc<dyn RequestStore>,
    validator: CredentialValidator,
    executor: EngagementExecutor,
    refresher: Arc<CredentialRefresher>,
    lock: Arc<dyn RunLock>,
    max_concurrency: usize,
}

/// How one account ended up for one request.
enum AccountResult {
    Unusable(Unusable),
    Executed {
        outcome: EngagementOutcome,
        refreshes: u64,
    },
}

impl EngagementWorker {
    pub fn new(deps: WorkerDeps) -> Self {
        let refresher = Arc::new(CredentialRefresher::new(
            deps.api.clone(),
            deps.accounts.clone(),
            deps.codec.clone(),
            deps.identity,
        ));
        let validator = CredentialValidator::new(deps.api.clone(), deps.codec, refresher.clone());
        let executor = EngagementExecutor::new(deps.api);

        Self {
            accounts: deps.accounts,
            requests: deps.requests,
            validator,
            executor,
            refresher,
            lock: deps.lock,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Run one pass over all pending requests. Safe to call on a timer: if a
    /// previous pass still holds the run lock this returns `Skipped` without
    /// reading or writing any request.
    pub async fn process_pending(&self) -> Result<PassReport> {
        if !self.lock.try_acquire().await? {
            warn!("Another engagement pass is running, skipping");
            return Ok(PassReport::skipped());
        }

        let result = self.run_pass().await;

        // Always release lock
        if let Err(e) = self.lock.release().await {
            warn!(error = %e, "Failed to release worker lock");
        }

        result
    }

    async fn run_pass(&self) -> Result<PassReport> {
        let pending = self.requests.list_pending().await?;
        if pending.is_empty() {
            info!("No pending engagement requests");
            return Ok(PassReport::default());
        }
        info!(count = pending.len(), "Processing pending engagement requests");

        let mut stats = PassStats::default();
        for request in &pending {
            stats.requests_seen += 1;

            let (engaged, request_stats) = match self.resolve_request(request).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    error!(request_id = %request.id, error = %e, "Failed to resolve request");
                    stats.requests_failed += 1;
                    continue;
                }
            };
            stats.absorb(&request_stats);

            match self.requests.set_engaged_accounts(request.id, &engaged).await {
                Ok(()) => {
                    stats.requests_updated += 1;
                    info!(
                        request_id = %request.id,
                        engaged = engaged.len(),
                        "Engagement request updated"
                    );
                }
                Err(e) => {
                    error!(request_id = %request.id, error = %e, "Failed to store engaged accounts");
                    stats.requests_failed += 1;
                }
            }
        }

        info!("Engagement pass complete. {stats}");
        Ok(PassReport {
            outcome: PassOutcome::Completed,
            stats,
        })
    }

    /// Engage every account with one request's target. Returns the ids to
    /// record, in account order.
    async fn resolve_request(&self, request: &EngagementRequest) -> Result<(Vec<Uuid>, PassStats)> {
        let mut stats = PassStats::default();

        let Some(post_id) = extract_post_id(&request.target_url) else {
            warn!(
                request_id = %request.id,
                target_url = request.target_url.as_str(),
                "No post id in target URL, skipping all accounts"
            );
            stats.skipped_no_target += 1;
            return Ok((Vec::new(), stats));
        };

        let accounts = self.accounts.list_accounts().await?;
        info!(
            request_id = %request.id,
            post_id,
            accounts = accounts.len(),
            "Dispatching engagement"
        );

        let mut results: Vec<(usize, AccountResult)> = stream::iter(accounts.iter().enumerate())
            .map(|(idx, account)| async move { (idx, self.engage_account(account, post_id).await) })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);

        let mut engaged = Vec::new();
        for (idx, result) in results {
            match result {
                AccountResult::Unusable(reason) => {
                    stats.accounts_unusable += 1;
                    debug!(account_id = %accounts[idx].id, reason = %reason, "Account excluded");
                }
                AccountResult::Executed { outcome, refreshes } => {
                    stats.accounts_validated += 1;
                    stats.credentials_refreshed += refreshes;
                    match outcome {
                        EngagementOutcome::Succeeded => stats.engaged += 1,
                        EngagementOutcome::RateLimited => stats.rate_limited += 1,
                        EngagementOutcome::AuthExpiredMidExecution
                        | EngagementOutcome::Failed(_) => stats.failed += 1,
                    }
                    if outcome.counts_as_engaged() {
                        engaged.push(accounts[idx].id);
                    }
                }
            }
        }

        Ok((engaged, stats))
    }

    /// Validate one account, run the action pair, and on a mid-execution 401
    /// refresh once and retry the pair once. A 429 on that retry excludes the
    /// account instead of counting as a soft success.
    async fn engage_account(&self, account: &Account, post_id: &str) -> AccountResult {
        let mut validated = match self.validator.validate(account).await {
            Ok(v) => v,
            Err(reason) => return AccountResult::Unusable(reason),
        };
        let mut refreshes = u64::from(validated.refreshed);

        let mut outcome = self.executor.execute(&validated, post_id).await;
        if outcome == EngagementOutcome::AuthExpiredMidExecution {
            match self
                .refresher
                .refresh(&validated.account, &validated.credential)
                .await
            {
                Ok(fresh) => {
                    refreshes += 1;
                    validated.credential = fresh;
                    validated.refreshed = true;
                    // The retry is the last chance: only a clean pair counts
                    outcome = match self.executor.execute(&validated, post_id).await {
                        EngagementOutcome::Succeeded => EngagementOutcome::Succeeded,
                        EngagementOutcome::RateLimited => {
                            warn!(account_id = %account.id, "Rate limited on retry after refresh, excluding");
                            EngagementOutcome::Failed("rate limited on retry".into())
                        }
                        other => {
                            warn!(account_id = %account.id, "Retry after refresh failed, giving up");
                            other
                        }
                    };
                }
                Err(e) => {
                    warn!(account_id = %account.id, error = %e, "Refresh after mid-execution 401 failed");
                }
            }
        }

        AccountResult::Executed { outcome, refreshes }
    }
}
