use std::sync::Arc;

use tracing::{debug, info, warn};

use engager_common::ValidatedAccount;

use crate::api::{ApiError, EngagementApi};
use crate::types::EngagementOutcome;

/// Performs the like-then-repost pair for one account against one post.
pub struct EngagementExecutor {
    api: Arc<dyn EngagementApi>,
}

impl EngagementExecutor {
    pub fn new(api: Arc<dyn EngagementApi>) -> Self {
        Self { api }
    }

    /// Like, then repost. Stops at the first failing action and classifies it.
    pub async fn execute(&self, validated: &ValidatedAccount, post_id: &str) -> EngagementOutcome {
        let account_id = validated.account.id;
        let user_id = validated.account.external_account_id.as_str();
        let token = validated.credential.access_token.as_str();

        if let Err(e) = self.api.like(token, user_id, post_id).await {
            return classify(account_id, "like", e);
        }
        debug!(account_id = %account_id, post_id, "Liked");

        if let Err(e) = self.api.repost(token, user_id, post_id).await {
            return classify(account_id, "repost", e);
        }
        debug!(account_id = %account_id, post_id, "Reposted");

        EngagementOutcome::Succeeded
    }
}

fn classify(account_id: uuid::Uuid, action: &str, err: ApiError) -> EngagementOutcome {
    match err {
        ApiError::AuthExpired => {
            info!(account_id = %account_id, action, "Token expired mid-execution");
            EngagementOutcome::AuthExpiredMidExecution
        }
        ApiError::RateLimited => {
            info!(account_id = %account_id, action, "Rate limited, recording as engaged");
            EngagementOutcome::RateLimited
        }
        ApiError::Transient(reason) => {
            warn!(account_id = %account_id, action, error = reason.as_str(), "Engagement action failed");
            EngagementOutcome::Failed(format!("{action}: {reason}"))
        }
    }
}
