use std::sync::Arc;

use tracing::{debug, info, warn};

use engager_common::{Account, ValidatedAccount};

use crate::api::{ApiError, EngagementApi};
use crate::codec::CredentialCodec;
use crate::refresher::CredentialRefresher;
use crate::types::Unusable;

/// Decides, once per account per pass, whether its credential can be used.
pub struct CredentialValidator {
    api: Arc<dyn EngagementApi>,
    codec: CredentialCodec,
    refresher: Arc<CredentialRefresher>,
}

impl CredentialValidator {
    pub fn new(
        api: Arc<dyn EngagementApi>,
        codec: CredentialCodec,
        refresher: Arc<CredentialRefresher>,
    ) -> Self {
        Self {
            api,
            codec,
            refresher,
        }
    }

    /// Decrypt, probe, and refresh on 401. Any other probe failure makes the
    /// account unusable until the next pass; no refresh is attempted for it.
    pub async fn validate(&self, account: &Account) -> Result<ValidatedAccount, Unusable> {
        let credential = match self.codec.decrypt(&account.encrypted_credential) {
            Ok(c) => c,
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Stored credential undecryptable, skipping");
                return Err(Unusable::Undecryptable);
            }
        };

        match self.api.who_am_i(&credential.access_token).await {
            Ok(remote_id) => {
                if remote_id != account.external_account_id {
                    debug!(
                        account_id = %account.id,
                        remote_id = remote_id.as_str(),
                        "Probe identity differs from stored external id"
                    );
                }
                Ok(ValidatedAccount {
                    account: account.clone(),
                    credential,
                    refreshed: false,
                })
            }
            Err(ApiError::AuthExpired) => {
                info!(account_id = %account.id, "Access token rejected, refreshing");
                match self.refresher.refresh(account, &credential).await {
                    Ok(fresh) => Ok(ValidatedAccount {
                        account: account.clone(),
                        credential: fresh,
                        refreshed: true,
                    }),
                    Err(e) => {
                        warn!(account_id = %account.id, error = %e, "Refresh failed, skipping");
                        Err(Unusable::RefreshFailed)
                    }
                }
            }
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Credential probe failed, skipping this pass");
                Err(Unusable::ProbeFailed)
            }
        }
    }
}
