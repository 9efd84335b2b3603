use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use engager_common::{Account, ClientIdentity, Credential};

use crate::api::{ApiError, EngagementApi};
use crate::codec::{CodecError, CredentialCodec};
use crate::store::AccountStore;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no OAuth2 client identity configured")]
    MissingClientIdentity,

    #[error("remote refresh failed: {0}")]
    Remote(#[from] ApiError),

    #[error("failed to encrypt refreshed credential: {0}")]
    Encrypt(#[from] CodecError),

    #[error("failed to persist refreshed credential: {0}")]
    Persist(anyhow::Error),
}

/// Exchanges refresh tokens for new credentials and stores them.
///
/// A refresh only counts as successful once the new credential is persisted,
/// so the next validation of the same account reads it back.
pub struct CredentialRefresher {
    api: Arc<dyn EngagementApi>,
    accounts: Arc<dyn AccountStore>,
    codec: CredentialCodec,
    identity: Option<ClientIdentity>,
}

impl CredentialRefresher {
    pub fn new(
        api: Arc<dyn EngagementApi>,
        accounts: Arc<dyn AccountStore>,
        codec: CredentialCodec,
        identity: Option<ClientIdentity>,
    ) -> Self {
        Self {
            api,
            accounts,
            codec,
            identity,
        }
    }

    pub async fn refresh(
        &self,
        account: &Account,
        current: &Credential,
    ) -> Result<Credential, RefreshError> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(RefreshError::MissingClientIdentity)?;

        let fresh = match self.api.refresh_token(identity, &current.refresh_token).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(account_id = %account.id, error = %e, "Token refresh rejected");
                return Err(e.into());
            }
        };

        let encrypted = self.codec.encrypt(&fresh)?;
        self.accounts
            .update_credential(account.id, &encrypted)
            .await
            .map_err(RefreshError::Persist)?;

        info!(
            account_id = %account.id,
            expires_in = fresh.expires_in_seconds,
            "Credential refreshed and stored"
        );
        Ok(fresh)
    }
}
