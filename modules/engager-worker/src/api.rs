// The remote API boundary.
//
// Everything the worker asks of the social platform goes through
// EngagementApi, and every failure comes back as ApiError, the closed
// taxonomy the validator and executor branch on. XError status codes are
// folded into it here and nowhere else.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use engager_common::{ClientIdentity, Credential};
use x_client::{XClient, XError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The remote rejected the access token (401).
    #[error("authentication expired or revoked")]
    AuthExpired,

    /// The remote refused the call for quota reasons (429).
    #[error("rate limited")]
    RateLimited,

    /// Network failure, timeout, unexpected status or unparseable body.
    #[error("transient or unknown failure: {0}")]
    Transient(String),
}

impl From<XError> for ApiError {
    fn from(err: XError) -> Self {
        match err.status() {
            Some(401) => ApiError::AuthExpired,
            Some(429) => ApiError::RateLimited,
            _ => ApiError::Transient(err.to_string()),
        }
    }
}

/// Remote calls used by one engagement pass, parameterized by access token.
#[async_trait]
pub trait EngagementApi: Send + Sync {
    /// Cheap authenticated probe. Returns the remote user id.
    async fn who_am_i(&self, access_token: &str) -> Result<String, ApiError>;

    async fn like(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError>;

    async fn repost(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError>;

    /// Exchange a refresh token for a fresh credential.
    async fn refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<Credential, ApiError>;
}

#[async_trait]
impl EngagementApi for XClient {
    async fn who_am_i(&self, access_token: &str) -> Result<String, ApiError> {
        Ok(self.me(access_token).await?.id)
    }

    async fn like(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError> {
        XClient::like(self, access_token, external_account_id, post_id).await?;
        Ok(())
    }

    async fn repost(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError> {
        self.retweet(access_token, external_account_id, post_id)
            .await?;
        Ok(())
    }

    async fn refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<Credential, ApiError> {
        let token = self
            .refresh_oauth2_token(&identity.client_id, &identity.client_secret, refresh_token)
            .await?;

        Ok(Credential {
            access_token: token.access_token,
            // X rotates refresh tokens, but keep the old one if none came back
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_in_seconds: token.expires_in,
            scope: token.scope,
        })
    }
}

/// Wraps an API so that no single call can outlive `timeout`.
pub struct Bounded<A> {
    inner: A,
    timeout: Duration,
}

impl<A> Bounded<A> {
    pub fn new(inner: A, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn guard<T, F>(&self, call: &'static str, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transient(format!(
                "{call} timed out after {}s",
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

#[async_trait]
impl<A: EngagementApi> EngagementApi for Bounded<A> {
    async fn who_am_i(&self, access_token: &str) -> Result<String, ApiError> {
        self.guard("who_am_i", self.inner.who_am_i(access_token))
            .await
    }

    async fn like(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError> {
        self.guard(
            "like",
            self.inner.like(access_token, external_account_id, post_id),
        )
        .await
    }

    async fn repost(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError> {
        self.guard(
            "repost",
            self.inner.repost(access_token, external_account_id, post_id),
        )
        .await
    }

    async fn refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<Credential, ApiError> {
        self.guard(
            "refresh_token",
            self.inner.refresh_token(identity, refresh_token),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_errors_fold_into_closed_taxonomy() {
        assert_eq!(
            ApiError::from(XError::Unauthorized {
                message: "expired".into()
            }),
            ApiError::AuthExpired
        );
        assert_eq!(
            ApiError::from(XError::RateLimited { reset_at: None }),
            ApiError::RateLimited
        );
        assert!(matches!(
            ApiError::from(XError::Api {
                status: 404,
                message: "Not Found".into()
            }),
            ApiError::Transient(_)
        ));
        assert_eq!(
            ApiError::from(XError::Api {
                status: 429,
                message: "Too Many Requests".into()
            }),
            ApiError::RateLimited
        );
        assert!(matches!(
            ApiError::from(XError::Timeout("slow".into())),
            ApiError::Transient(_)
        ));
        assert!(matches!(
            ApiError::from(XError::Network("reset".into())),
            ApiError::Transient(_)
        ));
    }

    struct Hangs;

    #[async_trait]
    impl EngagementApi for Hangs {
        async fn who_am_i(&self, _access_token: &str) -> Result<String, ApiError> {
            std::future::pending().await
        }
        async fn like(&self, _: &str, _: &str, _: &str) -> Result<(), ApiError> {
            std::future::pending().await
        }
        async fn repost(&self, _: &str, _: &str, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        async fn refresh_token(
            &self,
            _: &ClientIdentity,
            _: &str,
        ) -> Result<Credential, ApiError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_turns_hang_into_transient() {
        let api = Bounded::new(Hangs, Duration::from_secs(5));
        let err = api.who_am_i("token").await.unwrap_err();
        assert!(matches!(err, ApiError::Transient(msg) if msg.contains("who_am_i")));

        let err = api.like("token", "1", "2").await.unwrap_err();
        assert!(matches!(err, ApiError::Transient(_)));

        assert!(api.repost("token", "1", "2").await.is_ok());
    }
}
