pub mod error;
pub mod types;

pub use error::{Result, XError};
pub use types::{OAuth2Token, XUser};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use types::{ApiResponse, LikeData, ProblemBody, RetweetData, TweetTarget};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// Default per-request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct XClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for XClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for the subset of the X API v2 used for engagement.
///
/// The client itself holds no user credentials: every user-context call takes
/// the OAuth2 access token it should act with, so one client serves every
/// account in a pass.
#[derive(Clone)]
pub struct XClient {
    client: reqwest::Client,
    base_url: String,
}

impl XClient {
    pub fn new(config: XClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| XError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up the user that owns `access_token`. Cheap; used as a credential probe.
    pub async fn me(&self, access_token: &str) -> Result<XUser> {
        let url = format!("{}/2/users/me", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let api_resp: ApiResponse<XUser> = parse(resp).await?;
        Ok(api_resp.data)
    }

    /// Like `tweet_id` on behalf of `user_id`. Returns the `liked` flag reported by X.
    pub async fn like(&self, access_token: &str, user_id: &str, tweet_id: &str) -> Result<bool> {
        let url = format!("{}/2/users/{}/likes", self.base_url, user_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&TweetTarget { tweet_id })
            .send()
            .await?;

        let api_resp: ApiResponse<LikeData> = parse(resp).await?;
        tracing::debug!(user_id, tweet_id, liked = api_resp.data.liked, "Like call returned");
        Ok(api_resp.data.liked)
    }

    /// Retweet `tweet_id` on behalf of `user_id`. Returns the `retweeted` flag reported by X.
    pub async fn retweet(
        &self,
        access_token: &str,
        user_id: &str,
        tweet_id: &str,
    ) -> Result<bool> {
        let url = format!("{}/2/users/{}/retweets", self.base_url, user_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&TweetTarget { tweet_id })
            .send()
            .await?;

        let api_resp: ApiResponse<RetweetData> = parse(resp).await?;
        tracing::debug!(
            user_id,
            tweet_id,
            retweeted = api_resp.data.retweeted,
            "Retweet call returned"
        );
        Ok(api_resp.data.retweeted)
    }

    /// Exchange a refresh token for a new access/refresh pair (confidential client).
    pub async fn refresh_oauth2_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuth2Token> {
        let url = format!("{}/2/oauth2/token", self.base_url);
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        let resp = self
            .client
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&form)
            .send()
            .await?;

        parse(resp).await
    }
}

/// Map a non-2xx response onto `XError`, otherwise decode the JSON body.
async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        return Ok(serde_json::from_str(&body)?);
    }

    let reset_at = resp
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_reset_header);
    let body = resp.text().await.unwrap_or_default();

    Err(classify_status(status.as_u16(), &body, reset_at))
}

fn parse_reset_header(value: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = value.trim().parse().ok()?;
    DateTime::from_timestamp(secs, 0)
}

fn classify_status(status: u16, body: &str, reset_at: Option<DateTime<Utc>>) -> XError {
    let message = serde_json::from_str::<ProblemBody>(body)
        .ok()
        .and_then(|p| p.message())
        .unwrap_or_else(|| body.to_string());

    match status {
        401 => XError::Unauthorized { message },
        429 => XError::RateLimited { reset_at },
        _ => XError::Api { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_maps_to_unauthorized() {
        let err = classify_status(401, r#"{"title":"Unauthorized","detail":"Unauthorized"}"#, None);
        assert!(matches!(err, XError::Unauthorized { .. }));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn too_many_requests_keeps_reset_time() {
        let reset = parse_reset_header("1700000000");
        let err = classify_status(429, "", reset);
        match err {
            XError::RateLimited { reset_at } => {
                assert_eq!(reset_at.map(|t| t.timestamp()), Some(1_700_000_000));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn other_status_keeps_raw_body_when_not_json() {
        let err = classify_status(503, "upstream down", None);
        match err {
            XError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn garbage_reset_header_is_ignored() {
        assert!(parse_reset_header("soon").is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = XClient::new(XClientConfig {
            base_url: "http://localhost:9999/".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let client = XClient::new(XClientConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let err = client.me("token").await.unwrap_err();
        assert!(err.status().is_none(), "got {err:?}");
    }
}
