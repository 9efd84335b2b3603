use serde::{Deserialize, Serialize};

/// Envelope used by every v2 endpoint: the payload lives under `data`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

/// The authenticated user, as returned by `GET /2/users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct XUser {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// Body for the like and retweet endpoints.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TweetTarget<'a> {
    pub tweet_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LikeData {
    pub liked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RetweetData {
    pub retweeted: bool,
}

/// Response of the OAuth2 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Token {
    pub token_type: Option<String>,
    pub access_token: String,
    /// Present when the original grant included `offline.access`.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
}

/// Error body shape shared by most v2 failures.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProblemBody {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub error_description: Option<String>,
}

impl ProblemBody {
    pub fn message(&self) -> Option<String> {
        self.detail
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.title.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_without_refresh_token_parses() {
        let json = r#"{"token_type":"bearer","expires_in":7200,"access_token":"abc","scope":"tweet.read"}"#;
        let token: OAuth2Token = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 7200);
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn problem_body_prefers_detail() {
        let json = r#"{"title":"Unauthorized","detail":"Token expired"}"#;
        let body: ProblemBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.message().as_deref(), Some("Token expired"));
    }

    #[test]
    fn oauth_error_uses_description() {
        let json = r#"{"error":"invalid_request","error_description":"Value passed for the token was invalid."}"#;
        let body: ProblemBody = serde_json::from_str(json).unwrap();
        assert_eq!(
            body.message().as_deref(),
            Some("Value passed for the token was invalid.")
        );
    }
}
