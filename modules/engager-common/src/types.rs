use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Accounts ---

/// A registered account that engagements are dispatched through.
///
/// `encrypted_credential` is the opaque output of the credential codec; the
/// plaintext credential never leaves memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    /// The account's user id on the remote platform.
    pub external_account_id: String,
    pub encrypted_credential: String,
}

/// Decrypted OAuth2 credential bundle. Lives for one pass at most.
///
/// Serialized in camelCase so stored bundles share one JSON shape:
/// `{accessToken, refreshToken, expiresIn, scope}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "expiresIn", default)]
    pub expires_in_seconds: u64,
    #[serde(default)]
    pub scope: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_in_seconds", &self.expires_in_seconds)
            .field("scope", &self.scope)
            .finish()
    }
}

/// An account paired with a credential that passed validation in this pass.
#[derive(Debug, Clone)]
pub struct ValidatedAccount {
    pub account: Account,
    pub credential: Credential,
    /// True when the credential was obtained by a refresh during validation.
    pub refreshed: bool,
}

// --- Engagement requests ---

/// A queued request to like and repost `target_url` from every account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementRequest {
    pub id: Uuid,
    pub target_url: String,
    /// Accounts that engaged in the last pass, in account order.
    /// Empty means the request is still pending.
    pub engaged_account_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EngagementRequest {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_url: target_url.into(),
            engaged_account_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.engaged_account_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_uses_stored_field_names() {
        let cred = Credential {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_in_seconds: 7200,
            scope: "tweet.read like.write".into(),
        };
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["accessToken"], "at");
        assert_eq!(json["refreshToken"], "rt");
        assert_eq!(json["expiresIn"], 7200);
        assert_eq!(json["scope"], "tweet.read like.write");
    }

    #[test]
    fn credential_debug_hides_tokens() {
        let cred = Credential {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            expires_in_seconds: 10,
            scope: String::new(),
        };
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn new_request_is_pending() {
        let mut req = EngagementRequest::new("https://x.com/a/status/1");
        assert!(req.is_pending());
        req.engaged_account_ids.push(Uuid::new_v4());
        assert!(!req.is_pending());
    }
}
