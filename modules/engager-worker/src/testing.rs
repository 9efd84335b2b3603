// Test doubles for the engagement worker.
//
// - MemoryStore (AccountStore + RequestStore): in-memory rows, records every
//   engaged-list write, can be told to fail specific writes.
// - MockApi (EngagementApi): per-token scripted responses, logs every call.
//
// No network, no database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use engager_common::{Account, ClientIdentity, Credential, EngagementRequest};

use crate::api::{ApiError, EngagementApi};
use crate::store::{AccountStore, RequestStore};

pub const TEST_SECRET: &str = "test-token-secret";

pub fn test_identity() -> ClientIdentity {
    ClientIdentity {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
    }
}

pub fn credential(access_token: &str, refresh_token: &str) -> Credential {
    Credential {
        access_token: access_token.into(),
        refresh_token: refresh_token.into(),
        expires_in_seconds: 7200,
        scope: "tweet.read users.read like.write tweet.write offline.access".into(),
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<Vec<Account>>,
    requests: Mutex<Vec<EngagementRequest>>,
    engaged_writes: Mutex<Vec<(Uuid, Vec<Uuid>)>>,
    credential_writes: Mutex<Vec<(Uuid, String)>>,
    failing_requests: Mutex<HashSet<Uuid>>,
    fail_credential_updates: AtomicBool,
    fail_list_accounts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, external_account_id: &str, encrypted_credential: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.lock().unwrap().push(Account {
            id,
            external_account_id: external_account_id.into(),
            encrypted_credential: encrypted_credential.into(),
        });
        id
    }

    /// Queue a pending request. Each one is created a second after the last
    /// so oldest-first ordering is deterministic.
    pub fn add_request(&self, target_url: &str) -> Uuid {
        let mut requests = self.requests.lock().unwrap();
        let mut request = EngagementRequest::new(target_url);
        request.created_at = Utc::now() + Duration::seconds(requests.len() as i64);
        let id = request.id;
        requests.push(request);
        id
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn request(&self, id: Uuid) -> Option<EngagementRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn engaged_writes(&self) -> Vec<(Uuid, Vec<Uuid>)> {
        self.engaged_writes.lock().unwrap().clone()
    }

    pub fn credential_writes(&self) -> Vec<(Uuid, String)> {
        self.credential_writes.lock().unwrap().clone()
    }

    /// Make `set_engaged_accounts` fail for one request.
    pub fn fail_writes_for(&self, request_id: Uuid) {
        self.failing_requests.lock().unwrap().insert(request_id);
    }

    pub fn fail_credential_updates(&self) {
        self.fail_credential_updates.store(true, Ordering::SeqCst);
    }

    pub fn fail_list_accounts(&self) {
        self.fail_list_accounts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        if self.fail_list_accounts.load(Ordering::SeqCst) {
            bail!("MemoryStore: list_accounts failure injected");
        }
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn update_credential(&self, account_id: Uuid, encrypted_credential: &str) -> Result<()> {
        if self.fail_credential_updates.load(Ordering::SeqCst) {
            bail!("MemoryStore: credential update failure injected");
        }
        let mut accounts = self.accounts.lock().unwrap();
        let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) else {
            bail!("MemoryStore: no account {account_id}");
        };
        account.encrypted_credential = encrypted_credential.to_string();
        self.credential_writes
            .lock()
            .unwrap()
            .push((account_id, encrypted_credential.to_string()));
        Ok(())
    }

    async fn upsert_account(
        &self,
        external_account_id: &str,
        encrypted_credential: &str,
    ) -> Result<Uuid> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts
            .iter_mut()
            .find(|a| a.external_account_id == external_account_id)
        {
            account.encrypted_credential = encrypted_credential.to_string();
            return Ok(account.id);
        }
        let id = Uuid::new_v4();
        accounts.push(Account {
            id,
            external_account_id: external_account_id.into(),
            encrypted_credential: encrypted_credential.into(),
        });
        Ok(id)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn list_pending(&self) -> Result<Vec<EngagementRequest>> {
        let mut pending: Vec<_> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    async fn set_engaged_accounts(&self, request_id: Uuid, account_ids: &[Uuid]) -> Result<()> {
        if self.failing_requests.lock().unwrap().contains(&request_id) {
            bail!("MemoryStore: write failure injected for {request_id}");
        }
        let mut requests = self.requests.lock().unwrap();
        let Some(request) = requests.iter_mut().find(|r| r.id == request_id) else {
            bail!("MemoryStore: no request {request_id}");
        };
        request.engaged_account_ids = account_ids.to_vec();
        self.engaged_writes
            .lock()
            .unwrap()
            .push((request_id, account_ids.to_vec()));
        Ok(())
    }

    async fn create_request(&self, target_url: &str) -> Result<EngagementRequest> {
        let id = self.add_request(target_url);
        match self.request(id) {
            Some(request) => Ok(request),
            None => bail!("MemoryStore: request {id} vanished"),
        }
    }

    async fn list_requests(&self) -> Result<Vec<EngagementRequest>> {
        let mut all = self.requests.lock().unwrap().clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// MockApi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    WhoAmI { access_token: String },
    Like { access_token: String, user_id: String, post_id: String },
    Repost { access_token: String, user_id: String, post_id: String },
    Refresh { refresh_token: String },
}

/// Scripted remote API. Unregistered tokens succeed on probe, like and
/// repost; unregistered refresh tokens fail.
/// Builder pattern: `.on_probe()`, `.on_like()`, `.on_repost()`, `.on_refresh()`.
#[derive(Default)]
pub struct MockApi {
    probes: HashMap<String, Result<String, ApiError>>,
    likes: HashMap<String, Result<(), ApiError>>,
    reposts: HashMap<String, Result<(), ApiError>>,
    refreshes: HashMap<String, Result<Credential, ApiError>>,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_probe(mut self, access_token: &str, result: Result<String, ApiError>) -> Self {
        self.probes.insert(access_token.to_string(), result);
        self
    }

    pub fn on_like(mut self, access_token: &str, result: Result<(), ApiError>) -> Self {
        self.likes.insert(access_token.to_string(), result);
        self
    }

    pub fn on_repost(mut self, access_token: &str, result: Result<(), ApiError>) -> Self {
        self.reposts.insert(access_token.to_string(), result);
        self
    }

    pub fn on_refresh(mut self, refresh_token: &str, result: Result<Credential, ApiError>) -> Self {
        self.refreshes.insert(refresh_token.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Refresh { .. }))
            .count()
    }

    pub fn action_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Like { .. } | ApiCall::Repost { .. }))
            .count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EngagementApi for MockApi {
    async fn who_am_i(&self, access_token: &str) -> Result<String, ApiError> {
        self.record(ApiCall::WhoAmI {
            access_token: access_token.into(),
        });
        self.probes
            .get(access_token)
            .cloned()
            .unwrap_or_else(|| Ok(format!("user-of-{access_token}")))
    }

    async fn like(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::Like {
            access_token: access_token.into(),
            user_id: external_account_id.into(),
            post_id: post_id.into(),
        });
        self.likes.get(access_token).cloned().unwrap_or(Ok(()))
    }

    async fn repost(
        &self,
        access_token: &str,
        external_account_id: &str,
        post_id: &str,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::Repost {
            access_token: access_token.into(),
            user_id: external_account_id.into(),
            post_id: post_id.into(),
        });
        self.reposts.get(access_token).cloned().unwrap_or(Ok(()))
    }

    async fn refresh_token(
        &self,
        _identity: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<Credential, ApiError> {
        self.record(ApiCall::Refresh {
            refresh_token: refresh_token.into(),
        });
        self.refreshes.get(refresh_token).cloned().unwrap_or_else(|| {
            Err(ApiError::Transient(format!(
                "MockApi: no refresh registered for {refresh_token}"
            )))
        })
    }
}
