use std::fmt;

/// Why an account was dropped before any engagement call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unusable {
    /// Stored credential could not be decrypted or parsed.
    Undecryptable,
    /// Probe returned 401 and the refresh did not produce a stored credential.
    RefreshFailed,
    /// Probe failed for any reason other than 401.
    ProbeFailed,
}

impl fmt::Display for Unusable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undecryptable => write!(f, "undecryptable"),
            Self::RefreshFailed => write!(f, "refresh_failed"),
            Self::ProbeFailed => write!(f, "probe_failed"),
        }
    }
}

/// Result of one like+repost attempt for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngagementOutcome {
    Succeeded,
    /// 401 from an action after the account passed validation.
    AuthExpiredMidExecution,
    /// 429 from either action. Recorded as engaged (soft success).
    RateLimited,
    Failed(String),
}

impl EngagementOutcome {
    /// Whether the account belongs in the request's engaged list.
    pub fn counts_as_engaged(&self) -> bool {
        matches!(self, Self::Succeeded | Self::RateLimited)
    }
}

impl fmt::Display for EngagementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::AuthExpiredMidExecution => write!(f, "auth_expired"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassOutcome {
    #[default]
    Completed,
    /// Another pass held the run lock; nothing was touched.
    Skipped,
}

/// Stats from one `process_pending` pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub requests_seen: u64,
    pub requests_updated: u64,
    pub requests_failed: u64,
    pub skipped_no_target: u64,
    pub accounts_validated: u64,
    pub accounts_unusable: u64,
    pub credentials_refreshed: u64,
    pub engaged: u64,
    pub rate_limited: u64,
    pub failed: u64,
}

impl PassStats {
    pub(crate) fn absorb(&mut self, other: &PassStats) {
        self.requests_seen += other.requests_seen;
        self.requests_updated += other.requests_updated;
        self.requests_failed += other.requests_failed;
        self.skipped_no_target += other.skipped_no_target;
        self.accounts_validated += other.accounts_validated;
        self.accounts_unusable += other.accounts_unusable;
        self.credentials_refreshed += other.credentials_refreshed;
        self.engaged += other.engaged;
        self.rate_limited += other.rate_limited;
        self.failed += other.failed;
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests_seen={} requests_updated={} requests_failed={} skipped_no_target={} \
             accounts_validated={} accounts_unusable={} credentials_refreshed={} \
             engaged={} rate_limited={} failed={}",
            self.requests_seen,
            self.requests_updated,
            self.requests_failed,
            self.skipped_no_target,
            self.accounts_validated,
            self.accounts_unusable,
            self.credentials_refreshed,
            self.engaged,
            self.rate_limited,
            self.failed,
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub stats: PassStats,
}

impl PassReport {
    pub fn skipped() -> Self {
        Self {
            outcome: PassOutcome::Skipped,
            stats: PassStats::default(),
        }
    }
}
