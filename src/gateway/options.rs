use crate::wallet::Wallet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ENDORSE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub enabled: bool,
    /// Rewrites discovered peer hosts to localhost. Address resolution only.
    pub as_localhost: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            as_localhost: true,
        }
    }
}

#[derive(Clone)]
pub struct ConnectionOptions {
    pub wallet: Arc<dyn Wallet>,
    pub identity: String,
    pub discovery: DiscoveryOptions,
    pub endorse_timeout: Duration,
    pub commit_timeout: Duration,
}

impl ConnectionOptions {
    pub fn new(wallet: Arc<dyn Wallet>, identity: impl Into<String>) -> Self {
        Self {
            wallet,
            identity: identity.into(),
            discovery: DiscoveryOptions::default(),
            endorse_timeout: DEFAULT_ENDORSE_TIMEOUT,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
        }
    }

    pub fn with_discovery(mut self, enabled: bool, as_localhost: bool) -> Self {
        self.discovery = DiscoveryOptions {
            enabled,
            as_localhost,
        };
        self
    }

    pub fn with_endorse_timeout(mut self, timeout: Duration) -> Self {
        self.endorse_timeout = timeout;
        self
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("identity", &self.identity)
            .field("discovery", &self.discovery)
            .field("endorse_timeout", &self.endorse_timeout)
            .field("commit_timeout", &self.commit_timeout)
            .finish_non_exhaustive()
    }
}
