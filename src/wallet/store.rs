use super::identity::Identity;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("identity label must not be empty")]
    EmptyLabel,

    #[error("identity '{label}' not found in wallet")]
    IdentityNotFound { label: String },

    #[error("wallet store failure: {reason}")]
    Store { reason: String },
}

/// Backing store of identities, looked up by label.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn get(&self, label: &str) -> Result<Option<Identity>, WalletError>;
    async fn put(&self, label: &str, identity: Identity) -> Result<(), WalletError>;
    async fn remove(&self, label: &str) -> Result<bool, WalletError>;
    async fn list(&self) -> Result<Vec<String>, WalletError>;
}

/// Resolves exactly one identity or fails before anything touches the network.
pub async fn resolve(wallet: &dyn Wallet, label: &str) -> Result<Identity, WalletError> {
    if label.is_empty() {
        return Err(WalletError::EmptyLabel);
    }
    match wallet.get(label).await? {
        Some(identity) => {
            debug!("resolved identity '{}' ({})", label, identity.msp_id());
            Ok(identity)
        }
        None => Err(WalletError::IdentityNotFound {
            label: label.to_string(),
        }),
    }
}

#[derive(Clone, Default)]
pub struct InMemoryWallet {
    identities: Arc<RwLock<HashMap<String, Identity>>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Wallet for InMemoryWallet {
    async fn get(&self, label: &str) -> Result<Option<Identity>, WalletError> {
        Ok(self.identities.read().await.get(label).cloned())
    }

    async fn put(&self, label: &str, identity: Identity) -> Result<(), WalletError> {
        if label.is_empty() {
            return Err(WalletError::EmptyLabel);
        }
        self.identities
            .write()
            .await
            .insert(label.to_string(), identity);
        Ok(())
    }

    async fn remove(&self, label: &str) -> Result<bool, WalletError> {
        Ok(self.identities.write().await.remove(label).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, WalletError> {
        let mut labels: Vec<String> = self.identities.read().await.keys().cloned().collect();
        labels.sort();
        Ok(labels)
    }
}
