pub mod identity;
pub mod store;

pub use identity::{Credential, Identity, SerializedIdentity};
pub use store::{InMemoryWallet, Wallet, WalletError, resolve};
