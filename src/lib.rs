pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod paper;
pub mod redeem;
pub mod wallet;

pub use config::AppConfig;
pub use error::{GatewayError, Phase, TransactionError};
pub use gateway::{
    ConnectionOptions, ConnectionProfile, Contract, ContractRef, Gateway, LedgerTransport, Network,
};
pub use paper::{CommercialPaper, PaperState, RedeemRequest};
pub use redeem::{Target, run, run_observed, success_message};
pub use wallet::{Identity, InMemoryWallet, Wallet};
