use crate::error::GatewayError;
use crate::gateway::options::{DEFAULT_COMMIT_TIMEOUT, DEFAULT_ENDORSE_TIMEOUT};
use crate::gateway::{ConnectionOptions, ContractRef};
use crate::paper::{CHAINCODE_NAME, CONTRACT_NAMESPACE, RedeemRequest};
use crate::redeem::Target;
use crate::wallet::Wallet;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything the redeem program needs to know before it starts.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile_path: PathBuf,
    pub identity: String,
    pub channel: String,
    pub chaincode: String,
    pub namespace: String,
    pub discovery: bool,
    pub as_localhost: bool,
    pub endorse_timeout: Duration,
    pub commit_timeout: Duration,
    pub request: RedeemRequest,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("gateway/connection-org1.json"),
            identity: "balaji".to_string(),
            channel: "mychannel".to_string(),
            chaincode: CHAINCODE_NAME.to_string(),
            namespace: CONTRACT_NAMESPACE.to_string(),
            discovery: true,
            as_localhost: true,
            endorse_timeout: DEFAULT_ENDORSE_TIMEOUT,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            request: RedeemRequest {
                issuer: "MagnetoCorp".to_string(),
                paper_number: "00001".to_string(),
                redeeming_owner: "DigiBank".to_string(),
                redeeming_owner_msp: "Org2MSP".to_string(),
                redeem_date: "2020-11-30".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `PAPERNET_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("PAPERNET_PROFILE") {
            config.profile_path = PathBuf::from(path);
        }
        if let Some(identity) = lookup("PAPERNET_IDENTITY") {
            config.identity = identity;
        }
        if let Some(channel) = lookup("PAPERNET_CHANNEL") {
            config.channel = channel;
        }
        if let Some(chaincode) = lookup("PAPERNET_CHAINCODE") {
            config.chaincode = chaincode;
        }
        if let Some(namespace) = lookup("PAPERNET_CONTRACT") {
            config.namespace = namespace;
        }

        if let Some(raw) = lookup("PAPERNET_DISCOVERY") {
            match parse_flag(&raw) {
                Some(flag) => config.discovery = flag,
                None => warn!("PAPERNET_DISCOVERY must be true or false, got '{}'", raw),
            }
        }
        if let Some(raw) = lookup("PAPERNET_AS_LOCALHOST") {
            match parse_flag(&raw) {
                Some(flag) => config.as_localhost = flag,
                None => warn!("PAPERNET_AS_LOCALHOST must be true or false, got '{}'", raw),
            }
        }

        if let Some(raw) = lookup("PAPERNET_ENDORSE_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => config.endorse_timeout = Duration::from_secs(secs),
                Err(_) => warn!("PAPERNET_ENDORSE_TIMEOUT_SECS is not a number: '{}'", raw),
            }
        }
        if let Some(raw) = lookup("PAPERNET_COMMIT_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => config.commit_timeout = Duration::from_secs(secs),
                Err(_) => warn!("PAPERNET_COMMIT_TIMEOUT_SECS is not a number: '{}'", raw),
            }
        }

        if let Some(number) = lookup("PAPERNET_PAPER_NUMBER") {
            info!("redeeming paper {} from environment", number);
            config.request.paper_number = number;
        }
        if let Some(date) = lookup("PAPERNET_REDEEM_DATE") {
            config.request.redeem_date = date;
        }

        config
    }

    pub fn connection_options(&self, wallet: Arc<dyn Wallet>) -> ConnectionOptions {
        ConnectionOptions::new(wallet, self.identity.clone())
            .with_discovery(self.discovery, self.as_localhost)
            .with_endorse_timeout(self.endorse_timeout)
            .with_commit_timeout(self.commit_timeout)
    }

    pub fn target(&self) -> Result<Target, GatewayError> {
        Ok(Target {
            channel: self.channel.clone(),
            contract: ContractRef::new(&self.chaincode, &self.namespace)?,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
