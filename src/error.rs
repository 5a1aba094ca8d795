use crate::gateway::{ProfileError, TransportError};
use crate::paper::{DecodeError, PaperState};
use crate::wallet::WalletError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single submit or evaluate call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Peers refused the proposal: contract logic, arity or policy.
    #[error("endorsement failed: {reason}")]
    Endorsement { reason: String },

    /// Endorsed but not committed as valid.
    #[error("transaction {tx_id} was not committed: {reason}")]
    Commit { tx_id: String, reason: String },

    /// The commit wait expired. The transaction may still commit.
    #[error("transaction {tx_id} outcome unknown: no commit event within {waited:?}")]
    CommitTimeout { tx_id: String, waited: Duration },

    /// The commit event stream failed after broadcast. The transaction may still commit.
    #[error("transaction {tx_id} outcome unknown: commit status unavailable ({reason})")]
    CommitStatusUnavailable { tx_id: String, reason: String },

    /// Broadcast failed after the envelope was handed to the transport.
    /// The orderer may still have received it.
    #[error("transaction {tx_id} outcome unknown: broadcast not acknowledged ({reason})")]
    BroadcastUnconfirmed { tx_id: String, reason: String },

    /// No endorser could be reached. Nothing was sent for ordering.
    #[error("no reachable peer: {reason}")]
    Connectivity { reason: String },

    #[error("cannot encode transaction: {reason}")]
    Encoding { reason: String },
}

impl TransactionError {
    /// True when the transaction may have committed despite the error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            TransactionError::CommitTimeout { .. }
                | TransactionError::CommitStatusUnavailable { .. }
                | TransactionError::BroadcastUnconfirmed { .. }
        )
    }

    pub fn tx_id(&self) -> Option<&str> {
        match self {
            TransactionError::Commit { tx_id, .. }
            | TransactionError::CommitTimeout { tx_id, .. }
            | TransactionError::CommitStatusUnavailable { tx_id, .. }
            | TransactionError::BroadcastUnconfirmed { tx_id, .. } => Some(tx_id.as_str()),
            _ => None,
        }
    }
}

impl From<bincode::Error> for TransactionError {
    fn from(e: bincode::Error) -> Self {
        TransactionError::Encoding {
            reason: e.to_string(),
        }
    }
}

/// Stage of the submit workflow an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Identity,
    Connect,
    Channel,
    Submit,
    Decode,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Identity => "identity",
            Phase::Connect => "connect",
            Phase::Channel => "channel resolution",
            Phase::Submit => "submission",
            Phase::Decode => "decode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("invalid connection profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("failed to connect to gateway: {cause}")]
    Connection {
        #[source]
        cause: TransportError,
    },

    #[error("gateway is already connected")]
    AlreadyConnected,

    #[error("gateway is not connected")]
    NotConnected,

    #[error("channel '{channel}' not found")]
    ChannelNotFound { channel: String },

    #[error("invalid contract reference: {reason}")]
    InvalidContract { reason: String },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("paper {key} is {actual}, expected {expected}")]
    UnexpectedState {
        key: String,
        expected: PaperState,
        actual: PaperState,
    },
}

impl GatewayError {
    pub fn phase(&self) -> Phase {
        match self {
            GatewayError::Wallet(_) => Phase::Identity,
            GatewayError::Profile(_)
            | GatewayError::Connection { .. }
            | GatewayError::AlreadyConnected
            | GatewayError::NotConnected => Phase::Connect,
            GatewayError::ChannelNotFound { .. } | GatewayError::InvalidContract { .. } => {
                Phase::Channel
            }
            GatewayError::Transaction(_) => Phase::Submit,
            GatewayError::Decode(_) | GatewayError::UnexpectedState { .. } => Phase::Decode,
        }
    }

    /// True when the transaction is known not to have taken effect, so
    /// running the whole unit again cannot duplicate it.
    pub fn is_safe_to_retry(&self) -> bool {
        match self {
            GatewayError::Transaction(tx) => !tx.is_ambiguous(),
            GatewayError::Decode(_) | GatewayError::UnexpectedState { .. } => false,
            _ => true,
        }
    }
}
