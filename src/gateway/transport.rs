use super::proposal::{CommitStatus, Envelope, ProposalResponse, SignedProposal};
use crate::wallet::SerializedIdentity;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("endpoint {address} is unreachable")]
    Unreachable { address: String },

    #[error("TLS handshake with {address} failed: {reason}")]
    Tls { address: String, reason: String },

    #[error("identity rejected: {reason}")]
    Unauthorized { reason: String },

    #[error("channel '{channel}' is not known to the gateway")]
    UnknownChannel { channel: String },

    #[error("session {0} is closed")]
    SessionClosed(String),

    #[error("request rejected: {reason}")]
    Rejected { reason: String },
}

/// Opening request for an authenticated session. The signature covers the
/// endpoint address and proves possession of the identity's key.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub endpoint: String,
    pub tls: bool,
    pub tls_root: Option<String>,
    pub identity: SerializedIdentity,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoint {
    pub name: String,
    pub address: String,
    pub msp_id: String,
}

/// Endorsing-peer layout of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelTopology {
    pub channel: String,
    pub peers: Vec<PeerEndpoint>,
    /// Chaincode name to the organizations whose endorsement it requires.
    pub policies: HashMap<String, Vec<String>>,
}

impl ChannelTopology {
    /// Candidate peers grouped by required organization. Without a known
    /// policy every organization present on the channel must endorse.
    pub fn endorsement_plan(&self, chaincode: &str) -> BTreeMap<String, Vec<&PeerEndpoint>> {
        let mut plan: BTreeMap<String, Vec<&PeerEndpoint>> = match self.policies.get(chaincode) {
            Some(orgs) => orgs.iter().map(|msp| (msp.clone(), Vec::new())).collect(),
            None => self
                .peers
                .iter()
                .map(|p| (p.msp_id.clone(), Vec::new()))
                .collect(),
        };
        for peer in &self.peers {
            if let Some(candidates) = plan.get_mut(&peer.msp_id) {
                candidates.push(peer);
            }
        }
        plan
    }

    pub fn peers_of(&self, msp_id: &str) -> impl Iterator<Item = &PeerEndpoint> {
        self.peers.iter().filter(move |p| p.msp_id == msp_id)
    }
}

/// Request/response boundary to the ledger network. Endorsement, ordering
/// and commit happen on the other side of this trait.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn handshake(&self, request: HandshakeRequest) -> Result<SessionId, TransportError>;

    async fn discover(
        &self,
        session: &SessionId,
        channel: &str,
    ) -> Result<ChannelTopology, TransportError>;

    async fn endorse(
        &self,
        session: &SessionId,
        peer_address: &str,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError>;

    async fn broadcast(&self, session: &SessionId, envelope: &Envelope)
    -> Result<(), TransportError>;

    /// Resolves once the transaction has been validated into a block.
    async fn commit_status(
        &self,
        session: &SessionId,
        channel: &str,
        tx_id: &str,
    ) -> Result<CommitStatus, TransportError>;

    /// Releases the session. Must not fail and must tolerate repeats.
    fn release(&self, session: &SessionId);
}
