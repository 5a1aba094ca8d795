use super::papercontract;
use super::state::{Stub, WorldState};
use crate::gateway::proposal::{
    CommitStatus, Endorsement, Envelope, EnvelopePayload, ProposalResponse, STATUS_ERROR,
    STATUS_OK, SignedProposal, ValidationCode, compute_tx_id, response_digest,
};
use crate::gateway::transport::{
    ChannelTopology, HandshakeRequest, LedgerTransport, PeerEndpoint, SessionId, TransportError,
};
use crate::gateway::{ConnectionProfile, ProfileError};
use crate::paper::{CHAINCODE_NAME, CommercialPaper, decode, encode};
use crate::wallet::{Credential, Identity, SerializedIdentity};
use async_trait::async_trait;
use log::{debug, info, warn};
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

pub const CHANNEL: &str = "mychannel";
pub const ORG1_MSP: &str = "Org1MSP";
pub const ORG2_MSP: &str = "Org2MSP";

struct SimPeer {
    name: String,
    host_address: String,
    local_address: String,
    msp_id: String,
    credential: Credential,
    online: AtomicBool,
}

impl SimPeer {
    fn new(name: &str, port: u16, msp_id: &str) -> Self {
        Self {
            name: name.to_string(),
            host_address: format!("{}:{}", name, port),
            local_address: format!("localhost:{}", port),
            msp_id: msp_id.to_string(),
            credential: Credential::generate(),
            online: AtomicBool::new(true),
        }
    }

    fn identity(&self) -> SerializedIdentity {
        SerializedIdentity {
            msp_id: self.msp_id.clone(),
            certificate: self.credential.certificate().to_vec(),
        }
    }
}

#[derive(Default)]
struct Ledger {
    world: WorldState,
    height: u64,
    statuses: HashMap<String, CommitStatus>,
}

struct Inner {
    peers: Vec<SimPeer>,
    /// channel -> chaincode -> organizations required to endorse
    channels: HashMap<String, HashMap<String, Vec<String>>>,
    members: Mutex<HashMap<Vec<u8>, String>>,
    sessions: Mutex<HashMap<String, SerializedIdentity>>,
    ledger: tokio::sync::Mutex<Ledger>,
    committed: Notify,
    commit_delay_ms: AtomicU64,
    hold_commits: AtomicBool,
    releases: AtomicUsize,
}

/// In-process two-organization network hosting the commercial paper
/// contract. Peers are published on localhost ports; their discovered
/// addresses use container host names.
#[derive(Clone)]
pub struct PaperNet {
    inner: Arc<Inner>,
}

impl Default for PaperNet {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperNet {
    pub fn new() -> Self {
        let peers = vec![
            SimPeer::new("peer0.org1.example.com", 7051, ORG1_MSP),
            SimPeer::new("peer0.org2.example.com", 9051, ORG2_MSP),
        ];

        let mut policies = HashMap::new();
        policies.insert(
            CHAINCODE_NAME.to_string(),
            vec![ORG1_MSP.to_string(), ORG2_MSP.to_string()],
        );
        let mut channels = HashMap::new();
        channels.insert(CHANNEL.to_string(), policies);

        Self {
            inner: Arc::new(Inner {
                peers,
                channels,
                members: Mutex::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
                ledger: tokio::sync::Mutex::new(Ledger::default()),
                committed: Notify::new(),
                commit_delay_ms: AtomicU64::new(0),
                hold_commits: AtomicBool::new(false),
                releases: AtomicUsize::new(0),
            }),
        }
    }

    /// Issues a fresh identity registered with the given organization.
    pub fn enroll(&self, label: &str, msp_id: &str) -> Identity {
        let identity = Identity::new(label, msp_id, Credential::generate());
        self.members()
            .insert(identity.certificate().to_vec(), msp_id.to_string());
        info!("enrolled {} with {}", label, msp_id);
        identity
    }

    /// Writes a paper straight into the world state.
    pub async fn seed_paper(&self, paper: &CommercialPaper) -> Result<(), serde_json::Error> {
        let bytes = encode(paper)?;
        let mut ledger = self.inner.ledger.lock().await;
        let version = ledger.height;
        ledger.world.put(&paper.key(), bytes, version);
        Ok(())
    }

    pub async fn paper(&self, issuer: &str, paper_number: &str) -> Option<CommercialPaper> {
        let ledger = self.inner.ledger.lock().await;
        let entry = ledger
            .world
            .get(&CommercialPaper::make_key(issuer, paper_number))?;
        decode(&entry.value).ok()
    }

    pub async fn block_height(&self) -> u64 {
        self.inner.ledger.lock().await.height
    }

    pub fn set_peer_online(&self, name: &str, online: bool) {
        if let Some(peer) = self.inner.peers.iter().find(|p| p.name == name) {
            peer.online.store(online, Ordering::SeqCst);
        }
    }

    pub fn set_commit_delay(&self, delay: Duration) {
        self.inner
            .commit_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    /// While held, ordered transactions are accepted but never committed.
    pub fn hold_commits(&self, hold: bool) {
        self.inner.hold_commits.store(hold, Ordering::SeqCst);
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions().len()
    }

    pub fn releases(&self) -> usize {
        self.inner.releases.load(Ordering::SeqCst)
    }

    /// Connection profile describing this network from Org1's side.
    pub fn profile(&self) -> Result<ConnectionProfile, ProfileError> {
        let profile = json!({
            "name": "test-network-org1",
            "version": "1.0.0",
            "client": { "organization": "Org1" },
            "organizations": {
                "Org1": { "mspid": ORG1_MSP, "peers": ["peer0.org1.example.com"] },
                "Org2": { "mspid": ORG2_MSP, "peers": ["peer0.org2.example.com"] }
            },
            "peers": {
                "peer0.org1.example.com": {
                    "url": "grpcs://localhost:7051",
                    "tlsCACerts": { "pem": TLS_CA_PEM },
                    "grpcOptions": { "ssl-target-name-override": "peer0.org1.example.com" }
                },
                "peer0.org2.example.com": {
                    "url": "grpcs://localhost:9051",
                    "tlsCACerts": { "pem": TLS_CA_PEM },
                    "grpcOptions": { "ssl-target-name-override": "peer0.org2.example.com" }
                }
            },
            "channels": {
                CHANNEL: {
                    "peers": {
                        "peer0.org1.example.com": { "endorsingPeer": true },
                        "peer0.org2.example.com": { "endorsingPeer": true }
                    }
                }
            }
        });
        Ok(serde_json::from_value(profile)?)
    }

    fn members(&self) -> MutexGuard<'_, HashMap<Vec<u8>, String>> {
        self.inner
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SerializedIdentity>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_member(&self, identity: &SerializedIdentity) -> bool {
        self.members().get(&identity.certificate) == Some(&identity.msp_id)
    }

    fn check_session(&self, session: &SessionId) -> Result<(), TransportError> {
        if self.sessions().contains_key(&session.0) {
            Ok(())
        } else {
            Err(TransportError::SessionClosed(session.0.clone()))
        }
    }

    /// Only published localhost addresses of online peers answer.
    fn peer_at(&self, address: &str) -> Result<&SimPeer, TransportError> {
        self.inner
            .peers
            .iter()
            .find(|p| p.local_address == address && p.online.load(Ordering::SeqCst))
            .ok_or_else(|| TransportError::Unreachable {
                address: address.to_string(),
            })
    }
}

const TLS_CA_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIICJzCCAc2gAwIBAgIUPaperNetTlsCaRoot\n-----END CERTIFICATE-----\n";

fn error_response(message: String) -> ProposalResponse {
    ProposalResponse {
        status: STATUS_ERROR,
        message,
        payload: Vec::new(),
        rwset: Default::default(),
        endorsement: None,
    }
}

#[async_trait]
impl LedgerTransport for PaperNet {
    async fn handshake(&self, request: HandshakeRequest) -> Result<SessionId, TransportError> {
        self.peer_at(&request.endpoint)?;

        if request.tls {
            match &request.tls_root {
                Some(pem) if pem.contains("BEGIN CERTIFICATE") => {}
                _ => {
                    return Err(TransportError::Tls {
                        address: request.endpoint,
                        reason: "peer certificate not signed by a trusted root".to_string(),
                    });
                }
            }
        }
        if !request
            .identity
            .verify(request.endpoint.as_bytes(), &request.signature)
        {
            return Err(TransportError::Unauthorized {
                reason: "handshake signature does not match certificate".to_string(),
            });
        }
        if !self.is_member(&request.identity) {
            return Err(TransportError::Unauthorized {
                reason: format!("certificate is not enrolled with {}", request.identity.msp_id),
            });
        }

        let mut raw = [0u8; 16];
        OsRng.fill_bytes(&mut raw);
        let id = hex::encode(raw);
        self.sessions().insert(id.clone(), request.identity);
        debug!("opened session {} on {}", id, request.endpoint);
        Ok(SessionId(id))
    }

    async fn discover(
        &self,
        session: &SessionId,
        channel: &str,
    ) -> Result<ChannelTopology, TransportError> {
        self.check_session(session)?;
        let policies = self
            .inner
            .channels
            .get(channel)
            .ok_or_else(|| TransportError::UnknownChannel {
                channel: channel.to_string(),
            })?;

        Ok(ChannelTopology {
            channel: channel.to_string(),
            peers: self
                .inner
                .peers
                .iter()
                .map(|p| PeerEndpoint {
                    name: p.name.clone(),
                    address: p.host_address.clone(),
                    msp_id: p.msp_id.clone(),
                })
                .collect(),
            policies: policies.clone(),
        })
    }

    async fn endorse(
        &self,
        session: &SessionId,
        peer_address: &str,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError> {
        self.check_session(session)?;
        let peer = self.peer_at(peer_address)?;

        let decoded = proposal.decode().map_err(|e| TransportError::Rejected {
            reason: format!("malformed proposal: {}", e),
        })?;
        if !decoded.creator.verify(&proposal.bytes, &proposal.signature) {
            return Err(TransportError::Rejected {
                reason: "creator signature is invalid".to_string(),
            });
        }
        if !self.is_member(&decoded.creator) {
            return Err(TransportError::Rejected {
                reason: "creator is not a channel member".to_string(),
            });
        }
        if decoded.tx_id != compute_tx_id(&decoded.nonce, &decoded.creator) {
            return Err(TransportError::Rejected {
                reason: "transaction id does not match nonce and creator".to_string(),
            });
        }
        let Some(policies) = self.inner.channels.get(&decoded.channel) else {
            return Err(TransportError::Rejected {
                reason: format!("{} has not joined {}", peer.name, decoded.channel),
            });
        };
        if !policies.contains_key(&decoded.chaincode) {
            return Ok(error_response(format!(
                "chaincode {} is not installed on {}",
                decoded.chaincode, peer.name
            )));
        }

        let (outcome, rwset) = {
            let ledger = self.inner.ledger.lock().await;
            let mut stub = Stub::new(&ledger.world, decoded.creator.clone());
            let outcome = papercontract::invoke(&mut stub, &decoded.function, &decoded.args);
            (outcome, stub.into_rwset())
        };

        match outcome {
            Ok(payload) => {
                let digest = response_digest(&decoded.tx_id, &payload, &rwset).map_err(|e| {
                    TransportError::Rejected {
                        reason: e.to_string(),
                    }
                })?;
                debug!("{} endorsed {}", peer.name, decoded.tx_id);
                Ok(ProposalResponse {
                    status: STATUS_OK,
                    message: String::new(),
                    payload,
                    rwset,
                    endorsement: Some(Endorsement {
                        endorser: peer.identity(),
                        signature: peer.credential.sign(&digest),
                    }),
                })
            }
            Err(message) => {
                debug!("{} refused {}: {}", peer.name, decoded.tx_id, message);
                Ok(error_response(message))
            }
        }
    }

    async fn broadcast(
        &self,
        session: &SessionId,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        self.check_session(session)?;
        let payload = envelope.open().map_err(|e| TransportError::Rejected {
            reason: format!("malformed envelope: {}", e),
        })?;
        if !payload.creator.verify(&envelope.bytes, &envelope.signature) {
            return Err(TransportError::Rejected {
                reason: "envelope signature is invalid".to_string(),
            });
        }
        if !self.inner.channels.contains_key(&payload.channel) {
            return Err(TransportError::Rejected {
                reason: format!("channel {} does not exist", payload.channel),
            });
        }
        if self
            .inner
            .ledger
            .lock()
            .await
            .statuses
            .contains_key(&payload.tx_id)
        {
            return Err(TransportError::Rejected {
                reason: format!("duplicate transaction id {}", payload.tx_id),
            });
        }

        if self.inner.hold_commits.load(Ordering::SeqCst) {
            warn!("holding tx {}, it will not be committed", payload.tx_id);
            return Ok(());
        }

        let inner = self.inner.clone();
        let delay = Duration::from_millis(self.inner.commit_delay_ms.load(Ordering::SeqCst));
        tokio::spawn(async move {
            sleep(delay).await;
            commit(&inner, payload).await;
        });
        Ok(())
    }

    async fn commit_status(
        &self,
        session: &SessionId,
        _channel: &str,
        tx_id: &str,
    ) -> Result<CommitStatus, TransportError> {
        loop {
            let notified = self.inner.committed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.check_session(session)?;
            if let Some(status) = self.inner.ledger.lock().await.statuses.get(tx_id) {
                return Ok(status.clone());
            }
            notified.await;
        }
    }

    fn release(&self, session: &SessionId) {
        if self.sessions().remove(&session.0).is_some() {
            self.inner.releases.fetch_add(1, Ordering::SeqCst);
            debug!("released session {}", session);
        }
    }
}

/// Validates one ordered transaction into its own block.
async fn commit(inner: &Inner, payload: EnvelopePayload) {
    let mut code = endorsement_code(inner, &payload);

    let mut ledger = inner.ledger.lock().await;
    if code == ValidationCode::Valid && !ledger.world.reads_current(&payload.rwset.reads) {
        code = ValidationCode::MvccReadConflict;
    }
    if ledger.statuses.contains_key(&payload.tx_id) {
        code = ValidationCode::DuplicateTxId;
    }

    ledger.height += 1;
    let block_number = ledger.height;
    if code == ValidationCode::Valid {
        ledger.world.apply(&payload.rwset.writes, block_number);
    }
    ledger.statuses.insert(
        payload.tx_id.clone(),
        CommitStatus {
            tx_id: payload.tx_id.clone(),
            code,
            block_number,
        },
    );
    drop(ledger);

    info!("block {}: tx {} {}", block_number, payload.tx_id, code);
    inner.committed.notify_waiters();
}

fn endorsement_code(inner: &Inner, payload: &EnvelopePayload) -> ValidationCode {
    let Ok(digest) = response_digest(&payload.tx_id, &payload.response_payload, &payload.rwset)
    else {
        return ValidationCode::EndorsementPolicyFailure;
    };

    let mut endorsing_orgs = HashSet::new();
    for endorsement in &payload.endorsements {
        let known_peer = inner
            .peers
            .iter()
            .any(|p| p.identity() == endorsement.endorser);
        if known_peer && endorsement.endorser.verify(&digest, &endorsement.signature) {
            endorsing_orgs.insert(endorsement.endorser.msp_id.as_str());
        }
    }

    let required = inner
        .channels
        .get(&payload.channel)
        .and_then(|policies| policies.get(&payload.chaincode));
    match required {
        Some(orgs) if orgs.iter().all(|org| endorsing_orgs.contains(org.as_str())) => {
            ValidationCode::Valid
        }
        _ => ValidationCode::EndorsementPolicyFailure,
    }
}
