use crate::wallet::{Identity, SerializedIdentity};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const STATUS_OK: u16 = 200;
pub const STATUS_ERROR: u16 = 500;

const NONCE_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub tx_id: String,
    pub channel: String,
    pub chaincode: String,
    pub function: String,
    pub args: Vec<String>,
    pub creator: SerializedIdentity,
    pub nonce: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl Proposal {
    pub fn new(
        creator: &Identity,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[&str],
    ) -> Self {
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let creator = creator.serialized();
        Self {
            tx_id: compute_tx_id(&nonce, &creator),
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
            function: function.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            creator,
            nonce,
            timestamp: Utc::now(),
        }
    }

    pub fn sign(&self, identity: &Identity) -> Result<SignedProposal, bincode::Error> {
        let bytes = bincode::serialize(self)?;
        let signature = identity.sign(&bytes);
        Ok(SignedProposal { bytes, signature })
    }
}

/// Transaction ids bind the nonce to its creator: hex(sha256(nonce || creator)).
pub fn compute_tx_id(nonce: &[u8], creator: &SerializedIdentity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator.msp_id.as_bytes());
    hasher.update(&creator.certificate);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    pub bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedProposal {
    pub fn decode(&self) -> Result<Proposal, bincode::Error> {
        bincode::deserialize(&self.bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvRead {
    pub key: String,
    pub version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadWriteSet {
    pub reads: Vec<KvRead>,
    pub writes: Vec<KvWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub endorser: SerializedIdentity,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub status: u16,
    pub message: String,
    pub payload: Vec<u8>,
    pub rwset: ReadWriteSet,
    pub endorsement: Option<Endorsement>,
}

/// Bytes an endorser signs, and a committer later re-verifies.
pub fn response_digest(
    tx_id: &str,
    payload: &[u8],
    rwset: &ReadWriteSet,
) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(&(tx_id, payload, rwset))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopePayload {
    pub tx_id: String,
    pub channel: String,
    pub chaincode: String,
    pub creator: SerializedIdentity,
    pub response_payload: Vec<u8>,
    pub rwset: ReadWriteSet,
    pub endorsements: Vec<Endorsement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    pub fn seal(payload: &EnvelopePayload, identity: &Identity) -> Result<Self, bincode::Error> {
        let bytes = bincode::serialize(payload)?;
        let signature = identity.sign(&bytes);
        Ok(Self { bytes, signature })
    }

    pub fn open(&self) -> Result<EnvelopePayload, bincode::Error> {
        bincode::deserialize(&self.bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    Valid,
    MvccReadConflict,
    EndorsementPolicyFailure,
    BadCreatorSignature,
    DuplicateTxId,
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ValidationCode::Valid => "VALID",
            ValidationCode::MvccReadConflict => "MVCC_READ_CONFLICT",
            ValidationCode::EndorsementPolicyFailure => "ENDORSEMENT_POLICY_FAILURE",
            ValidationCode::BadCreatorSignature => "BAD_CREATOR_SIGNATURE",
            ValidationCode::DuplicateTxId => "DUPLICATE_TXID",
        };
        f.write_str(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    pub tx_id: String,
    pub code: ValidationCode,
    pub block_number: u64,
}

impl CommitStatus {
    pub fn is_valid(&self) -> bool {
        self.code == ValidationCode::Valid
    }
}
