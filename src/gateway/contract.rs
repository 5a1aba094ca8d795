use super::network::Network;
use super::proposal::{
    Envelope, EnvelopePayload, Proposal, ProposalResponse, ReadWriteSet, STATUS_OK, SignedProposal,
};
use super::transport::{PeerEndpoint, TransportError};
use crate::error::{GatewayError, TransactionError};
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

/// Address of a contract: the chaincode it is deployed in and its namespace
/// inside that chaincode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractRef {
    chaincode: String,
    namespace: String,
}

impl ContractRef {
    pub fn new(chaincode: &str, namespace: &str) -> Result<Self, GatewayError> {
        if chaincode.trim().is_empty() {
            return Err(GatewayError::InvalidContract {
                reason: "chaincode name must not be empty".to_string(),
            });
        }
        if namespace.trim().is_empty() {
            return Err(GatewayError::InvalidContract {
                reason: "contract namespace must not be empty".to_string(),
            });
        }
        if namespace.contains(':') {
            return Err(GatewayError::InvalidContract {
                reason: format!("contract namespace '{}' must not contain ':'", namespace),
            });
        }
        Ok(Self {
            chaincode: chaincode.to_string(),
            namespace: namespace.to_string(),
        })
    }

    pub fn chaincode(&self) -> &str {
        &self.chaincode
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Wire function name, `namespace:transaction`.
    pub fn qualified(&self, transaction: &str) -> String {
        format!("{}:{}", self.namespace, transaction)
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.chaincode, self.namespace)
    }
}

pub struct Contract<'a> {
    network: &'a Network<'a>,
    reference: ContractRef,
}

impl<'a> Contract<'a> {
    pub(crate) fn new(
        network: &'a Network<'a>,
        chaincode: &str,
        namespace: &str,
    ) -> Result<Self, GatewayError> {
        let reference = ContractRef::new(chaincode, namespace)?;
        debug!("addressing {} on {}", reference, network.name());
        Ok(Self { network, reference })
    }

    pub fn reference(&self) -> &ContractRef {
        &self.reference
    }

    pub fn network(&self) -> &'a Network<'a> {
        self.network
    }

    pub fn create_transaction(&self, name: &str) -> Transaction<'_> {
        Transaction {
            contract: self,
            name: name.to_string(),
            commit_timeout: None,
        }
    }

    /// Endorses, orders and waits for commit; returns the contract's response.
    pub async fn submit_transaction(&self, name: &str, args: &[&str]) -> Result<Vec<u8>, TransactionError> {
        self.create_transaction(name).submit(args).await
    }

    /// Runs the transaction on a single peer without ordering it.
    pub async fn evaluate_transaction(&self, name: &str, args: &[&str]) -> Result<Vec<u8>, TransactionError> {
        self.create_transaction(name).evaluate(args).await
    }
}

/// A single named invocation, optionally with its own commit timeout.
pub struct Transaction<'c> {
    contract: &'c Contract<'c>,
    name: String,
    commit_timeout: Option<Duration>,
}

impl<'c> Transaction<'c> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = Some(timeout);
        self
    }

    pub async fn submit(&self, args: &[&str]) -> Result<Vec<u8>, TransactionError> {
        let network = self.contract.network;
        let session = network.session();
        let identity = session.identity();
        let transport = session.transport();

        let (proposal, signed) = self.proposal(args)?;
        let tx_id = proposal.tx_id.clone();
        info!(
            "submitting {} with {} argument(s) as tx {}",
            proposal.function,
            args.len(),
            tx_id
        );

        let responses = self.collect_endorsements(&signed).await?;
        let (payload, rwset) = agreed_result(&responses)?;
        let endorsements = responses
            .into_iter()
            .filter_map(|response| response.endorsement)
            .collect();

        let envelope = Envelope::seal(
            &EnvelopePayload {
                tx_id: tx_id.clone(),
                channel: proposal.channel,
                chaincode: proposal.chaincode,
                creator: proposal.creator,
                response_payload: payload.clone(),
                rwset,
                endorsements,
            },
            identity,
        )?;

        transport
            .broadcast(session.id(), &envelope)
            .await
            .map_err(|e| match e {
                TransportError::Rejected { reason } => TransactionError::Commit {
                    tx_id: tx_id.clone(),
                    reason,
                },
                other => TransactionError::BroadcastUnconfirmed {
                    tx_id: tx_id.clone(),
                    reason: other.to_string(),
                },
            })?;
        debug!("tx {} accepted for ordering", tx_id);

        let waited = self
            .commit_timeout
            .unwrap_or(session.options().commit_timeout);
        let status = match timeout(
            waited,
            transport.commit_status(session.id(), network.name(), &tx_id),
        )
        .await
        {
            Err(_) => {
                warn!("tx {} not committed within {:?}, outcome unknown", tx_id, waited);
                return Err(TransactionError::CommitTimeout { tx_id, waited });
            }
            Ok(Err(e)) => {
                return Err(TransactionError::CommitStatusUnavailable {
                    tx_id,
                    reason: e.to_string(),
                });
            }
            Ok(Ok(status)) => status,
        };

        if !status.is_valid() {
            return Err(TransactionError::Commit {
                tx_id,
                reason: status.code.to_string(),
            });
        }
        info!("tx {} committed in block {}", tx_id, status.block_number);
        Ok(payload)
    }

    pub async fn evaluate(&self, args: &[&str]) -> Result<Vec<u8>, TransactionError> {
        let topology = self.contract.network.topology();
        let own_msp = self.contract.network.session().identity().msp_id();

        let (proposal, signed) = self.proposal(args)?;
        debug!("evaluating {} as tx {}", proposal.function, proposal.tx_id);

        let mut candidates: Vec<&PeerEndpoint> = topology.peers_of(own_msp).collect();
        candidates.extend(topology.peers.iter().filter(|p| p.msp_id != own_msp));
        let response = self.endorse_with_any(&signed, own_msp, &candidates).await?;
        Ok(response.payload)
    }

    fn proposal(&self, args: &[&str]) -> Result<(Proposal, SignedProposal), TransactionError> {
        let network = self.contract.network;
        let identity = network.session().identity();
        let reference = &self.contract.reference;
        let proposal = Proposal::new(
            identity,
            network.name(),
            reference.chaincode(),
            &reference.qualified(&self.name),
            args,
        );
        let signed = proposal.sign(identity)?;
        Ok((proposal, signed))
    }

    async fn collect_endorsements(
        &self,
        signed: &SignedProposal,
    ) -> Result<Vec<ProposalResponse>, TransactionError> {
        let plan = self
            .contract
            .network
            .topology()
            .endorsement_plan(self.contract.reference.chaincode());
        if plan.is_empty() {
            return Err(TransactionError::Connectivity {
                reason: format!("no endorsing peers known on {}", self.contract.network.name()),
            });
        }

        let mut responses = Vec::with_capacity(plan.len());
        for (msp_id, candidates) in &plan {
            responses.push(self.endorse_with_any(signed, msp_id, candidates).await?);
        }
        Ok(responses)
    }

    /// Tries each candidate of one organization until a peer answers.
    async fn endorse_with_any(
        &self,
        signed: &SignedProposal,
        msp_id: &str,
        candidates: &[&PeerEndpoint],
    ) -> Result<ProposalResponse, TransactionError> {
        let session = self.contract.network.session();
        let endorse_timeout = session.options().endorse_timeout;
        let mut last_error = None;

        for peer in candidates {
            let attempt = timeout(
                endorse_timeout,
                session
                    .transport()
                    .endorse(session.id(), &peer.address, signed),
            )
            .await;
            match attempt {
                Ok(Ok(response)) => return check_response(peer, response),
                Ok(Err(TransportError::Rejected { reason })) => {
                    return Err(TransactionError::Endorsement {
                        reason: format!("{} rejected the proposal: {}", peer.name, reason),
                    });
                }
                Ok(Err(e)) => {
                    warn!("endorser {} unavailable: {}", peer.name, e);
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    warn!("endorser {} timed out after {:?}", peer.name, endorse_timeout);
                    last_error = Some(format!("{} timed out", peer.name));
                }
            }
        }

        Err(TransactionError::Connectivity {
            reason: format!(
                "no reachable endorser for {}: {}",
                msp_id,
                last_error.unwrap_or_else(|| "no peers known".to_string())
            ),
        })
    }
}

fn check_response(
    peer: &PeerEndpoint,
    response: ProposalResponse,
) -> Result<ProposalResponse, TransactionError> {
    if response.status != STATUS_OK {
        return Err(TransactionError::Endorsement {
            reason: format!(
                "{} returned status {}: {}",
                peer.name, response.status, response.message
            ),
        });
    }
    if response.endorsement.is_none() {
        return Err(TransactionError::Endorsement {
            reason: format!("{} returned no endorsement", peer.name),
        });
    }
    Ok(response)
}

/// Every endorser must have simulated the same result.
fn agreed_result(responses: &[ProposalResponse]) -> Result<(Vec<u8>, ReadWriteSet), TransactionError> {
    let first = responses
        .first()
        .ok_or_else(|| TransactionError::Endorsement {
            reason: "no endorsements collected".to_string(),
        })?;
    if responses
        .iter()
        .any(|r| r.payload != first.payload || r.rwset != first.rwset)
    {
        return Err(TransactionError::Endorsement {
            reason: "endorsers returned divergent results".to_string(),
        });
    }
    Ok((first.payload.clone(), first.rwset.clone()))
}
