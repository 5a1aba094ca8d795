use async_trait::async_trait;
use papernet::error::{Phase, TransactionError};
use papernet::gateway::proposal::{CommitStatus, Envelope, ProposalResponse, SignedProposal};
use papernet::gateway::transport::{
    ChannelTopology, HandshakeRequest, LedgerTransport, SessionId, TransportError,
};
use papernet::gateway::{ConnectionOptions, ConnectionProfile, ContractRef, Gateway};
use papernet::ledger::{CHANNEL, ORG1_MSP, ORG2_MSP, PaperNet};
use papernet::paper::{
    BuyRequest, CHAINCODE_NAME, CONTRACT_NAMESPACE, CommercialPaper, IssueRequest, PaperState,
    RedeemRequest, query_paper, submit_paper,
};
use papernet::wallet::{InMemoryWallet, Wallet};
use papernet::{GatewayError, Target, run, run_observed, success_message};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Fixture {
    net: PaperNet,
    wallet: Arc<InMemoryWallet>,
    profile: ConnectionProfile,
}

impl Fixture {
    async fn new() -> Self {
        let net = PaperNet::new();
        let wallet = InMemoryWallet::new();
        wallet
            .put("balaji", net.enroll("balaji", ORG1_MSP))
            .await
            .unwrap();
        net.seed_paper(&traded_paper()).await.unwrap();
        let profile = net.profile().unwrap();
        Self {
            net,
            wallet: Arc::new(wallet),
            profile,
        }
    }

    fn gateway(&self) -> Gateway {
        Gateway::new(Arc::new(self.net.clone()))
    }

    fn options(&self) -> ConnectionOptions {
        ConnectionOptions::new(self.wallet.clone(), "balaji")
    }
}

fn traded_paper() -> CommercialPaper {
    CommercialPaper {
        issuer: "MagnetoCorp".into(),
        paper_number: "00001".into(),
        owner: "DigiBank".into(),
        owner_msp: Some(ORG2_MSP.into()),
        issue_date: "2020-05-31".into(),
        maturity_date: "2020-11-30".into(),
        face_value: 5_000_000,
        state: PaperState::Traded,
        redeem_date: None,
    }
}

fn target() -> Target {
    Target {
        channel: CHANNEL.into(),
        contract: ContractRef::new(CHAINCODE_NAME, CONTRACT_NAMESPACE).unwrap(),
    }
}

fn redeem_request() -> RedeemRequest {
    RedeemRequest {
        issuer: "MagnetoCorp".into(),
        paper_number: "00001".into(),
        redeeming_owner: "DigiBank".into(),
        redeeming_owner_msp: ORG2_MSP.into(),
        redeem_date: "2020-11-30".into(),
    }
}

fn transaction_error(err: GatewayError) -> TransactionError {
    match err {
        GatewayError::Transaction(tx) => tx,
        other => panic!("expected a transaction error, got {:?}", other),
    }
}

#[tokio::test]
async fn redeems_traded_paper_end_to_end() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();

    let paper = assert_ok!(
        run(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request()
        )
        .await
    );

    assert_eq!(paper.issuer, "MagnetoCorp");
    assert_eq!(paper.paper_number, "00001");
    assert_eq!(paper.owner, "DigiBank");
    assert_eq!(paper.state, PaperState::Redeemed);
    assert_eq!(paper.redeem_date.as_deref(), Some("2020-11-30"));
    assert_eq!(
        success_message(&paper),
        "MagnetoCorp commercial paper : 00001 successfully redeemed with DigiBank"
    );

    let stored = fx.net.paper("MagnetoCorp", "00001").await.unwrap();
    assert_eq!(stored, paper);
    assert_eq!(fx.net.block_height().await, 1);
    assert!(!gateway.is_connected());
    assert_eq!(fx.net.releases(), 1);
    assert_eq!(fx.net.open_sessions(), 0);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    assert_ok!(gateway.connect(fx.profile.clone(), fx.options()).await);
    assert_eq!(fx.net.open_sessions(), 1);
    {
        let network = assert_ok!(gateway.get_network(CHANNEL).await);
        let contract = assert_ok!(network.get_contract(CHAINCODE_NAME, CONTRACT_NAMESPACE));
        assert_eq!(contract.reference().namespace(), CONTRACT_NAMESPACE);
        assert_eq!(network.name(), CHANNEL);
    }

    gateway.disconnect();
    gateway.disconnect();
    assert_eq!(fx.net.releases(), 1);
    assert_eq!(fx.net.open_sessions(), 0);
}

#[tokio::test]
async fn disconnect_without_connect_does_nothing() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    gateway.disconnect();
    assert_eq!(fx.net.releases(), 0);
}

#[tokio::test]
async fn unknown_identity_never_reaches_the_network() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    let options = ConnectionOptions::new(fx.wallet.clone(), "nobody");

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            options,
            &target(),
            &redeem_request()
        )
        .await
    );
    assert_eq!(err.phase(), Phase::Identity);
    assert_eq!(fx.net.releases(), 0);
    assert_eq!(fx.net.open_sessions(), 0);
}

#[tokio::test]
async fn unknown_channel_releases_session() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    let target = Target {
        channel: "nochannel".into(),
        ..target()
    };

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target,
            &redeem_request()
        )
        .await
    );
    assert!(matches!(err, GatewayError::ChannelNotFound { ref channel } if channel == "nochannel"));
    assert_eq!(err.phase(), Phase::Channel);
    assert_eq!(fx.net.releases(), 1);
}

#[tokio::test]
async fn wrong_argument_count_is_an_endorsement_failure() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    assert_ok!(gateway.connect(fx.profile.clone(), fx.options()).await);

    let network = assert_ok!(gateway.get_network(CHANNEL).await);
    let contract = assert_ok!(network.get_contract(CHAINCODE_NAME, CONTRACT_NAMESPACE));
    let err = assert_err!(
        contract
            .submit_transaction("redeem", &["MagnetoCorp", "00001"])
            .await
    );
    match &err {
        TransactionError::Endorsement { reason } => {
            assert!(reason.contains("redeem expects 5 arguments, got 2"), "{}", reason)
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(GatewayError::from(err).is_safe_to_retry());
    assert_eq!(fx.net.block_height().await, 0);

    gateway.disconnect();
    assert_eq!(fx.net.releases(), 1);
}

#[tokio::test]
async fn commit_timeout_is_ambiguous_and_still_releases() {
    let fx = Fixture::new().await;
    fx.net.hold_commits(true);
    let mut gateway = fx.gateway();
    let options = fx.options().with_commit_timeout(Duration::from_millis(150));

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            options,
            &target(),
            &redeem_request()
        )
        .await
    );
    assert!(!err.is_safe_to_retry());
    let tx = transaction_error(err);
    assert!(tx.is_ambiguous());
    assert!(matches!(
        tx,
        TransactionError::CommitTimeout { waited, .. } if waited == Duration::from_millis(150)
    ));
    assert!(tx.tx_id().is_some());

    assert_eq!(fx.net.releases(), 1);
    assert_eq!(fx.net.open_sessions(), 0);
}

#[tokio::test]
async fn per_transaction_timeout_overrides_session_default() {
    let fx = Fixture::new().await;
    fx.net.set_commit_delay(Duration::from_millis(500));
    let mut gateway = fx.gateway();
    assert_ok!(gateway.connect(fx.profile.clone(), fx.options()).await);

    let network = assert_ok!(gateway.get_network(CHANNEL).await);
    let contract = assert_ok!(network.get_contract(CHAINCODE_NAME, CONTRACT_NAMESPACE));
    let request = redeem_request();
    let err = assert_err!(
        contract
            .create_transaction("redeem")
            .with_commit_timeout(Duration::from_millis(50))
            .submit(&request_args(&request))
            .await
    );
    assert!(matches!(err, TransactionError::CommitTimeout { .. }));

    gateway.disconnect();
}

fn request_args(request: &RedeemRequest) -> Vec<&str> {
    vec![
        request.issuer.as_str(),
        request.paper_number.as_str(),
        request.redeeming_owner.as_str(),
        request.redeeming_owner_msp.as_str(),
        request.redeem_date.as_str(),
    ]
}

#[tokio::test]
async fn container_addresses_unreachable_without_localhost_rewrite() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    let options = fx.options().with_discovery(true, false);

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            options,
            &target(),
            &redeem_request()
        )
        .await
    );
    assert!(matches!(
        transaction_error(err),
        TransactionError::Connectivity { .. }
    ));
    assert_eq!(
        fx.net.paper("MagnetoCorp", "00001").await.unwrap().state,
        PaperState::Traded
    );
    assert_eq!(fx.net.releases(), 1);
}

#[tokio::test]
async fn static_topology_used_when_discovery_disabled() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    let options = fx.options().with_discovery(false, false);

    let paper = assert_ok!(
        run(
            &mut gateway,
            fx.profile.clone(),
            options,
            &target(),
            &redeem_request()
        )
        .await
    );
    assert!(paper.is_redeemed());
}

#[tokio::test]
async fn offline_endorser_is_a_connectivity_failure() {
    let fx = Fixture::new().await;
    fx.net.set_peer_online("peer0.org2.example.com", false);
    let mut gateway = fx.gateway();

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request()
        )
        .await
    );
    assert!(err.is_safe_to_retry());
    match transaction_error(err) {
        TransactionError::Connectivity { reason } => assert!(reason.contains(ORG2_MSP), "{}", reason),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn offline_gateway_peer_fails_connect() {
    let fx = Fixture::new().await;
    fx.net.set_peer_online("peer0.org1.example.com", false);
    let mut gateway = fx.gateway();

    let err = assert_err!(gateway.connect(fx.profile.clone(), fx.options()).await);
    assert!(matches!(err, GatewayError::Connection { .. }));
    assert_eq!(err.phase(), Phase::Connect);
    assert!(!gateway.is_connected());
}

#[tokio::test]
async fn second_redeem_is_rejected_by_the_contract() {
    let fx = Fixture::new().await;

    let mut first = fx.gateway();
    assert_ok!(
        run(
            &mut first,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request()
        )
        .await
    );

    let mut second = fx.gateway();
    let err = assert_err!(
        run(
            &mut second,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request()
        )
        .await
    );
    match transaction_error(err) {
        TransactionError::Endorsement { reason } => {
            assert!(reason.contains("already been redeemed"), "{}", reason)
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(fx.net.releases(), 2);
}

#[tokio::test]
async fn concurrent_redeems_conflict_at_commit() {
    let fx = Fixture::new().await;
    fx.net.set_commit_delay(Duration::from_millis(300));

    let mut gateway_a = fx.gateway();
    let mut gateway_b = fx.gateway();
    assert_ok!(gateway_a.connect(fx.profile.clone(), fx.options()).await);
    assert_ok!(gateway_b.connect(fx.profile.clone(), fx.options()).await);

    let network_a = assert_ok!(gateway_a.get_network(CHANNEL).await);
    let network_b = assert_ok!(gateway_b.get_network(CHANNEL).await);
    let contract_a = assert_ok!(network_a.get_contract(CHAINCODE_NAME, CONTRACT_NAMESPACE));
    let contract_b = assert_ok!(network_b.get_contract(CHAINCODE_NAME, CONTRACT_NAMESPACE));

    let request = redeem_request();
    let (a, b) = tokio::join!(
        submit_paper(&contract_a, &request),
        submit_paper(&contract_b, &request)
    );

    let (winner, loser) = match (a, b) {
        (Ok(paper), Err(err)) | (Err(err), Ok(paper)) => (paper, err),
        other => panic!("expected exactly one commit, got {:?}", other),
    };
    assert!(winner.is_redeemed());
    match transaction_error(loser) {
        TransactionError::Commit { reason, .. } => assert_eq!(reason, "MVCC_READ_CONFLICT"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(fx.net.block_height().await, 2);

    gateway_a.disconnect();
    gateway_b.disconnect();
    assert_eq!(fx.net.releases(), 2);
}

#[tokio::test]
async fn full_lifecycle_issue_buy_redeem() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    assert_ok!(gateway.connect(fx.profile.clone(), fx.options()).await);
    let network = assert_ok!(gateway.get_network(CHANNEL).await);
    let contract = assert_ok!(network.get_contract(CHAINCODE_NAME, CONTRACT_NAMESPACE));

    let issued = assert_ok!(
        submit_paper(
            &contract,
            &IssueRequest {
                issuer: "MagnetoCorp".into(),
                paper_number: "00002".into(),
                issue_date: "2020-06-01".into(),
                maturity_date: "2020-12-01".into(),
                face_value: "5000000".into(),
            }
        )
        .await
    );
    assert_eq!(issued.state, PaperState::Issued);
    assert_eq!(issued.owner, "MagnetoCorp");
    assert_eq!(issued.owner_msp.as_deref(), Some(ORG1_MSP));

    let bought = assert_ok!(
        submit_paper(
            &contract,
            &BuyRequest {
                issuer: "MagnetoCorp".into(),
                paper_number: "00002".into(),
                current_owner: "MagnetoCorp".into(),
                new_owner: "DigiBank".into(),
                new_owner_msp: ORG2_MSP.into(),
                price: "4900000".into(),
                purchase_date: "2020-06-01".into(),
            }
        )
        .await
    );
    assert_eq!(bought.state, PaperState::Traded);
    assert_eq!(bought.owner, "DigiBank");

    let redeemed = assert_ok!(
        submit_paper(
            &contract,
            &RedeemRequest {
                paper_number: "00002".into(),
                redeem_date: "2020-12-01".into(),
                ..redeem_request()
            }
        )
        .await
    );
    assert_eq!(redeemed.state, PaperState::Redeemed);

    let height = fx.net.block_height().await;
    let queried = assert_ok!(query_paper(&contract, "MagnetoCorp", "00002").await);
    assert_eq!(queried, redeemed);
    assert_eq!(fx.net.block_height().await, height);

    drop(contract);
    drop(network);
    gateway.disconnect();
}

#[tokio::test]
async fn empty_contract_names_rejected() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    assert_ok!(gateway.connect(fx.profile.clone(), fx.options()).await);
    let network = assert_ok!(gateway.get_network(CHANNEL).await);

    assert!(matches!(
        network.get_contract("", CONTRACT_NAMESPACE),
        Err(GatewayError::InvalidContract { .. })
    ));
    assert!(matches!(
        network.get_contract(CHAINCODE_NAME, ""),
        Err(GatewayError::InvalidContract { .. })
    ));
}

#[tokio::test]
async fn run_refuses_a_gateway_that_is_already_connected() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    assert_ok!(gateway.connect(fx.profile.clone(), fx.options()).await);

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request()
        )
        .await
    );
    assert!(matches!(err, GatewayError::AlreadyConnected));
    assert!(gateway.is_connected());
    assert_eq!(fx.net.open_sessions(), 1);
    assert_eq!(fx.net.releases(), 0);
    assert_eq!(
        fx.net.paper("MagnetoCorp", "00001").await.unwrap().state,
        PaperState::Traded
    );

    gateway.disconnect();
    assert_eq!(fx.net.releases(), 1);
}

/// Hands every envelope to the network, then reports the orderer as gone.
struct LostAckTransport {
    net: PaperNet,
}

#[async_trait]
impl LedgerTransport for LostAckTransport {
    async fn handshake(&self, request: HandshakeRequest) -> Result<SessionId, TransportError> {
        self.net.handshake(request).await
    }

    async fn discover(
        &self,
        session: &SessionId,
        channel: &str,
    ) -> Result<ChannelTopology, TransportError> {
        self.net.discover(session, channel).await
    }

    async fn endorse(
        &self,
        session: &SessionId,
        peer_address: &str,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError> {
        self.net.endorse(session, peer_address, proposal).await
    }

    async fn broadcast(
        &self,
        session: &SessionId,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        self.net.broadcast(session, envelope).await?;
        Err(TransportError::Unreachable {
            address: "orderer.example.com:7050".into(),
        })
    }

    async fn commit_status(
        &self,
        session: &SessionId,
        channel: &str,
        tx_id: &str,
    ) -> Result<CommitStatus, TransportError> {
        self.net.commit_status(session, channel, tx_id).await
    }

    fn release(&self, session: &SessionId) {
        self.net.release(session)
    }
}

#[tokio::test]
async fn lost_broadcast_ack_is_ambiguous() {
    let fx = Fixture::new().await;
    let mut gateway = Gateway::new(Arc::new(LostAckTransport {
        net: fx.net.clone(),
    }));

    let err = assert_err!(
        run(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request()
        )
        .await
    );
    assert!(!err.is_safe_to_retry());
    assert_eq!(err.phase(), Phase::Submit);
    let tx = transaction_error(err);
    assert!(tx.is_ambiguous());
    assert!(tx.tx_id().is_some());
    assert!(matches!(tx, TransactionError::BroadcastUnconfirmed { .. }));
    assert_eq!(fx.net.releases(), 1);

    // the envelope did reach ordering, so the paper still gets redeemed
    let mut state = PaperState::Traded;
    for _ in 0..50 {
        state = fx.net.paper("MagnetoCorp", "00001").await.unwrap().state;
        if state == PaperState::Redeemed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state, PaperState::Redeemed);
}

#[tokio::test]
async fn phases_are_reported_as_they_start() {
    let fx = Fixture::new().await;
    let mut gateway = fx.gateway();
    let mut seen = Vec::new();

    assert_ok!(
        run_observed(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request(),
            |phase| seen.push(phase)
        )
        .await
    );
    assert_eq!(
        seen,
        vec![Phase::Connect, Phase::Channel, Phase::Submit, Phase::Decode]
    );
}

#[tokio::test]
async fn failed_connect_reports_no_later_phase() {
    let fx = Fixture::new().await;
    fx.net.set_peer_online("peer0.org1.example.com", false);
    let mut gateway = fx.gateway();
    let mut seen = Vec::new();

    let err = assert_err!(
        run_observed(
            &mut gateway,
            fx.profile.clone(),
            fx.options(),
            &target(),
            &redeem_request(),
            |phase| seen.push(phase)
        )
        .await
    );
    assert_eq!(err.phase(), Phase::Connect);
    assert_eq!(seen, vec![Phase::Connect]);
}
