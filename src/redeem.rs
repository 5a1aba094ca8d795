use crate::error::{GatewayError, Phase};
use crate::gateway::{ConnectionOptions, ConnectionProfile, ContractRef, Gateway};
use crate::paper::{CommercialPaper, PaperState, RedeemRequest, submit_paper};
use log::{error, info, warn};

/// Where the redeem transaction is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub channel: String,
    pub contract: ContractRef,
}

/// Connects, redeems and disconnects. The session is released on every
/// path, including failures after connect. A gateway that is already
/// connected is refused and left as it was.
pub async fn run(
    gateway: &mut Gateway,
    profile: ConnectionProfile,
    options: ConnectionOptions,
    target: &Target,
    request: &RedeemRequest,
) -> Result<CommercialPaper, GatewayError> {
    run_observed(gateway, profile, options, target, request, |_| {}).await
}

/// Like [`run`], calling `on_phase` as each stage of the workflow starts.
pub async fn run_observed(
    gateway: &mut Gateway,
    profile: ConnectionProfile,
    options: ConnectionOptions,
    target: &Target,
    request: &RedeemRequest,
    mut on_phase: impl FnMut(Phase),
) -> Result<CommercialPaper, GatewayError> {
    if gateway.is_connected() {
        warn!("refusing to redeem on a gateway with a live session");
        return Err(GatewayError::AlreadyConnected);
    }

    let outcome = execute(gateway, profile, options, target, request, &mut on_phase).await;
    gateway.disconnect();

    if let Err(e) = &outcome {
        error!("redeem failed during {}: {}", e.phase(), e);
    }
    outcome
}

async fn execute(
    gateway: &mut Gateway,
    profile: ConnectionProfile,
    options: ConnectionOptions,
    target: &Target,
    request: &RedeemRequest,
    on_phase: &mut impl FnMut(Phase),
) -> Result<CommercialPaper, GatewayError> {
    on_phase(Phase::Connect);
    gateway.connect(profile, options).await?;

    on_phase(Phase::Channel);
    let network = gateway.get_network(&target.channel).await?;
    let contract = network.get_contract(target.contract.chaincode(), target.contract.namespace())?;
    info!("using {} on {}", contract.reference(), network.name());

    on_phase(Phase::Submit);
    let paper = submit_paper(&contract, request).await?;

    on_phase(Phase::Decode);
    if paper.state != PaperState::Redeemed {
        return Err(GatewayError::UnexpectedState {
            key: paper.key(),
            expected: PaperState::Redeemed,
            actual: paper.state,
        });
    }
    Ok(paper)
}

pub fn success_message(paper: &CommercialPaper) -> String {
    format!(
        "{} commercial paper : {} successfully redeemed with {}",
        paper.issuer, paper.paper_number, paper.owner
    )
}
