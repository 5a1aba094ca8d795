use anyhow::{Context, Result};
use log::{error, info};
use papernet::gateway::ConnectionProfile;
use papernet::ledger::{ORG1_MSP, ORG2_MSP, PaperNet};
use papernet::{AppConfig, CommercialPaper, Gateway, InMemoryWallet, PaperState, Phase, Wallet};
use std::process::ExitCode;
use std::sync::Arc;

/// Starts the local PaperNet with DigiBank holding paper 00001 and an
/// enrolled wallet identity for the configured user.
async fn bootstrap(config: &AppConfig) -> Result<(PaperNet, InMemoryWallet)> {
    let net = PaperNet::new();
    let wallet = InMemoryWallet::new();
    let identity = net.enroll(&config.identity, ORG1_MSP);
    wallet
        .put(&config.identity, identity)
        .await
        .context("failed to store identity in wallet")?;

    net.seed_paper(&CommercialPaper {
        issuer: config.request.issuer.clone(),
        paper_number: config.request.paper_number.clone(),
        owner: "DigiBank".to_string(),
        owner_msp: Some(ORG2_MSP.to_string()),
        issue_date: "2020-05-31".to_string(),
        maturity_date: "2020-11-30".to_string(),
        face_value: 5_000_000,
        state: PaperState::Traded,
        redeem_date: None,
    })
    .await
    .context("failed to seed commercial paper")?;

    Ok((net, wallet))
}

async fn redeem(config: &AppConfig, gateway: &mut Gateway, wallet: InMemoryWallet) -> Result<()> {
    let profile = ConnectionProfile::load(&config.profile_path)
        .with_context(|| format!("loading {}", config.profile_path.display()))?;
    let target = config.target()?;
    let options = config.connection_options(Arc::new(wallet));

    let paper = papernet::run_observed(
        gateway,
        profile,
        options,
        &target,
        &config.request,
        |phase| match phase {
            Phase::Connect => println!("Connect to Fabric gateway."),
            Phase::Channel => {
                println!("Use network channel: {}.", target.channel);
                println!("Use {} smart contract.", target.contract.namespace());
            }
            Phase::Submit => println!("Submit commercial paper redeem transaction."),
            Phase::Decode => println!("Process redeem transaction response."),
            Phase::Identity => {}
        },
    )
    .await?;

    println!("{}", papernet::success_message(&paper));
    println!("Transaction complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    info!("starting redeem with {:?}", config);

    let (net, wallet) = match bootstrap(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("{:#}", e);
            println!("Redeem program exception.");
            return ExitCode::FAILURE;
        }
    };

    let mut gateway = Gateway::new(Arc::new(net.clone()));
    let outcome = redeem(&config, &mut gateway, wallet).await;

    println!("Disconnect from Fabric gateway.");
    gateway.disconnect();
    info!("{} session(s) still open", net.open_sessions());

    match outcome {
        Ok(()) => {
            println!("Redeem program complete.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Error processing transaction. {:#}", e);
            println!("Redeem program exception.");
            ExitCode::FAILURE
        }
    }
}
