use super::paper::{CommercialPaper, decode};
use crate::error::GatewayError;
use crate::gateway::Contract;
use log::info;

pub const CHAINCODE_NAME: &str = "papercontract";
pub const CONTRACT_NAMESPACE: &str = "org.papernet.commercialcontract";

/// A paper lifecycle transaction: its name and positional wire arguments.
/// Order and count are the contract's; the peers enforce them.
pub trait PaperTransaction {
    fn name(&self) -> &'static str;
    fn args(&self) -> Vec<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub issuer: String,
    pub paper_number: String,
    pub issue_date: String,
    pub maturity_date: String,
    pub face_value: String,
}

impl PaperTransaction for IssueRequest {
    fn name(&self) -> &'static str {
        "issue"
    }

    fn args(&self) -> Vec<&str> {
        vec![
            self.issuer.as_str(),
            self.paper_number.as_str(),
            self.issue_date.as_str(),
            self.maturity_date.as_str(),
            self.face_value.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyRequest {
    pub issuer: String,
    pub paper_number: String,
    pub current_owner: String,
    pub new_owner: String,
    pub new_owner_msp: String,
    pub price: String,
    pub purchase_date: String,
}

impl PaperTransaction for BuyRequest {
    fn name(&self) -> &'static str {
        "buy"
    }

    fn args(&self) -> Vec<&str> {
        vec![
            self.issuer.as_str(),
            self.paper_number.as_str(),
            self.current_owner.as_str(),
            self.new_owner.as_str(),
            self.new_owner_msp.as_str(),
            self.price.as_str(),
            self.purchase_date.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemRequest {
    pub issuer: String,
    pub paper_number: String,
    pub redeeming_owner: String,
    pub redeeming_owner_msp: String,
    pub redeem_date: String,
}

impl PaperTransaction for RedeemRequest {
    fn name(&self) -> &'static str {
        "redeem"
    }

    fn args(&self) -> Vec<&str> {
        vec![
            self.issuer.as_str(),
            self.paper_number.as_str(),
            self.redeeming_owner.as_str(),
            self.redeeming_owner_msp.as_str(),
            self.redeem_date.as_str(),
        ]
    }
}

/// Submits a lifecycle transaction and decodes the paper the contract returns.
pub async fn submit_paper<T: PaperTransaction>(
    contract: &Contract<'_>,
    request: &T,
) -> Result<CommercialPaper, GatewayError> {
    let payload = contract
        .submit_transaction(request.name(), &request.args())
        .await?;
    let paper = decode(&payload)?;
    info!("{} returned {}", request.name(), paper);
    Ok(paper)
}

/// Reads the current ledger view of a paper without submitting anything.
pub async fn query_paper(
    contract: &Contract<'_>,
    issuer: &str,
    paper_number: &str,
) -> Result<CommercialPaper, GatewayError> {
    let payload = contract
        .evaluate_transaction("getPaper", &[issuer, paper_number])
        .await?;
    Ok(decode(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeem_arguments_keep_wire_order() {
        let request = RedeemRequest {
            issuer: "MagnetoCorp".into(),
            paper_number: "00001".into(),
            redeeming_owner: "DigiBank".into(),
            redeeming_owner_msp: "Org2MSP".into(),
            redeem_date: "2020-11-30".into(),
        };
        assert_eq!(request.name(), "redeem");
        assert_eq!(
            request.args(),
            vec!["MagnetoCorp", "00001", "DigiBank", "Org2MSP", "2020-11-30"]
        );
    }

    #[test]
    fn buy_carries_seven_arguments() {
        let request = BuyRequest {
            issuer: "MagnetoCorp".into(),
            paper_number: "00001".into(),
            current_owner: "MagnetoCorp".into(),
            new_owner: "DigiBank".into(),
            new_owner_msp: "Org2MSP".into(),
            price: "4900000".into(),
            purchase_date: "2020-05-31".into(),
        };
        assert_eq!(request.args().len(), 7);
        assert_eq!(request.args()[3], "DigiBank");
    }
}
