pub mod paper;
pub mod requests;

pub use paper::{CommercialPaper, DecodeError, PaperState, decode, encode};
pub use requests::{
    BuyRequest, CHAINCODE_NAME, CONTRACT_NAMESPACE, IssueRequest, PaperTransaction, RedeemRequest,
    query_paper, submit_paper,
};
