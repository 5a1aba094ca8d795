pub mod network;
pub mod papercontract;
pub mod state;

pub use network::{CHANNEL, ORG1_MSP, ORG2_MSP, PaperNet};
pub use state::{Stub, WorldState};
