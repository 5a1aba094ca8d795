pub mod contract;
pub mod gateway;
pub mod network;
pub mod options;
pub mod profile;
pub mod proposal;
pub mod transport;

pub use contract::{Contract, ContractRef, Transaction};
pub use gateway::{Gateway, Session};
pub use network::Network;
pub use options::{ConnectionOptions, DiscoveryOptions};
pub use profile::{ConnectionProfile, GatewayEndpoint, ProfileError};
pub use transport::{ChannelTopology, LedgerTransport, PeerEndpoint, SessionId, TransportError};
