use super::contract::Contract;
use super::gateway::Session;
use super::profile::as_localhost;
use super::transport::{ChannelTopology, TransportError};
use crate::error::GatewayError;
use log::{debug, info};

/// A channel reached through a live session. Borrowing the session keeps
/// the handle from outliving it.
pub struct Network<'s> {
    session: &'s Session,
    topology: ChannelTopology,
}

impl<'s> Network<'s> {
    pub(crate) async fn open(session: &'s Session, channel: &str) -> Result<Self, GatewayError> {
        if channel.is_empty() {
            return Err(GatewayError::ChannelNotFound {
                channel: String::new(),
            });
        }

        let topology = if session.options().discovery.enabled {
            discover(session, channel).await?
        } else {
            session
                .profile()
                .static_topology(channel)?
                .ok_or_else(|| GatewayError::ChannelNotFound {
                    channel: channel.to_string(),
                })?
        };

        info!(
            "using channel {} with {} endorsing peer(s)",
            channel,
            topology.peers.len()
        );
        Ok(Self { session, topology })
    }

    pub fn name(&self) -> &str {
        &self.topology.channel
    }

    pub fn topology(&self) -> &ChannelTopology {
        &self.topology
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    pub fn get_contract(&self, chaincode: &str, namespace: &str) -> Result<Contract<'_>, GatewayError> {
        Contract::new(self, chaincode, namespace)
    }
}

async fn discover(session: &Session, channel: &str) -> Result<ChannelTopology, GatewayError> {
    if let Some(topology) = session.cached_topology(channel).await {
        debug!("discovery cache hit for {}", channel);
        return Ok(topology);
    }

    let mut topology = session
        .transport()
        .discover(session.id(), channel)
        .await
        .map_err(|e| match e {
            TransportError::UnknownChannel { channel } => GatewayError::ChannelNotFound { channel },
            cause => GatewayError::Connection { cause },
        })?;

    if session.options().discovery.as_localhost {
        for peer in &mut topology.peers {
            peer.address = as_localhost(&peer.address);
        }
    }
    debug!("discovered {} peer(s) on {}", topology.peers.len(), channel);

    session.cache_topology(topology.clone()).await;
    Ok(topology)
}
