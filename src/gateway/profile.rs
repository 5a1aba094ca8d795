use super::transport::{ChannelTopology, PeerEndpoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("cannot read connection profile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse connection profile: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("organization '{0}' is not defined in the profile")]
    UnknownOrganization(String),

    #[error("organization '{org}' lists no peers")]
    NoPeers { org: String },

    #[error("peer '{0}' is not defined in the profile")]
    UnknownPeer(String),

    #[error("peer url '{url}' is invalid, expected grpc:// or grpcs://host:port")]
    InvalidUrl { url: String },

    #[error("peer '{peer}' uses TLS but has no tlsCACerts")]
    MissingTlsRoot { peer: String },
}

/// Static description of a network: organizations, their peers and the
/// trust roots used to reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub client: ClientConfig,
    pub organizations: HashMap<String, OrganizationConfig>,
    pub peers: HashMap<String, PeerConfig>,
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub url: String,
    #[serde(rename = "tlsCACerts", default)]
    pub tls_ca_certs: Option<TlsCerts>,
    #[serde(rename = "grpcOptions", default)]
    pub grpc_options: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsCerts {
    pub pem: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub peers: HashMap<String, ChannelPeerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPeerConfig {
    #[serde(default = "default_true")]
    pub endorsing_peer: bool,
}

fn default_true() -> bool {
    true
}

/// The peer a client opens its session against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub peer: String,
    pub address: String,
    pub tls: bool,
    pub tls_root: Option<String>,
}

impl ConnectionProfile {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProfileError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    pub fn client_organization(&self) -> Result<&OrganizationConfig, ProfileError> {
        self.organizations
            .get(&self.client.organization)
            .ok_or_else(|| ProfileError::UnknownOrganization(self.client.organization.clone()))
    }

    /// First peer of the client's organization, with its url and trust root
    /// checked.
    pub fn gateway_endpoint(&self) -> Result<GatewayEndpoint, ProfileError> {
        let org = self.client_organization()?;
        let peer_name = org.peers.first().ok_or_else(|| ProfileError::NoPeers {
            org: self.client.organization.clone(),
        })?;
        let peer = self
            .peers
            .get(peer_name)
            .ok_or_else(|| ProfileError::UnknownPeer(peer_name.clone()))?;

        let (tls, address) = parse_url(&peer.url)?;
        let tls_root = peer.tls_ca_certs.as_ref().map(|certs| certs.pem.clone());
        if tls && tls_root.is_none() {
            return Err(ProfileError::MissingTlsRoot {
                peer: peer_name.clone(),
            });
        }

        Ok(GatewayEndpoint {
            peer: peer_name.clone(),
            address,
            tls,
            tls_root,
        })
    }

    /// Endorsing peers listed for a channel, used when discovery is off.
    pub fn static_topology(&self, channel: &str) -> Result<Option<ChannelTopology>, ProfileError> {
        let Some(config) = self.channels.get(channel) else {
            return Ok(None);
        };

        let mut names: Vec<&String> = config
            .peers
            .iter()
            .filter(|(_, p)| p.endorsing_peer)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        let mut peers = Vec::with_capacity(names.len());
        for name in names {
            let peer = self
                .peers
                .get(name)
                .ok_or_else(|| ProfileError::UnknownPeer(name.clone()))?;
            let (_, address) = parse_url(&peer.url)?;
            let msp_id = self
                .msp_of_peer(name)
                .ok_or_else(|| ProfileError::UnknownPeer(name.clone()))?;
            peers.push(PeerEndpoint {
                name: name.clone(),
                address,
                msp_id: msp_id.to_string(),
            });
        }

        Ok(Some(ChannelTopology {
            channel: channel.to_string(),
            peers,
            policies: HashMap::new(),
        }))
    }

    fn msp_of_peer(&self, peer: &str) -> Option<&str> {
        self.organizations
            .values()
            .find(|org| org.peers.iter().any(|p| p == peer))
            .map(|org| org.mspid.as_str())
    }
}

/// Splits `grpc[s]://host:port` into (tls, "host:port").
pub fn parse_url(url: &str) -> Result<(bool, String), ProfileError> {
    let invalid = || ProfileError::InvalidUrl {
        url: url.to_string(),
    };
    let (tls, rest) = if let Some(rest) = url.strip_prefix("grpcs://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("grpc://") {
        (false, rest)
    } else {
        return Err(invalid());
    };

    let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok((tls, rest.to_string()))
}

/// Rewrites the host part of `host:port` to `localhost`.
pub fn as_localhost(address: &str) -> String {
    match address.rsplit_once(':') {
        Some((_, port)) => format!("localhost:{}", port),
        None => "localhost".to_string(),
    }
}
