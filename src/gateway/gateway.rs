use super::network::Network;
use super::options::ConnectionOptions;
use super::profile::{ConnectionProfile, GatewayEndpoint};
use super::transport::{ChannelTopology, HandshakeRequest, LedgerTransport, SessionId};
use crate::error::GatewayError;
use crate::wallet::{self, Identity};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

const TOPOLOGY_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(16).unwrap();

/// One authenticated connection to a gateway peer. Released exactly once,
/// either through `Gateway::disconnect` or on drop.
pub struct Session {
    id: SessionId,
    identity: Identity,
    endpoint: GatewayEndpoint,
    profile: ConnectionProfile,
    options: ConnectionOptions,
    transport: Arc<dyn LedgerTransport>,
    topologies: Mutex<LruCache<String, ChannelTopology>>,
    connected_at: DateTime<Utc>,
    released: AtomicBool,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn endpoint(&self) -> &GatewayEndpoint {
        &self.endpoint
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub(crate) fn transport(&self) -> &dyn LedgerTransport {
        self.transport.as_ref()
    }

    pub(crate) async fn cached_topology(&self, channel: &str) -> Option<ChannelTopology> {
        self.topologies.lock().await.get(channel).cloned()
    }

    pub(crate) async fn cache_topology(&self, topology: ChannelTopology) {
        self.topologies
            .lock()
            .await
            .put(topology.channel.clone(), topology);
    }

    pub fn is_open(&self) -> bool {
        !self.released.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually released the session.
    fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.transport.release(&self.id);
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.release() {
            warn!("session {} dropped without disconnect, released", self.id);
        }
    }
}

/// Entry point to a ledger network. Holds at most one live session.
pub struct Gateway {
    transport: Arc<dyn LedgerTransport>,
    session: Option<Session>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self {
            transport,
            session: None,
        }
    }

    /// Resolves the identity, then opens a session against the client
    /// organization's gateway peer. No session is kept on failure.
    pub async fn connect(
        &mut self,
        profile: ConnectionProfile,
        options: ConnectionOptions,
    ) -> Result<(), GatewayError> {
        if self.session.is_some() {
            return Err(GatewayError::AlreadyConnected);
        }

        let identity = wallet::resolve(options.wallet.as_ref(), &options.identity).await?;
        let endpoint = profile.gateway_endpoint()?;

        info!(
            "connecting to {} at {} as {} ({})",
            endpoint.peer,
            endpoint.address,
            identity.label(),
            identity.msp_id()
        );

        let request = HandshakeRequest {
            endpoint: endpoint.address.clone(),
            tls: endpoint.tls,
            tls_root: endpoint.tls_root.clone(),
            identity: identity.serialized(),
            signature: identity.sign(endpoint.address.as_bytes()),
        };
        let id = self
            .transport
            .handshake(request)
            .await
            .map_err(|cause| GatewayError::Connection { cause })?;

        debug!("session {} established", id);
        self.session = Some(Session {
            id,
            identity,
            endpoint,
            profile,
            options,
            transport: self.transport.clone(),
            topologies: Mutex::new(LruCache::new(TOPOLOGY_CACHE_SIZE)),
            connected_at: Utc::now(),
            released: AtomicBool::new(false),
        });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&Session, GatewayError> {
        self.session.as_ref().ok_or(GatewayError::NotConnected)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(Session::identity)
    }

    pub async fn get_network(&self, channel: &str) -> Result<Network<'_>, GatewayError> {
        Network::open(self.session()?, channel).await
    }

    /// Idempotent; a no-op when no session was ever opened.
    pub fn disconnect(&mut self) {
        match self.session.take() {
            Some(session) => {
                session.release();
                info!(
                    "session {} disconnected after {}ms",
                    session.id,
                    (Utc::now() - session.connected_at).num_milliseconds()
                );
            }
            None => debug!("disconnect with no live session"),
        }
    }
}
