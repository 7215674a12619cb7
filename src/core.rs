//! The shared, lock-protected state every HTTP handler and plugin callback
//! resolves handles through. Kept as an explicit value rather than a global
//! singleton, passed into handlers and plugin callbacks alike, so tests can
//! stand up multiple independent gateways in one process.

use std::sync::{Arc, Mutex};

use crate::bidirectional_multimap::BidirectionalMultimap;
use crate::handle::HandleId;
use crate::plugin::PluginToken;
use crate::sdp::{DtlsContext, IceAgent, Negotiator, SdpTransform};
use crate::session::SessionId;

/// Reverse lookup from a plugin-side handle token back to the gateway
/// handle it represents.
#[derive(Default)]
pub struct TokenIndex {
    map: Mutex<BidirectionalMultimap<(SessionId, HandleId), PluginToken>>,
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn associate(&self, token: PluginToken, session_id: SessionId, handle_id: HandleId) {
        self.map
            .lock()
            .expect("token index mutex poisoned")
            .associate((session_id, handle_id), token);
    }

    pub fn resolve(&self, token: PluginToken) -> Option<(SessionId, HandleId)> {
        self.map
            .lock()
            .expect("token index mutex poisoned")
            .get_key(&token)
            .copied()
    }

    pub fn remove_token(&self, token: PluginToken) {
        self.map.lock().expect("token index mutex poisoned").remove_value(&token);
    }
}

use crate::session::SessionTable;

/// Builds a fresh `Negotiator` per handle: the SDP transform is stateless
/// and shared, but each handle's ICE agent carries its own
/// candidate-gathering state, so a new one is drawn from `ice_factory` at
/// attach time.
#[derive(Clone)]
pub struct NegotiationFactory {
    sdp: Arc<dyn SdpTransform>,
    ice_factory: Arc<dyn Fn() -> Arc<dyn IceAgent> + Send + Sync>,
    dtls: Arc<dyn DtlsContext>,
}

impl NegotiationFactory {
    pub fn new(
        sdp: Arc<dyn SdpTransform>,
        ice_factory: Arc<dyn Fn() -> Arc<dyn IceAgent> + Send + Sync>,
        dtls: Arc<dyn DtlsContext>,
    ) -> Self {
        Self { sdp, ice_factory, dtls }
    }

    pub fn build(&self) -> Negotiator {
        Negotiator::new((self.ice_factory)(), self.sdp.clone())
    }

    /// Resolves the STUN server and RTP port range once at startup, against
    /// a throwaway agent drawn from the same factory every handle uses. A
    /// failure here (an unresolvable STUN server, an unusable RTP range) is
    /// fatal: the process must not start serving with a broken ICE stack.
    pub fn init_ice(&self, stun_host: &str, stun_port: u16, rtp_min: u16, rtp_max: u16) -> anyhow::Result<()> {
        (self.ice_factory)().init(stun_host, stun_port, rtp_min, rtp_max)
    }

    /// Loads the certificate pair DTLS-SRTP uses to secure media, once at
    /// startup. The same pair doubles as the HTTPS identity when the HTTPS
    /// listener is enabled, but DTLS is initialized independently of it.
    pub fn init_dtls(&self, cert_pem_path: &str, cert_key_path: &str) -> anyhow::Result<()> {
        self.dtls.init(cert_pem_path, cert_key_path)
    }

    /// A factory wired to the in-memory stub collaborators, so the crate is
    /// self-contained for testing without a real ICE/DTLS/SDP stack.
    pub fn stub() -> Self {
        use crate::sdp::stub::{StubDtlsContext, StubIceAgent, StubSdpTransform};

        Self::new(
            Arc::new(StubSdpTransform),
            Arc::new(|| Arc::new(StubIceAgent::default()) as Arc<dyn IceAgent>),
            Arc::new(StubDtlsContext),
        )
    }
}

/// The core gateway tables, shared by the HTTP router and every plugin's
/// `GatewayCallbacks`.
pub struct GatewayCore {
    pub sessions: SessionTable,
    pub tokens: TokenIndex,
    pub negotiation: NegotiationFactory,
}

impl GatewayCore {
    pub fn new(negotiation: NegotiationFactory) -> Arc<Self> {
        Arc::new(Self {
            sessions: SessionTable::new(),
            tokens: TokenIndex::new(),
            negotiation,
        })
    }

    #[cfg(test)]
    pub fn stub() -> Arc<Self> {
        Self::new(NegotiationFactory::stub())
    }
}
