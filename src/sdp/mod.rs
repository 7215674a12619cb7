//! SDP negotiation coordinator: drives pre-parse, local ICE setup, and
//! merge/anonymize between endpoint messages, plugin responses, and the ICE
//! agent.

pub mod collaborators;
pub mod stub;

pub use collaborators::{DtlsContext, IceAgent, MLineCounts, RtcpHelpers, SdpTransform, StreamId};

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayErrorCode};

/// The offer/answer SDP wrapper exchanged through the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum Jsep {
    Offer { sdp: String },
    Answer { sdp: String },
}

impl Jsep {
    pub fn sdp(&self) -> &str {
        match self {
            Jsep::Offer { sdp } | Jsep::Answer { sdp } => sdp,
        }
    }

    pub fn is_offer(&self) -> bool {
        matches!(self, Jsep::Offer { .. })
    }
}

/// Per-handle media pipeline state, owned by the ICE/DTLS subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaContext {
    pub audio_active: bool,
    pub video_active: bool,
    pub local_ice_ready: bool,
}

/// How long the plugin-originated flow will wait for the ICE agent to
/// signal "candidates done" before giving up.
const CANDIDATES_DONE_TIMEOUT: Duration = Duration::from_secs(10);
const CANDIDATES_DONE_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Negotiator {
    ice: Arc<dyn IceAgent>,
    sdp: Arc<dyn SdpTransform>,
}

impl Negotiator {
    pub fn new(ice: Arc<dyn IceAgent>, sdp: Arc<dyn SdpTransform>) -> Self {
        Self { ice, sdp }
    }

    /// Runs the offer/answer dance for an endpoint-originated `message`
    /// carrying a `jsep`. Returns the anonymized SDP to hand to
    /// `plugin.handle_message`.
    pub fn negotiate_offer_answer(&self, media: &mut MediaContext, jsep: &Jsep) -> Result<String, GatewayError> {
        let counts = self
            .sdp
            .preparse(jsep.sdp())
            .map_err(|_| GatewayError::new(GatewayErrorCode::JsepInvalidSdp))?;

        if jsep.is_offer() {
            self.ice
                .setup_local(true, counts.audio > 0, counts.video > 0)
                .map_err(|_| GatewayError::new(GatewayErrorCode::JsepInvalidSdp))?;
            media.local_ice_ready = true;
        }

        self.sdp
            .parse(jsep.sdp())
            .map_err(|_| GatewayError::new(GatewayErrorCode::JsepInvalidSdp))?;

        if !jsep.is_offer() {
            for stream in 0..self.ice.streams_num() as u32 {
                for component in 1..=2u8 {
                    self.ice
                        .setup_remote_candidate(StreamId(stream), component)
                        .map_err(|_| GatewayError::new(GatewayErrorCode::JsepInvalidSdp))?;
                }
            }
        }

        media.audio_active = counts.audio > 0;
        media.video_active = counts.video > 0;

        self.sdp
            .anonymize(jsep.sdp())
            .map_err(|_| GatewayError::new(GatewayErrorCode::JsepInvalidSdp))
    }

    /// Runs the plugin-originated flow, for a `push_event` call carrying
    /// SDP. Returns the merged SDP to send to the endpoint as `jsep.sdp`.
    pub fn negotiate_plugin_event(&self, media: &mut MediaContext, jsep: &Jsep) -> Result<String> {
        if jsep.is_offer() && !media.local_ice_ready {
            self.ice.setup_local(false, true, true)?;
            media.local_ice_ready = true;
        }

        self.wait_for_candidates_done()?;

        let stripped = self.sdp.anonymize(jsep.sdp())?;
        let merged = self.sdp.merge(&stripped)?;

        if !jsep.is_offer() {
            for stream in 0..self.ice.streams_num() as u32 {
                for component in 1..=2u8 {
                    self.ice.setup_remote_candidate(StreamId(stream), component)?;
                }
            }
        }

        Ok(merged)
    }

    fn wait_for_candidates_done(&self) -> Result<()> {
        let deadline = Instant::now() + CANDIDATES_DONE_TIMEOUT;

        loop {
            if self.ice.failed() {
                bail!("ICE agent reported failure while gathering candidates");
            }

            if self.ice.candidates_done() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                bail!("timed out waiting for ICE candidates-done");
            }

            std::thread::sleep(CANDIDATES_DONE_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::stub::{StubIceAgent, StubSdpTransform};

    fn negotiator() -> Negotiator {
        Negotiator::new(Arc::new(StubIceAgent::default()), Arc::new(StubSdpTransform))
    }

    #[test]
    fn offer_sets_up_local_ice_and_anonymizes() {
        let negotiator = negotiator();
        let mut media = MediaContext::default();
        let jsep = Jsep::Offer {
            sdp: "v=0\r\na=ice-ufrag:abcd\r\nm=audio 1 RTP/AVP 0\r\n".to_owned(),
        };

        let anonymized = negotiator.negotiate_offer_answer(&mut media, &jsep).unwrap();
        assert!(!anonymized.contains("ice-ufrag"));
        assert!(media.local_ice_ready);
        assert!(media.audio_active);
    }

    #[test]
    fn plugin_event_merges_gateway_identity() {
        let negotiator = negotiator();
        let mut media = MediaContext::default();
        let jsep = Jsep::Offer {
            sdp: "v=0\r\nm=audio 1 RTP/AVP 0\r\n".to_owned(),
        };

        let merged = negotiator.negotiate_plugin_event(&mut media, &jsep).unwrap();
        assert!(merged.contains("a=ice-ufrag:gw"));
    }
}
