//! The gateway→plugin callback bundle: a small fixed set of functions the
//! plugin invokes to push a JSON event toward an endpoint, or relay
//! RTP/RTCP.

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::core::GatewayCore;
use crate::error::PluginError;
use crate::event::Event;
use crate::handle::HandleState;
use crate::plugin::PluginToken;
use crate::sdp::Jsep;

/// Provided once to each plugin at `init`. Cloning is cheap (an `Arc` and
/// an owned package string) so plugins may hand copies to their own worker
/// threads.
#[derive(Clone)]
pub struct GatewayCallbacks {
    package: String,
    core: Arc<GatewayCore>,
}

impl GatewayCallbacks {
    pub fn new(package: String, core: Arc<GatewayCore>) -> Self {
        Self { package, core }
    }

    /// Validates `message`, wraps it in the `event` envelope (including
    /// JSEP when supplied), and enqueues it on the target session's event
    /// queue. Non-object JSON is rejected and enqueues nothing.
    ///
    /// `message` is always taken by value; the callee never borrows past
    /// this call.
    pub fn push_event(
        &self,
        token: PluginToken,
        transaction: Option<&str>,
        message: JsonValue,
        jsep: Option<Jsep>,
    ) -> Result<(), PluginError> {
        if !message.is_object() {
            return Err(PluginError::InvalidJsonObject);
        }

        let (session_id, handle_id) = match self.core.tokens.resolve(token) {
            Some(target) => target,
            None => return Err(PluginError::Rejected("unknown handle token".to_owned())),
        };

        let session = match self.core.sessions.get(session_id) {
            Ok(session) => session,
            Err(_) => return Err(PluginError::Rejected("session no longer exists".to_owned())),
        };

        let Some(handle) = session.handle(handle_id) else {
            return Err(PluginError::Rejected("handle no longer exists".to_owned()));
        };

        let mut envelope = json!({
            "janus": "event",
            "sender": handle_id.value(),
            "plugindata": {
                "plugin": self.package,
                "data": message,
            },
        });

        if let Some(transaction) = transaction {
            envelope["transaction"] = JsonValue::String(transaction.to_owned());
        }

        // Plugin-originated SDP runs the answer-side negotiation flow: wait
        // for local candidates, anonymize, then merge in the gateway's own
        // ICE/DTLS identity before handing it to the endpoint.
        if let Some(jsep) = jsep {
            let is_offer = jsep.is_offer();

            let merged_sdp = {
                let mut media = handle.media();
                handle
                    .negotiator()
                    .negotiate_plugin_event(&mut media, &jsep)
                    .map_err(|err| PluginError::Rejected(format!("SDP negotiation failed: {}", err)))?
            };

            let outgoing = if is_offer {
                Jsep::Offer { sdp: merged_sdp }
            } else {
                Jsep::Answer { sdp: merged_sdp }
            };

            envelope["jsep"] = serde_json::to_value(outgoing)
                .map_err(|err| PluginError::Rejected(format!("failed to serialize jsep: {}", err)))?;

            handle.set_state(HandleState::MediaReady);
        }

        session.events().push(Event::new(envelope));
        Ok(())
    }

    /// Relays an RTP packet to the endpoint represented by `token`, if that
    /// handle is currently `media-ready`. A handle in any other state drops
    /// incoming RTP/RTCP silently.
    pub fn relay_rtp(&self, token: PluginToken, is_video: bool, buf: &[u8]) {
        self.relay(token, is_video, buf, RelayKind::Rtp);
    }

    pub fn relay_rtcp(&self, token: PluginToken, is_video: bool, buf: &[u8]) {
        self.relay(token, is_video, buf, RelayKind::Rtcp);
    }

    fn relay(&self, token: PluginToken, is_video: bool, buf: &[u8], kind: RelayKind) {
        let Some((session_id, handle_id)) = self.core.tokens.resolve(token) else {
            crate::err!("relay_{:?} for unknown token {}", kind, token);
            return;
        };

        let Ok(session) = self.core.sessions.get(session_id) else {
            return;
        };

        let Some(handle) = session.handle(handle_id) else {
            return;
        };

        if handle.state() != HandleState::MediaReady {
            crate::huge!(
                "Dropping {:?} for handle {} in session {}: not media-ready",
                kind,
                handle_id,
                session_id
            );
            return;
        }

        // This stub gateway has no real RTP transport to forward onto; a
        // production build would hand `buf` to the per-handle UDP socket
        // bound during `setup_media`. Recorded here only to keep the byte
        // count observable to tests.
        crate::huge!(
            "Relayed {} bytes of {:?} ({}) for handle {}",
            buf.len(),
            kind,
            if is_video { "video" } else { "audio" },
            handle_id
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum RelayKind {
    Rtp,
    Rtcp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{Handle, HandleId};
    use crate::plugin::registry::testing::dummy_plugin_entry;

    fn setup() -> (GatewayCallbacks, Arc<GatewayCore>, PluginToken) {
        let core = GatewayCore::stub();
        let session = core.sessions.create();
        let plugin = dummy_plugin_entry();
        let token = PluginToken(42);

        let handle = session
            .handles()
            .insert(|id| Handle::new(id, session.id(), plugin.clone(), token, core.negotiation.build()));

        core.tokens.associate(token, session.id(), handle.id());

        let callbacks = GatewayCallbacks::new("janus.plugin.noop".to_owned(), core.clone());
        (callbacks, core, token)
    }

    #[test]
    fn push_event_rejects_non_object_json() {
        let (callbacks, _core, token) = setup();
        let err = callbacks
            .push_event(token, Some("t1"), json!("not an object"), None)
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidJsonObject));
    }

    #[test]
    fn push_event_enqueues_on_the_right_session() {
        let (callbacks, core, token) = setup();
        let (session_id, _handle_id) = core.tokens.resolve(token).unwrap();

        callbacks
            .push_event(token, Some("t1"), json!({"result": "ok"}), None)
            .unwrap();

        let session = core.sessions.get(session_id).unwrap();
        let event = session.events().try_pop().unwrap();
        assert_eq!(event.payload["janus"], "event");
        assert_eq!(event.payload["transaction"], "t1");
        assert_eq!(event.payload["plugindata"]["data"]["result"], "ok");
    }

    #[test]
    fn relay_drops_packets_when_not_media_ready() {
        let (callbacks, core, token) = setup();
        let (session_id, handle_id) = core.tokens.resolve(token).unwrap();
        let session = core.sessions.get(session_id).unwrap();
        let handle = session.handle(handle_id).unwrap();

        assert_eq!(handle.state(), crate::handle::HandleState::Fresh);
        callbacks.relay_rtp(token, false, &[1, 2, 3]);
        // No observable effect besides a log line; the invariant under test
        // is that this does not panic or require a ready handle.

        handle.set_state(crate::handle::HandleState::MediaReady);
        callbacks.relay_rtp(token, false, &[1, 2, 3]);
    }
}
