//! A loopback reference plugin, in the spirit of Janus's own echo/videocall
//! reference plugins: it accepts any `message` body and pushes it straight
//! back as the `result` of an `event`, negotiating SDP symmetrically when a
//! `jsep` is present. Exists so the crate's own integration tests have
//! something real to attach to without a production media plugin.

use std::path::Path;
use std::sync::Mutex;

use serde_json::json;

use crate::error::PluginError;
use crate::plugin::{GatewayCallbacks, JanusPlugin, PluginToken};
use crate::sdp::Jsep;

pub struct EchoTestPlugin {
    callbacks: Mutex<Option<GatewayCallbacks>>,
}

impl Default for EchoTestPlugin {
    fn default() -> Self {
        Self {
            callbacks: Mutex::new(None),
        }
    }
}

impl JanusPlugin for EchoTestPlugin {
    fn init(&self, callbacks: GatewayCallbacks, _config_dir: &Path) -> Result<(), PluginError> {
        *self.callbacks.lock().expect("echotest callbacks mutex poisoned") = Some(callbacks);
        Ok(())
    }

    fn destroy(&self) {}

    fn get_version(&self) -> i32 {
        1
    }

    fn get_version_string(&self) -> &str {
        "0.1.0"
    }

    fn get_description(&self) -> &str {
        "Loopback reference plugin for integration testing"
    }

    fn get_name(&self) -> &str {
        "Echo Test"
    }

    fn get_package(&self) -> &str {
        "janus.plugin.echotest"
    }

    fn create_session(&self, _token: PluginToken) -> Result<(), PluginError> {
        Ok(())
    }

    fn handle_message(
        &self,
        token: PluginToken,
        transaction: String,
        body: serde_json::Value,
        jsep: Option<Jsep>,
    ) -> Result<(), PluginError> {
        let callbacks = self.callbacks.lock().expect("echotest callbacks mutex poisoned");
        let Some(callbacks) = callbacks.as_ref() else {
            return Err(PluginError::Rejected("plugin not initialized".to_owned()));
        };

        let result = json!({ "echotest": "event", "result": "ok", "echo": body });

        callbacks
            .push_event(token, Some(&transaction), result, jsep)
            .map_err(|err| PluginError::Rejected(format!("push_event failed: {}", err)))
    }

    fn setup_media(&self, _token: PluginToken) {}
    fn incoming_rtp(&self, token: PluginToken, is_video: bool, buf: &[u8]) {
        if let Some(callbacks) = self.callbacks.lock().expect("echotest callbacks mutex poisoned").as_ref() {
            callbacks.relay_rtp(token, is_video, buf);
        }
    }

    fn incoming_rtcp(&self, token: PluginToken, is_video: bool, buf: &[u8]) {
        if let Some(callbacks) = self.callbacks.lock().expect("echotest callbacks mutex poisoned").as_ref() {
            callbacks.relay_rtcp(token, is_video, buf);
        }
    }

    fn hangup_media(&self, _token: PluginToken) {}

    fn destroy_session(&self, _token: PluginToken) -> Result<(), PluginError> {
        Ok(())
    }
}
