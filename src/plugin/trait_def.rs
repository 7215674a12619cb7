//! The fourteen-function plugin ABI, represented as a trait object so each
//! loaded module's function table is a dynamic dispatch target rather than
//! a block of raw function pointers.

use std::path::Path;

use serde_json::Value as JsonValue;

use crate::error::PluginError;
use crate::plugin::callbacks::GatewayCallbacks;
use crate::plugin::PluginToken;
use crate::sdp::Jsep;

/// Implemented by every loaded plugin module. A plugin never retains a
/// `PluginToken` past the matching `destroy_session` call.
pub trait JanusPlugin: Send + Sync {
    fn init(&self, callbacks: GatewayCallbacks, config_dir: &Path) -> Result<(), PluginError>;

    fn destroy(&self);

    fn get_version(&self) -> i32;
    fn get_version_string(&self) -> &str;
    fn get_description(&self) -> &str;
    fn get_name(&self) -> &str;
    fn get_package(&self) -> &str;

    fn create_session(&self, token: PluginToken) -> Result<(), PluginError>;

    fn handle_message(
        &self,
        token: PluginToken,
        transaction: String,
        body: JsonValue,
        jsep: Option<Jsep>,
    ) -> Result<(), PluginError>;

    fn setup_media(&self, token: PluginToken);
    fn incoming_rtp(&self, token: PluginToken, is_video: bool, buf: &[u8]);
    fn incoming_rtcp(&self, token: PluginToken, is_video: bool, buf: &[u8]);
    fn hangup_media(&self, token: PluginToken);

    fn destroy_session(&self, token: PluginToken) -> Result<(), PluginError>;
}

/// Signature every dynamically-loaded plugin module must export under the
/// symbol name `janus_plugin_create`.
pub type PluginConstructor = unsafe extern "C" fn() -> *mut dyn JanusPlugin;
