pub mod callbacks;
pub mod echotest;
pub mod registry;
pub mod trait_def;

pub use callbacks::GatewayCallbacks;
pub use registry::{PluginEntry, PluginRegistry};
pub use trait_def::JanusPlugin;

use std::fmt;

/// Opaque identifier the plugin assigns to represent a handle on its side.
/// The gateway never interprets its value; it is only used as a lookup key
/// into the reverse handle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginToken(pub u64);

impl fmt::Display for PluginToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
