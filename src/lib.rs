//! Signaling and media-relay gateway control plane: session/handle object
//! graph, a JSON request router over long-poll HTTP(S), a
//! dynamically-loaded plugin registry, and the SDP negotiation coordinator.

pub mod bidirectional_multimap;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod handle;
pub mod http;
pub mod ids;
pub mod logging;
pub mod plugin;
pub mod sdp;
pub mod session;
pub mod supervisor;
pub mod tls;
