//! The HTTP/JSON surface: an `axum::Router` serving
//! both the create/attach/detach/destroy/message dispatch and the
//! long-poll event responder.

pub mod cors;
pub mod envelope;
pub mod longpoll;
pub mod router;

pub use router::build_router;
