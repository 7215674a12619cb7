//! GET long-poll responder: pops the session's event queue; if empty, waits
//! up to 30 seconds for either a push or a shutdown signal before falling
//! back to a keep-alive. Implemented with `tokio::sync::Notify`/`watch`
//! rather than a sleep-poll loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Path};
use axum::response::IntoResponse;
use axum::Json;
use tokio::sync::watch;

use crate::core::GatewayCore;
use crate::error::GatewayError;
use crate::event::Event;
use crate::session::SessionId;

const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn poll(
    Path(session_id): Path<u64>,
    Extension(core): Extension<Arc<GatewayCore>>,
    Extension(mut shutdown): Extension<watch::Receiver<bool>>,
) -> impl IntoResponse {
    let session = match core.sessions.get(SessionId::new(session_id)) {
        Ok(session) => session,
        Err(err) => return into_error_response(err),
    };
    session.touch();

    if let Some(event) = session.events().try_pop() {
        return Json(event.payload).into_response();
    }

    tokio::select! {
        _ = tokio::time::sleep(LONG_POLL_TIMEOUT) => {
            Json(Event::keepalive().payload).into_response()
        }
        _ = session.events().notified() => {
            let event = session.events().try_pop().unwrap_or_else(Event::keepalive);
            Json(event.payload).into_response()
        }
        _ = shutdown.changed() => {
            Json(Event::keepalive().payload).into_response()
        }
    }
}

fn into_error_response(err: GatewayError) -> axum::response::Response {
    Json(err.to_envelope(None)).into_response()
}
