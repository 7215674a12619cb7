//! Dispatch: one handler per path scope matches on the `janus` verb and
//! enforces the dispatch-order checks before touching any session/handle
//! state.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::watch;

use crate::core::GatewayCore;
use crate::error::{GatewayError, GatewayErrorCode};
use crate::handle::{Handle, HandleId, HandleState};
use crate::http::cors::{allow_any_origin, preflight};
use crate::http::envelope::{ack_envelope, parse_post_body, peek_transaction, success_envelope};
use crate::http::longpoll;
use crate::ids::draw_unique_id;
use crate::plugin::{PluginRegistry, PluginToken};
use crate::session::{Session, SessionId, SessionState};

pub fn build_router(
    core: Arc<GatewayCore>,
    registry: Arc<PluginRegistry>,
    base_path: &str,
    shutdown: watch::Receiver<bool>,
) -> Router {
    let base = base_path.trim_end_matches('/').to_owned();
    let session_path = format!("{}/:session", base);
    let handle_path = format!("{}/:session/:handle", base);

    Router::new()
        .route(&base, post(dispatch_root).options(preflight))
        .route(&session_path, post(dispatch_session).get(longpoll::poll).options(preflight))
        .route(&handle_path, post(dispatch_handle).get(redirect_to_session).options(preflight))
        .fallback(not_found)
        .layer(axum::middleware::from_fn(allow_any_origin))
        .layer(axum::middleware::from_fn(enforce_allowed_methods))
        .layer(Extension(core))
        .layer(Extension(registry))
        .layer(Extension(shutdown))
        .layer(Extension(Arc::<str>::from(base)))
}

/// Any method outside GET/POST/OPTIONS is rejected before routing even
/// looks at the path.
async fn enforce_allowed_methods<B>(request: Request<B>, next: Next<B>) -> Response {
    if matches!(*request.method(), Method::GET | Method::POST | Method::OPTIONS) {
        next.run(request).await
    } else {
        StatusCode::NOT_IMPLEMENTED.into_response()
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn error_response(transaction: Option<&str>, err: GatewayError) -> Response {
    Json(err.to_envelope(transaction)).into_response()
}

/// `POST <base>`: only `create` is valid at this scope.
async fn dispatch_root(Extension(core): Extension<Arc<GatewayCore>>, body: Bytes) -> Response {
    let post = match parse_post_body(&body) {
        Ok(post) => post,
        Err(err) => return error_response(peek_transaction(&body).as_deref(), err),
    };

    if post.janus != "create" {
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::InvalidRequestPath));
    }

    let session = core.sessions.create();
    Json(success_envelope(&post.transaction, Some(json!({ "id": session.id().value() })))).into_response()
}

/// `POST <base>/:session`: `attach` or `destroy`.
async fn dispatch_session(
    Path(session_id): Path<u64>,
    Extension(core): Extension<Arc<GatewayCore>>,
    Extension(registry): Extension<Arc<PluginRegistry>>,
    body: Bytes,
) -> Response {
    let post = match parse_post_body(&body) {
        Ok(post) => post,
        Err(err) => return error_response(peek_transaction(&body).as_deref(), err),
    };

    let session = match core.sessions.get(SessionId::new(session_id)) {
        Ok(session) => session,
        Err(err) => return error_response(Some(&post.transaction), err),
    };
    session.touch();

    match post.janus.as_str() {
        "attach" => attach(&core, &registry, &session, post),
        "destroy" => destroy(&core, &session, &post.transaction),
        _ => error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::InvalidRequestPath)),
    }
}

fn attach(
    core: &Arc<GatewayCore>,
    registry: &Arc<PluginRegistry>,
    session: &Arc<Session>,
    post: crate::http::envelope::PostBody,
) -> Response {
    if session.state() == SessionState::Destroying {
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::SessionNotFound));
    }

    let Some(package) = post.plugin else {
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::MissingMandatoryElement));
    };

    let Some(plugin) = registry.get(&package) else {
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::PluginNotFound));
    };

    let token = PluginToken(draw_unique_id(|_| false));
    let negotiator = core.negotiation.build();

    let handle = session
        .handles()
        .insert(|id| Handle::new(id, session.id(), plugin.clone(), token, negotiator));

    core.tokens.associate(token, session.id(), handle.id());

    if let Err(err) = plugin.vtable().create_session(token) {
        crate::err!("Plugin {} rejected create_session: {}", package, err);
        session.handles().remove(handle.id());
        core.tokens.remove_token(token);
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::PluginAttach));
    }

    handle.set_state(HandleState::Attached);
    Json(success_envelope(&post.transaction, Some(json!({ "id": handle.id().value() })))).into_response()
}

fn destroy(core: &Arc<GatewayCore>, session: &Arc<Session>, transaction: &str) -> Response {
    session.mark_destroying();

    for handle in session.handles().drain() {
        if let Err(err) = handle.plugin().vtable().destroy_session(handle.plugin_token()) {
            crate::err!("Plugin destroy_session failed for handle {}: {}", handle.id(), err);
        }
        core.tokens.remove_token(handle.plugin_token());
    }

    core.sessions.remove(session.id());
    Json(success_envelope(transaction, None)).into_response()
}

/// `POST <base>/:session/:handle`: `detach` or `message`.
async fn dispatch_handle(
    Path((session_id, handle_id)): Path<(u64, u64)>,
    Extension(core): Extension<Arc<GatewayCore>>,
    body: Bytes,
) -> Response {
    let post = match parse_post_body(&body) {
        Ok(post) => post,
        Err(err) => return error_response(peek_transaction(&body).as_deref(), err),
    };

    let session = match core.sessions.get(SessionId::new(session_id)) {
        Ok(session) => session,
        Err(err) => return error_response(Some(&post.transaction), err),
    };
    session.touch();

    let Some(handle) = session.handle(HandleId::new(handle_id)) else {
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::HandleNotFound));
    };

    match post.janus.as_str() {
        "detach" => detach(&core, &session, &handle, &post.transaction),
        "message" => message(&handle, post),
        _ => error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::InvalidRequestPath)),
    }
}

fn detach(core: &Arc<GatewayCore>, session: &Arc<Session>, handle: &Arc<Handle>, transaction: &str) -> Response {
    if let Err(err) = handle.plugin().vtable().destroy_session(handle.plugin_token()) {
        crate::err!("Plugin destroy_session failed for handle {}: {}", handle.id(), err);
    }

    session.handles().remove(handle.id());
    core.tokens.remove_token(handle.plugin_token());
    handle.set_state(HandleState::Closed);

    Json(success_envelope(transaction, None)).into_response()
}

fn message(handle: &Arc<Handle>, post: crate::http::envelope::PostBody) -> Response {
    crate::verb!("handle {} dispatching message, transaction {}", handle.id(), post.transaction);

    let Some(body) = post.body else {
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::MissingMandatoryElement));
    };

    let outgoing_jsep = match post.jsep {
        Some(jsep) => {
            let is_offer = jsep.is_offer();
            let mut media = handle.media();
            match handle.negotiator().negotiate_offer_answer(&mut media, &jsep) {
                Ok(stripped_sdp) => {
                    if handle.state() == HandleState::Attached {
                        handle.set_state(HandleState::Negotiating);
                    }

                    Some(if is_offer {
                        crate::sdp::Jsep::Offer { sdp: stripped_sdp }
                    } else {
                        crate::sdp::Jsep::Answer { sdp: stripped_sdp }
                    })
                }
                Err(err) => return error_response(Some(&post.transaction), err),
            }
        }
        None => None,
    };

    if let Err(err) = handle
        .plugin()
        .vtable()
        .handle_message(handle.plugin_token(), post.transaction.clone(), body, outgoing_jsep)
    {
        crate::err!("Plugin handle_message failed for handle {}: {}", handle.id(), err);
        return error_response(Some(&post.transaction), GatewayError::new(GatewayErrorCode::PluginMessage));
    }

    // The real result, if any, arrives later as a `push_event` bearing the
    // same transaction: the ack only confirms the plugin accepted the
    // message, not that it has finished processing it.
    Json(ack_envelope(&post.transaction)).into_response()
}

/// `axum::response::Redirect::to` issues a 303 See Other; a GET on a handle
/// URL must redirect with exactly 302 Found, so the response is built
/// directly instead.
async fn redirect_to_session(
    Path((session_id, _handle_id)): Path<(u64, u64)>,
    Extension(base_path): Extension<Arc<str>>,
) -> Response {
    let location = format!("{}/{}", base_path, session_id);

    Response::builder()
        .status(StatusCode::FOUND)
        .header(axum::http::header::LOCATION, location)
        .body(axum::body::Body::empty())
        .map(|response| response.map(axum::body::boxed))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
