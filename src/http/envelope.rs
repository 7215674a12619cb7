//! JSON envelope shapes and builders for the wire protocol.

use serde_json::{json, Value as JsonValue};

use crate::error::{GatewayError, GatewayErrorCode};
use crate::sdp::Jsep;

/// The parsed shape of a POST body, after the dispatch-order checks in
/// `router.rs` have already confirmed it is a JSON object with a `janus`
/// field. Per-verb mandatory fields (`plugin` on `attach`, `body` on
/// `message`) are checked by the caller, not here, since which fields are
/// mandatory depends on the verb.
pub struct PostBody {
    pub janus: String,
    pub transaction: String,
    pub plugin: Option<String>,
    pub body: Option<JsonValue>,
    pub jsep: Option<Jsep>,
}

/// Parses the raw request body as JSON, then validates the common envelope
/// shape: JSON object, `janus` string, non-empty `transaction` string.
/// Per-verb fields are left to the caller. A body that isn't even valid JSON
/// is `INVALID_JSON` (454), distinct from a well-formed non-object value
/// (`INVALID_JSON_OBJECT`, 455).
pub fn parse_post_body(body: &[u8]) -> Result<PostBody, GatewayError> {
    let value: JsonValue = serde_json::from_slice(body).map_err(|_| GatewayError::new(GatewayErrorCode::InvalidJson))?;
    parse_post_value(&value)
}

fn parse_post_value(value: &JsonValue) -> Result<PostBody, GatewayError> {
    let object = value
        .as_object()
        .ok_or_else(|| GatewayError::new(GatewayErrorCode::InvalidJsonObject))?;

    let janus = object
        .get("janus")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| GatewayError::new(GatewayErrorCode::MissingMandatoryElement))?
        .to_owned();

    let transaction = object
        .get("transaction")
        .and_then(JsonValue::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::new(GatewayErrorCode::MissingMandatoryElement))?
        .to_owned();

    let plugin = object.get("plugin").and_then(JsonValue::as_str).map(str::to_owned);
    let body = object.get("body").cloned();

    let jsep = match object.get("jsep") {
        Some(value) => Some(
            serde_json::from_value(value.clone())
                .map_err(|_| GatewayError::new(GatewayErrorCode::JsepUnknownType))?,
        ),
        None => None,
    };

    Ok(PostBody {
        janus,
        transaction,
        plugin,
        body,
        jsep,
    })
}

/// Best-effort `transaction` extraction for error envelopes produced before
/// `parse_post_body` has fully validated the body: errors still carry
/// `transaction` when one was present. A body that doesn't even parse as
/// JSON has no transaction to recover.
pub fn peek_transaction(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<JsonValue>(body)
        .ok()?
        .get("transaction")
        .and_then(JsonValue::as_str)
        .map(str::to_owned)
}

pub fn success_envelope(transaction: &str, data: Option<JsonValue>) -> JsonValue {
    let mut envelope = json!({
        "janus": "success",
        "transaction": transaction,
    });

    if let Some(data) = data {
        envelope["data"] = data;
    }

    envelope
}

pub fn ack_envelope(transaction: &str) -> JsonValue {
    json!({
        "janus": "ack",
        "transaction": transaction,
    })
}
