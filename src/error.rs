//! Stable protocol-level error taxonomy plus the internal `anyhow`-based
//! error type used everywhere else in the crate.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// Numeric codes are kept stable across releases so clients can match on
/// them without parsing the reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum GatewayErrorCode {
    Unknown = 490,
    UsePost = 436,
    MissingRequest = 452,
    InvalidJson = 454,
    InvalidJsonObject = 455,
    MissingMandatoryElement = 456,
    InvalidRequestPath = 457,
    SessionNotFound = 458,
    HandleNotFound = 459,
    PluginNotFound = 460,
    PluginAttach = 461,
    PluginMessage = 462,
    PluginDetach = 463,
    JsepUnknownType = 464,
    JsepInvalidSdp = 465,
    UnknownRequest = 453,
}

impl GatewayErrorCode {
    pub fn reason(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown error",
            Self::UsePost => "Use POST for this request",
            Self::MissingRequest => "Missing request",
            Self::InvalidJson => "Invalid JSON",
            Self::InvalidJsonObject => "Invalid JSON object",
            Self::MissingMandatoryElement => "Missing mandatory element",
            Self::InvalidRequestPath => "Unhandled request at this path",
            Self::SessionNotFound => "No such session",
            Self::HandleNotFound => "No such handle in this session",
            Self::PluginNotFound => "No such plugin",
            Self::PluginAttach => "Error attaching to plugin",
            Self::PluginMessage => "Error sending message to plugin",
            Self::PluginDetach => "Error detaching from plugin",
            Self::JsepUnknownType => "Unknown JSEP type",
            Self::JsepInvalidSdp => "Invalid SDP",
            Self::UnknownRequest => "Unknown request",
        }
    }
}

/// A protocol-level error, surfaced to the endpoint as `{"janus":"error",...}`.
#[derive(Debug, Clone)]
pub struct GatewayError {
    code: GatewayErrorCode,
    reason: String,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode) -> Self {
        Self {
            reason: code.reason().to_owned(),
            code,
        }
    }

    pub fn with_reason(code: GatewayErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> GatewayErrorCode {
        self.code
    }

    /// Renders the `{"janus":"error",...}` response envelope.
    pub fn to_envelope(&self, transaction: Option<&str>) -> JsonValue {
        let mut envelope = json!({
            "janus": "error",
            "error": {
                "code": self.code as i32,
                "reason": self.reason,
            },
        });

        if let Some(transaction) = transaction {
            envelope["transaction"] = JsonValue::String(transaction.to_owned());
        }

        envelope
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.reason)
    }
}

impl std::error::Error for GatewayError {}

/// Errors a `JanusPlugin` implementation can report back to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("invalid JSON object")]
    InvalidJsonObject,
    #[error("plugin rejected the operation: {0}")]
    Rejected(String),
}
