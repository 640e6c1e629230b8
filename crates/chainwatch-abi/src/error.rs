//! Error types for interface parsing, call encoding and log decoding.

use thiserror::Error;

/// Errors raised while building or querying an [`Interface`](crate::Interface).
#[derive(Debug, Error)]
pub enum AbiError {
    /// The descriptor is not usable: bad JSON, unknown type tag, more than
    /// three indexed parameters, or a duplicate event.
    #[error("malformed interface: {0}")]
    MalformedSpec(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A call argument does not fit its declared parameter type.
    #[error("cannot encode {param}: {reason}")]
    Encode { param: String, reason: String },
}

/// A matched log (or call output) whose payload does not fit its declaration.
///
/// `event` names the event or function being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode {event}.{param}: {reason}")]
pub struct DecodeError {
    pub event: String,
    pub param: String,
    pub reason: String,
}

impl DecodeError {
    pub(crate) fn new(event: &str, param: &str, reason: impl Into<String>) -> Self {
        Self {
            event: event.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}
