//! Error types for the invocation boundary.
//!
//! # Design
//! Only two things are fatal at the boundary: an event that lacks a required
//! field and I/O on the host channels. Missing environment variables, query
//! parameters and headers are soft defaults and never show up here.
//! Handler failures are carried through `InvokeError::Handler` as the exact
//! value the handler returned.

use thiserror::Error;

/// Errors raised by an adapter while decoding a request or encoding a
/// response.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A required event field is missing or the event is not valid JSON.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The request body could not be turned into a UTF-8 string.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Reading the input channel or writing the output channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The response envelope could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl AdapterError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }
}

/// Outcome of a failed invocation, tagged with the stage that failed.
///
/// `E` is the user handler's own error type; it is never wrapped, converted
/// or retried.
#[derive(Debug, Error)]
pub enum InvokeError<E> {
    #[error("decode failed: {0}")]
    Decode(#[source] AdapterError),

    #[error("handler failed")]
    Handler(E),

    #[error("encode failed: {0}")]
    Encode(#[source] AdapterError),
}

impl<E> InvokeError<E> {
    /// The handler's error, if the handler is what failed.
    pub fn into_handler_error(self) -> Option<E> {
        match self {
            InvokeError::Handler(err) => Some(err),
            _ => None,
        }
    }

    /// The adapter error, if decode or encode is what failed.
    pub fn adapter_error(&self) -> Option<&AdapterError> {
        match self {
            InvokeError::Decode(err) | InvokeError::Encode(err) => Some(err),
            InvokeError::Handler(_) => None,
        }
    }
}
