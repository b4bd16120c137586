//! Runs one decode → handle → encode cycle.
//!
//! # Design
//! `Adapter` is the seam between a hosting runtime and the canonical model.
//! The invoker owns no data of its own: it calls the handler exactly once,
//! hands its error back untouched, and never retries or times out. Hosts that
//! need a deadline wrap `invoke_async` in their own timeout.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::cgi::Environment;
use crate::error::{AdapterError, InvokeError};
use crate::model::{CanonicalRequest, CanonicalResponse};

/// Environment variable that selects the invocation model.
pub const MODE_VAR: &str = "WGI_MODE";

/// Translates between a runtime's native invocation shape and the canonical
/// model.
pub trait Adapter {
    /// What the runtime hands over for one invocation.
    type Input;
    /// What the runtime expects back.
    type Output;

    fn mode(&self) -> Mode;

    fn decode(&mut self, input: Self::Input) -> Result<CanonicalRequest, AdapterError>;

    fn encode(&mut self, response: CanonicalResponse) -> Result<Self::Output, AdapterError>;
}

/// The invocation model a process is embedded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Cgi,
    Event,
}

impl Mode {
    /// `WGI_MODE=lambda` (or `event`) selects the event model; anything else,
    /// including an unset variable, is CGI.
    pub fn from_env(env: &Environment) -> Self {
        env.get(MODE_VAR)
            .and_then(|value| value.parse().ok())
            .unwrap_or(Mode::Cgi)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Cgi => write!(f, "cgi"),
            Mode::Event => write!(f, "event"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown invocation mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cgi" => Ok(Mode::Cgi),
            "event" | "lambda" => Ok(Mode::Event),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

fn invocation_span(mode: Mode) -> tracing::Span {
    let invocation_id = Uuid::new_v4();
    tracing::info_span!("invocation", %invocation_id, %mode)
}

/// Decode `input`, run `handler` once, encode its response.
pub fn invoke<A, H, E>(
    adapter: &mut A,
    input: A::Input,
    handler: H,
) -> Result<A::Output, InvokeError<E>>
where
    A: Adapter,
    H: FnOnce(CanonicalRequest) -> Result<CanonicalResponse, E>,
{
    let span = invocation_span(adapter.mode());
    let _guard = span.enter();

    let request = adapter.decode(input).map_err(InvokeError::Decode)?;
    tracing::debug!(method = request.method(), "request decoded");

    let response = handler(request).map_err(|err| {
        tracing::warn!("handler returned an error");
        InvokeError::Handler(err)
    })?;
    tracing::debug!(status = response.status_code(), "handler returned");

    adapter.encode(response).map_err(InvokeError::Encode)
}

/// Same contract as [`invoke`] for a handler that may suspend.
pub async fn invoke_async<A, H, Fut, E>(
    adapter: &mut A,
    input: A::Input,
    handler: H,
) -> Result<A::Output, InvokeError<E>>
where
    A: Adapter,
    H: FnOnce(CanonicalRequest) -> Fut,
    Fut: Future<Output = Result<CanonicalResponse, E>>,
{
    let span = invocation_span(adapter.mode());
    async move {
        let request = adapter.decode(input).map_err(InvokeError::Decode)?;
        tracing::debug!(method = request.method(), "request decoded");

        let response = handler(request).await.map_err(|err| {
            tracing::warn!("handler returned an error");
            InvokeError::Handler(err)
        })?;
        tracing::debug!(status = response.status_code(), "handler returned");

        adapter.encode(response).map_err(InvokeError::Encode)
    }
    .instrument(span)
    .await
}
