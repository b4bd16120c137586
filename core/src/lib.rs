//! Invocation boundary shared by CGI and event/context runtimes.
//!
//! # Overview
//! A handler is written once against `CanonicalRequest` and
//! `CanonicalResponse`. Each runtime gets an `Adapter` that decodes its native
//! input into the canonical request and encodes the handler's response into
//! whatever the runtime expects back. `invoke` ties the three steps together.
//!
//! # Design
//! - `CgiAdapter` reads an injected `Environment` snapshot and input stream,
//!   and writes `Status:`/header lines/blank line/body to an output stream.
//! - `EventAdapter` decodes a typed `Event` and returns an `EventResponse`
//!   envelope. `httpMethod` is the only required field.
//! - `query::parse` is decode-only and keeps raw token text.
//! - Nothing here retries, times out or catches handler errors.

pub mod cgi;
pub mod error;
pub mod event;
pub mod invoker;
pub mod model;
pub mod query;

pub use cgi::{CgiAdapter, Environment};
pub use error::{AdapterError, InvokeError};
pub use event::{Event, EventAdapter, EventResponse};
pub use invoker::{invoke, invoke_async, Adapter, Mode};
pub use model::{CanonicalRequest, CanonicalResponse, Headers, QueryParams, ResponseHeaders};
