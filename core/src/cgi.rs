//! CGI adapter: environment variables and stdin in, status/headers/body out.
//!
//! # Design
//! The adapter never calls `std::env::var` itself. It receives an
//! `Environment` snapshot plus a reader and a writer at construction, so tests
//! drive it with an in-memory map, a byte slice and a `Vec<u8>`.
//! `CgiAdapter::from_process` binds the real process environment, stdin and
//! stdout.
//!
//! Decoding is permissive: an unset `REQUEST_METHOD` becomes `""` and an
//! unset `QUERY_STRING` is parsed as `""`. Stdin is read only up to
//! `CONTENT_LENGTH`; without it the request has no body.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use crate::error::AdapterError;
use crate::invoker::{Adapter, Mode};
use crate::model::{CanonicalRequest, CanonicalResponse, Headers};
use crate::query;

const HTTP_PREFIX: &str = "HTTP_";

/// A snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment. Variables whose name or
    /// value is not valid Unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// `HTTP_ACCEPT_LANGUAGE` → `accept-language`. `None` for variables that are
/// not request headers.
fn header_name(var: &str) -> Option<String> {
    match var {
        "CONTENT_TYPE" => Some("content-type".to_string()),
        "CONTENT_LENGTH" => Some("content-length".to_string()),
        _ => {
            let name = var.strip_prefix(HTTP_PREFIX)?;
            if name.is_empty() {
                return None;
            }
            Some(name.to_ascii_lowercase().replace('_', "-"))
        }
    }
}

/// Adapter for CGI-style invocation.
#[derive(Debug)]
pub struct CgiAdapter<R, W> {
    env: Environment,
    input: R,
    output: W,
}

impl CgiAdapter<io::Stdin, io::Stdout> {
    pub fn from_process() -> Self {
        Self::new(Environment::from_process(), io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> CgiAdapter<R, W> {
    pub fn new(env: Environment, input: R, output: W) -> Self {
        Self { env, input, output }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Give back the output channel, e.g. to inspect what was written.
    pub fn into_output(self) -> W {
        self.output
    }

    fn read_body(&mut self) -> Result<Option<String>, AdapterError> {
        // Servers need not close stdin, so never read past CONTENT_LENGTH.
        // Without a usable length there is no body.
        let length = match self
            .env
            .get("CONTENT_LENGTH")
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            Some(length) if length > 0 => length,
            _ => return Ok(None),
        };

        let mut buf = Vec::new();
        (&mut self.input).take(length).read_to_end(&mut buf)?;
        if buf.is_empty() {
            return Ok(None);
        }
        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| AdapterError::InvalidBody(e.to_string()))
    }
}

impl<R: Read, W: Write> Adapter for CgiAdapter<R, W> {
    type Input = ();
    type Output = ();

    fn mode(&self) -> Mode {
        Mode::Cgi
    }

    fn decode(&mut self, _input: ()) -> Result<CanonicalRequest, AdapterError> {
        let headers: Headers = self
            .env
            .iter()
            .filter_map(|(var, value)| header_name(var).map(|name| (name, value)))
            .collect();

        let body = self.read_body()?;
        let request = CanonicalRequest::builder()
            .method(self.env.get("REQUEST_METHOD").unwrap_or(""))
            .path(self.env.get("PATH_INFO").map(str::to_string))
            .headers(headers)
            .query_params(query::parse(self.env.get("QUERY_STRING").unwrap_or("")))
            .body(body)
            .build();

        tracing::debug!(
            method = request.method(),
            headers = request.headers().len(),
            has_body = request.body().is_some(),
            "decoded CGI request"
        );
        Ok(request)
    }

    fn encode(&mut self, response: CanonicalResponse) -> Result<(), AdapterError> {
        let (status, headers, body) = response.into_parts();

        writeln!(self.output, "Status: {status}")?;
        for (name, values) in headers.iter() {
            for value in values {
                writeln!(self.output, "{name}: {value}")?;
            }
        }
        writeln!(self.output)?;
        self.output.write_all(body.as_bytes())?;
        self.output.flush()?;

        tracing::debug!(status, bytes = body.len(), "wrote CGI response");
        Ok(())
    }
}
