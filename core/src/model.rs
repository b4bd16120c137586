//! Canonical request/response model shared by every adapter.
//!
//! # Design
//! Handlers are written against `CanonicalRequest` and `CanonicalResponse`
//! only. Adapters build the request fresh for each invocation and consume the
//! response exactly once, so neither type carries interior mutability.
//!
//! Request header names are lower-cased on insert; lookups lower-case the
//! probe instead of scanning. Response header names keep the handler's
//! spelling because hosts echo them back verbatim, but two spellings of the
//! same name always share one entry.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Query parameters keyed by raw token text. `None` marks a key that appeared
/// without `=`, which is not the same as an empty value.
pub type QueryParams = BTreeMap<String, Option<String>>;

// ---------------------------------------------------------------------------
// Request headers
// ---------------------------------------------------------------------------

/// Single-valued request headers with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any value stored under the same name in
    /// any casing.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate `(name, value)` pairs; names are lower case.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// The adapter-agnostic request handed to a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    path: Option<String>,
    headers: Headers,
    query_params: QueryParams,
    body: Option<String>,
}

impl CanonicalRequest {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Upper-case HTTP verb, or `""` when the runtime did not supply one.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent")
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// Value of `key`, or `None` when the key is missing or carries no value.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).and_then(|v| v.as_deref())
    }

    /// Value of `key`, falling back to `default` when it is missing or has no
    /// value.
    pub fn query_param_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.query_param(key).unwrap_or(default)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Builder used by adapters; the finished request is read-only.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    request: CanonicalRequest,
}

impl RequestBuilder {
    pub fn method(mut self, method: &str) -> Self {
        self.request.method = method.to_ascii_uppercase();
        self
    }

    pub fn path(mut self, path: Option<String>) -> Self {
        self.request.path = path;
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.request.headers = headers;
        self
    }

    pub fn query_params(mut self, params: QueryParams) -> Self {
        self.request.query_params = params;
        self
    }

    pub fn body(mut self, body: Option<String>) -> Self {
        self.request.body = body;
        self
    }

    pub fn build(self) -> CanonicalRequest {
        self.request
    }
}

// ---------------------------------------------------------------------------
// Response headers
// ---------------------------------------------------------------------------

/// Multi-valued response headers in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Add a value, keeping earlier values for the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        match self.position(name) {
            Some(i) => self.entries[i].1.push(value.into()),
            None => self.entries.push((name.to_string(), vec![value.into()])),
        }
    }

    /// Replace every value stored for `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = vec![value.into()],
            None => self.entries.push((name.to_string(), vec![value.into()])),
        }
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|i| self.entries[i].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Serialize for ResponseHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResponseHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        let mut headers = ResponseHeaders::new();
        for (name, values) in raw {
            for value in values {
                headers.append(&name, value);
            }
        }
        Ok(headers)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The adapter-agnostic response a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalResponse {
    status_code: u16,
    headers: ResponseHeaders,
    body: String,
}

impl CanonicalResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: ResponseHeaders::new(),
            body: String::new(),
        }
    }

    pub fn from_parts(status_code: u16, headers: ResponseHeaders, body: String) -> Self {
        Self {
            status_code,
            headers,
            body,
        }
    }

    /// A response with `Content-Type: text/html`.
    pub fn html(status_code: u16, body: impl Into<String>) -> Self {
        Self::new(status_code)
            .with_header("Content-Type", "text/html")
            .with_body(body)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Split into parts for an encoder that takes ownership.
    pub fn into_parts(self) -> (u16, ResponseHeaders, String) {
        (self.status_code, self.headers, self.body)
    }
}

impl fmt::Display for CanonicalResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.status_code, self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_header_lookup_ignores_case() {
        let req = CanonicalRequest::builder()
            .header("Accept", "text/html")
            .build();
        assert_eq!(req.header("accept"), Some("text/html"));
        assert_eq!(req.header("ACCEPT"), Some("text/html"));
    }

    #[test]
    fn request_header_insert_replaces_other_casing() {
        let headers: Headers = [("User-Agent", "a"), ("user-agent", "b")]
            .into_iter()
            .collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("USER-AGENT"), Some("b"));
    }

    #[test]
    fn method_is_upper_cased() {
        let req = CanonicalRequest::builder().method("post").build();
        assert_eq!(req.method(), "POST");
    }

    #[test]
    fn default_request_has_empty_method() {
        let req = CanonicalRequest::builder().build();
        assert_eq!(req.method(), "");
        assert!(req.body().is_none());
        assert!(req.path().is_none());
    }

    #[test]
    fn query_param_or_falls_back_for_missing_and_absent() {
        let mut params = QueryParams::new();
        params.insert("flag".to_string(), None);
        params.insert("message".to_string(), Some("hi".to_string()));
        let req = CanonicalRequest::builder().query_params(params).build();

        assert_eq!(req.query_param_or("message", "Unset"), "hi");
        assert_eq!(req.query_param_or("flag", "Unset"), "Unset");
        assert_eq!(req.query_param_or("other", "Unset"), "Unset");
        assert!(req.query_params().contains_key("flag"));
    }

    #[test]
    fn empty_query_value_is_not_absent() {
        let mut params = QueryParams::new();
        params.insert("empty".to_string(), Some(String::new()));
        let req = CanonicalRequest::builder().query_params(params).build();
        assert_eq!(req.query_param_or("empty", "Unset"), "");
    }

    #[test]
    fn response_headers_append_keeps_order_and_first_spelling() {
        let mut headers = ResponseHeaders::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");
        headers.append("X-Other", "x");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_all("SET-COOKIE"), ["a=1", "b=2"]);
        let names: Vec<&str> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["Set-Cookie", "X-Other"]);
    }

    #[test]
    fn response_headers_set_replaces_values() {
        let mut headers = ResponseHeaders::new();
        headers.append("Vary", "Accept");
        headers.append("Vary", "Origin");
        headers.set("vary", "*");
        assert_eq!(headers.get_all("Vary"), ["*"]);
    }

    #[test]
    fn response_headers_serialize_as_map_of_sequences() {
        let resp = CanonicalResponse::html(200, "<h1>Hi</h1>").with_header("Set-Cookie", "a=1");
        let json = serde_json::to_value(resp.headers()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Content-Type": ["text/html"], "Set-Cookie": ["a=1"]})
        );
    }

    #[test]
    fn response_headers_deserialize_merges_casing() {
        let headers: ResponseHeaders =
            serde_json::from_str(r#"{"X-A": ["1"], "x-a": ["2"]}"#).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("x-a").len(), 2);
    }

    #[test]
    fn empty_body_is_permitted() {
        let resp = CanonicalResponse::new(204);
        assert_eq!(resp.body(), "");
        assert_eq!(resp.to_string(), "204 (0 bytes)");
    }
}
