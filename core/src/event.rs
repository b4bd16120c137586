//! Event adapter: one structured event in, one response envelope out.
//!
//! # Design
//! The event is a typed struct with explicit optionality instead of a loose
//! JSON bag. `httpMethod` is the only required field and is checked here, at
//! the boundary; every other field degrades to empty or absent.
//!
//! Query parameters arrive already parsed by the hosting runtime and are
//! copied as-is. Hosts that deliver multi-value arrays are accepted too:
//! headers are joined with `", "`, query parameters keep their last value.
//!
//! Optional fields are read leniently. Numbers and booleans become their
//! text, and values of any other unexpected type are dropped. A mistyped
//! optional field never rejects the whole event.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AdapterError;
use crate::invoker::{Adapter, Mode};
use crate::model::{CanonicalRequest, CanonicalResponse, Headers, QueryParams, ResponseHeaders};

/// A field the host may send as a single value or as an array of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// `None` for null and for objects.
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(values) => Some(OneOrMany::Many(
                values.into_iter().filter_map(scalar_text).collect(),
            )),
            value => scalar_text(value).map(OneOrMany::One),
        }
    }

    fn joined(self) -> Option<String> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) if values.is_empty() => None,
            OneOrMany::Many(values) => Some(values.join(", ")),
        }
    }

    fn last(self) -> Option<String> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.into_iter().last(),
        }
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(de)?.and_then(scalar_text))
}

fn lenient_flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(matches!(Option::<Value>::deserialize(de)?, Some(Value::Bool(true))))
}

type MultiMap = BTreeMap<String, Option<OneOrMany>>;

/// A non-object map is treated as absent; `null` entries stay `None`.
fn lenient_map<'de, D: Deserializer<'de>>(de: D) -> Result<Option<MultiMap>, D::Error> {
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::Object(entries)) => Some(
            entries
                .into_iter()
                .map(|(key, value)| (key, OneOrMany::from_value(value)))
                .collect(),
        ),
        _ => None,
    })
}

/// The invocation event as delivered by an event/context runtime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub http_method: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub headers: Option<MultiMap>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub query_string_parameters: Option<MultiMap>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_base64_encoded: bool,
}

impl Event {
    /// Parse an event from JSON text. Invalid JSON is a malformed event.
    pub fn from_json(raw: &str) -> Result<Self, AdapterError> {
        serde_json::from_str(raw).map_err(|e| AdapterError::malformed(e.to_string()))
    }
}

/// The response envelope returned to an event/context runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: ResponseHeaders,
    #[serde(default)]
    pub body: String,
}

impl EventResponse {
    pub fn to_json(&self) -> Result<String, AdapterError> {
        serde_json::to_string(self).map_err(|e| AdapterError::Serialization(e.to_string()))
    }
}

impl From<CanonicalResponse> for EventResponse {
    fn from(response: CanonicalResponse) -> Self {
        let (status_code, headers, body) = response.into_parts();
        Self {
            status_code,
            headers,
            body,
        }
    }
}

/// Adapter for event/context invocation. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventAdapter;

impl EventAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Parse `raw` and decode it in one step.
    pub fn decode_json(&mut self, raw: &str) -> Result<CanonicalRequest, AdapterError> {
        let event = Event::from_json(raw)?;
        self.decode(event)
    }
}

/// Hosts flag a body as base64 when it is not valid UTF-8. Such a body, or
/// one that does not decode at all, is kept in its encoded form.
fn decode_body(body: Option<String>, is_base64_encoded: bool) -> Option<String> {
    let encoded = match body {
        Some(encoded) if is_base64_encoded => encoded,
        body => return body,
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| e.to_string())
        .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()));
    match decoded {
        Ok(text) => Some(text),
        Err(reason) => {
            tracing::debug!(%reason, "keeping base64 body undecoded");
            Some(encoded)
        }
    }
}

impl Adapter for EventAdapter {
    type Input = Event;
    type Output = EventResponse;

    fn mode(&self) -> Mode {
        Mode::Event
    }

    fn decode(&mut self, event: Event) -> Result<CanonicalRequest, AdapterError> {
        let method = event
            .http_method
            .ok_or_else(|| AdapterError::malformed("missing httpMethod"))?;

        let headers: Headers = event
            .headers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, value)| Some((name, value?.joined()?)))
            .collect();

        let query_params: QueryParams = event
            .query_string_parameters
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.and_then(OneOrMany::last)))
            .collect();

        let body = decode_body(event.body, event.is_base64_encoded);

        let request = CanonicalRequest::builder()
            .method(&method)
            .path(event.path)
            .headers(headers)
            .query_params(query_params)
            .body(body)
            .build();

        tracing::debug!(
            method = request.method(),
            headers = request.headers().len(),
            has_body = request.body().is_some(),
            "decoded event"
        );
        Ok(request)
    }

    fn encode(&mut self, response: CanonicalResponse) -> Result<EventResponse, AdapterError> {
        Ok(response.into())
    }
}
