//! `key=value&key=value` query string decoding.
//!
//! No percent-decoding happens here: keys and values are the raw token text.

use crate::model::QueryParams;

/// Parse a raw query string.
///
/// Tokens are split on the first `=`; a token without `=` maps to `None`.
/// A repeated key keeps the value of its last occurrence. Empty tokens are
/// skipped, except that an empty input is itself a single empty token and
/// yields one entry: `""` with no value.
pub fn parse(raw: &str) -> QueryParams {
    let mut params = QueryParams::new();
    if raw.is_empty() {
        params.insert(String::new(), None);
        return params;
    }

    for token in raw.split('&').filter(|t| !t.is_empty()) {
        let (key, value) = match token.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (token, None),
        };
        params.insert(key.to_string(), value);
    }
    params
}
