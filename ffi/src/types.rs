//! `#[repr(C)]` and opaque types for the FFI boundary.
//!
//! # Design
//! `FfiRequest` pre-converts every string a C handler can ask for into a
//! `CString`, so accessors hand out borrowed pointers that stay valid for the
//! whole handler call without allocating per lookup. `FfiResponse` collects
//! status, headers and body until the runner converts it back into a
//! `CanonicalResponse`. Conversion functions live here to keep `lib.rs`
//! focused on the `extern "C"` surface.

use std::collections::BTreeMap;
use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use thiserror::Error;
use wgi_core::{AdapterError, CanonicalRequest, CanonicalResponse, InvokeError, ResponseHeaders};

/// Signature of a C handler. Returning null signals a handler failure.
/// Ownership of a non-null response passes to the runner.
pub type WgiHandler =
    extern "C" fn(request: *const FfiRequest, user_data: *mut c_void) -> *mut FfiResponse;

/// C strings cannot carry interior NUL bytes; drop them.
pub(crate) fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Opaque, read-only view of a `CanonicalRequest` for C handlers.
pub struct FfiRequest {
    pub(crate) method: CString,
    pub(crate) path: Option<CString>,
    pub(crate) headers: BTreeMap<String, CString>,
    pub(crate) query: BTreeMap<String, Option<CString>>,
    pub(crate) body: Option<CString>,
}

impl From<&CanonicalRequest> for FfiRequest {
    fn from(req: &CanonicalRequest) -> Self {
        Self {
            method: c_string(req.method()),
            path: req.path().map(c_string),
            headers: req
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), c_string(value)))
                .collect(),
            query: req
                .query_params()
                .iter()
                .map(|(key, value)| (key.clone(), value.as_deref().map(c_string)))
                .collect(),
            body: req.body().map(c_string),
        }
    }
}

impl FfiRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&CString> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    pub(crate) fn query(&self, key: &str) -> Option<&CString> {
        self.query.get(key).and_then(Option::as_ref)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Opaque response under construction by a C handler.
pub struct FfiResponse {
    pub(crate) status: u16,
    pub(crate) headers: ResponseHeaders,
    pub(crate) body: String,
}

impl FfiResponse {
    pub(crate) fn new(status: u16) -> Self {
        Self {
            status,
            headers: ResponseHeaders::new(),
            body: String::new(),
        }
    }

    pub(crate) fn into_canonical(self) -> CanonicalResponse {
        CanonicalResponse::from_parts(self.status, self.headers, self.body)
    }
}

/// The C handler returned null instead of a response.
#[derive(Debug, Error)]
#[error("handler returned no response")]
pub struct HandlerFailed;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiInvokeResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    MalformedEvent = 1,
    InvalidBody = 2,
    Io = 3,
    Serialization = 4,
    Handler = 5,
    Panic = 6,
    NullArg = 7,
}

impl From<&AdapterError> for FfiErrorCode {
    fn from(err: &AdapterError) -> Self {
        match err {
            AdapterError::MalformedEvent(_) => FfiErrorCode::MalformedEvent,
            AdapterError::InvalidBody(_) => FfiErrorCode::InvalidBody,
            AdapterError::Io(_) => FfiErrorCode::Io,
            AdapterError::Serialization(_) => FfiErrorCode::Serialization,
        }
    }
}

/// Result envelope for both runners.
///
/// On success `error_code` is `Ok` and `error_message` is null. `output`
/// holds the JSON envelope for event invocations and is null for CGI
/// invocations, whose response has already been written to stdout.
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string and `output` is null.
#[repr(C)]
pub struct FfiInvokeResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub output: *mut c_char,
}

impl FfiInvokeResult {
    fn boxed(error_code: FfiErrorCode, message: Option<String>, output: Option<String>) -> *mut Self {
        let result = Box::new(FfiInvokeResult {
            error_code,
            error_message: message.map_or(std::ptr::null_mut(), |m| c_string(&m).into_raw()),
            output: output.map_or(std::ptr::null_mut(), |o| c_string(&o).into_raw()),
        });
        Box::into_raw(result)
    }

    /// Build a success result, optionally carrying output text.
    pub(crate) fn ok(output: Option<String>) -> *mut Self {
        Self::boxed(FfiErrorCode::Ok, None, output)
    }

    /// Build an error result from a failed invocation.
    pub(crate) fn from_error(err: InvokeError<HandlerFailed>) -> *mut Self {
        let code = match &err {
            InvokeError::Handler(_) => FfiErrorCode::Handler,
            InvokeError::Decode(e) | InvokeError::Encode(e) => e.into(),
        };
        let message = match &err {
            InvokeError::Handler(e) => e.to_string(),
            other => other.to_string(),
        };
        Self::boxed(code, Some(message), None)
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::NullArg, Some(format!("null argument: {name}")), None)
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, Some(msg.to_string()), None)
    }
}
