//! C-ABI wrapper around `wgi-core`.
//!
//! # Overview
//! Lets a handler written in C run unmodified under both invocation models.
//! The C side implements one `WgiHandler`, reads the request through
//! `wgi_request_*` accessors and builds its response with `wgi_response_*`.
//! `wgi_run_event` and `wgi_run_cgi` do the decoding and encoding.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Strings returned by request accessors are borrowed from the request and
//!   valid until the handler returns. The C caller must not free them.
//! - The handler hands ownership of its `FfiResponse` to the runner.
//! - The C caller owns every returned `FfiInvokeResult` and must release it
//!   with `wgi_free_result`.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::io::{Read, Write};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use wgi_core::{
    invoke, CanonicalRequest, CanonicalResponse, CgiAdapter, Environment, Event, EventAdapter,
};

use types::*;

/// Read a C string argument; invalid UTF-8 reads as empty.
fn str_arg<'a>(ptr: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("")
}

fn borrow_ptr(value: Option<&CString>) -> *const c_char {
    value.map_or(std::ptr::null(), |s| s.as_ptr())
}

/// Adapt a C handler into the core handler contract.
fn c_handler(
    handler: WgiHandler,
    user_data: *mut c_void,
) -> impl FnOnce(CanonicalRequest) -> Result<CanonicalResponse, HandlerFailed> {
    move |req| {
        let ffi_req = FfiRequest::from(&req);
        let resp = handler(&ffi_req, user_data);
        if resp.is_null() {
            return Err(HandlerFailed);
        }
        let resp = unsafe { Box::from_raw(resp) };
        Ok(resp.into_canonical())
    }
}

// ---------------------------------------------------------------------------
// Request accessors
// ---------------------------------------------------------------------------

/// Upper-case HTTP method, `""` when the runtime supplied none.
///
/// Returns null if `req` is null.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_request_method(req: *const FfiRequest) -> *const c_char {
    catch_unwind(|| {
        if req.is_null() {
            return std::ptr::null();
        }
        let req = unsafe { &*req };
        req.method.as_ptr()
    })
    .unwrap_or(std::ptr::null())
}

/// Request path, or null when the runtime supplied none.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_request_path(req: *const FfiRequest) -> *const c_char {
    catch_unwind(|| {
        if req.is_null() {
            return std::ptr::null();
        }
        let req = unsafe { &*req };
        borrow_ptr(req.path.as_ref())
    })
    .unwrap_or(std::ptr::null())
}

/// Header value by case-insensitive name, or null when absent.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_request_header(req: *const FfiRequest, name: *const c_char) -> *const c_char {
    catch_unwind(|| {
        if req.is_null() || name.is_null() {
            return std::ptr::null();
        }
        let req = unsafe { &*req };
        borrow_ptr(req.header(str_arg(name)))
    })
    .unwrap_or(std::ptr::null())
}

/// Query parameter value, or `default_value` when the key is missing or has
/// no value. `default_value` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_request_query(
    req: *const FfiRequest,
    key: *const c_char,
    default_value: *const c_char,
) -> *const c_char {
    catch_unwind(|| {
        if req.is_null() || key.is_null() {
            return default_value;
        }
        let req = unsafe { &*req };
        match req.query(str_arg(key)) {
            Some(value) => value.as_ptr(),
            None => default_value,
        }
    })
    .unwrap_or(default_value)
}

/// Request body, or null when the invocation carried no payload.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_request_body(req: *const FfiRequest) -> *const c_char {
    catch_unwind(|| {
        if req.is_null() {
            return std::ptr::null();
        }
        let req = unsafe { &*req };
        borrow_ptr(req.body.as_ref())
    })
    .unwrap_or(std::ptr::null())
}

// ---------------------------------------------------------------------------
// Response building
// ---------------------------------------------------------------------------

/// Create an empty response with `status`.
///
/// Return it from the handler to hand it over, or release it with
/// `wgi_response_free`.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_response_new(status: u16) -> *mut FfiResponse {
    catch_unwind(|| Box::into_raw(Box::new(FfiResponse::new(status))))
        .unwrap_or(std::ptr::null_mut())
}

/// Append a header value. Repeated names keep every value.
///
/// Returns false if any argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_response_add_header(
    resp: *mut FfiResponse,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if resp.is_null() || name.is_null() || value.is_null() {
            return false;
        }
        let resp = unsafe { &mut *resp };
        resp.headers.append(str_arg(name), str_arg(value));
        true
    }))
    .unwrap_or(false)
}

/// Replace the response body. A null `body` clears it.
///
/// Returns false if `resp` is null.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_response_set_body(resp: *mut FfiResponse, body: *const c_char) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if resp.is_null() {
            return false;
        }
        let resp = unsafe { &mut *resp };
        resp.body = if body.is_null() {
            String::new()
        } else {
            str_arg(body).to_string()
        };
        true
    }))
    .unwrap_or(false)
}

/// Free a response that was not returned from a handler. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_response_free(resp: *mut FfiResponse) {
    if !resp.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(resp) });
        });
    }
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Decode `event_json`, run `handler` once and return the response envelope
/// as JSON in `output`.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_run_event(
    event_json: *const c_char,
    handler: Option<WgiHandler>,
    user_data: *mut c_void,
) -> *mut FfiInvokeResult {
    catch_unwind(AssertUnwindSafe(|| {
        if event_json.is_null() {
            return FfiInvokeResult::null_arg("event_json");
        }
        let Some(handler) = handler else {
            return FfiInvokeResult::null_arg("handler");
        };
        let event = match Event::from_json(str_arg(event_json)) {
            Ok(event) => event,
            Err(e) => return FfiInvokeResult::from_error(wgi_core::InvokeError::Decode(e)),
        };
        let envelope = match invoke(&mut EventAdapter::new(), event, c_handler(handler, user_data)) {
            Ok(envelope) => envelope,
            Err(e) => return FfiInvokeResult::from_error(e),
        };
        match envelope.to_json() {
            Ok(json) => FfiInvokeResult::ok(Some(json)),
            Err(e) => FfiInvokeResult::from_error(wgi_core::InvokeError::Encode(e)),
        }
    }))
    .unwrap_or_else(|_| FfiInvokeResult::panic("panic in wgi_run_event"))
}

/// Run `handler` once as a CGI program: environment and stdin in, response
/// on stdout.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_run_cgi(
    handler: Option<WgiHandler>,
    user_data: *mut c_void,
) -> *mut FfiInvokeResult {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(handler) = handler else {
            return FfiInvokeResult::null_arg("handler");
        };
        run_cgi_with(
            Environment::from_process(),
            std::io::stdin(),
            std::io::stdout(),
            handler,
            user_data,
        )
    }))
    .unwrap_or_else(|_| FfiInvokeResult::panic("panic in wgi_run_cgi"))
}

fn run_cgi_with<R: Read, W: Write>(
    env: Environment,
    input: R,
    output: W,
    handler: WgiHandler,
    user_data: *mut c_void,
) -> *mut FfiInvokeResult {
    let mut cgi = CgiAdapter::new(env, input, output);
    match invoke(&mut cgi, (), c_handler(handler, user_data)) {
        Ok(()) => FfiInvokeResult::ok(None),
        Err(e) => FfiInvokeResult::from_error(e),
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiInvokeResult` returned by a runner. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wgi_free_result(result: *mut FfiInvokeResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.output.is_null() {
            drop(unsafe { CString::from_raw(result.output) });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_str().unwrap())
        }
    }

    /// Echoes what it sees, the way the CGI hello-world does.
    extern "C" fn hello(req: *const FfiRequest, _user_data: *mut c_void) -> *mut FfiResponse {
        let method = c_str(wgi_request_method(req)).unwrap();
        if method != "GET" {
            let resp = wgi_response_new(405);
            let body = CString::new("Method Not Allowed\n").unwrap();
            wgi_response_set_body(resp, body.as_ptr());
            return resp;
        }

        let ua_name = CString::new("USER-AGENT").unwrap();
        let user_agent = c_str(wgi_request_header(req, ua_name.as_ptr())).unwrap_or("User");
        let key = CString::new("message").unwrap();
        let unset = CString::new("Unset").unwrap();
        let message = c_str(wgi_request_query(req, key.as_ptr(), unset.as_ptr())).unwrap();

        let resp = wgi_response_new(200);
        let name = CString::new("Content-Type").unwrap();
        let value = CString::new("text/plain").unwrap();
        wgi_response_add_header(resp, name.as_ptr(), value.as_ptr());
        let body = CString::new(format!("Hello {user_agent}! {message}")).unwrap();
        wgi_response_set_body(resp, body.as_ptr());
        resp
    }

    extern "C" fn failing(_req: *const FfiRequest, _user_data: *mut c_void) -> *mut FfiResponse {
        std::ptr::null_mut()
    }

    extern "C" fn counting(_req: *const FfiRequest, user_data: *mut c_void) -> *mut FfiResponse {
        let calls = unsafe { &mut *(user_data as *mut u32) };
        *calls += 1;
        wgi_response_new(204)
    }

    fn run_event(json: &str, handler: WgiHandler, user_data: *mut c_void) -> *mut FfiInvokeResult {
        let event = CString::new(json).unwrap();
        wgi_run_event(event.as_ptr(), Some(handler), user_data)
    }

    #[test]
    fn run_event_returns_envelope() {
        let result = run_event(
            r#"{"httpMethod":"GET","headers":{"User-Agent":"curl"},"queryStringParameters":{"message":"hi"}}"#,
            hello,
            std::ptr::null_mut(),
        );
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert!(r.error_message.is_null());

        let envelope: serde_json::Value = serde_json::from_str(c_str(r.output).unwrap()).unwrap();
        assert_eq!(
            envelope,
            serde_json::json!({
                "statusCode": 200,
                "headers": {"Content-Type": ["text/plain"]},
                "body": "Hello curl! hi"
            })
        );

        wgi_free_result(result);
    }

    #[test]
    fn run_event_missing_query_uses_default() {
        let result = run_event(r#"{"httpMethod":"GET"}"#, hello, std::ptr::null_mut());
        let r = unsafe { &*result };
        let envelope: serde_json::Value = serde_json::from_str(c_str(r.output).unwrap()).unwrap();
        assert_eq!(envelope["body"], "Hello User! Unset");
        wgi_free_result(result);
    }

    #[test]
    fn run_event_missing_method_is_malformed() {
        let mut calls = 0u32;
        let result = run_event(r#"{"headers":{}}"#, counting, &mut calls as *mut u32 as *mut c_void);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::MalformedEvent);
        assert!(r.output.is_null());
        assert!(c_str(r.error_message).unwrap().contains("httpMethod"));
        assert_eq!(calls, 0);
        wgi_free_result(result);
    }

    #[test]
    fn run_event_invalid_json_is_malformed() {
        let result = run_event("{", hello, std::ptr::null_mut());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::MalformedEvent);
        wgi_free_result(result);
    }

    #[test]
    fn null_response_is_handler_error() {
        let result = run_event(r#"{"httpMethod":"GET"}"#, failing, std::ptr::null_mut());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Handler);
        assert_eq!(c_str(r.error_message), Some("handler returned no response"));
        wgi_free_result(result);
    }

    #[test]
    fn handler_runs_exactly_once() {
        let mut calls = 0u32;
        let result = run_event(
            r#"{"httpMethod":"GET"}"#,
            counting,
            &mut calls as *mut u32 as *mut c_void,
        );
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
        assert_eq!(calls, 1);
        wgi_free_result(result);
    }

    #[test]
    fn run_event_null_args() {
        let result = wgi_run_event(std::ptr::null(), Some(hello), std::ptr::null_mut());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        wgi_free_result(result);

        let event = CString::new(r#"{"httpMethod":"GET"}"#).unwrap();
        let result = wgi_run_event(event.as_ptr(), None, std::ptr::null_mut());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        wgi_free_result(result);
    }

    #[test]
    fn cgi_runner_writes_response() {
        let env: Environment = [
            ("REQUEST_METHOD", "GET"),
            ("HTTP_USER_AGENT", "curl"),
            ("QUERY_STRING", "message=hi"),
        ]
        .into_iter()
        .collect();
        let mut out = Vec::new();
        let result = run_cgi_with(env, &b""[..], &mut out, hello, std::ptr::null_mut());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Ok);
        assert!(unsafe { &*result }.output.is_null());
        wgi_free_result(result);

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Status: 200\nContent-Type: text/plain\n\nHello curl! hi"
        );
    }

    #[test]
    fn cgi_runner_without_method_gets_405() {
        let mut out = Vec::new();
        let result = run_cgi_with(Environment::default(), &b""[..], &mut out, hello, std::ptr::null_mut());
        wgi_free_result(result);
        assert_eq!(String::from_utf8(out).unwrap(), "Status: 405\n\nMethod Not Allowed\n");
    }

    #[test]
    fn request_accessors_handle_absent_values() {
        let req = CanonicalRequest::builder().method("get").build();
        let ffi_req = FfiRequest::from(&req);
        let name = CString::new("accept").unwrap();

        assert_eq!(c_str(wgi_request_method(&ffi_req)), Some("GET"));
        assert!(wgi_request_path(&ffi_req).is_null());
        assert!(wgi_request_body(&ffi_req).is_null());
        assert!(wgi_request_header(&ffi_req, name.as_ptr()).is_null());
        assert!(wgi_request_query(&ffi_req, name.as_ptr(), std::ptr::null()).is_null());
    }

    #[test]
    fn request_accessors_return_null_for_null_request() {
        let key = CString::new("message").unwrap();
        let fallback = CString::new("Unset").unwrap();

        assert!(wgi_request_method(std::ptr::null()).is_null());
        assert!(wgi_request_path(std::ptr::null()).is_null());
        assert!(wgi_request_body(std::ptr::null()).is_null());
        assert!(wgi_request_header(std::ptr::null(), key.as_ptr()).is_null());
        assert_eq!(
            c_str(wgi_request_query(std::ptr::null(), key.as_ptr(), fallback.as_ptr())),
            Some("Unset")
        );
    }

    #[test]
    fn request_accessors_expose_present_values() {
        let req = CanonicalRequest::builder()
            .method("post")
            .path(Some("/hello".to_string()))
            .body(Some("ping".to_string()))
            .build();
        let ffi_req = FfiRequest::from(&req);

        assert_eq!(c_str(wgi_request_method(&ffi_req)), Some("POST"));
        assert_eq!(c_str(wgi_request_path(&ffi_req)), Some("/hello"));
        assert_eq!(c_str(wgi_request_body(&ffi_req)), Some("ping"));
    }

    #[test]
    fn response_builder_null_is_rejected() {
        let name = CString::new("X").unwrap();
        assert!(!wgi_response_add_header(std::ptr::null_mut(), name.as_ptr(), name.as_ptr()));
        assert!(!wgi_response_set_body(std::ptr::null_mut(), name.as_ptr()));
    }

    #[test]
    fn free_functions_accept_null() {
        wgi_free_result(std::ptr::null_mut());
        wgi_response_free(std::ptr::null_mut());
    }
}
