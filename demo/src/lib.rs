//! Demo "hello" handler that runs under both invocation models.
//!
//! The handler only sees a `CanonicalRequest`; `main.rs` decides whether it
//! was invoked through CGI or an event.

pub mod config;

use std::convert::Infallible;
use std::fmt::Write;
use std::time::Duration;

use wgi_core::{CanonicalRequest, CanonicalResponse};

/// Query parameter echoed into the page.
pub const MESSAGE_PARAM: &str = "message";
/// Shown when `message` is missing or has no value.
pub const MESSAGE_DEFAULT: &str = "Unset";

/// Render the page, wait `delay`, answer `200 text/html`.
///
/// The wait is a suspension point: other tasks on the runtime keep running.
pub async fn hello(
    req: CanonicalRequest,
    delay: Duration,
) -> Result<CanonicalResponse, Infallible> {
    tracing::info!("function triggered");
    tracing::info!(
        accept = req.header("accept").unwrap_or_default(),
        user_agent = req.user_agent().unwrap_or_default(),
        "request headers"
    );

    let body = render_page(&req);

    if !delay.is_zero() {
        tracing::debug!(delay_ms = delay.as_millis() as u64, "sleeping");
        tokio::time::sleep(delay).await;
    }

    Ok(CanonicalResponse::html(200, body))
}

/// The HTML page for `req`. Missing values render as empty strings.
pub fn render_page(req: &CanonicalRequest) -> String {
    let mut page = String::new();
    let _ = write!(
        page,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Hello World</title>
</head>
<body>
  <h1>Hello World!</h1>
  <p>Function triggered!
  <ul>
    <li>Http method: {method}</li>
    <li>Host: {host}</li>
    <li>User agent: {user_agent}</li>
    <li>Query string test: {message}</li>
  </ul>
  {body}
</body>
</html>"#,
        method = escape(req.method()),
        host = escape(req.header("host").unwrap_or_default()),
        user_agent = escape(req.user_agent().unwrap_or_default()),
        message = escape(req.query_param_or(MESSAGE_PARAM, MESSAGE_DEFAULT)),
        body = escape(req.body().unwrap_or_default()),
    );
    page
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_specials() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn page_uses_default_message() {
        let req = CanonicalRequest::builder().method("GET").build();
        let page = render_page(&req);
        assert!(page.contains("<li>Query string test: Unset</li>"));
        assert!(page.contains("<li>Http method: GET</li>"));
        assert!(page.contains("<li>Host: </li>"));
    }
}
