//! Wire-level dumps for debugging.
//!
//! When debugging is enabled the client renders each request before it is
//! sent and each response once it is received, in HTTP/1.1 text form, and
//! hands the text to a [`DebugSink`]. Sensitive header values are redacted.

use std::fmt::Write as _;

use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;

use crate::request::Request;

/// Target used by [`TracingSink`] events.
pub const WIRE_TARGET: &str = "kong_admin::wire";

/// Receives rendered wire dumps.
pub trait DebugSink: Send + Sync {
    fn record(&self, dump: &str);
}

/// Emits each dump as a `tracing` debug event under [`WIRE_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn record(&self, dump: &str) {
        tracing::debug!(target: WIRE_TARGET, "{dump}");
    }
}

/// Keeps every dump in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    dumps: Mutex<Vec<String>>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dumps recorded so far, oldest first.
    #[must_use]
    pub fn dumps(&self) -> Vec<String> {
        self.dumps.lock().clone()
    }
}

impl DebugSink for CaptureSink {
    fn record(&self, dump: &str) {
        self.dumps.lock().push(dump.to_owned());
    }
}

pub(crate) fn render_request(request: &Request) -> String {
    let mut out = String::new();
    let (target, host) = match url::Url::parse(request.url()) {
        Ok(url) => {
            let mut target = url.path().to_owned();
            if let Some(query) = url.query() {
                target.push('?');
                target.push_str(query);
            }
            let host = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.to_owned(),
                (None, _) => String::new(),
            };
            (target, host)
        }
        Err(_) => (request.url().to_owned(), String::new()),
    };

    let _ = write!(out, "{} {target} HTTP/1.1\r\nHost: {host}\r\n", request.method());
    render_headers(&mut out, request.headers());
    out.push_str("\r\n");
    if let Some(body) = request.body() {
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

pub(crate) fn render_response(status: StatusCode, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    render_headers(&mut out, headers);
    out.push_str("\r\n");
    if let Some(body) = body {
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

fn render_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = if value.is_sensitive() || name.as_str() == crate::config::ADMIN_TOKEN_HEADER {
            "[redacted]".into()
        } else {
            String::from_utf8_lossy(value.as_bytes())
        };
        let _ = write!(out, "{name}: {value}\r\n");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderValue, Method};

    #[test]
    fn test_request_dump_has_line_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("kong-admin-token", HeaderValue::from_static("t0ken"));
        let request = Request::new(
            Method::POST,
            "http://localhost:8001/services?cluster.id=abc".to_owned(),
            headers,
            Some(Bytes::from_static(br#"{"name":"s1"}"#)),
        );

        let dump = render_request(&request);
        assert!(dump.starts_with("POST /services?cluster.id=abc HTTP/1.1\r\nHost: localhost:8001\r\n"));
        assert!(dump.contains("content-type: application/json\r\n"));
        assert!(dump.contains("kong-admin-token: [redacted]\r\n"));
        assert!(!dump.contains("t0ken"));
        assert!(dump.ends_with("\r\n\r\n{\"name\":\"s1\"}"));
    }

    #[test]
    fn test_response_dump_without_body() {
        let dump = render_response(StatusCode::NOT_FOUND, &HeaderMap::new(), None);
        assert_eq!(dump, "HTTP/1.1 404 Not Found\r\n\r\n");
    }

    #[test]
    fn test_capture_sink_keeps_order() {
        let sink = CaptureSink::new();
        sink.record("first");
        sink.record("second");
        assert_eq!(sink.dumps(), vec!["first".to_owned(), "second".to_owned()]);
    }
}
