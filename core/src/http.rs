//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and raw responses are plain data. `NinoxClient` assembles an
//! `HttpRequest`, hands it to whatever `Transport` it was built with, and
//! parses the `RawResponse` that comes back. Production code uses the ureq
//! transport; tests inject a recording transport and never touch the network.
//!
//! `RawResponse` deliberately mirrors a curl-style engine: the header block
//! and the body arrive as one byte buffer plus the size of the header block.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// User agent the transport announces unless the caller overrides it.
pub const TRANSPORT_USER_AGENT: &str = concat!("ninox-rust-client,v", env!("CARGO_PKG_VERSION"));

/// HTTP method for a request. Any verb the server understands can be sent
/// through `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Other(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Other(verb) => verb,
        }
    }
}

impl From<&str> for HttpMethod {
    fn from(verb: &str) -> Self {
        let verb = verb.trim().to_ascii_uppercase();
        match verb.as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            _ => HttpMethod::Other(verb),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport knobs. Every option is optional so that sets can be stacked with
/// [`TransportOptions::overlay`]; an unset option means "use the layer below".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    pub method: Option<String>,
    pub user_agent: Option<String>,
    /// Treat 4xx/5xx as transport failures. Always `false` unless overridden.
    pub fail_on_error: Option<bool>,
    /// Return the header block ahead of the body. Advisory: the ureq
    /// transport always returns the header block.
    pub include_headers: Option<bool>,
    /// Verify the peer's TLS certificate. Forced on for every request.
    pub verify_peer: Option<bool>,
    /// Hand the body back to the caller instead of streaming it elsewhere.
    /// Forced on for every request. Advisory: the ureq transport always
    /// returns the body.
    pub return_transfer: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub proxy: Option<String>,
    /// Knobs only a custom transport understands. Ignored by the ureq
    /// transport.
    pub extra: BTreeMap<String, String>,
}

impl TransportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(duration_millis(timeout));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(duration_millis(timeout));
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = Some(verify);
        self
    }

    pub fn return_transfer(mut self, enabled: bool) -> Self {
        self.return_transfer = Some(enabled);
        self
    }

    pub fn fail_on_error(mut self, enabled: bool) -> Self {
        self.fail_on_error = Some(enabled);
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout_duration(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Stack `top` over `self`: options set in `top` win, `extra` entries
    /// merge key by key.
    pub fn overlay(mut self, top: &TransportOptions) -> Self {
        fn pick<T: Clone>(below: &mut Option<T>, top: &Option<T>) {
            if top.is_some() {
                below.clone_from(top);
            }
        }

        pick(&mut self.method, &top.method);
        pick(&mut self.user_agent, &top.user_agent);
        pick(&mut self.fail_on_error, &top.fail_on_error);
        pick(&mut self.include_headers, &top.include_headers);
        pick(&mut self.verify_peer, &top.verify_peer);
        pick(&mut self.return_transfer, &top.return_transfer);
        pick(&mut self.timeout_ms, &top.timeout_ms);
        pick(&mut self.connect_timeout_ms, &top.connect_timeout_ms);
        pick(&mut self.proxy, &top.proxy);
        self.extra
            .extend(top.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Effective options for one request: built-in defaults, then the
    /// caller's overrides, then the options no caller may change.
    pub fn layered(method: &HttpMethod, caller: &TransportOptions) -> TransportOptions {
        let builtin = TransportOptions {
            method: Some(method.as_str().to_string()),
            user_agent: Some(TRANSPORT_USER_AGENT.to_string()),
            fail_on_error: Some(false),
            include_headers: Some(true),
            ..TransportOptions::default()
        };
        let mandatory = TransportOptions {
            verify_peer: Some(true),
            return_transfer: Some(true),
            ..TransportOptions::default()
        };
        builtin.overlay(caller).overlay(&mandatory)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// An HTTP request described as plain data.
///
/// `headers` keeps insertion order and may contain the same name twice; a
/// transport that needs single values takes the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub options: TransportOptions,
}

impl HttpRequest {
    /// Last value sent for `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What a transport reports after a completed round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Byte length of the header block at the start of `content`.
    pub header_size: usize,
    pub content: Vec<u8>,
}

impl RawResponse {
    /// Assemble a curl-style buffer: status line, header lines, blank line,
    /// body.
    pub fn from_parts<'a, I>(status_line: &str, headers: I, body: &[u8], status: u16) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut block = format!("{status_line}\r\n");
        for (name, value) in headers {
            block.push_str(name);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
        block.push_str("\r\n");

        let header_size = block.len();
        let mut content = block.into_bytes();
        content.extend_from_slice(body);
        RawResponse {
            status,
            header_size,
            content,
        }
    }
}

/// Executes one blocking HTTP round-trip.
///
/// Implementations must return `Ok` for every response the server sends,
/// whatever its status, and `Err(NinoxError::Transport)` only when no
/// response was received.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse>;
}
