//! Blocking transport backed by ureq.
//!
//! # Design
//! A fresh agent is configured per request from the request's layered
//! `TransportOptions`; nothing is pooled or kept between calls. Status codes
//! are returned as data unless `fail_on_error` is set, redirects are not
//! followed, bodies are read without a size cap, and the response header
//! block is rebuilt in wire form so `RawResponse::header_size` matches what a
//! curl-style engine would report.

use ureq::http;
use ureq::tls::TlsConfig;

use crate::error::{NinoxError, Result};
use crate::http::{HttpRequest, RawResponse, Transport, TransportOptions};

#[derive(Debug, Clone, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent(options: &TransportOptions) -> Result<ureq::Agent> {
        let tls = TlsConfig::builder()
            .disable_verification(!options.verify_peer.unwrap_or(true))
            .build();

        let mut config = ureq::Agent::config_builder()
            .http_status_as_error(options.fail_on_error.unwrap_or(false))
            .allow_non_standard_methods(true)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .tls_config(tls)
            .timeout_global(options.timeout_duration())
            .timeout_connect(options.connect_timeout_duration());

        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = ureq::Proxy::new(proxy)
                .map_err(|e| NinoxError::InvalidRequest(format!("proxy {proxy}: {e}")))?;
            config = config.proxy(Some(proxy));
        }

        Ok(config.build().new_agent())
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse> {
        let agent = Self::agent(&request.options)?;

        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in collapse_headers(request) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let sent = match &request.body {
            Some(body) => {
                let req = builder
                    .body(body.clone())
                    .map_err(|e| NinoxError::InvalidRequest(e.to_string()))?;
                agent.run(req)
            }
            None => {
                let req = builder
                    .body(())
                    .map_err(|e| NinoxError::InvalidRequest(e.to_string()))?;
                agent.run(req)
            }
        };
        let mut response = sent.map_err(NinoxError::transport)?;

        let status = response.status();
        let status_line = format!(
            "{:?} {} {}",
            response.version(),
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(NinoxError::transport)?;

        Ok(RawResponse::from_parts(
            status_line.trim_end(),
            headers.iter().map(|(n, v)| (n.as_str(), v.as_str())),
            &body,
            status.as_u16(),
        ))
    }
}

/// One value per header name, the last one sent winning, in first-seen
/// order. The configured user agent only applies when no `User-Agent` header
/// was given.
fn collapse_headers(request: &HttpRequest) -> Vec<(String, String)> {
    let mut collapsed: Vec<(String, String)> = Vec::new();
    let agent = request
        .options
        .user_agent
        .as_ref()
        .map(|agent| ("User-Agent".to_string(), agent.clone()));

    for (name, value) in agent.iter().chain(request.headers.iter()) {
        match collapsed
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1.clone_from(value),
            None => collapsed.push((name.clone(), value.clone())),
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{SocketAddr, TcpListener};

    /// Answer one connection with `head` followed by `body`, then close.
    fn serve_once(head: String, body: Vec<u8>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let mut stream = reader.into_inner();
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
        });
        addr
    }

    fn get(addr: SocketAddr, options: TransportOptions) -> Result<RawResponse> {
        let mut req = request(&[], TransportOptions::layered(&HttpMethod::Get, &options));
        req.url = format!("http://{addr}/teams");
        UreqTransport::new().execute(&req)
    }

    fn request(headers: &[(&str, &str)], options: TransportOptions) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/teams".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: None,
            options,
        }
    }

    #[test]
    fn explicit_user_agent_header_beats_option() {
        let req = request(
            &[("User-Agent", "from-header"), ("Accept", "application/json")],
            TransportOptions::new().user_agent("from-option"),
        );
        let headers = collapse_headers(&req);
        assert_eq!(
            headers,
            vec![
                ("User-Agent".to_string(), "from-header".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]
        );
    }

    #[test]
    fn option_user_agent_used_when_no_header() {
        let req = request(&[], TransportOptions::new().user_agent("from-option"));
        assert_eq!(
            collapse_headers(&req),
            vec![("User-Agent".to_string(), "from-option".to_string())]
        );
    }

    #[test]
    fn duplicate_headers_keep_last_value() {
        let req = request(
            &[("Authorization", "Bearer a"), ("authorization", "Bearer b")],
            TransportOptions::new(),
        );
        assert_eq!(
            collapse_headers(&req),
            vec![("Authorization".to_string(), "Bearer b".to_string())]
        );
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut req = request(&[], TransportOptions::new());
        req.url = format!("http://{addr}/teams");
        let err = UreqTransport::new().execute(&req).unwrap_err();
        assert!(matches!(err, NinoxError::Transport(_)));
    }

    #[test]
    fn bodies_over_ten_mebibytes_are_read_whole() {
        let size = 11 * 1024 * 1024;
        let mut body = Vec::with_capacity(size);
        body.push(b'"');
        body.resize(size - 1, b'a');
        body.push(b'"');
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {size}\r\nConnection: close\r\n\r\n"
        );

        let raw = get(serve_once(head, body), TransportOptions::new()).unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.content.len() - raw.header_size, size);
    }

    #[test]
    fn redirects_come_back_as_responses() {
        let head = "HTTP/1.1 302 Found\r\nLocation: /other\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let raw = get(serve_once(head.to_string(), Vec::new()), TransportOptions::new()).unwrap();

        assert_eq!(raw.status, 302);
        let block = String::from_utf8_lossy(&raw.content[..raw.header_size]).to_ascii_lowercase();
        assert!(block.starts_with("http/1.1 302"));
        assert!(block.contains("location: /other"));
    }

    #[test]
    fn advisory_options_do_not_change_the_exchange() {
        let head = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n";
        let mut options = TransportOptions::new().extra("x-knob", "1");
        options.include_headers = Some(false);

        let raw = get(serve_once(head.to_string(), b"[]".to_vec()), options).unwrap();
        assert!(raw.header_size > 0);
        assert_eq!(&raw.content[raw.header_size..], b"[]");
    }
}
