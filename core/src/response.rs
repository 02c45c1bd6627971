//! The response envelope returned by every endpoint call.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{NinoxError, Result};
use crate::http::RawResponse;

/// Status the API answers with when the caller should slow down.
pub const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Parsed body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The body was valid JSON.
    Json(Value),
    /// The body was empty or not JSON, kept as text. Bytes that are not
    /// valid UTF-8 are replaced with U+FFFD.
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Text(text) if text.is_empty())
    }
}

/// One completed HTTP exchange: status, header lines, and the body.
///
/// Built once from the transport output and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct NinoxResponse {
    header_size: usize,
    status_code: u16,
    response_headers: Vec<String>,
    response_body: ResponseBody,
}

impl NinoxResponse {
    /// Split raw transport output into header lines and body.
    ///
    /// The first `header_size` bytes are the header block, split on `\n` with
    /// each line trimmed. A non-empty remainder is decoded as JSON when it
    /// parses, and kept as text when it does not. Header and body bytes are
    /// decoded as lossy UTF-8.
    pub fn parse(raw: RawResponse) -> Self {
        let split = raw.header_size.min(raw.content.len());
        let (head, body) = raw.content.split_at(split);

        let response_headers = String::from_utf8_lossy(head)
            .split('\n')
            .map(|line| line.trim().to_string())
            .collect();

        let body = String::from_utf8_lossy(body).into_owned();
        let response_body = if body.is_empty() {
            ResponseBody::Text(body)
        } else {
            match serde_json::from_str(&body) {
                Ok(value) => ResponseBody::Json(value),
                Err(err) => {
                    tracing::trace!(error = %err, "response body is not JSON, keeping text");
                    ResponseBody::Text(body)
                }
            }
        };

        NinoxResponse {
            header_size: raw.header_size,
            status_code: raw.status,
            response_headers,
            response_body,
        }
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn response_headers(&self) -> &[String] {
        &self.response_headers
    }

    pub fn response_body(&self) -> &ResponseBody {
        &self.response_body
    }

    pub fn into_body(self) -> ResponseBody {
        self.response_body
    }

    /// `true` when the status is 200.
    pub fn is_ok(&self) -> bool {
        self.is_status(200)
    }

    pub fn is_status(&self, expected: u16) -> bool {
        self.status_code == expected
    }

    pub fn needs_throttle(&self) -> bool {
        self.status_code == HTTP_TOO_MANY_REQUESTS
    }

    /// Value of the first `Name: value` header line matching `name`,
    /// compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response_headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// Deserialize the body into `T`. A text body is treated as a JSON
    /// string value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.response_body {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
        };
        serde_json::from_value(value).map_err(NinoxError::Deserialization)
    }
}
