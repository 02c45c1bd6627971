//! Blocking client for the Ninox REST API.
//!
//! # Design
//! Every endpoint method is the same three steps: pick a path template, build
//! the URL with `build_url`, and hand it to `make_request`. The template may
//! contain `{TEAM_ID}` and `{DATABASE_ID}`; `build_url` fills them from the
//! call's own `Scope` first and from the client's fixed `SharedScope` second,
//! and leaves a placeholder untouched when neither has a value.
//!
//! The per-call scope is an argument, never client state, so it cannot leak
//! into the next call. The fixed scope is shared (see `scope.rs`).
//!
//! HTTP status codes are data: a 404 or 429 comes back as a `NinoxResponse`.
//! Only a failed round-trip is an `Err`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientOptions;
use crate::error::{NinoxError, Result};
use crate::http::{HttpMethod, HttpRequest, Transport, TransportOptions};
use crate::response::NinoxResponse;
use crate::scope::SharedScope;
use crate::types::{QueryParams, Scope, QUERY_FILTERS};

/// Version announced in the default `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) const TEAM_ID_VAR: &str = "{TEAM_ID}";
pub(crate) const DATABASE_ID_VAR: &str = "{DATABASE_ID}";

/// Client for one Ninox account.
///
/// Host, default headers and version prefix are fixed at construction. The
/// transport options can be replaced with `set_transport_options`.
pub struct NinoxClient {
    host: String,
    headers: Vec<(String, String)>,
    version: Option<String>,
    transport_options: TransportOptions,
    fixed: SharedScope,
    transport: Arc<dyn Transport>,
}

impl NinoxClient {
    /// Client over HTTPS using the process-wide fixed scope.
    ///
    /// A non-empty `fixed_team` becomes the fixed team for every client in
    /// the process; `None` leaves the current fixed team alone.
    #[cfg(feature = "ureq")]
    pub fn new(api_key: &str, options: ClientOptions, fixed_team: Option<&str>) -> Self {
        Self::with_transport(
            api_key,
            options,
            fixed_team,
            Arc::new(crate::transport::UreqTransport::new()),
        )
    }

    pub fn with_transport(
        api_key: &str,
        options: ClientOptions,
        fixed_team: Option<&str>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::from_parts(api_key, options, fixed_team, transport, SharedScope::global())
    }

    /// Client over an explicit transport and fixed scope. Clients built over
    /// clones of the same `SharedScope` share their fixed team and database.
    pub fn from_parts(
        api_key: &str,
        options: ClientOptions,
        fixed_team: Option<&str>,
        transport: Arc<dyn Transport>,
        fixed: SharedScope,
    ) -> Self {
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            (
                "User-Agent".to_string(),
                format!("ninox-rust-client/{VERSION};rust"),
            ),
            ("Accept".to_string(), "application/json".to_string()),
        ];

        if let Some(team) = fixed_team.filter(|t| !t.is_empty()) {
            fixed.set_team(Some(team));
        }

        Self {
            host: options.host,
            headers,
            version: options.version,
            transport_options: options.transport,
            fixed,
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    pub fn fixed_scope(&self) -> &SharedScope {
        &self.fixed
    }

    /// Fix the team for every later call of every client sharing this
    /// client's fixed scope. `None` clears it.
    pub fn set_fix_team(&self, team: Option<&str>) {
        self.fixed.set_team(team);
    }

    /// Fix the database for every later call of every client sharing this
    /// client's fixed scope. `None` clears it.
    pub fn set_fix_database(&self, database: Option<&str>) {
        self.fixed.set_database(database);
    }

    /// Replace the caller's transport overrides.
    pub fn set_transport_options(&mut self, options: TransportOptions) -> &mut Self {
        self.transport_options = options;
        self
    }

    /// Absolute URL for `path`: host, version prefix, path with team and
    /// database placeholders filled in, then the query string.
    pub fn build_url(&self, path: &str, query: Option<&QueryParams>, scope: &Scope) -> String {
        let mut path = path.to_string();
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            path.push('?');
            path.push_str(&query.encode());
        }

        let resolved = scope.resolve(&self.fixed.snapshot());
        if let Some(team) = &resolved.team {
            path = path.replace(TEAM_ID_VAR, &encode_segment(team));
        }
        if let Some(database) = &resolved.database {
            path = path.replace(DATABASE_ID_VAR, &encode_segment(database));
        }

        format!("{}{}{}", self.host, self.version.as_deref().unwrap_or(""), path)
    }

    /// Assemble a request without sending it: default headers, then
    /// `extra_headers`, then `Content-Type` when a body is present.
    pub fn build_request(
        &self,
        method: impl Into<HttpMethod>,
        url: &str,
        body: Option<&Value>,
        extra_headers: Option<&[(String, String)]>,
    ) -> Result<HttpRequest> {
        let method = method.into();
        let mut headers = self.headers.clone();
        if let Some(extra) = extra_headers {
            headers.extend_from_slice(extra);
        }

        let body = match body {
            Some(value) => {
                let encoded = serde_json::to_string(value).map_err(NinoxError::Serialization)?;
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(encoded)
            }
            None => None,
        };

        let options = TransportOptions::layered(&method, &self.transport_options);
        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
            options,
        })
    }

    /// Send one request and parse whatever comes back.
    pub fn make_request(
        &self,
        method: impl Into<HttpMethod>,
        url: &str,
        body: Option<&Value>,
        extra_headers: Option<&[(String, String)]>,
    ) -> Result<NinoxResponse> {
        let request = self.build_request(method, url, body, extra_headers)?;
        debug!(method = %request.method, url = %request.url, "sending Ninox request");

        let raw = self.transport.execute(&request).inspect_err(|err| {
            warn!(method = %request.method, url = %request.url, error = %err, "Ninox request failed");
        })?;

        let response = NinoxResponse::parse(raw);
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status_code(),
            header_size = response.header_size(),
            "received Ninox response"
        );
        Ok(response)
    }

    pub fn list_teams(&self) -> Result<NinoxResponse> {
        let url = self.build_url("/teams", None, &Scope::default());
        self.make_request(HttpMethod::Get, &url, None, None)
    }

    pub fn list_databases(&self, team: Option<&str>) -> Result<NinoxResponse> {
        let path = format!("/teams/{}/databases", TEAM_ID_VAR);
        let url = self.build_url(&path, None, &Scope::new(team, None));
        self.make_request(HttpMethod::Get, &url, None, None)
    }

    pub fn list_tables(&self, database: Option<&str>, team: Option<&str>) -> Result<NinoxResponse> {
        let path = format!("{}/tables", database_path());
        let url = self.build_url(&path, None, &Scope::new(team, database));
        self.make_request(HttpMethod::Get, &url, None, None)
    }

    /// Records of a table. A `filters` value is sent JSON-encoded as the
    /// `filters` query parameter, replacing one already in `query`.
    pub fn query_records(
        &self,
        table: &str,
        query: Option<&QueryParams>,
        filters: Option<&Value>,
        database: Option<&str>,
        team: Option<&str>,
    ) -> Result<NinoxResponse> {
        let mut params = query.cloned().unwrap_or_default();
        if let Some(filters) = filters {
            let encoded = serde_json::to_string(filters).map_err(NinoxError::Serialization)?;
            params.insert(QUERY_FILTERS, encoded);
        }

        let url = self.build_url(&records_path(table), Some(&params), &Scope::new(team, database));
        self.make_request(HttpMethod::Get, &url, None, None)
    }

    pub fn get_record(
        &self,
        table: &str,
        record_id: impl fmt::Display,
        database: Option<&str>,
        team: Option<&str>,
    ) -> Result<NinoxResponse> {
        let url = self.build_url(&record_path(table, record_id), None, &Scope::new(team, database));
        self.make_request(HttpMethod::Get, &url, None, None)
    }

    /// Files attached to a record.
    pub fn list_record_files(
        &self,
        table: &str,
        record_id: impl fmt::Display,
        database: Option<&str>,
        team: Option<&str>,
    ) -> Result<NinoxResponse> {
        let path = format!("{}/files", record_path(table, record_id));
        let url = self.build_url(&path, None, &Scope::new(team, database));
        self.make_request(HttpMethod::Get, &url, None, None)
    }

    pub fn delete_record(
        &self,
        table: &str,
        record_id: impl fmt::Display,
        database: Option<&str>,
        team: Option<&str>,
    ) -> Result<NinoxResponse> {
        let url = self.build_url(&record_path(table, record_id), None, &Scope::new(team, database));
        self.make_request(HttpMethod::Delete, &url, None, None)
    }

    /// Insert or update records. `upserts` may be one record object or an
    /// array of them; see [`normalize_upserts`].
    pub fn upsert_records(
        &self,
        table: &str,
        upserts: Value,
        database: Option<&str>,
        team: Option<&str>,
    ) -> Result<NinoxResponse> {
        let batch = Value::Array(normalize_upserts(upserts));
        let url = self.build_url(&records_path(table), None, &Scope::new(team, database));
        self.make_request(HttpMethod::Post, &url, Some(&batch), None)
    }

    /// `true` when listing teams answers 200. A failed round-trip counts as
    /// an invalid key.
    pub fn validate_key(&self) -> bool {
        match self.list_teams() {
            Ok(response) => response.is_ok(),
            Err(err) => {
                debug!(error = %err, "key validation could not reach the API");
                false
            }
        }
    }
}

impl fmt::Debug for NinoxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NinoxClient")
            .field("host", &self.host)
            .field("version", &self.version)
            .field("transport_options", &self.transport_options)
            .field("fixed", &self.fixed.snapshot())
            .finish_non_exhaustive()
    }
}

/// Batch for an upsert: an object becomes a one-element batch, an array is
/// sent as is, anything else becomes an empty batch.
pub fn normalize_upserts(upserts: Value) -> Vec<Value> {
    match upserts {
        Value::Array(records) => records,
        record @ Value::Object(_) => vec![record],
        _ => Vec::new(),
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

fn database_path() -> String {
    format!("/teams/{}/databases/{}", TEAM_ID_VAR, DATABASE_ID_VAR)
}

fn records_path(table: &str) -> String {
    format!("{}/tables/{}/records", database_path(), encode_segment(table))
}

fn record_path(table: &str, record_id: impl fmt::Display) -> String {
    format!(
        "{}/{}",
        records_path(table),
        encode_segment(&record_id.to_string())
    )
}
