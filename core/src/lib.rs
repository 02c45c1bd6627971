//! Blocking client for the Ninox database REST API.
//!
//! # Overview
//! Maps one method per REST endpoint (teams → databases → tables → records)
//! onto a single shared path: build the URL, send it through a `Transport`,
//! parse the reply into a `NinoxResponse` envelope.
//!
//! # Design
//! - Paths are templates with `{TEAM_ID}` / `{DATABASE_ID}` placeholders,
//!   filled from the call's `Scope` or, failing that, the fixed
//!   `SharedScope` all clients in a process share by default.
//! - The network sits behind the `Transport` trait. `UreqTransport` (feature
//!   `ureq`, on by default) is the real one; tests plug in their own.
//! - Every HTTP status is a successful call. Only a failed round-trip is an
//!   error.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod response;
pub mod scope;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;

pub use client::{normalize_upserts, NinoxClient, VERSION};
pub use config::{ClientOptions, API_KEY_ENV, DEFAULT_HOST};
pub use error::{NinoxError, Result};
pub use http::{HttpMethod, HttpRequest, RawResponse, Transport, TransportOptions};
pub use response::{NinoxResponse, ResponseBody};
pub use scope::SharedScope;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{QueryParams, Scope};
