//! The data shapes delivered by the traffic-capture collaborator.
//!
//! The engine never captures traffic itself — an embedder-owned
//! `TrafficSource` (a browser extension's `webRequest` listener, a proxy, a
//! test fixture) delivers [`CapturedRequest`]/[`CapturedResponse`] pairs
//! keyed by `request_id`. These types are the contract between that
//! collaborator and the engine; nothing in this crate constructs them from
//! a live source.

use std::collections::HashMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A request or response body, as delivered by the capture collaborator.
///
/// Binary bodies (protobuf, gRPC-Web frames) arrive base64-encoded; bodies
/// already known to be text (JSON, SSE, NDJSON) may be delivered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Base64(String),
    Text(String),
}

impl Body {
    /// Decode to raw bytes, base64-decoding if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a [`Body::Base64`] value containing
    /// invalid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Self::Base64(encoded) => base64::engine::general_purpose::STANDARD.decode(encoded),
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Borrow as a `&str`, when this is a text body.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Base64(_) => None,
        }
    }
}

/// One captured HTTP(S) request, as delivered by the traffic collaborator.
///
/// WebSocket/SSE/beacon events are represented with a synthetic request
/// record (a fixed `method`, no body) followed by one or more synthetic
/// [`CapturedResponse`] records carrying the individual frames/messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    /// Collaborator-assigned id for the browsing context the request
    /// originated from (e.g. a browser tab).
    pub tab_id: u64,
    /// Collaborator-assigned id correlating this request with its
    /// eventual [`CapturedResponse`].
    pub request_id: String,
    pub url: String,
    pub method: String,
    /// The origin that initiated the request, when known.
    pub initiator_origin: Option<String>,
    pub request_headers: HashMap<String, String>,
    pub raw_body: Option<Body>,
    pub content_type: Option<String>,
}

/// One captured HTTP(S) response, correlated to its request by
/// `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub request_id: String,
    pub status: u16,
    pub response_headers: HashMap<String, String>,
    pub body: Option<Body>,
    pub content_type: Option<String>,
}
