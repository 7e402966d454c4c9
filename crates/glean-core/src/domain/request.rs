//! Upload requests
//!
//! A [`PingRequest`] is the wire form of an assembled ping: path, body and
//! headers. Requests are built once at assembly time and persisted, so the
//! headers reflect the debug and source tags in effect at that moment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::ping::DELETION_REQUEST_PING_NAME;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const TELEMETRY_AGENT_HEADER: &str = "X-Telemetry-Agent";
pub const DEBUG_ID_HEADER: &str = "X-Debug-ID";
pub const SOURCE_TAGS_HEADER: &str = "X-Source-Tags";
pub const DATE_HEADER: &str = "Date";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Schema version in the submission path
pub const PING_SCHEMA_VERSION: u32 = 1;

/// Submission path `/submit/{namespace}/{ping}/1/{document_id}`
pub fn submission_path(namespace: &str, ping_name: &str, document_id: &str) -> String {
    format!("/submit/{namespace}/{ping_name}/{PING_SCHEMA_VERSION}/{document_id}")
}

/// RFC 7231 value for the `Date` header
pub fn date_header_value(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %T GMT").to_string()
}

/// An assembled ping ready to be handed to an uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    pub document_id: String,
    pub ping_name: String,
    pub path: String,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    pub body_has_info_sections: bool,
}

impl PingRequest {
    /// Starts a builder with the default headers
    ///
    /// # Arguments
    ///
    /// * `language_binding_name` - Reported in `X-Telemetry-Agent`
    /// * `max_body_size` - Bodies larger than this are rejected by `build`
    pub fn builder(language_binding_name: &str, max_body_size: usize) -> PingRequestBuilder {
        PingRequestBuilder::new(language_binding_name, max_body_size)
    }

    pub fn is_deletion_request(&self) -> bool {
        self.ping_name == DELETION_REQUEST_PING_NAME
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Body parsed as JSON, if it is valid JSON
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Pretty-printed body, used when ping logging is enabled
    pub fn pretty_body(&self) -> Option<String> {
        self.body_json()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
    }
}

/// Builder for [`PingRequest`]
#[derive(Debug)]
pub struct PingRequestBuilder {
    document_id: Option<String>,
    ping_name: Option<String>,
    path: Option<String>,
    body: Option<Vec<u8>>,
    headers: BTreeMap<String, String>,
    body_has_info_sections: bool,
    max_body_size: usize,
}

impl PingRequestBuilder {
    pub fn new(language_binding_name: &str, max_body_size: usize) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string());
        headers.insert(
            TELEMETRY_AGENT_HEADER.to_string(),
            format!(
                "Glean/{} ({} on {})",
                env!("CARGO_PKG_VERSION"),
                language_binding_name,
                std::env::consts::OS
            ),
        );
        Self {
            document_id: None,
            ping_name: None,
            path: None,
            body: None,
            headers,
            body_has_info_sections: true,
            max_body_size,
        }
    }

    pub fn document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    pub fn ping_name(mut self, name: impl Into<String>) -> Self {
        self.ping_name = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body_has_info_sections(mut self, has: bool) -> Self {
        self.body_has_info_sections = has;
        self
    }

    /// Finishes the request
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IncompleteRequest` when a required field is
    /// missing, or `DomainError::PingBodyOverflow` when the body is too large.
    pub fn build(self) -> Result<PingRequest, DomainError> {
        let body = self.body.ok_or(DomainError::IncompleteRequest("body"))?;
        if body.len() > self.max_body_size {
            return Err(DomainError::PingBodyOverflow {
                size: body.len(),
                max: self.max_body_size,
            });
        }
        Ok(PingRequest {
            document_id: self
                .document_id
                .ok_or(DomainError::IncompleteRequest("document_id"))?,
            ping_name: self
                .ping_name
                .ok_or(DomainError::IncompleteRequest("ping_name"))?,
            path: self.path.ok_or(DomainError::IncompleteRequest("path"))?,
            body,
            headers: self.headers,
            body_has_info_sections: self.body_has_info_sections,
        })
    }
}
