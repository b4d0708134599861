//! REST API route definitions
//!
//! Every `/airtable` endpoint answers with the same [`ApiResponse`] envelope.
//! Failures are raised as [`ProxyError`](crate::error::ProxyError) and
//! rendered by its `IntoResponse` impl.

pub mod health;
pub mod orders;
pub mod records;

use axum::Router;
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::AppState;
use crate::error::{ProxyError, ProxyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Uniform response envelope: `{status, message?, data?, count?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: impl Serialize) -> ProxyResult<Self> {
        let data = serde_json::to_value(data)
            .map_err(|e| ProxyError::Configuration(format!("failed to encode response: {e}")))?;
        Ok(Self {
            status: ResponseStatus::Success,
            message: Some(message.into()),
            data: Some(data),
            count: None,
        })
    }

    pub fn error(message: impl Into<String>, data: Option<JsonValue>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: Some(message.into()),
            data,
            count: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Parse a JSON request body; an empty body yields `T::default()`
pub(crate) fn parse_body_or_default<T>(body: &Bytes) -> ProxyResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

/// Parse a JSON request body
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ProxyResult<T> {
    serde_json::from_slice(body).map_err(|e| ProxyError::BadRequest(format!("Invalid request body: {e}")))
}

/// All `/airtable` routes
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(orders::router())
        .merge(records::router())
}
