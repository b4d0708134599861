//! Error kinds surfaced by the proxy and their HTTP rendering.
//!
//! Handlers return `Result<_, ProxyError>` and let the error bubble up;
//! [`IntoResponse`] turns it into a failure status carrying the usual
//! `{status: "error", message, data}` envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::api::ApiResponse;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Lookup returned nothing
    #[error("{0}")]
    NotFound(String),

    /// Filter value was not a string, number or boolean
    #[error("Unsupported value type for field '{key}': {type_name}")]
    UnsupportedFilterType { key: String, type_name: &'static str },

    /// Request body could not be understood
    #[error("{0}")]
    BadRequest(String),

    /// Transport or HTTP failure reported by Airtable
    #[error("Airtable error{}: {message}", status_suffix(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
        body: Option<JsonValue>,
    },

    /// Client or table handle could not be constructed
    #[error("Airtable configuration error: {0}")]
    Configuration(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl ProxyError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream_transport(err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            status: None,
            message: err.to_string(),
            body: None,
        }
    }

    /// HTTP status this error is rendered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::UnsupportedFilterType { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream { status, .. } => match status {
                // Credential problems belong to the proxy, not the caller
                Some(401) | Some(403) => StatusCode::BAD_GATEWAY,
                Some(code) if (400..500).contains(code) => {
                    StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "Request rejected");
        }

        let message = self.to_string();
        let data = match self {
            ProxyError::Upstream { body, .. } => body,
            _ => None,
        };

        (status, Json(ApiResponse::error(message, data))).into_response()
    }
}
