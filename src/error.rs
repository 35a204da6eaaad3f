//! Request-level errors and their HTTP mapping.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Errors a relay request can end in. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Bad shared secret")]
    Unauthorized,

    #[error("Bad request: {0}")]
    Decode(String),

    #[error("No chat id given and no default chat configured")]
    MissingChat,

    #[error("Chat client error: {0:#}")]
    Adapter(anyhow::Error),
}

impl RelayError {
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Decode(_) | Self::MissingChat => StatusCode::BAD_REQUEST,
            Self::Adapter(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Unauthorized => warn!("Rejected request with bad shared secret"),
            Self::Decode(reason) => warn!("Could not decode request: {}", reason),
            Self::MissingChat => warn!("Request without chat id and no default chat"),
            Self::Adapter(e) => error!("Chat client failed, relay is unhealthy: {:#}", e),
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
