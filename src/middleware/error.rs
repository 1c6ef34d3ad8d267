use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

/// HTTP-boundary errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// OAuth flow failure surfaced on a browser-facing route.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Session cookie mutation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        match self {
            Self::OAuth(ref msg) => {
                let encoded = urlencoding::encode(msg);
                Redirect::to(&format!("/login?error={encoded}")).into_response()
            }
            Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for FlowError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Session(msg) => Self::Store(msg),
            crate::error::Error::Config(msg) => Self::Config(msg),
            other => Self::OAuth(other.to_string()),
        }
    }
}
