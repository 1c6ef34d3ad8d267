#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Non-2xx response from the token endpoint during code exchange.
    #[error("token endpoint returned HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },
    /// Non-2xx response from the token endpoint during refresh.
    #[error("token endpoint returned HTTP {status}")]
    TokenRefresh { status: u16 },
    /// Refresh was requested but the session holds no refresh token.
    /// Local precondition failure; no network call is made.
    #[error("No refresh token")]
    MissingRefreshToken,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The session store could not persist a mutation (e.g. the host
    /// environment cannot set cookies). Fatal to the calling operation.
    #[error("session error: {0}")]
    Session(String),
    #[error("configuration error: {0}")]
    Config(String),
}
