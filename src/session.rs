use std::collections::HashMap;

use time::{Duration, OffsetDateTime};

/// Cookie names used by the login flow.
pub mod keys {
    /// CSRF state round-tripped through the provider redirect.
    pub const OAUTH_STATE: &str = "oauth_state";
    /// Username captured at initiation, consumed by the callback.
    pub const LOGIN_USERNAME: &str = "login_username";
    /// Long-lived username memo for the login form.
    pub const REMEMBERED_USERNAME: &str = "remembered_username";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// TTL for the CSRF state and the pending username (10 minutes).
pub const STATE_TTL: Duration = Duration::minutes(10);
/// TTL for the remembered username and the refresh token (30 days).
pub const LONG_TTL: Duration = Duration::days(30);
/// Access-token TTL when the provider omits `expires_in`.
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::seconds(3600);

/// Store mutation error. Models the host environment's inability to set
/// cookies; always fatal to the calling flow operation.
pub type SessionError = Box<dyn std::error::Error + Send + Sync>;

/// TTL'd key-value session storage, backed by cookies in production.
///
/// Implementations own the cookie policy (http-only, secure, `SameSite=Lax`,
/// path `/`) — it is fixed per store, not per key. All login-flow state goes
/// through this trait, so the controller never touches a request directly.
pub trait SessionStore: Send {
    /// Current value for `key`, if present and unexpired.
    fn get(&self, key: &str) -> Option<String>;

    /// Persist `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error when the mutation cannot be recorded.
    fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError>;

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the mutation cannot be recorded.
    fn delete(&mut self, key: &str) -> Result<(), SessionError>;
}

/// In-process [`SessionStore`] for tests and non-HTTP embeddings.
///
/// Records each entry's TTL so callers can inspect what would have been
/// written to the cookie header.
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: HashMap<String, Entry>,
}

#[derive(Debug)]
struct Entry {
    value: String,
    ttl: Duration,
    expires_at: OffsetDateTime,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL the entry was stored with, if present and unexpired.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|e| e.expires_at > OffsetDateTime::now_utc())
            .map(|e| e.ttl)
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|e| e.expires_at > OffsetDateTime::now_utc())
            .map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl,
                expires_at: OffsetDateTime::now_utc() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}
