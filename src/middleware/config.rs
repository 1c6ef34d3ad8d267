use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::FlowError;
use crate::notify::{EmailChannel, NotificationDispatcher, TelegramChannel};
use crate::oauth::{OAuthClient, OAuthConfig, OAuthExchange};

/// Shared flow settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct FlowSettings {
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
    pub(crate) dev_routes_enabled: bool,
}

impl FlowSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            secure_cookies: true,
            auth_path: "/auth".into(),
            login_redirect: "/".into(),
            logout_redirect: "/".into(),
            error_redirect: "/login".into(),
            dev_routes_enabled: false,
        }
    }
}

/// Login flow configuration: provider exchange + notification channels +
/// cookie/routing settings.
///
/// Required collaborators are constructor parameters — no runtime "missing
/// field" errors. Use [`from_env()`](FlowConfig::from_env) for
/// convention-based setup, or [`new()`](FlowConfig::new) with `with_*`
/// methods for full control.
pub struct FlowConfig {
    pub(super) oauth: Arc<dyn OAuthExchange>,
    pub(super) dispatcher: NotificationDispatcher,
    pub(super) settings: FlowSettings,
}

impl FlowConfig {
    /// Create config with the required exchange client and dispatcher.
    ///
    /// All optional fields use sensible defaults. Override with `with_*` methods.
    #[must_use]
    pub fn new(oauth: impl OAuthExchange + 'static, dispatcher: NotificationDispatcher) -> Self {
        Self {
            oauth: Arc::new(oauth),
            dispatcher,
            settings: FlowSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OAUTH_CLIENT_ID`: OAuth2 client ID
    /// - `OAUTH_REDIRECT_URI`: OAuth2 callback URI (must be a valid URL)
    /// - `OAUTH_AUTH_URL`: provider authorization endpoint
    /// - `OAUTH_TOKEN_URL`: provider token endpoint
    ///
    /// # Optional env vars
    /// - `OAUTH_SCOPES`: comma-separated OAuth2 scopes
    /// - `TELEGRAM_BOT_TOKEN` + `TELEGRAM_CHAT_ID`: register the Telegram channel
    /// - `RESEND_API_KEY` + `EMAIL_SENDER` + `EMAIL_RECIPIENT`: register the email channel
    /// - `COOKIE_KEY`: cookie signing key bytes
    /// - `DEV_AUTH`: set to `"1"` or `"true"` to enable the test-notification
    ///   route and disable secure cookies
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, FlowError> {
        let client_id = required_var("OAUTH_CLIENT_ID")?;
        let redirect_uri = required_url("OAUTH_REDIRECT_URI")?;
        let auth_url = required_url("OAUTH_AUTH_URL")?;
        let token_url = required_url("OAUTH_TOKEN_URL")?;

        let mut oauth_config = OAuthConfig::new(client_id, auth_url, token_url, redirect_uri);
        if let Ok(scopes) = std::env::var("OAUTH_SCOPES") {
            oauth_config =
                oauth_config.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }

        let mut dispatcher = NotificationDispatcher::new();
        if let (Ok(bot_token), Ok(chat_id)) = (
            std::env::var("TELEGRAM_BOT_TOKEN"),
            std::env::var("TELEGRAM_CHAT_ID"),
        ) {
            dispatcher = dispatcher.with_channel(Arc::new(TelegramChannel::new(bot_token, chat_id)));
        }
        if let (Ok(api_key), Ok(sender), Ok(recipient)) = (
            std::env::var("RESEND_API_KEY"),
            std::env::var("EMAIL_SENDER"),
            std::env::var("EMAIL_RECIPIENT"),
        ) {
            dispatcher =
                dispatcher.with_channel(Arc::new(EmailChannel::new(api_key, sender, recipient)));
        }
        if dispatcher.channel_count() == 0 {
            tracing::warn!("no notification channels configured; events will only be logged");
        }

        let dev_auth = matches!(std::env::var("DEV_AUTH").as_deref(), Ok("1") | Ok("true"));

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                FlowError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(Self::new(OAuthClient::new(oauth_config), dispatcher)
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth)
            .with_dev_routes_enabled(dev_auth))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_dev_routes_enabled(mut self, enabled: bool) -> Self {
        self.settings.dev_routes_enabled = enabled;
        self
    }
}

fn required_var(name: &'static str) -> Result<String, FlowError> {
    std::env::var(name).map_err(|_| FlowError::Config(format!("{name} is required")))
}

fn required_url(name: &'static str) -> Result<Url, FlowError> {
    required_var(name)?
        .parse()
        .map_err(|e| FlowError::Config(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> FlowConfig {
        let oauth = OAuthConfig::new(
            "client",
            "https://provider.test/authorize".parse().unwrap(),
            "https://provider.test/token".parse().unwrap(),
            "https://app.test/auth/callback".parse().unwrap(),
        );
        FlowConfig::new(OAuthClient::new(oauth), NotificationDispatcher::new())
    }

    #[test]
    fn defaults() {
        let config = test_config();
        assert!(config.settings.secure_cookies);
        assert_eq!(config.settings.auth_path, "/auth");
        assert_eq!(config.settings.error_redirect, "/login");
        assert!(!config.settings.dev_routes_enabled);
    }

    #[test]
    fn builder_overrides() {
        let config = test_config()
            .with_auth_path("/api/auth")
            .with_secure_cookies(false)
            .with_login_redirect("/dashboard")
            .with_dev_routes_enabled(true);
        assert_eq!(config.settings.auth_path, "/api/auth");
        assert!(!config.settings.secure_cookies);
        assert_eq!(config.settings.login_redirect, "/dashboard");
        assert!(config.settings.dev_routes_enabled);
    }
}
