use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// Bounded timeout for token-endpoint calls. A hung provider must not
/// block a login request indefinitely.
const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

/// `OAuth2` provider configuration.
///
/// Required fields are constructor parameters — no runtime "missing field" errors.
///
/// ```rust,ignore
/// use login_herald::OAuthConfig;
///
/// let config = OAuthConfig::new(
///     "my-client-id",
///     "https://provider.example.com/oauth/authorize".parse()?,
///     "https://provider.example.com/oauth/token".parse()?,
///     "https://my-app.com/auth/callback".parse()?,
/// );
/// // Optional overrides via chaining:
/// let config = config.with_scopes(vec!["openid".into(), "profile".into()]);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new `OAuth2` configuration.
    ///
    /// Required fields are parameters — compile-time enforcement, no `Result`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, auth_url: Url, token_url: Url, redirect_uri: Url) -> Self {
        Self {
            client_id: client_id.into(),
            auth_url,
            token_url,
            redirect_uri,
            scopes: vec!["openid".into()],
        }
    }

    /// Override the `OAuth2` scopes (default: `["openid"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorization endpoint URL.
    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Token exchange endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// `OAuth2` redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Requested `OAuth2` scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Token response from the provider's token endpoint.
///
/// `access_token` is required: a success response without one fails
/// deserialization and surfaces as an error to the caller.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// The two provider exchanges plus authorization-URL construction.
///
/// [`OAuthClient`] is the production implementation; the seam exists so the
/// flow controller can be driven against a scripted provider in tests.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    /// Build the provider authorization URL for a redirect. Pure; no I/O.
    fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> Url;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, Error>;

    /// Exchange a refresh token for a fresh token set.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, Error>;
}

/// `OAuth2` authorization-code client.
///
/// Both exchanges are single-shot network calls with no retry; the caller
/// decides retry policy.
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Create a new client with a bounded request timeout.
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration");
        Self { config, http }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

#[async_trait]
impl OAuthExchange for OAuthClient {
    fn authorization_url(&self, state: &str, login_hint: Option<&str>) -> Url {
        let scope = self.config.scopes.join(" ");
        let mut url = self.config.auth_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", self.config.redirect_uri.as_str())
                .append_pair("scope", &scope)
                .append_pair("state", state);
            if let Some(hint) = login_hint {
                pairs.append_pair("login_hint", hint);
            }
        }
        url
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or timeout, or
    /// [`Error::TokenExchange`] on a non-2xx response.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenExchange { status, body });
        }
        response.json::<TokenSet>().await.map_err(Into::into)
    }

    /// Exchange a refresh token for a fresh token set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or timeout, or
    /// [`Error::TokenRefresh`] on a non-2xx response.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::TokenRefresh {
                status: response.status().as_u16(),
            });
        }
        response.json::<TokenSet>().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "test-client",
            "https://provider.test/oauth/authorize".parse().unwrap(),
            "https://provider.test/oauth/token".parse().unwrap(),
            "https://app.test/auth/callback".parse().unwrap(),
        )
    }

    #[test]
    fn test_authorization_url_parameters() {
        let client = OAuthClient::new(test_config());
        let url = client.authorization_url("state-123", None);

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "test-client");
        assert_eq!(params["redirect_uri"], "https://app.test/auth/callback");
        assert_eq!(params["scope"], "openid");
        assert_eq!(params["state"], "state-123");
        assert!(!params.contains_key("login_hint"));
    }

    #[test]
    fn test_authorization_url_with_login_hint() {
        let client = OAuthClient::new(test_config());
        let url = client.authorization_url("state-123", Some("alice"));

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["login_hint"], "alice");
    }

    #[test]
    fn test_authorization_url_joins_scopes() {
        let config = test_config().with_scopes(vec!["openid".into(), "profile".into()]);
        let client = OAuthClient::new(config);
        let url = client.authorization_url("s", None);

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["scope"], "openid profile");
    }

    #[test]
    fn test_config_constructor() {
        let config = test_config();
        assert_eq!(config.client_id(), "test-client");
        assert_eq!(
            config.token_url().as_str(),
            "https://provider.test/oauth/token"
        );
        assert_eq!(config.scopes(), &["openid"]);
    }

    #[test]
    fn test_token_set_optional_fields() {
        let tokens: TokenSet =
            serde_json::from_str(r#"{"access_token":"AT1","token_type":"Bearer"}"#).unwrap();
        assert_eq!(tokens.access_token, "AT1");
        assert_eq!(tokens.expires_in, None);
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.scope, None);
    }

    #[test]
    fn test_token_set_requires_access_token() {
        let result = serde_json::from_str::<TokenSet>(r#"{"token_type":"Bearer"}"#);
        assert!(result.is_err(), "missing access_token must be a hard error");
    }
}
