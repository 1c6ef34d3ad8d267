use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Duration;
use url::Url;

use crate::csrf;
use crate::error::Error;
use crate::notify::{
    ClientMetadata, NotificationDispatcher, NotificationEvent, NotificationKind, UNKNOWN_USER,
};
use crate::oauth::{OAuthExchange, TokenSet};
use crate::session::{self, SessionError, SessionStore, keys};

/// Outcome of a callback or refresh operation, safe to show to the end
/// user. Provider error detail never appears here — it goes to tracing
/// and the error notification only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlowResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Orchestrates the authorization-code flow against the session store, the
/// provider exchange, and the notification dispatcher.
///
/// Every externally observable failure dispatches exactly one `LoginError`
/// notification (best-effort) before the failure is reported to the caller.
pub struct LoginFlowController {
    oauth: Arc<dyn OAuthExchange>,
    notifier: NotificationDispatcher,
}

impl LoginFlowController {
    #[must_use]
    pub fn new(oauth: Arc<dyn OAuthExchange>, notifier: NotificationDispatcher) -> Self {
        Self { oauth, notifier }
    }

    /// The injected dispatcher, for callers that emit their own events
    /// (provider-error callbacks, test probes).
    #[must_use]
    pub fn notifier(&self) -> &NotificationDispatcher {
        &self.notifier
    }

    /// Start the flow: remember the username if asked, persist a fresh CSRF
    /// state and the pending username, and return the provider URL the
    /// caller must redirect the user to.
    ///
    /// # Errors
    ///
    /// Re-raises any session-store failure after dispatching a `LoginError`
    /// notification. There is no `success: false` contract here — the
    /// caller must redirect, so a partial failure has to be visible.
    pub async fn initiate_oauth<S: SessionStore>(
        &self,
        session: &mut S,
        username: &str,
        remember_username: bool,
        meta: &ClientMetadata,
    ) -> Result<Url, Error> {
        let attempt = NotificationEvent::new(NotificationKind::LoginAttempt, username, meta.clone())
            .with_detail("remember_username", remember_username);
        self.notifier.dispatch(&attempt).await;

        match self.begin(session, username, remember_username) {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::error!(error = %e, "OAuth initiation failed");
                let event =
                    NotificationEvent::new(NotificationKind::LoginError, username, meta.clone())
                        .with_message(format!("OAuth initiation failed: {e}"));
                self.notifier.dispatch(&event).await;
                Err(e)
            }
        }
    }

    fn begin<S: SessionStore>(
        &self,
        session: &mut S,
        username: &str,
        remember_username: bool,
    ) -> Result<Url, Error> {
        if remember_username && !username.is_empty() {
            session
                .set(keys::REMEMBERED_USERNAME, username, session::LONG_TTL)
                .map_err(session_err)?;
        }

        let state = csrf::generate_state();
        session
            .set(keys::OAUTH_STATE, &state, session::STATE_TTL)
            .map_err(session_err)?;
        session
            .set(keys::LOGIN_USERNAME, username, session::STATE_TTL)
            .map_err(session_err)?;

        let login_hint = (!username.is_empty()).then_some(username);
        Ok(self.oauth.authorization_url(&state, login_hint))
    }

    /// Complete the flow from the provider callback.
    ///
    /// The returned `state` is validated against the stored CSRF state
    /// before any network call; a mismatch rejects the callback outright.
    /// On success the token set is written to the session and the pending
    /// username and state are cleared.
    pub async fn complete_callback<S: SessionStore>(
        &self,
        session: &mut S,
        code: &str,
        state: &str,
        meta: &ClientMetadata,
    ) -> FlowResult {
        let username = pending_username(session);

        if session.get(keys::OAUTH_STATE).as_deref() != Some(state) {
            tracing::warn!(user = %username, "OAuth state mismatch on callback");
            let event =
                NotificationEvent::new(NotificationKind::LoginError, &username, meta.clone())
                    .with_message("Token exchange rejected: OAuth state mismatch")
                    .with_detail("authorization_code", truncate_code(code));
            self.notifier.dispatch(&event).await;
            return FlowResult::failed("Invalid OAuth callback");
        }

        let outcome: Result<TokenSet, Error> = async {
            let tokens = self.oauth.exchange_code(code).await?;
            store_token_set(session, &tokens)?;
            session.delete(keys::LOGIN_USERNAME).map_err(session_err)?;
            session.delete(keys::OAUTH_STATE).map_err(session_err)?;
            Ok(tokens)
        }
        .await;

        match outcome {
            Ok(tokens) => {
                tracing::info!(user = %username, "OAuth login completed");
                let mut event = NotificationEvent::new(
                    NotificationKind::LoginSuccess,
                    &username,
                    meta.clone(),
                )
                .with_detail("token_type", &tokens.token_type);
                if let Some(expires_in) = tokens.expires_in {
                    event = event.with_detail("expires_in", expires_in);
                }
                if let Some(scope) = &tokens.scope {
                    event = event.with_detail("scope", scope);
                }
                self.notifier.dispatch(&event).await;
                FlowResult::ok()
            }
            Err(e) => {
                tracing::error!(error = %e, user = %username, "token exchange failed");
                let event =
                    NotificationEvent::new(NotificationKind::LoginError, &username, meta.clone())
                        .with_message(format!("Token exchange failed: {e}"))
                        .with_detail("authorization_code", truncate_code(code));
                self.notifier.dispatch(&event).await;
                FlowResult::failed("Failed to exchange code for tokens")
            }
        }
    }

    /// Renew the access token from the stored refresh token.
    ///
    /// Without a refresh token this fails locally — no network call is
    /// attempted. The username on notifications falls back to the
    /// remembered username, then "Unknown".
    pub async fn refresh<S: SessionStore>(
        &self,
        session: &mut S,
        meta: &ClientMetadata,
    ) -> FlowResult {
        let username = session
            .get(keys::REMEMBERED_USERNAME)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| UNKNOWN_USER.to_string());

        let Some(refresh_token) = session.get(keys::REFRESH_TOKEN) else {
            let e = Error::MissingRefreshToken;
            let event =
                NotificationEvent::new(NotificationKind::LoginError, &username, meta.clone())
                    .with_message(format!("Token refresh failed: {e}"));
            self.notifier.dispatch(&event).await;
            return FlowResult::failed("No refresh token available");
        };

        let outcome: Result<TokenSet, Error> = async {
            let tokens = self.oauth.exchange_refresh_token(&refresh_token).await?;
            store_token_set(session, &tokens)?;
            Ok(tokens)
        }
        .await;

        match outcome {
            Ok(tokens) => {
                tracing::info!(user = %username, "access token refreshed");
                let mut event = NotificationEvent::new(
                    NotificationKind::TokenRefreshed,
                    &username,
                    meta.clone(),
                );
                if let Some(expires_in) = tokens.expires_in {
                    event = event.with_detail("expires_in", expires_in);
                }
                self.notifier.dispatch(&event).await;
                FlowResult::ok()
            }
            Err(e) => {
                tracing::error!(error = %e, user = %username, "token refresh failed");
                let event =
                    NotificationEvent::new(NotificationKind::LoginError, &username, meta.clone())
                        .with_message(format!("Token refresh failed: {e}"));
                self.notifier.dispatch(&event).await;
                FlowResult::failed("Failed to refresh token")
            }
        }
    }

    /// Clear token and flow state. The remembered username survives so the
    /// login form can pre-fill it next time. No notification is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] when the store cannot record a deletion.
    pub fn logout<S: SessionStore>(&self, session: &mut S) -> Result<(), Error> {
        for key in [
            keys::ACCESS_TOKEN,
            keys::REFRESH_TOKEN,
            keys::LOGIN_USERNAME,
            keys::OAUTH_STATE,
        ] {
            session.delete(key).map_err(session_err)?;
        }
        Ok(())
    }
}

fn pending_username<S: SessionStore>(session: &S) -> String {
    session
        .get(keys::LOGIN_USERNAME)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

fn store_token_set<S: SessionStore>(session: &mut S, tokens: &TokenSet) -> Result<(), Error> {
    let ttl = tokens.expires_in.map_or(session::DEFAULT_ACCESS_TOKEN_TTL, |secs| {
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    });
    session
        .set(keys::ACCESS_TOKEN, &tokens.access_token, ttl)
        .map_err(session_err)?;
    // A response without a refresh token leaves any stored one untouched.
    if let Some(refresh_token) = &tokens.refresh_token {
        session
            .set(keys::REFRESH_TOKEN, refresh_token, session::LONG_TTL)
            .map_err(session_err)?;
    }
    Ok(())
}

fn session_err(e: SessionError) -> Error {
    Error::Session(e.to_string())
}

/// Forensic prefix of an authorization code: first 10 characters plus an
/// ellipsis. The full code never reaches a notification channel.
fn truncate_code(code: &str) -> String {
    let prefix: String = code.chars().take(10).collect();
    format!("{prefix}...")
}
