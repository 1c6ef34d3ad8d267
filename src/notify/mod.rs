//! Fire-and-forget operational notifications for login lifecycle events.
//!
//! Channels are injected into a [`NotificationDispatcher`] once at startup.
//! Dispatch runs all channels concurrently, awaits completion, and logs
//! failures — a broken channel never surfaces to the calling flow.

mod email;
mod telegram;

pub use email::EmailChannel;
pub use telegram::TelegramChannel;

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Username placeholder when no username is known.
pub const UNKNOWN_USER: &str = "Unknown";

/// Per-request client snapshot attached to every notification for
/// forensic context. Proxy headers are trusted best-effort.
#[derive(Debug, Clone)]
pub struct ClientMetadata {
    pub user_agent: String,
    pub ip: String,
    pub referer: String,
}

impl Default for ClientMetadata {
    fn default() -> Self {
        Self {
            user_agent: UNKNOWN_USER.to_string(),
            ip: UNKNOWN_USER.to_string(),
            referer: "Direct".to_string(),
        }
    }
}

/// Login lifecycle event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    LoginAttempt,
    LoginSuccess,
    LoginError,
    TokenRefreshed,
    /// Dev-only probe to verify channel configuration.
    Test,
}

impl NotificationKind {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::LoginAttempt => "Login Attempt",
            Self::LoginSuccess => "Login Successful",
            Self::LoginError => "Login Error",
            Self::TokenRefreshed => "Token Refreshed",
            Self::Test => "Test Notification",
        }
    }

    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::LoginAttempt => "🔑",
            Self::LoginSuccess => "✅",
            Self::LoginError => "❌",
            Self::TokenRefreshed => "🔄",
            Self::Test => "ℹ️",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::LoginAttempt => "A user is attempting to log in.",
            Self::LoginSuccess => "A user has successfully logged in.",
            Self::LoginError => "A login error occurred.",
            Self::TokenRefreshed => "An access token was refreshed.",
            Self::Test => "This is a test notification from the login system.",
        }
    }
}

/// A single lifecycle event, rendered independently by each channel.
///
/// Details are an ordered list of pairs so rendering is deterministic
/// across channels. Events are never persisted.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub username: String,
    pub message: String,
    pub timestamp: OffsetDateTime,
    pub metadata: ClientMetadata,
    pub details: Vec<(String, String)>,
}

impl NotificationEvent {
    /// Create an event with the kind's default message. An empty username
    /// falls back to [`UNKNOWN_USER`].
    #[must_use]
    pub fn new(kind: NotificationKind, username: &str, metadata: ClientMetadata) -> Self {
        let username = if username.is_empty() {
            UNKNOWN_USER.to_string()
        } else {
            username.to_string()
        };
        Self {
            kind,
            username,
            message: kind.description().to_string(),
            timestamp: OffsetDateTime::now_utc(),
            metadata,
            details: Vec::new(),
        }
    }

    /// Replace the default message (error events carry the error text here).
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Append a detail pair. Order of insertion is the order of rendering.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.details.push((key.into(), value.to_string()));
        self
    }

    pub(crate) fn formatted_timestamp(&self) -> String {
        self.timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Per-channel delivery errors. Isolated inside the dispatcher; never
/// escalated to the flow controller.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
}

/// A notification sink (chat, email, ...). Each channel renders the event
/// into its own representation.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] on transport or API failure; the dispatcher
    /// logs it and moves on.
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), ChannelError>;
}

/// Fan-out over the registered channels.
///
/// Construct once at process start and hand to the flow controller —
/// dependency injection instead of module-level singletons.
#[derive(Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver `event` to every channel concurrently.
    ///
    /// Always resolves: each channel is attempted independently and
    /// failures are logged, not surfaced. Each failure response is still
    /// awaited so no request is left dangling.
    pub async fn dispatch(&self, event: &NotificationEvent) {
        let deliveries = self
            .channels
            .iter()
            .map(|channel| async move { (channel.name(), channel.deliver(event).await) });

        for (name, result) in futures::future::join_all(deliveries).await {
            if let Err(e) = result {
                tracing::warn!(channel = name, error = %e, "notification delivery failed");
            }
        }
    }
}
