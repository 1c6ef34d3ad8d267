#![doc = include_str!("../README.md")]

pub mod csrf;
pub mod error;
pub mod flow;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod notify;
pub mod oauth;
pub mod session;

// Re-exports for convenient access
pub use csrf::generate_state;
pub use error::Error;
pub use flow::{FlowResult, LoginFlowController};
pub use notify::{
    ClientMetadata, EmailChannel, NotificationChannel, NotificationDispatcher, NotificationEvent,
    NotificationKind, TelegramChannel,
};
pub use oauth::{OAuthClient, OAuthConfig, OAuthExchange, TokenSet};
pub use session::{MemorySession, SessionStore};
