//! Plug-and-play Axum surface for the notified OAuth2 login flow.
//!
//! Mounts the login, callback, refresh, and logout routes over signed
//! session cookies, with notification channels wired from configuration.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use login_herald::middleware::{FlowConfig, auth_routes};
//!
//! // 1. Configure from environment (provider endpoints + channels)
//! let config = FlowConfig::from_env()?;
//!
//! // 2. Mount auth routes
//! let app = axum::Router::new().merge(auth_routes(config));
//! ```

mod config;
mod cookies;
mod error;
mod routes;
mod state;

pub use config::FlowConfig;
pub use cookies::CookieSession;
pub use error::FlowError;
pub use routes::auth_routes;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
