use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::FlowSettings;
use crate::flow::LoginFlowController;

/// Shared state for auth route handlers.
#[derive(Clone)]
pub(super) struct FlowState {
    pub(super) controller: Arc<LoginFlowController>,
    pub(super) settings: FlowSettings,
}

// SignedCookieJar requires Key to be extractable from state
impl FromRef<FlowState> for Key {
    fn from_ref(state: &FlowState) -> Self {
        state.settings.cookie_key.clone()
    }
}
