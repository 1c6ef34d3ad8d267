use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::{REFERER, USER_AGENT};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::SignedCookieJar;
use serde::Deserialize;

use super::config::FlowConfig;
use super::cookies::CookieSession;
use super::error::FlowError;
use super::state::FlowState;
use crate::flow::{FlowResult, LoginFlowController};
use crate::notify::{ClientMetadata, NotificationEvent, NotificationKind, UNKNOWN_USER};
use crate::session::{SessionStore, keys};

/// Create the login flow router.
pub fn auth_routes(config: FlowConfig) -> Router {
    let prefix = config.settings.auth_path.clone();

    let state = FlowState {
        controller: Arc::new(LoginFlowController::new(config.oauth, config.dispatcher)),
        settings: config.settings,
    };

    let mut router = Router::new()
        .route(&format!("{prefix}/login"), post(login))
        .route(&format!("{prefix}/callback"), get(callback))
        .route(&format!("{prefix}/refresh"), post(refresh))
        .route(&format!("{prefix}/logout"), get(logout).post(logout));

    if state.settings.dev_routes_enabled {
        router = router.route(&format!("{prefix}/test-notification"), post(test_notification));
    }

    router.with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    remember_username: bool,
}

async fn login(
    State(state): State<FlowState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<(SignedCookieJar, Redirect), FlowError> {
    let meta = client_metadata(&headers);
    let mut session = CookieSession::new(jar, state.settings.secure_cookies);

    let url = state
        .controller
        .initiate_oauth(&mut session, &form.username, form.remember_username, &meta)
        .await?;

    Ok((session.apply(), Redirect::to(url.as_str())))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback(
    State(state): State<FlowState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<(SignedCookieJar, Redirect), Response> {
    let meta = client_metadata(&headers);
    let mut session = CookieSession::new(jar, state.settings.secure_cookies);
    let username = session
        .get(keys::LOGIN_USERNAME)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_string());

    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth error from provider");
        let event = NotificationEvent::new(NotificationKind::LoginError, &username, meta)
            .with_message(format!("OAuth provider error: {error}: {desc}"));
        state.controller.notifier().dispatch(&event).await;
        return Err(login_error(&state.settings.error_redirect, desc));
    }

    let Some(code) = params.code else {
        tracing::warn!("OAuth callback without authorization code");
        let event = NotificationEvent::new(NotificationKind::LoginError, &username, meta)
            .with_message("OAuth callback missing authorization code");
        state.controller.notifier().dispatch(&event).await;
        return Err(login_error(&state.settings.error_redirect, "missing_code"));
    };

    // A missing state parameter can never match the stored token, so the
    // controller's mismatch path handles it with a single notification.
    let callback_state = params.state.unwrap_or_default();

    let result = state
        .controller
        .complete_callback(&mut session, &code, &callback_state, &meta)
        .await;

    if result.success {
        Ok((session.apply(), Redirect::to(&state.settings.login_redirect)))
    } else {
        Err(login_error(
            &state.settings.error_redirect,
            result.error.as_deref().unwrap_or("login_failed"),
        ))
    }
}

// ── Refresh ────────────────────────────────────────────────────────

async fn refresh(
    State(state): State<FlowState>,
    jar: SignedCookieJar,
    headers: HeaderMap,
) -> (SignedCookieJar, Json<FlowResult>) {
    let meta = client_metadata(&headers);
    let mut session = CookieSession::new(jar, state.settings.secure_cookies);

    let result = state.controller.refresh(&mut session, &meta).await;

    (session.apply(), Json(result))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(
    State(state): State<FlowState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Redirect), FlowError> {
    let mut session = CookieSession::new(jar, state.settings.secure_cookies);
    state.controller.logout(&mut session)?;

    Ok((session.apply(), Redirect::to(&state.settings.logout_redirect)))
}

// ── Test Notification ──────────────────────────────────────────────

async fn test_notification(
    State(state): State<FlowState>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    // Route is only registered when dev_routes_enabled is true
    let meta = client_metadata(&headers);
    let event = NotificationEvent::new(NotificationKind::Test, "test-user", meta)
        .with_detail("environment", "development");
    state.controller.notifier().dispatch(&event).await;

    Json(serde_json::json!({
        "success": true,
        "message": "Test notifications sent",
    }))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(error_redirect: &str, message: &str) -> Response {
    let encoded = urlencoding::encode(message);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}

fn client_metadata(headers: &HeaderMap) -> ClientMetadata {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    ClientMetadata {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(UNKNOWN_USER)
            .to_string(),
        ip: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| header("x-real-ip"))
            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        referer: headers
            .get(REFERER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Direct")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::notify::NotificationDispatcher;
    use crate::oauth::{OAuthClient, OAuthConfig};

    fn test_app() -> Router {
        let oauth = OAuthConfig::new(
            "test-client",
            "https://provider.test/authorize".parse().unwrap(),
            "https://provider.test/token".parse().unwrap(),
            "https://app.test/auth/callback".parse().unwrap(),
        );
        auth_routes(
            FlowConfig::new(OAuthClient::new(oauth), NotificationDispatcher::new())
                .with_secure_cookies(false)
                .with_dev_routes_enabled(true),
        )
    }

    #[tokio::test]
    async fn login_redirects_to_provider_with_state_cookie() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header(
                        header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(Body::from("username=alice&remember_username=true"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://provider.test/authorize?"));
        assert!(location.contains("login_hint=alice"));
        assert!(location.contains("state="));

        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("oauth_state=")));
        assert!(cookies.iter().any(|c| c.starts_with("remembered_username=")));
        assert!(cookies.iter().any(|c| c.contains("HttpOnly")));
    }

    #[tokio::test]
    async fn callback_without_session_redirects_to_error_page() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/auth/callback?code=abc&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("/login?error="));
    }

    #[tokio::test]
    async fn callback_with_provider_error_redirects_without_exchange() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/auth/callback?error=access_denied&error_description=denied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("/login?error="));
    }

    #[tokio::test]
    async fn refresh_without_token_returns_json_failure() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let result: FlowResult = serde_json::from_slice(&body).unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No refresh token available"));
    }

    #[tokio::test]
    async fn logout_redirects_home() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert_eq!(location, "/");
    }

    #[tokio::test]
    async fn test_notification_route_reports_success() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/test-notification")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
    }

    #[test]
    fn client_metadata_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert(USER_AGENT, "curl/8.0".parse().unwrap());

        let meta = client_metadata(&headers);
        assert_eq!(meta.ip, "203.0.113.9");
        assert_eq!(meta.user_agent, "curl/8.0");
        assert_eq!(meta.referer, "Direct");
    }

    #[test]
    fn client_metadata_falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        assert_eq!(client_metadata(&headers).ip, "198.51.100.7");

        assert_eq!(client_metadata(&HeaderMap::new()).ip, "Unknown");
    }
}
