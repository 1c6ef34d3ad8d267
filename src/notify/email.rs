use async_trait::async_trait;
use serde::Serialize;

use super::{ChannelError, NotificationChannel, NotificationEvent};

const DEFAULT_API_BASE: &str = "https://api.resend.com";
const DELIVERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Resend-style HTTP email channel. Renders each event as a small HTML
/// document and posts it with bearer auth.
pub struct EmailChannel {
    api_key: String,
    sender: String,
    recipient: String,
    api_base: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl EmailChannel {
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            api_key: api_key.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            http,
        }
    }

    /// Override the email API base URL (for testing against a stub server).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn subject(event: &NotificationEvent) -> String {
    format!(
        "{} {}: {}",
        event.kind.marker(),
        event.kind.title(),
        event.username
    )
}

fn render_html(event: &NotificationEvent) -> String {
    let mut html = format!(
        "<h1>{}</h1>\
         <p>{}</p>\
         <p><strong>User:</strong> {}</p>\
         <p><strong>Time:</strong> {}</p>\
         <p><strong>IP:</strong> {}</p>\
         <p><strong>User-Agent:</strong> {}</p>\
         <p><strong>Referer:</strong> {}</p>",
        escape_html(event.kind.title()),
        escape_html(&event.message),
        escape_html(&event.username),
        escape_html(&event.formatted_timestamp()),
        escape_html(&event.metadata.ip),
        escape_html(&event.metadata.user_agent),
        escape_html(&event.metadata.referer),
    );
    if !event.details.is_empty() {
        html.push_str("<h2>Details:</h2><ul>");
        for (key, value) in &event.details {
            html.push_str(&format!(
                "<li><strong>{}:</strong> {}</li>",
                escape_html(key),
                escape_html(value)
            ));
        }
        html.push_str("</ul>");
    }
    html
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), ChannelError> {
        let url = format!("{}/emails", self.api_base);
        let subject = subject(event);
        let html = render_html(event);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SendEmail {
                from: &self.sender,
                to: &self.recipient,
                subject: &subject,
                html: &html,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Api { status, body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ClientMetadata, NotificationKind};

    #[test]
    fn subject_from_kind_and_username() {
        let event = NotificationEvent::new(
            NotificationKind::LoginSuccess,
            "alice",
            ClientMetadata::default(),
        );
        assert_eq!(subject(&event), "✅ Login Successful: alice");
    }

    #[test]
    fn html_lists_details_in_order() {
        let event = NotificationEvent::new(
            NotificationKind::LoginSuccess,
            "alice",
            ClientMetadata::default(),
        )
        .with_detail("token_type", "Bearer")
        .with_detail("expires_in", 3600);

        let html = render_html(&event);
        let token_pos = html.find("token_type").unwrap();
        let expires_pos = html.find("expires_in").unwrap();
        assert!(token_pos < expires_pos);
        assert!(html.contains("<li><strong>token_type:</strong> Bearer</li>"));
    }

    #[test]
    fn html_escapes_interpolated_values() {
        let event = NotificationEvent::new(
            NotificationKind::LoginError,
            "<script>alert(1)</script>",
            ClientMetadata::default(),
        )
        .with_message("error & \"detail\"");

        let html = render_html(&event);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("error &amp; &quot;detail&quot;"));
    }

    #[test]
    fn html_omits_empty_details_section() {
        let event = NotificationEvent::new(
            NotificationKind::LoginAttempt,
            "bob",
            ClientMetadata::default(),
        );
        assert!(!render_html(&event).contains("<h2>Details:</h2>"));
    }
}
