use async_trait::async_trait;
use serde::Serialize;

use super::{ChannelError, NotificationChannel, NotificationEvent};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DELIVERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Telegram Bot API channel. Posts a plain-text `sendMessage` to a fixed
/// chat for every event.
pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    api_base: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramChannel {
    #[must_use]
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            http,
        }
    }

    /// Override the Bot API base URL (for testing against a stub server).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

fn render_text(event: &NotificationEvent) -> String {
    let mut text = format!(
        "{} {}: {}\n\n{}\n\nUser: {}\nTime: {}\nIP: {}\nUser-Agent: {}\nReferer: {}",
        event.kind.marker(),
        event.kind.title(),
        event.username,
        event.message,
        event.username,
        event.formatted_timestamp(),
        event.metadata.ip,
        event.metadata.user_agent,
        event.metadata.referer,
    );
    if !event.details.is_empty() {
        text.push_str("\n\nDetails:");
        for (key, value) in &event.details {
            text.push_str(&format!("\n- {key}: {value}"));
        }
    }
    text
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<(), ChannelError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let text = render_text(event);
        let response = self
            .http
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &text,
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
