//! 텔레그램 발신자.

use async_trait::async_trait;
use fxpilot_core::TelegramNotifyConfig;
use reqwest::Client;
use serde_json::json;

use crate::error::NotificationError;
use crate::events::PilotEvent;
use crate::traits::NotificationSender;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// 텔레그램 봇 API 발신자.
pub struct TelegramSender {
    client: Client,
    bot_token: String,
    chat_id: String,
    enabled: bool,
    api_base: String,
}

impl TelegramSender {
    /// 설정에서 발신자를 생성합니다.
    pub fn new(config: &TelegramNotifyConfig) -> Self {
        Self {
            client: Client::new(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            enabled: config.enabled && !config.bot_token.is_empty() && !config.chat_id.is_empty(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    /// API 기본 URL을 교체합니다 (테스트용).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    fn name(&self) -> &str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, event: &PilotEvent) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = json!({
            "chat_id": self.chat_id,
            "text": event.summary(),
        });

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NotificationError::Send(format!("{}: {}", status, text)));
        }

        Ok(())
    }
}
