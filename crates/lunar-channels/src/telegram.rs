// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, warn};

use crate::channel::{Channel, ChatType, Envelope, InboundHandler};

const TELEGRAM_MAX_LEN: usize = 4096;
const POLL_TIMEOUT_SECS: u64 = 30;

/// Long-poll connector for the Telegram Bot API. Authenticates with a bot
/// token supplied at construction and produces one [`Envelope`] per text
/// update it receives.
pub struct TelegramChannel {
    token: String,
    client: reqwest::Client,
    running: Arc<AtomicBool>,
    offset: Arc<AtomicI64>,
}

impl TelegramChannel {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::Client::new(),
            running: Arc::new(AtomicBool::new(false)),
            offset: Arc::new(AtomicI64::new(0)),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    async fn get_updates(&self) -> anyhow::Result<Vec<TelegramUpdate>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let resp: TelegramUpdatesResponse = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[("timeout", POLL_TIMEOUT_SECS.to_string()), ("offset", offset.to_string())])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.result)
    }

    async fn set_typing(&self, chat_id: i64) {
        let _ = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&serde_json::json!({ "chat_id": chat_id, "action": "typing" }))
            .send()
            .await;
    }

    async fn send_reply(&self, chat_id: i64, text: &str) {
        for chunk in crate::channel::split_reply(text, TELEGRAM_MAX_LEN) {
            let result = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&serde_json::json!({ "chat_id": chat_id, "text": chunk }))
                .send()
                .await;
            if let Err(e) = result {
                error!(error = %e, "failed to send telegram reply chunk");
            }
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self, on_message: InboundHandler) -> anyhow::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            let updates = match self.get_updates().await {
                Ok(u) => u,
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed, retrying");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
            };

            for update in updates {
                self.offset.store(update.update_id + 1, Ordering::SeqCst);
                let Some(message) = update.message else { continue };
                let Some(text) = message.text else { continue };
                let chat_id = message.chat.id;
                let chat_type = if message.chat.chat_type.as_deref() == Some("private") { ChatType::Direct } else { ChatType::Group };

                self.set_typing(chat_id).await;
                let envelope = Envelope::new("telegram", chat_id.to_string(), text, chat_type);
                match on_message(envelope).await {
                    Ok(reply) => self.send_reply(chat_id, &reply).await,
                    Err(e) => {
                        error!(error = %e, "agent loop failed for telegram update");
                        self.send_reply(chat_id, "Sorry, something went wrong.").await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUpdatesResponse {
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    text: Option<String>,
    chat: TelegramChat,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    #[serde(rename = "type")]
    chat_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_embeds_token_and_method() {
        let channel = TelegramChannel::new("abc123");
        assert_eq!(channel.api_url("getUpdates"), "https://api.telegram.org/botabc123/getUpdates");
    }

    #[tokio::test]
    async fn stop_before_start_is_a_safe_no_op() {
        let channel = TelegramChannel::new("abc123");
        channel.stop().await.unwrap();
        assert!(!channel.running.load(Ordering::SeqCst));
    }
}
