//! Telegram Bot API transport: `getUpdates` long polling in, `sendMessage` out.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use todo_core::dispatch::InboundMessage;
use todo_core::error::AppError;
use todo_core::keyboard::KeyboardDirective;
use todo_core::outbound::{Outbound, OutboundMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LONG_POLL_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = LONG_POLL_TIMEOUT_SECS + 10;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: T,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Default, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Chat {
    id: i64,
}

/// `reply_markup` for a keyboard change, if any.
fn reply_markup(directive: &KeyboardDirective) -> Option<serde_json::Value> {
    match directive {
        KeyboardDirective::Show(rows) => Some(serde_json::json!({
            "keyboard": rows,
            "resize_keyboard": true,
        })),
        KeyboardDirective::Hide => Some(serde_json::json!({ "remove_keyboard": true })),
        KeyboardDirective::None => None,
    }
}

fn send_message_body(message: &OutboundMessage) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": message.chat_id,
        "text": message.text,
    });
    if let Some(markup) = reply_markup(&message.keyboard) {
        body["reply_markup"] = markup;
    }
    body
}

/// Text messages of a batch plus the offset acknowledging all of it.
fn collect_updates(updates: Vec<Update>, offset: i64) -> (Vec<InboundMessage>, i64) {
    let mut next_offset = offset;
    let mut messages = Vec::new();
    for update in updates {
        next_offset = next_offset.max(update.update_id.saturating_add(1));
        let Some(message) = update.message else {
            continue;
        };
        if let Some(text) = message.text {
            messages.push(InboundMessage::new(message.chat.id, text));
        }
    }
    (messages, next_offset)
}

pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| AppError::invalid_input(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn poll_updates(&self, offset: i64) -> Result<(Vec<InboundMessage>, i64), AppError> {
        let url = format!(
            "{}?timeout={}&offset={}",
            self.method_url("getUpdates"),
            LONG_POLL_TIMEOUT_SECS,
            offset
        );
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::io(format!("telegram getUpdates failed: {err}")))?;

        let parsed = res
            .json::<ApiResponse<Vec<Update>>>()
            .await
            .map_err(|err| AppError::invalid_data(format!("telegram getUpdates parse failed: {err}")))?;

        if !parsed.ok {
            return Err(AppError::io(
                parsed
                    .description
                    .unwrap_or_else(|| "telegram getUpdates failed".to_string()),
            ));
        }

        Ok(collect_updates(parsed.result, offset))
    }
}

#[async_trait]
impl Outbound for TelegramClient {
    async fn send(&self, message: &OutboundMessage) -> Result<(), AppError> {
        let res = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&send_message_body(message))
            .send()
            .await
            .map_err(|err| AppError::send(format!("telegram sendMessage failed: {err}")))?;

        let parsed = res
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .map_err(|err| {
                AppError::send(format!("telegram sendMessage response parse failed: {err}"))
            })?;

        if !parsed.ok {
            return Err(AppError::send(
                parsed
                    .description
                    .unwrap_or_else(|| "telegram sendMessage failed".to_string()),
            ));
        }
        Ok(())
    }
}

/// Long-polls for updates and forwards text messages until cancelled.
pub async fn poll_inbound(
    client: Arc<TelegramClient>,
    inbound: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) {
    let mut offset = 0i64;
    info!("telegram polling started");

    loop {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            polled = client.poll_updates(offset) => polled,
        };

        match polled {
            Ok((messages, next_offset)) => {
                offset = next_offset;
                debug!(count = messages.len(), offset, "updates received");
                for message in messages {
                    if inbound.send(message).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "telegram polling failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    info!("telegram polling stopped");
}
