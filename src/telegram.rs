//! Telegram Bot API client (long polling)

use crate::acl::{User, UserId};
use crate::replies::{Keyboard, Reply};
use crate::runtime::{Inbound, Messenger, MessagingError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, MessagingError> {
        Self::with_base_url(token, API_BASE)
    }

    pub fn with_base_url(token: &str, api_base: &str) -> Result<Self, MessagingError> {
        // Must exceed the long-poll timeout
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MessagingError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, MessagingError> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Network(format!("{method}: {e}")))?;

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| MessagingError::Api(format!("{method}: invalid response: {e}")))?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(MessagingError::Api(format!(
                "{method}: {}",
                description.unwrap_or_else(|| "unknown error".to_string())
            ))),
        }
    }

    /// Identity of the bot itself
    pub async fn get_me(&self) -> Result<TgUser, MessagingError> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, MessagingError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, user: UserId, reply: &Reply) -> Result<(), MessagingError> {
        let body = send_message_body(user, reply, true);
        match self.call::<Value>("sendMessage", &body).await {
            Ok(_) => Ok(()),
            // Titles can contain Markdown control characters
            Err(MessagingError::Api(msg)) if msg.contains("can't parse entities") => {
                tracing::debug!(user_id = %user, "Markdown rejected, resending as plain text");
                let body = send_message_body(user, reply, false);
                self.call::<Value>("sendMessage", &body).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

fn send_message_body(chat_id: UserId, reply: &Reply, markdown: bool) -> Value {
    let mut body = json!({
        "chat_id": chat_id,
        "text": reply.text,
        "disable_web_page_preview": reply.disable_preview,
    });
    if markdown {
        body["parse_mode"] = json!("Markdown");
    }
    match &reply.keyboard {
        Keyboard::Unchanged => {}
        Keyboard::Options(rows) => {
            body["reply_markup"] = json!({
                "keyboard": rows,
                "one_time_keyboard": true,
                "resize_keyboard": true,
                "selective": true,
            });
        }
        Keyboard::Remove => {
            body["reply_markup"] = json!({ "remove_keyboard": true });
        }
    }
    body
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TgUser {
    /// Username, else `first_name [last_name]`
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return username.to_string();
        }
        match self.last_name.as_deref().filter(|l| !l.is_empty()) {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

impl Update {
    /// Text messages from humans; everything else is ignored
    pub fn into_inbound(self) -> Option<Inbound> {
        let message = self.message?;
        let from = message.from.filter(|u| !u.is_bot)?;
        let text = message.text?;
        Some(Inbound {
            user: User::new(from.id, from.display_name()),
            text,
        })
    }
}
