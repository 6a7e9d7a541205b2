// Telegram Bot API 客户端

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::messenger::MessageChannel;
use super::types::{Message, OutgoingMessage, TelegramResponse, Update};
use crate::config::TelegramConfig;
use crate::error::{BeaconError, BeaconResult};

/// 编辑内容与原消息相同时 Telegram 返回的错误描述
const NOT_MODIFIED: &str = "message is not modified";

/// Telegram Bot API 客户端
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    /// https://api.telegram.org/bot<token>
    base_url: String,
    /// getUpdates 长轮询超时（秒）
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> BeaconResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BeaconError::Config(format!("failed to build Telegram client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    /// 调用 Bot API 方法
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> BeaconResult<T> {
        let url = format!("{}/{}", self.base_url, method);

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| BeaconError::Delivery(format!("{} request failed: {}", method, e)))?;

        // 4xx 也会带 JSON 描述，先解析再判断
        let parsed: TelegramResponse<T> = resp
            .json()
            .await
            .map_err(|e| BeaconError::Delivery(format!("{} decode failed: {}", method, e)))?;

        if !parsed.ok {
            let description = parsed
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(BeaconError::Delivery(format!(
                "{} rejected ({}): {}",
                method,
                parsed.error_code.unwrap_or_default(),
                description
            )));
        }

        parsed
            .result
            .ok_or_else(|| BeaconError::Delivery(format!("{} returned no result", method)))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// 长轮询获取更新
    pub async fn get_updates(&self, offset: i64) -> BeaconResult<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });

        // 请求超时要比长轮询超时长
        let timeout = Duration::from_secs(self.poll_timeout_secs + 10);
        self.call("getUpdates", &body, timeout).await
    }
}

#[async_trait]
impl MessageChannel for TelegramClient {
    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> BeaconResult<i64> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": message.text,
        });
        if message.html {
            body["parse_mode"] = json!("HTML");
        }
        if let Some(keyboard) = &message.keyboard {
            body["reply_markup"] = json!(keyboard);
        }

        let sent: Message = self
            .call("sendMessage", &body, self.request_timeout())
            .await?;
        debug!("消息已发送: chat_id={}, message_id={}", chat_id, sent.message_id);
        Ok(sent.message_id)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> BeaconResult<()> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });

        // 成功时 result 为 Message（或内联消息时为 true），这里不关心内容
        match self
            .call::<Value>("editMessageText", &body, self.request_timeout())
            .await
        {
            Ok(_) => Ok(()),
            Err(BeaconError::Delivery(msg)) if msg.contains(NOT_MODIFIED) => {
                debug!("消息内容未变化: chat_id={}, message_id={}", chat_id, message_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> BeaconResult<()> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        self.call::<bool>("deleteMessage", &body, self.request_timeout())
            .await
            .map(|_| ())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> BeaconResult<()> {
        let body = json!({
            "callback_query_id": callback_id,
            "text": text,
        });
        if let Err(e) = self
            .call::<bool>("answerCallbackQuery", &body, self.request_timeout())
            .await
        {
            // 回调过期（超过 15 秒）时会失败，不影响后续流程
            warn!("应答回调失败: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::types::{InlineKeyboardButton, InlineKeyboardMarkup};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base: server.uri(),
            poll_timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message_with_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 42,
                "parse_mode": "HTML",
                "reply_markup": {"inline_keyboard": [[{"text": "❌ Cancel", "callback_data": "cancel"}]]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 99, "chat": {"id": 42}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let message = OutgoingMessage::html("<b>Search Results:</b>").with_keyboard(
            InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton::new("❌ Cancel", "cancel")]],
            },
        );
        let id = client_for(&server).send_message(42, &message).await.unwrap();
        assert_eq!(id, 99);
    }

    #[tokio::test]
    async fn test_edit_not_modified_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
            })))
            .mount(&server)
            .await;

        client_for(&server).edit_message(42, 7, "same").await.unwrap();
    }

    #[tokio::test]
    async fn test_edit_other_error_is_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to edit not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).edit_message(42, 7, "text").await.unwrap_err();
        assert!(matches!(err, BeaconError::Delivery(_)));
    }

    #[tokio::test]
    async fn test_get_updates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(json!({"offset": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{"update_id": 5, "message": {"message_id": 1, "chat": {"id": 1}, "text": "hi"}}]
            })))
            .mount(&server)
            .await;

        let updates = client_for(&server).get_updates(5).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 5);
    }
}
