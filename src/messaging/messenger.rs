//! 消息发送通道与编辑去重
//!
//! 进度消息每隔几秒编辑一次，大多数时候内容不变。`Messenger` 按
//! (chat_id, message_id) 记录最后一次成功写入的文本，相同内容直接跳过。

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::types::OutgoingMessage;
use crate::error::BeaconResult;

/// 外发消息通道
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// 发送消息，返回消息 ID
    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> BeaconResult<i64>;

    /// 编辑已有消息的文本
    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> BeaconResult<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> BeaconResult<()>;

    /// 应答按钮回调
    async fn answer_callback(&self, callback_id: &str, text: &str) -> BeaconResult<()>;
}

/// 带编辑去重的消息发送器
#[derive(Clone)]
pub struct Messenger {
    channel: Arc<dyn MessageChannel>,
    /// (chat_id, message_id) -> 最后一次成功编辑的文本
    last_text: Arc<DashMap<(i64, i64), String>>,
}

impl Messenger {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            last_text: Arc::new(DashMap::new()),
        }
    }

    pub async fn send(&self, chat_id: i64, message: &OutgoingMessage) -> BeaconResult<i64> {
        self.channel.send_message(chat_id, message).await
    }

    pub async fn send_text(&self, chat_id: i64, text: &str) -> BeaconResult<i64> {
        self.send(chat_id, &OutgoingMessage::plain(text)).await
    }

    /// 编辑消息，内容与上次相同时不发出请求
    ///
    /// 返回是否实际发出了编辑请求
    pub async fn edit_if_changed(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> BeaconResult<bool> {
        let key = (chat_id, message_id);
        if self
            .last_text
            .get(&key)
            .is_some_and(|previous| previous.as_str() == text)
        {
            debug!("消息内容未变化，跳过编辑: chat_id={}, message_id={}", chat_id, message_id);
            return Ok(false);
        }

        self.channel.edit_message(chat_id, message_id, text).await?;
        self.last_text.insert(key, text.to_string());
        Ok(true)
    }

    /// 消息不会再被编辑时释放去重缓存
    pub fn forget(&self, chat_id: i64, message_id: i64) {
        self.last_text.remove(&(chat_id, message_id));
    }

    #[cfg(test)]
    pub fn is_tracked(&self, chat_id: i64, message_id: i64) -> bool {
        self.last_text.contains_key(&(chat_id, message_id))
    }

    pub async fn delete(&self, chat_id: i64, message_id: i64) -> BeaconResult<()> {
        self.forget(chat_id, message_id);
        self.channel.delete_message(chat_id, message_id).await
    }

    pub async fn answer_callback(&self, callback_id: &str, text: &str) -> BeaconResult<()> {
        self.channel.answer_callback(callback_id, text).await
    }
}
