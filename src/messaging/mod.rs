//! 聊天消息通道
//!
//! - messenger: 通道接口与编辑去重
//! - telegram: Telegram Bot API 实现
//! - types: Bot API 数据类型

pub mod messenger;
pub mod telegram;
pub mod types;

pub use messenger::{MessageChannel, Messenger};
pub use telegram::TelegramClient;
pub use types::{InlineKeyboardButton, InlineKeyboardMarkup, OutgoingMessage};
