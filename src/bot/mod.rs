//! Telegram 机器人
//!
//! - commands: 命令与回调解析
//! - title: 发布标题清洗
//! - format: 结果消息与按钮
//! - handler: 更新处理与下载提交

pub mod commands;
pub mod format;
pub mod handler;
pub mod title;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::messaging::TelegramClient;
pub use handler::BotHandler;

/// 拉取更新失败后的重试间隔
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// 长轮询拉取更新，直到收到取消信号
///
/// 每个更新在独立任务中处理，慢速搜索不会阻塞后续消息
pub async fn run_polling(
    telegram: TelegramClient,
    handler: Arc<BotHandler>,
    cancel: CancellationToken,
) {
    info!("开始拉取 Telegram 更新");
    let mut offset = 0i64;

    loop {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = telegram.get_updates(offset) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    debug!("收到更新: update_id={}", update.update_id);
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handler.handle_update(update).await;
                    });
                }
            }
            Err(e) => {
                warn!("拉取更新失败，{} 秒后重试: {}", RETRY_DELAY.as_secs(), e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("Telegram 更新拉取已停止");
}
