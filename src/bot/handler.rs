//! 聊天更新处理
//!
//! 命令 -> OMDb 查询 -> 选择影片/季 -> newznab 搜索 -> 选择候选 -> 提交下载并启动监听

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::commands::{is_series, parse_title_year, Callback, Command};
use super::format::{format_age, results_message, seasons_message, titles_message, ResultEntry, RESULT_EMOJIS};
use super::title::parse_release_title;
use crate::messaging::types::{CallbackQuery, Message, Update};
use crate::messaging::Messenger;
use crate::monitor::DownloadMonitor;
use crate::persistence::{Job, JobStore, SelectionContext};
use crate::sabnzbd::DownloadSubmitter;
use crate::search::omdb::is_too_broad;
use crate::search::{FeedItem, NewznabClient, OmdbClient, OmdbTitle};

const WELCOME: &str = "Welcome! Use /movie [movie name] [year] to search for movies.";
const UNKNOWN_COMMAND: &str =
    "I don't know that command. Use /movie, /tv, /km (kids movies), or /ktv (kids TV) to search.";
const ASK_NAME_AND_YEAR: &str = "Please provide the name and year.";
const NO_RESULTS: &str = "No results found.";
const SEARCH_TOO_BROAD: &str =
    "No bueno. The search was too broad. Please try a more specific search with both title and year.";
const SEARCH_NOTHING: &str = "No bueno. Couldn't find any matching results.";
const SEARCHING_NZBS: &str = "Searching for NZBs...";
const SEARCH_EXPIRED: &str = "This search has expired.";
const PICK_NOT_FOUND: &str = "Failed to retrieve the download information.";
const SUBMIT_FAILED: &str = "Failed to add the NZB to SABnzbd.";

/// 机器人更新处理器
pub struct BotHandler {
    store: Arc<dyn JobStore>,
    messenger: Messenger,
    monitor: DownloadMonitor,
    submitter: Arc<dyn DownloadSubmitter>,
    omdb: OmdbClient,
    newznab: NewznabClient,
    /// 等待补充搜索词的用户 -> 分类
    pending_input: DashMap<i64, String>,
}

impl BotHandler {
    pub fn new(
        store: Arc<dyn JobStore>,
        messenger: Messenger,
        monitor: DownloadMonitor,
        submitter: Arc<dyn DownloadSubmitter>,
        omdb: OmdbClient,
        newznab: NewznabClient,
    ) -> Self {
        Self {
            store,
            messenger,
            monitor,
            submitter,
            omdb,
            newznab,
            pending_input: DashMap::new(),
        }
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(query) = update.callback_query {
            self.handle_callback(query).await;
        }
    }

    /// 发送文本，失败只记录日志
    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!("发送消息失败: chat_id={}, 错误: {}", chat_id, e);
        }
    }

    // =====================================================
    // 消息与命令
    // =====================================================

    async fn handle_message(&self, message: Message) {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let chat_id = message.chat.id;
        let user_id = message.from.as_ref().map_or(chat_id, |u| u.id);

        match Command::parse(text) {
            Some(command) => self.handle_command(chat_id, user_id, command).await,
            None => self.handle_input(chat_id, user_id, text).await,
        }
    }

    async fn handle_command(&self, chat_id: i64, user_id: i64, command: Command) {
        debug!("收到命令: chat_id={}, command={:?}", chat_id, command);
        match command {
            Command::Start => self.reply(chat_id, WELCOME).await,
            Command::Unknown(_) => self.reply(chat_id, UNKNOWN_COMMAND).await,
            Command::Search { category, args } if args.is_empty() => {
                self.pending_input.insert(user_id, category.to_string());
                self.reply(chat_id, ASK_NAME_AND_YEAR).await;
            }
            Command::Search { category, args } => {
                self.search_titles(chat_id, user_id, category, &args).await
            }
        }
    }

    /// 处理命令之后补充的搜索词
    async fn handle_input(&self, chat_id: i64, user_id: i64, text: &str) {
        let Some((_, category)) = self.pending_input.remove(&user_id) else {
            return;
        };
        self.search_titles(chat_id, user_id, &category, text).await;
    }

    async fn search_titles(&self, chat_id: i64, user_id: i64, category: &str, args: &str) {
        if is_series(category) {
            self.search_series(chat_id, user_id, category, args).await
        } else {
            self.search_movie(chat_id, user_id, category, args).await
        }
    }

    async fn search_movie(&self, chat_id: i64, user_id: i64, category: &str, args: &str) {
        let (name, year) = parse_title_year(args);
        if year.is_empty() {
            self.pending_input.insert(user_id, category.to_string());
            self.reply(chat_id, &format!("Please provide the year for: {}", name))
                .await;
            return;
        }

        match self.omdb.search(&name, &year, category).await {
            Ok(titles) => {
                self.send_titles(chat_id, user_id, category, &name, &year, &titles)
                    .await
            }
            Err(e) => {
                warn!("OMDb 搜索失败: {}", e);
                let text = if is_too_broad(&e) {
                    SEARCH_TOO_BROAD
                } else {
                    SEARCH_NOTHING
                };
                self.reply(chat_id, text).await;
            }
        }
    }

    async fn search_series(&self, chat_id: i64, user_id: i64, category: &str, args: &str) {
        let (name, year) = parse_title_year(args);
        let series = match self.omdb.lookup_series(&name, &year).await {
            Ok(series) => series,
            Err(e) => {
                warn!("OMDb 剧集查询失败: {}", e);
                self.reply(chat_id, NO_RESULTS).await;
                return;
            }
        };

        let Some(total_seasons) = series.total_seasons else {
            // 季数未知时按普通结果展示
            let year = series.title.year.clone();
            self.send_titles(chat_id, user_id, category, &name, &year, &[series.title])
                .await;
            return;
        };

        let message = seasons_message(&series.title.title, &series.title.imdb_id, total_seasons);
        self.send_with_context(chat_id, user_id, category, &name, &series.title.year, &message)
            .await;
    }

    async fn send_titles(
        &self,
        chat_id: i64,
        user_id: i64,
        category: &str,
        search: &str,
        year: &str,
        titles: &[OmdbTitle],
    ) {
        if titles.is_empty() {
            self.reply(chat_id, NO_RESULTS).await;
            return;
        }
        let message = titles_message(titles);
        self.send_with_context(chat_id, user_id, category, search, year, &message)
            .await;
    }

    /// 发送带按钮的消息并保存选择上下文
    async fn send_with_context(
        &self,
        chat_id: i64,
        user_id: i64,
        category: &str,
        search: &str,
        year: &str,
        message: &crate::messaging::OutgoingMessage,
    ) {
        let message_id = match self.messenger.send(chat_id, message).await {
            Ok(id) => id,
            Err(e) => {
                error!("发送选择消息失败: chat_id={}, 错误: {}", chat_id, e);
                return;
            }
        };

        let ctx = SelectionContext {
            chat_id,
            message_id,
            user_id,
            category: category.to_string(),
            search: search.to_string(),
            year: year.to_string(),
            created_at: Utc::now().timestamp(),
        };
        if let Err(e) = self.store.save_selection_context(&ctx) {
            error!("保存选择上下文失败: message_id={}, 错误: {}", message_id, e);
        }
    }

    // =====================================================
    // 按钮回调
    // =====================================================

    async fn handle_callback(&self, query: CallbackQuery) {
        let Some(message) = query.message.as_ref() else {
            self.answer(&query.id, "").await;
            return;
        };
        let chat_id = message.chat.id;
        let message_id = message.message_id;

        let Some(callback) = query.data.as_deref().and_then(Callback::parse) else {
            warn!("无法识别的回调数据: {:?}", query.data);
            self.answer(&query.id, "").await;
            return;
        };
        debug!("收到回调: chat_id={}, callback={:?}", chat_id, callback);

        let finished = match callback {
            Callback::Imdb(imdb_id) => {
                self.search_releases_by_imdb(&query, chat_id, message_id, &imdb_id)
                    .await;
                true
            }
            Callback::Season { imdb_id, season } => {
                self.search_releases_by_season(&query, chat_id, message_id, &imdb_id, season)
                    .await;
                true
            }
            Callback::Cancel => {
                self.answer(&query.id, "").await;
                self.remove_unselected(chat_id);
                true
            }
            Callback::Pick(job_id) => {
                self.answer(&query.id, "").await;
                self.submit_pick(chat_id, &job_id).await
            }
        };
        // 选择失败时保留结果消息，用户可以改选其他候选
        if !finished {
            return;
        }

        // 选择消息处理完毕，清理上下文和消息本身
        if let Err(e) = self.store.delete_selection_context(chat_id, message_id) {
            warn!("删除选择上下文失败: message_id={}, 错误: {}", message_id, e);
        }
        if let Err(e) = self.messenger.delete(chat_id, message_id).await {
            warn!("删除结果消息失败: message_id={}, 错误: {}", message_id, e);
        }
    }

    /// 应答按钮回调，失败只记录日志
    async fn answer(&self, callback_id: &str, text: &str) {
        if let Err(e) = self.messenger.answer_callback(callback_id, text).await {
            warn!("应答按钮回调失败: callback_id={}, 错误: {}", callback_id, e);
        }
    }

    fn selection_context(&self, chat_id: i64, message_id: i64) -> Option<SelectionContext> {
        match self.store.get_selection_context(chat_id, message_id) {
            Ok(ctx) => ctx,
            Err(e) => {
                error!("读取选择上下文失败: message_id={}, 错误: {}", message_id, e);
                None
            }
        }
    }

    async fn search_releases_by_imdb(
        &self,
        query: &CallbackQuery,
        chat_id: i64,
        message_id: i64,
        imdb_id: &str,
    ) {
        let Some(ctx) = self.selection_context(chat_id, message_id) else {
            self.answer(&query.id, SEARCH_EXPIRED).await;
            return;
        };
        self.answer(&query.id, SEARCHING_NZBS).await;

        let mut result = match self.newznab.search_by_imdb(imdb_id, &ctx.category).await {
            Ok(result) => result,
            Err(e) => {
                error!("按 IMDb 搜索失败: {}", e);
                self.reply(chat_id, &format!("Error looking up on NZBGeek: {}", e))
                    .await;
                return;
            }
        };

        if result.total_found == 0 {
            info!("IMDb 搜索无结果，改用关键词搜索: {}", ctx.search);
            let q = format!("{} {}", ctx.search, ctx.year);
            result = match self.newznab.search_by_query(q.trim(), &ctx.category).await {
                Ok(result) => result,
                Err(e) => {
                    error!("关键词搜索失败: {}", e);
                    self.reply(chat_id, &format!("Error searching NZBGeek: {}", e))
                        .await;
                    return;
                }
            };
        }

        if result.items.is_empty() {
            self.reply(chat_id, &format!("No results found for IMDb ID: {}", imdb_id))
                .await;
            return;
        }
        self.send_releases(&ctx, &result.items).await;
    }

    async fn search_releases_by_season(
        &self,
        query: &CallbackQuery,
        chat_id: i64,
        message_id: i64,
        imdb_id: &str,
        season: u32,
    ) {
        let Some(ctx) = self.selection_context(chat_id, message_id) else {
            self.answer(&query.id, SEARCH_EXPIRED).await;
            return;
        };
        self.answer(&query.id, SEARCHING_NZBS).await;

        let q = format!("{} S{:02}", ctx.search, season);
        let result = match self.newznab.search_by_query(&q, &ctx.category).await {
            Ok(result) => result,
            Err(e) => {
                error!("按季搜索失败: {}", e);
                self.reply(chat_id, &format!("Error searching NZBGeek: {}", e))
                    .await;
                return;
            }
        };

        if result.items.is_empty() {
            self.reply(
                chat_id,
                &format!("No results found for: {} ({})", ctx.search, imdb_id),
            )
            .await;
            return;
        }
        self.send_releases(&ctx, &result.items).await;
    }

    /// 保存候选项并发送结果列表
    async fn send_releases(&self, ctx: &SelectionContext, items: &[FeedItem]) {
        let now = Utc::now();
        let mut entries = Vec::new();

        for item in items.iter().take(RESULT_EMOJIS.len()) {
            let release = parse_release_title(&item.title);
            let job = Job::candidate(
                item.download_url(),
                release.display_name(),
                ctx.category.clone(),
                ctx.chat_id,
            );
            if let Err(e) = self.store.upsert_job(&job) {
                error!("保存候选项失败: {}", e);
                continue;
            }
            entries.push(ResultEntry {
                job_id: job.id,
                release,
                size: item.size,
                age: format_age(&item.pub_date, now),
            });
        }

        if entries.is_empty() {
            self.reply(ctx.chat_id, NO_RESULTS).await;
            return;
        }

        let message = results_message(&entries);
        self.send_with_context(
            ctx.chat_id,
            ctx.user_id,
            &ctx.category,
            &ctx.search,
            &ctx.year,
            &message,
        )
        .await;
    }

    // =====================================================
    // 提交下载
    // =====================================================

    /// 提交选中的候选并启动监听
    ///
    /// 返回 true 表示这次选择已经结束（提交成功），结果消息可以删除；
    /// 失败时候选项保持可选
    async fn submit_pick(&self, chat_id: i64, job_id: &str) -> bool {
        let mut job = match self.store.claim_pick(job_id, chat_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("候选项不存在或正在提交: job_id={}", job_id);
                self.reply(chat_id, PICK_NOT_FOUND).await;
                return false;
            }
            Err(e) => {
                error!("认领候选项失败: job_id={}, 错误: {}", job_id, e);
                self.reply(chat_id, PICK_NOT_FOUND).await;
                return false;
            }
        };

        let external_id = match self.submitter.submit(&job.source_url, &job.category).await {
            Ok(id) => id,
            Err(e) => {
                error!("提交下载失败: job_id={}, 错误: {}", job_id, e);
                if let Err(e) = self.store.release_pick(job_id) {
                    warn!("释放候选项失败: job_id={}, 错误: {}", job_id, e);
                }
                self.reply(chat_id, SUBMIT_FAILED).await;
                return false;
            }
        };

        // 下载已经提交，进度消息发不出去也要继续记录和监听
        let text = format!("NZB '{}' added to SABnzbd. Initializing...", job.display_name);
        let progress_message_id = match self.messenger.send_text(chat_id, &text).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("发送初始进度消息失败: job_id={}, 错误: {}", job_id, e);
                None
            }
        };

        job.mark_submitted(external_id, progress_message_id);
        if let Err(e) = self.store.upsert_job(&job) {
            error!("保存已提交任务失败: job_id={}, 错误: {}", job_id, e);
            return true;
        }

        info!(
            "已提交下载: job_id={}, name={}, nzo_id={}",
            job.id,
            job.display_name,
            job.external_id_str()
        );
        self.monitor.spawn(job.id.clone());
        self.remove_unselected(chat_id);
        true
    }

    fn remove_unselected(&self, chat_id: i64) {
        if let Err(e) = self.store.delete_unselected(chat_id) {
            warn!("清理未选中候选项失败: chat_id={}, 错误: {}", chat_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::error::{BeaconError, BeaconResult};
    use crate::messaging::types::{Chat, User};
    use crate::monitor::{MonitorRegistry, MonitorSettings};
    use crate::persistence::{JobStatus, SqliteJobStore};
    use crate::test_support::{ProbeStep, RecordedCall, RecordingChannel, ScriptedProbe};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSubmitter {
        reject: bool,
        /// 模拟下载器的响应耗时
        delay: Duration,
        submitted: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DownloadSubmitter for FakeSubmitter {
        async fn submit(&self, nzb_url: &str, category: &str) -> BeaconResult<String> {
            self.submitted
                .lock()
                .push((nzb_url.to_string(), category.to_string()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.reject {
                return Err(BeaconError::Submit("rejected".to_string()));
            }
            Ok("SABnzbd_nzo_new".to_string())
        }
    }

    struct Harness {
        store: Arc<SqliteJobStore>,
        channel: Arc<RecordingChannel>,
        submitter: Arc<FakeSubmitter>,
        monitor: DownloadMonitor,
        handler: BotHandler,
    }

    fn harness(reject: bool) -> Harness {
        harness_with(FakeSubmitter {
            reject,
            ..Default::default()
        })
    }

    fn harness_with(submitter: FakeSubmitter) -> Harness {
        let store = Arc::new(SqliteJobStore::open_in_memory().unwrap());
        let channel = Arc::new(RecordingChannel::default());
        let messenger = Messenger::new(channel.clone());
        let submitter = Arc::new(submitter);
        let monitor = DownloadMonitor::new(
            store.clone(),
            Arc::new(ScriptedProbe::new(vec![ProbeStep::status(
                JobStatus::Downloading,
                "Progress: 1.00 MB / 2.00 MB (50.0%)",
            )])),
            messenger.clone(),
            Arc::new(MonitorRegistry::new()),
            MonitorSettings::fast_for_testing(),
        );
        let search = SearchConfig::default();
        let handler = BotHandler::new(
            store.clone(),
            messenger,
            monitor.clone(),
            submitter.clone(),
            OmdbClient::new(&search).unwrap(),
            NewznabClient::new(&search).unwrap(),
        );
        Harness {
            store,
            channel,
            submitter,
            monitor,
            handler,
        }
    }

    fn text_update(chat_id: i64, user_id: i64, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(Message {
                message_id: 1,
                chat: Chat { id: chat_id },
                from: Some(User {
                    id: user_id,
                    is_bot: false,
                    username: None,
                }),
                text: Some(text.to_string()),
            }),
            callback_query: None,
        }
    }

    fn callback_update(chat_id: i64, message_id: i64, data: &str) -> Update {
        Update {
            update_id: 2,
            message: None,
            callback_query: Some(CallbackQuery {
                id: "cb".to_string(),
                from: User {
                    id: 5,
                    is_bot: false,
                    username: None,
                },
                message: Some(Message {
                    message_id,
                    chat: Chat { id: chat_id },
                    from: None,
                    text: None,
                }),
                data: Some(data.to_string()),
            }),
        }
    }

    fn sent_texts(channel: &RecordingChannel) -> Vec<String> {
        channel.sent().into_iter().map(|m| m.text).collect()
    }

    fn save_context(store: &SqliteJobStore, chat_id: i64, message_id: i64) {
        store
            .save_selection_context(&SelectionContext {
                chat_id,
                message_id,
                user_id: 5,
                category: "movies".to_string(),
                search: "Heat".to_string(),
                year: "1995".to_string(),
                created_at: 0,
            })
            .unwrap();
    }

    fn deleted_messages(channel: &RecordingChannel) -> Vec<i64> {
        channel
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCall::Delete { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    /// 让出一次调度，等已启动的监听注册后再全部取消
    async fn cancel_monitors(h: &Harness) {
        tokio::task::yield_now().await;
        for job_id in h.monitor.registry().active_jobs() {
            h.monitor.registry().cancel(&job_id);
        }
    }

    fn offer_candidates(store: &SqliteJobStore, chat_id: i64) -> Vec<Job> {
        (0..3)
            .map(|i| {
                let job = Job::candidate(
                    format!("http://indexer/get/{}", i),
                    format!("Heat (199{})", i),
                    "movies",
                    chat_id,
                );
                store.upsert_job(&job).unwrap();
                job
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_and_unknown_commands() {
        let h = harness(false);
        h.handler.handle_update(text_update(1, 5, "/start")).await;
        h.handler.handle_update(text_update(1, 5, "/help")).await;
        assert_eq!(sent_texts(&h.channel), vec![WELCOME, UNKNOWN_COMMAND]);
    }

    #[tokio::test]
    async fn test_command_without_args_asks_for_input() {
        let h = harness(false);
        h.handler.handle_update(text_update(1, 5, "/movie")).await;
        assert_eq!(sent_texts(&h.channel), vec![ASK_NAME_AND_YEAR]);

        // 补充的输入缺少年份时继续询问
        h.handler.handle_update(text_update(1, 5, "Heat")).await;
        assert_eq!(
            sent_texts(&h.channel),
            vec![ASK_NAME_AND_YEAR, "Please provide the year for: Heat"]
        );

        // 其他用户的普通消息被忽略
        h.handler.handle_update(text_update(1, 6, "hello")).await;
        assert_eq!(h.channel.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_pick_submits_and_starts_monitor() {
        let h = harness(false);
        let candidates = offer_candidates(&h.store, 1);
        let picked = &candidates[1];

        h.handler
            .handle_update(callback_update(1, 500, &picked.id))
            .await;

        assert_eq!(
            h.submitter.submitted.lock().clone(),
            vec![(picked.source_url.clone(), "movies".to_string())]
        );
        assert_eq!(
            sent_texts(&h.channel),
            vec!["NZB 'Heat (1991)' added to SABnzbd. Initializing..."]
        );

        let stored = h.store.get_job(&picked.id).unwrap().unwrap();
        assert!(stored.selected);
        assert_eq!(stored.external_id.as_deref(), Some("SABnzbd_nzo_new"));
        assert_eq!(stored.message_id, Some(1000));
        assert_ne!(stored.status, JobStatus::Pending);

        // 其他候选被清理，结果消息被删除
        assert!(h.store.get_job(&candidates[0].id).unwrap().is_none());
        assert!(h.store.get_job(&candidates[2].id).unwrap().is_none());
        assert!(h.channel.calls().contains(&RecordedCall::Delete {
            chat_id: 1,
            message_id: 500
        }));

        // 监听器已启动并开始编辑进度消息
        let mut waited = 0;
        while h.channel.edits().is_empty() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(
            h.channel.edits()[0],
            "NZB: Heat (1991)\nStatus: Downloading\nProgress: 1.00 MB / 2.00 MB (50.0%)"
        );
        assert!(h.monitor.registry().cancel(&picked.id));
    }

    #[tokio::test]
    async fn test_pick_rejected_by_downloader() {
        let h = harness(true);
        let candidates = offer_candidates(&h.store, 1);
        save_context(&h.store, 1, 500);

        h.handler
            .handle_update(callback_update(1, 500, &candidates[0].id))
            .await;

        assert_eq!(sent_texts(&h.channel), vec![SUBMIT_FAILED]);
        let stored = h.store.get_job(&candidates[0].id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert!(!stored.selected);
        assert!(h.monitor.registry().active_jobs().is_empty());

        // 结果消息和候选项都保留，用户可以改选
        for job in &candidates {
            assert!(h.store.get_job(&job.id).unwrap().is_some());
        }
        assert!(h.store.get_selection_context(1, 500).unwrap().is_some());
        assert!(deleted_messages(&h.channel).is_empty());

        h.handler
            .handle_update(callback_update(1, 500, &candidates[1].id))
            .await;
        assert_eq!(h.submitter.submitted.lock().len(), 2);
        assert_eq!(sent_texts(&h.channel), vec![SUBMIT_FAILED, SUBMIT_FAILED]);
    }

    #[tokio::test]
    async fn test_concurrent_picks_submit_once() {
        let h = harness_with(FakeSubmitter {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let candidates = offer_candidates(&h.store, 1);
        save_context(&h.store, 1, 500);

        tokio::join!(
            h.handler
                .handle_update(callback_update(1, 500, &candidates[0].id)),
            h.handler
                .handle_update(callback_update(1, 500, &candidates[2].id)),
        );

        assert_eq!(h.submitter.submitted.lock().len(), 1);
        let selected: Vec<Job> = candidates
            .iter()
            .filter_map(|job| h.store.get_job(&job.id).unwrap())
            .filter(|job| job.selected)
            .collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].external_id.as_deref(), Some("SABnzbd_nzo_new"));

        let texts = sent_texts(&h.channel);
        assert_eq!(texts.len(), 2);
        assert!(texts.contains(&PICK_NOT_FOUND.to_string()));
        assert_eq!(deleted_messages(&h.channel), vec![500]);
        assert!(h.store.get_selection_context(1, 500).unwrap().is_none());

        cancel_monitors(&h).await;
    }

    #[tokio::test]
    async fn test_repeated_pick_of_same_candidate_submits_once() {
        let h = harness_with(FakeSubmitter {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let candidates = offer_candidates(&h.store, 1);

        tokio::join!(
            h.handler
                .handle_update(callback_update(1, 500, &candidates[1].id)),
            h.handler
                .handle_update(callback_update(1, 500, &candidates[1].id)),
        );

        assert_eq!(h.submitter.submitted.lock().len(), 1);
        assert_eq!(deleted_messages(&h.channel), vec![500]);
        cancel_monitors(&h).await;
    }

    #[tokio::test]
    async fn test_pick_survives_progress_message_failure() {
        let h = harness(false);
        let candidates = offer_candidates(&h.store, 1);
        h.channel.fail_sends(true);

        h.handler
            .handle_update(callback_update(1, 500, &candidates[0].id))
            .await;

        // 下载已提交，任务仍被记录，只是没有进度消息
        let stored = h.store.get_job(&candidates[0].id).unwrap().unwrap();
        assert!(stored.selected);
        assert_eq!(stored.external_id.as_deref(), Some("SABnzbd_nzo_new"));
        assert_eq!(stored.message_id, None);
        assert!(h.store.get_job(&candidates[1].id).unwrap().is_none());
        assert_eq!(deleted_messages(&h.channel), vec![500]);

        cancel_monitors(&h).await;
    }

    #[tokio::test]
    async fn test_failed_callback_answer_does_not_block_pick() {
        let h = harness(false);
        let candidates = offer_candidates(&h.store, 1);
        h.channel.fail_answers(true);

        h.handler
            .handle_update(callback_update(1, 500, &candidates[0].id))
            .await;

        assert_eq!(h.submitter.submitted.lock().len(), 1);
        assert!(!h
            .channel
            .calls()
            .iter()
            .any(|c| matches!(c, RecordedCall::Answer { .. })));
        assert_eq!(deleted_messages(&h.channel), vec![500]);

        cancel_monitors(&h).await;
    }

    #[tokio::test]
    async fn test_pick_unknown_job() {
        let h = harness(false);
        h.handler
            .handle_update(callback_update(1, 500, "no-such-job"))
            .await;
        assert_eq!(sent_texts(&h.channel), vec![PICK_NOT_FOUND]);
        assert!(h.submitter.submitted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_clears_candidates_and_context() {
        let h = harness(false);
        let candidates = offer_candidates(&h.store, 1);
        save_context(&h.store, 1, 500);

        h.handler.handle_update(callback_update(1, 500, "cancel")).await;

        for job in &candidates {
            assert!(h.store.get_job(&job.id).unwrap().is_none());
        }
        assert!(h.store.get_selection_context(1, 500).unwrap().is_none());
        assert!(h.channel.calls().contains(&RecordedCall::Delete {
            chat_id: 1,
            message_id: 500
        }));
        assert!(h.submitter.submitted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_expired_selection_is_answered() {
        let h = harness(false);
        h.handler
            .handle_update(callback_update(1, 500, "imdb:tt0113277"))
            .await;

        assert!(h.channel.calls().contains(&RecordedCall::Answer {
            callback_id: "cb".to_string(),
            text: SEARCH_EXPIRED.to_string()
        }));
        assert!(h.channel.sent().is_empty());
    }
}
