// newznab (NZBGeek) 索引搜索

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::error::{BeaconError, BeaconResult};

/// 每次搜索请求的结果数量
const SEARCH_LIMIT: &str = "50";

// RSS 解析用的正则
static RE_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").expect("valid item regex"));
static RE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").expect("valid title regex"));
static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link\b[^>]*>(.*?)</link>").expect("valid link regex"));
static RE_PUB_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<pubDate\b[^>]*>(.*?)</pubDate>").expect("valid pubDate regex")
});
static RE_ENCLOSURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<enclosure\b([^>]*)/?>").expect("valid enclosure regex"));
static RE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w:-]+)\s*=\s*"([^"]*)""#).expect("valid attribute regex"));
static RE_CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<!\[CDATA\[(.*?)\]\]>\s*$").expect("valid cdata regex"));

/// 一条下载候选
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// 发布标题（原始文件名）
    pub title: String,
    pub link: String,
    /// NZB 下载地址
    pub enclosure_url: String,
    /// 大小（字节）
    pub size: u64,
    /// 原始发布时间文本
    pub pub_date: String,
}

impl FeedItem {
    pub fn published_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc2822(self.pub_date.trim()).ok()
    }

    /// 下载地址，没有 enclosure 时使用 link
    pub fn download_url(&self) -> &str {
        if self.enclosure_url.is_empty() {
            &self.link
        } else {
            &self.enclosure_url
        }
    }
}

/// 一次搜索的结果
#[derive(Debug, Clone, Default)]
pub struct FeedSearchResult {
    /// 按发布时间倒序截取后的候选
    pub items: Vec<FeedItem>,
    /// 索引返回的总数
    pub total_found: usize,
}

/// 下载分类对应的 newznab 分类 ID
pub fn category_id(category: &str) -> &'static str {
    match category {
        "tv" | "kids_tv" => "5000",
        _ => "2000",
    }
}

/// 解析 RSS 中的所有 item
pub fn parse_feed(xml: &str) -> Vec<FeedItem> {
    RE_ITEM
        .captures_iter(xml)
        .map(|caps| {
            let body = caps.get(1).map_or("", |m| m.as_str());
            let (enclosure_url, size) = parse_enclosure(body);
            FeedItem {
                title: element_text(&RE_TITLE, body),
                link: element_text(&RE_LINK, body),
                enclosure_url,
                size,
                pub_date: element_text(&RE_PUB_DATE, body),
            }
        })
        .collect()
}

fn element_text(re: &Regex, body: &str) -> String {
    let raw = re
        .captures(body)
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str());

    match RE_CDATA.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => decode_entities(raw.trim()),
    }
}

fn parse_enclosure(body: &str) -> (String, u64) {
    let Some(attrs) = RE_ENCLOSURE.captures(body).and_then(|c| c.get(1)) else {
        return (String::new(), 0);
    };

    let mut url = String::new();
    let mut length = 0;
    for caps in RE_ATTR.captures_iter(attrs.as_str()) {
        match &caps[1] {
            "url" => url = decode_entities(&caps[2]),
            "length" => length = caps[2].trim().parse().unwrap_or(0),
            _ => {}
        }
    }
    (url, length)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// 按发布时间倒序排序，无法解析的时间排在最后
pub fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.published_at().cmp(&a.published_at()));
}

/// newznab 客户端
#[derive(Debug, Clone)]
pub struct NewznabClient {
    client: Client,
    api_url: String,
    api_key: String,
    max_results: usize,
}

impl NewznabClient {
    pub fn new(config: &SearchConfig) -> BeaconResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BeaconError::Config(format!("failed to build newznab client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.newznab_api_url.clone(),
            api_key: config.newznab_api_key.clone(),
            max_results: config.max_results,
        })
    }

    /// 按 IMDb ID 搜索（去掉 tt 前缀）
    pub async fn search_by_imdb(
        &self,
        imdb_id: &str,
        category: &str,
    ) -> BeaconResult<FeedSearchResult> {
        let imdb = imdb_id.trim().trim_start_matches("tt");
        self.search(&[("imdbid", imdb)], category).await
    }

    /// 按关键词搜索
    pub async fn search_by_query(
        &self,
        query: &str,
        category: &str,
    ) -> BeaconResult<FeedSearchResult> {
        self.search(&[("q", query)], category).await
    }

    async fn search(
        &self,
        params: &[(&str, &str)],
        category: &str,
    ) -> BeaconResult<FeedSearchResult> {
        let mut query: Vec<(&str, &str)> = vec![
            ("apikey", self.api_key.as_str()),
            ("t", "search"),
            ("cat", category_id(category)),
            ("limit", SEARCH_LIMIT),
        ];
        query.extend_from_slice(params);

        info!("newznab 搜索: category={}, params={:?}", category, params);

        let resp = self
            .client
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| BeaconError::Search(format!("error fetching from indexer: {}", e)))?;

        if !resp.status().is_success() {
            return Err(BeaconError::Search(format!(
                "bad status from indexer: {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| BeaconError::Search(format!("error reading indexer response: {}", e)))?;

        let mut items = parse_feed(&body);
        let total_found = items.len();
        debug!("newznab 返回 {} 条结果", total_found);

        sort_newest_first(&mut items);
        items.truncate(self.max_results);

        Ok(FeedSearchResult { items, total_found })
    }
}
