//! 发布标题清洗
//!
//! 从 `Heat.1995.1080p.BluRay.x264-GROUP` 这类文件名中提取
//! 可读标题、年份、分辨率和发布组

use std::sync::LazyLock;

use regex::Regex;

static RE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(nzb|mkv|mp4|avi|m4v|ts)$").expect("valid extension regex")
});
static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid year regex"));
static RE_RESOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(4k|uhd|2160p|1080p|720p|480p|360p|240p|144p|sd)\b")
        .expect("valid resolution regex")
});
static RE_GROUP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[^-.\s]+$").expect("valid group regex"));
static RE_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    let tags = [
        "bluray", "web-dl", "webrip", "brrip", "dvdrip", "hdtv", "multi", "internal",
        "x264", "x265", "h264", r"h\.265", "hevc", "xvid", "divx", "dts-hd", "dts",
        r"dd5\.1", "dd", "aac", "ac3", "eac3", "atmos", "remux", "proper", "repack",
        "extended", "theatrical", "hdr", "dolby", "vision", "dovi", "hybrid",
    ];
    Regex::new(&format!(r"\b({})\b", tags.join("|"))).expect("valid tag regex")
});
static RE_AUDIO_CHANNELS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\.\d+\b").expect("valid channel regex"));
static RE_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"));
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// 发布标题解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub title: String,
    pub year: String,
    pub resolution: String,
    /// 发布组（保留原始大小写）
    pub last_tag: String,
}

impl ReleaseInfo {
    /// 展示名称，例如 "Heat (1995)"
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.title, self.year)
    }
}

/// 解析发布标题
pub fn parse_release_title(raw: &str) -> ReleaseInfo {
    let original = RE_EXTENSION.replace(raw.trim(), "").to_string();

    let parts: Vec<&str> = original
        .split(|c| c == '-' || c == '.')
        .filter(|p| !p.is_empty())
        .collect();
    let last_tag = if parts.len() > 1 {
        parts[parts.len() - 1].to_string()
    } else {
        String::new()
    };

    let lower = original.to_lowercase();
    let year = RE_YEAR
        .find(&lower)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let resolution = RE_RESOLUTION
        .find(&lower)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let cleaned = RE_GROUP_SUFFIX.replace(&lower, "");
    let cleaned = RE_YEAR.replace_all(&cleaned, "");
    let cleaned = RE_RESOLUTION.replace_all(&cleaned, "");
    // 标签之间可能相邻（例如 "dts-hd.x264"），重复清理直到稳定
    let mut cleaned = cleaned.to_string();
    loop {
        let next = RE_TAGS.replace_all(&cleaned, "").to_string();
        if next == cleaned {
            break;
        }
        cleaned = next;
    }
    let cleaned = RE_AUDIO_CHANNELS.replace_all(&cleaned, "");
    let cleaned = RE_NON_WORD.replace_all(&cleaned, " ");
    let cleaned = RE_SPACES.replace_all(&cleaned, " ");

    ReleaseInfo {
        title: title_case(cleaned.trim()),
        year,
        resolution,
        last_tag,
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
