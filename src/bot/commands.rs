//! 命令与按钮回调解析

use std::sync::LazyLock;

use regex::Regex;

static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"));

/// 聊天命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    /// 搜索命令，args 可能为空
    Search {
        category: &'static str,
        args: String,
    },
    Unknown(String),
}

impl Command {
    /// 解析 "/movie@SomeBot Heat 1995" 形式的文本，非命令返回 None
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        let command = match name.as_str() {
            "start" => Self::Start,
            other => match category_for(other) {
                Some(category) => Self::Search {
                    category,
                    args: args.to_string(),
                },
                None => Self::Unknown(other.to_string()),
            },
        };
        Some(command)
    }
}

/// 命令对应的下载分类
pub fn category_for(command: &str) -> Option<&'static str> {
    match command {
        "movie" => Some("movies"),
        "km" => Some("kids_movies"),
        "tv" => Some("tv"),
        "ktv" => Some("kids_tv"),
        _ => None,
    }
}

/// 是否为剧集分类
pub fn is_series(category: &str) -> bool {
    matches!(category, "tv" | "kids_tv")
}

/// 拆分 "名称 年份"，年份可以出现在任意位置
pub fn parse_title_year(args: &str) -> (String, String) {
    let year = RE_YEAR
        .find(args)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let name = RE_YEAR.replace_all(args, "");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    (name, year)
}

/// 按钮回调
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// 选中 OMDb 结果
    Imdb(String),
    /// 选中剧集的某一季
    Season { imdb_id: String, season: u32 },
    Cancel,
    /// 选中下载候选（任务 ID）
    Pick(String),
}

impl Callback {
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        if data.is_empty() {
            return None;
        }

        if let Some(rest) = data.strip_prefix("tvimdb:") {
            let (imdb_id, season) = rest.split_once(':')?;
            let season = season
                .split_whitespace()
                .next()?
                .trim_start_matches(['S', 's'])
                .parse()
                .ok()?;
            return Some(Self::Season {
                imdb_id: imdb_id.to_string(),
                season,
            });
        }
        if let Some(imdb_id) = data.strip_prefix("imdb:") {
            return Some(Self::Imdb(imdb_id.to_string()));
        }
        if data == "cancel" {
            return Some(Self::Cancel);
        }
        Some(Self::Pick(data.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(
            Command::parse("/movie Heat 1995"),
            Some(Command::Search {
                category: "movies",
                args: "Heat 1995".to_string()
            })
        );
        assert_eq!(
            Command::parse("/KTV@beacon_bot  Bluey "),
            Some(Command::Search {
                category: "kids_tv",
                args: "Bluey".to_string()
            })
        );
        assert_eq!(
            Command::parse("/km"),
            Some(Command::Search {
                category: "kids_movies",
                args: String::new()
            })
        );
        assert_eq!(Command::parse("/help"), Some(Command::Unknown("help".to_string())));
        assert_eq!(Command::parse("Heat 1995"), None);
    }

    #[test]
    fn test_parse_title_year() {
        assert_eq!(
            parse_title_year("Heat 1995"),
            ("Heat".to_string(), "1995".to_string())
        );
        assert_eq!(
            parse_title_year("2001 A Space Odyssey 1968"),
            ("A Space Odyssey".to_string(), "2001".to_string())
        );
        assert_eq!(
            parse_title_year("The Matrix"),
            ("The Matrix".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_callbacks() {
        assert_eq!(
            Callback::parse("imdb:tt0113277"),
            Some(Callback::Imdb("tt0113277".to_string()))
        );
        assert_eq!(
            Callback::parse("tvimdb:tt0306414:03"),
            Some(Callback::Season {
                imdb_id: "tt0306414".to_string(),
                season: 3
            })
        );
        assert_eq!(
            Callback::parse("tvimdb:tt0306414:00 - Specials"),
            Some(Callback::Season {
                imdb_id: "tt0306414".to_string(),
                season: 0
            })
        );
        assert_eq!(Callback::parse("tvimdb:broken"), None);
        assert_eq!(Callback::parse("cancel"), Some(Callback::Cancel));
        assert_eq!(
            Callback::parse("4f7c-uuid"),
            Some(Callback::Pick("4f7c-uuid".to_string()))
        );
        assert_eq!(Callback::parse(""), None);
    }

    #[test]
    fn test_is_series() {
        assert!(is_series("tv"));
        assert!(is_series("kids_tv"));
        assert!(!is_series("movies"));
    }
}
