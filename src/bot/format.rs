//! 结果消息与按钮的格式化

use chrono::{DateTime, Utc};

use super::title::ReleaseInfo;
use crate::messaging::{InlineKeyboardButton, InlineKeyboardMarkup, OutgoingMessage};
use crate::search::OmdbTitle;

/// 候选项按钮上的标记
pub const RESULT_EMOJIS: [&str; 9] = ["🍎", "🍌", "🍒", "🍊", "🍋", "🥝", "🍍", "🥭", "🍉"];

pub const CANCEL_LABEL: &str = "❌ Cancel";
pub const CANCEL_DATA: &str = "cancel";

/// 每行按钮数量
const BUTTONS_PER_ROW: usize = 3;

/// 一个已保存的下载候选
#[derive(Debug, Clone)]
pub struct ResultEntry {
    /// 候选任务 ID（即按钮回调数据）
    pub job_id: String,
    pub release: ReleaseInfo,
    pub size: u64,
    pub age: String,
}

/// 按 1024 进制格式化文件大小
pub fn format_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    if size < UNIT {
        return format!("{} B", size);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", size as f64 / div as f64, unit)
}

/// 发布时间距今多久
pub fn format_age(pub_date: &str, now: DateTime<Utc>) -> String {
    let Ok(published) = DateTime::parse_from_rfc2822(pub_date.trim()) else {
        return "Unknown".to_string();
    };

    let hours = (now - published.with_timezone(&Utc)).num_seconds() as f64 / 3600.0;
    if hours < 24.0 {
        format!("{:.0} hours", hours)
    } else if hours < 48.0 {
        "1 day".to_string()
    } else {
        format!("{:.0} days", hours / 24.0)
    }
}

/// HTML 转义
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn cancel_row() -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::new(CANCEL_LABEL, CANCEL_DATA)]
}

/// 下载候选列表消息（最多 9 个，每行 3 个按钮，最后一行为取消）
pub fn results_message(entries: &[ResultEntry]) -> OutgoingMessage {
    let mut text = String::from("Search Results:\n\n");
    let mut buttons = Vec::new();

    for (entry, emoji) in entries.iter().zip(RESULT_EMOJIS) {
        text.push_str(&format!(
            "{} <b>{}</b>\n   <b>Year:</b> {}   <b>Size:</b> {}\n   <b>Resolution:</b> {}<b>   Release:</b> {}\n   <b>Age:</b> {}\n\n",
            emoji,
            escape_html(&entry.release.title),
            escape_html(&entry.release.year),
            escape_html(&format_size(entry.size)),
            escape_html(&entry.release.resolution),
            escape_html(&entry.release.last_tag),
            escape_html(&entry.age),
        ));
        buttons.push(InlineKeyboardButton::new(emoji, entry.job_id.clone()));
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect();
    rows.push(cancel_row());

    OutgoingMessage::html(text).with_keyboard(InlineKeyboardMarkup {
        inline_keyboard: rows,
    })
}

/// OMDb 结果列表（每行一个）
pub fn titles_message(titles: &[OmdbTitle]) -> OutgoingMessage {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = titles
        .iter()
        .map(|t| {
            vec![InlineKeyboardButton::new(
                format!("{} ({})", t.title, t.year),
                format!("imdb:{}", t.imdb_id),
            )]
        })
        .collect();
    rows.push(cancel_row());

    OutgoingMessage::plain("IMDB Results:").with_keyboard(InlineKeyboardMarkup {
        inline_keyboard: rows,
    })
}

/// 季选择消息，第 0 季为特别篇
pub fn seasons_message(title: &str, imdb_id: &str, total_seasons: u32) -> OutgoingMessage {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = (0..=total_seasons)
        .map(|season| {
            let label = if season == 0 {
                "S00 - Specials".to_string()
            } else {
                format!("S{:02}", season)
            };
            vec![InlineKeyboardButton::new(
                label,
                format!("tvimdb:{}:{:02}", imdb_id, season),
            )]
        })
        .collect();
    rows.push(cancel_row());

    OutgoingMessage::plain(title).with_keyboard(InlineKeyboardMarkup {
        inline_keyboard: rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: &str) -> ResultEntry {
        ResultEntry {
            job_id: id.to_string(),
            release: ReleaseInfo {
                title: "Heat".to_string(),
                year: "1995".to_string(),
                resolution: "1080p".to_string(),
                last_tag: "GRP".to_string(),
            },
            size: 8 * 1024 * 1024 * 1024,
            age: "3 days".to_string(),
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(8 * 1024 * 1024 * 1024), "8.0 GB");
    }

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(format_age("Wed, 10 Jan 2024 07:00:00 +0000", now), "5 hours");
        assert_eq!(format_age("Tue, 09 Jan 2024 06:00:00 +0000", now), "1 day");
        assert_eq!(format_age("Sun, 07 Jan 2024 12:00:00 +0000", now), "3 days");
        assert_eq!(format_age("yesterday", now), "Unknown");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Tom & Jerry <3"), "Tom &amp; Jerry &lt;3");
    }

    #[test]
    fn test_results_keyboard_layout() {
        let entries: Vec<_> = (0..4).map(|i| entry(&format!("job-{}", i))).collect();
        let message = results_message(&entries);

        assert!(message.html);
        assert!(message.text.starts_with("Search Results:\n\n🍎 <b>Heat</b>"));
        assert!(message.text.contains("<b>Size:</b> 8.0 GB"));

        let rows = message.keyboard.unwrap().inline_keyboard;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[1][0].callback_data, "job-3");
        assert_eq!(rows[2], vec![InlineKeyboardButton::new(CANCEL_LABEL, CANCEL_DATA)]);
    }

    #[test]
    fn test_results_capped_at_nine() {
        let entries: Vec<_> = (0..12).map(|i| entry(&format!("job-{}", i))).collect();
        let rows = results_message(&entries).keyboard.unwrap().inline_keyboard;
        let picks: usize = rows.iter().map(|r| r.len()).sum::<usize>() - 1;
        assert_eq!(picks, 9);
    }

    #[test]
    fn test_seasons_message() {
        let message = seasons_message("The Wire", "tt0306414", 2);
        let rows = message.keyboard.unwrap().inline_keyboard;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0].text, "S00 - Specials");
        assert_eq!(rows[0][0].callback_data, "tvimdb:tt0306414:00");
        assert_eq!(rows[2][0].text, "S02");
        assert_eq!(rows[3][0].callback_data, "cancel");
    }

    #[test]
    fn test_titles_message() {
        let message = titles_message(&[OmdbTitle {
            title: "Heat".to_string(),
            year: "1995".to_string(),
            imdb_id: "tt0113277".to_string(),
            kind: "movie".to_string(),
        }]);
        assert_eq!(message.text, "IMDB Results:");
        let rows = message.keyboard.unwrap().inline_keyboard;
        assert_eq!(rows[0][0].text, "Heat (1995)");
        assert_eq!(rows[0][0].callback_data, "imdb:tt0113277");
    }
}
