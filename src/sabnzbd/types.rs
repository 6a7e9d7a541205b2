//! SABnzbd API 响应类型
//!
//! SABnzbd 的数值字段在不同版本中可能是数字，也可能是字符串，
//! 这里在反序列化边界统一处理

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{BeaconError, BeaconResult};

// =====================================================
// 队列 (mode=queue)
// =====================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueResponse {
    #[serde(default)]
    pub queue: Queue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Queue {
    #[serde(default)]
    pub slots: Vec<QueueSlot>,
}

/// 队列中的单个下载
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSlot {
    #[serde(default)]
    pub nzo_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub filename: String,
    /// 完成百分比，例如 "75" 或 "75%"
    #[serde(default, deserialize_with = "loose_string")]
    pub percentage: String,
    /// 总大小 (MB)
    #[serde(default, deserialize_with = "loose_number")]
    pub mb: f64,
    /// 剩余大小 (MB)
    #[serde(default, deserialize_with = "loose_number")]
    pub mbleft: f64,
}

impl QueueSlot {
    /// 百分比数值（去掉结尾的 %，解析失败按 0 处理）
    pub fn percent(&self) -> f64 {
        self.percentage
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse()
            .unwrap_or(0.0)
    }
}

// =====================================================
// 历史 (mode=history)
// =====================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: History,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct History {
    #[serde(default)]
    pub slots: Vec<HistorySlot>,
}

/// 历史记录中的单个下载
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistorySlot {
    #[serde(default)]
    pub nzo_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub storage: String,
    /// 下载大小（字节）
    #[serde(default, deserialize_with = "loose_number")]
    pub bytes: f64,
    #[serde(default)]
    pub download_time: TimeValue,
    #[serde(default)]
    pub postproc_time: TimeValue,
    #[serde(default)]
    pub fail_message: String,
}

// =====================================================
// 添加任务 (mode=addurl)
// =====================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddUrlResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub nzo_ids: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// =====================================================
// 时间字段
// =====================================================

/// 耗时字段（秒）
///
/// 下游可能返回整数、浮点数或数字字符串，其它类型标记为 Unsupported
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TimeValue {
    Integer(i64),
    Float(f64),
    Text(String),
    #[default]
    Unsupported,
}

impl TimeValue {
    /// 转换为整秒（浮点数截断）
    pub fn to_seconds(&self) -> BeaconResult<i64> {
        match self {
            Self::Integer(v) => Ok(*v),
            Self::Float(v) if v.is_finite() => Ok(v.trunc() as i64),
            Self::Float(v) => Err(BeaconError::UnsupportedTimeFormat(v.to_string())),
            Self::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .or_else(|_| {
                        trimmed
                            .parse::<f64>()
                            .ok()
                            .filter(|f| f.is_finite())
                            .map(|f| f.trunc() as i64)
                            .ok_or(())
                    })
                    .map_err(|_| BeaconError::UnsupportedTimeFormat(format!("\"{}\"", s)))
            }
            Self::Unsupported => Err(BeaconError::UnsupportedTimeFormat(
                "unsupported value".to_string(),
            )),
        }
    }
}

impl From<Value> for TimeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Unsupported
                }
            }
            Value::String(s) => Self::Text(s),
            _ => Self::Unsupported,
        }
    }
}

impl<'de> Deserialize<'de> for TimeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from(Value::deserialize(deserializer)?))
    }
}

/// 下载耗时 + 后处理耗时（秒）
pub fn elapsed_seconds(download_time: &TimeValue, postproc_time: &TimeValue) -> BeaconResult<i64> {
    let download = download_time.to_seconds()?;
    let postproc = postproc_time.to_seconds()?;
    Ok(download.saturating_add(postproc))
}

// =====================================================
// 宽松反序列化
// =====================================================

/// 数字或数字字符串 -> f64（无法解析时为 0）
fn loose_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// 字符串或数字 -> String
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
