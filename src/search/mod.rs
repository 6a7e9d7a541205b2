//! 影片信息与下载候选搜索
//!
//! - omdb: 标题 -> IMDb ID
//! - newznab: IMDb ID / 关键词 -> NZB 候选

pub mod newznab;
pub mod omdb;

pub use newznab::{FeedItem, FeedSearchResult, NewznabClient};
pub use omdb::{OmdbClient, OmdbTitle, SeriesInfo};
