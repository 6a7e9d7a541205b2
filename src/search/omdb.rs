// OMDb 影片信息查询

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{BeaconError, BeaconResult};

/// 精确匹配和模糊搜索都失败
pub const NO_RESULTS: &str = "no results found";
/// 搜索过于宽泛，细化后仍然失败
pub const TOO_BROAD: &str = "no suitable results found, please try a more specific search";

/// OMDb 的 "结果过多" 错误
const TOO_MANY_RESULTS: &str = "Too many results.";

/// 一条影片/剧集信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmdbTitle {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Year", default)]
    pub year: String,
    #[serde(rename = "imdbID", default)]
    pub imdb_id: String,
    #[serde(rename = "Type", default)]
    pub kind: String,
}

/// 剧集详情
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInfo {
    pub title: OmdbTitle,
    /// 季数，OMDb 返回 "N/A" 时为 None
    pub total_seasons: Option<u32>,
}

/// t= 精确匹配响应
#[derive(Debug, Deserialize)]
struct TitleResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Error", default)]
    error: String,
    #[serde(flatten)]
    title: OmdbTitle,
    #[serde(rename = "totalSeasons", default)]
    total_seasons: Option<String>,
}

/// s= 搜索响应
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbTitle>,
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Error", default)]
    error: String,
}

/// 下载分类对应的 OMDb 类型
pub fn media_type(category: &str) -> &'static str {
    match category {
        "tv" | "kids_tv" => "series",
        _ => "movie",
    }
}

/// 是否为 "搜索过于宽泛" 错误
pub fn is_too_broad(err: &BeaconError) -> bool {
    matches!(err, BeaconError::Search(msg) if msg == TOO_BROAD)
}

/// OMDb 客户端
#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(config: &SearchConfig) -> BeaconResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BeaconError::Config(format!("failed to build OMDb client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.omdb_base_url.clone(),
            api_key: config.omdb_api_key.clone(),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, params: &[(&str, &str)]) -> BeaconResult<T> {
        let mut query = vec![("apikey", self.api_key.as_str())];
        query.extend_from_slice(params);

        let resp = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| BeaconError::Search(format!("error making OMDb request: {}", e)))?;

        if !resp.status().is_success() {
            return Err(BeaconError::Search(format!(
                "bad status from OMDb: {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| BeaconError::Search(format!("error decoding OMDb response: {}", e)))
    }

    /// 按标题查找：先精确匹配，失败后退回模糊搜索
    pub async fn search(
        &self,
        title: &str,
        year: &str,
        category: &str,
    ) -> BeaconResult<Vec<OmdbTitle>> {
        if self.api_key.is_empty() {
            return Err(BeaconError::Config("OMDb api key is not set".to_string()));
        }

        let kind = media_type(category);
        info!("OMDb 搜索: title='{}', year='{}', type={}", title, year, kind);

        match self.specific_match(title, year, kind).await {
            Ok(found) => {
                debug!("OMDb 精确匹配成功: {:?}", found.title);
                return Ok(vec![found.title]);
            }
            Err(e) => debug!("OMDb 精确匹配失败: {}，改用搜索", e),
        }

        match self.perform_search(title, year, kind).await {
            Ok(results) => Ok(results),
            Err(SearchFailure::TooMany) => {
                info!("OMDb 结果过多，合并标题和年份重新搜索");
                let refined = format!("{} {}", title, year);
                self.perform_search(refined.trim(), "", kind)
                    .await
                    .map_err(|e| {
                        warn!("OMDb 细化搜索失败: {}", e.describe());
                        BeaconError::Search(TOO_BROAD.to_string())
                    })
            }
            Err(e) => {
                warn!("OMDb 搜索失败: {}", e.describe());
                Err(BeaconError::Search(NO_RESULTS.to_string()))
            }
        }
    }

    /// 查询剧集（含季数）
    pub async fn lookup_series(&self, title: &str, year: &str) -> BeaconResult<SeriesInfo> {
        if self.api_key.is_empty() {
            return Err(BeaconError::Config("OMDb api key is not set".to_string()));
        }
        self.specific_match(title, year, "series").await
    }

    async fn specific_match(&self, title: &str, year: &str, kind: &str) -> BeaconResult<SeriesInfo> {
        let resp: TitleResponse = self
            .get(&[("t", title), ("y", year), ("type", kind)])
            .await?;

        if resp.response.eq_ignore_ascii_case("false") {
            return Err(BeaconError::Search(resp.error));
        }

        Ok(SeriesInfo {
            title: resp.title,
            total_seasons: resp.total_seasons.and_then(|s| s.trim().parse().ok()),
        })
    }

    async fn perform_search(
        &self,
        title: &str,
        year: &str,
        kind: &str,
    ) -> Result<Vec<OmdbTitle>, SearchFailure> {
        let resp: SearchResponse = self
            .get(&[("s", title), ("y", year), ("type", kind)])
            .await
            .map_err(SearchFailure::Request)?;

        if resp.response.eq_ignore_ascii_case("false") {
            if resp.error == TOO_MANY_RESULTS {
                return Err(SearchFailure::TooMany);
            }
            return Err(SearchFailure::Rejected(resp.error));
        }

        if resp.search.is_empty() {
            return Err(SearchFailure::Rejected(NO_RESULTS.to_string()));
        }
        Ok(resp.search)
    }
}

#[derive(Debug)]
enum SearchFailure {
    TooMany,
    Rejected(String),
    Request(BeaconError),
}

impl SearchFailure {
    fn describe(&self) -> String {
        match self {
            Self::TooMany => TOO_MANY_RESULTS.to_string(),
            Self::Rejected(msg) => msg.clone(),
            Self::Request(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OmdbClient {
        OmdbClient::new(&SearchConfig {
            omdb_base_url: format!("{}/", server.uri()),
            omdb_api_key: "k".to_string(),
            ..SearchConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("movies"), "movie");
        assert_eq!(media_type("kids_movies"), "movie");
        assert_eq!(media_type("tv"), "series");
        assert_eq!(media_type("kids_tv"), "series");
    }

    #[tokio::test]
    async fn test_specific_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("t", "Heat"))
            .and(query_param("type", "movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "True",
                "Title": "Heat",
                "Year": "1995",
                "imdbID": "tt0113277",
                "Type": "movie"
            })))
            .mount(&server)
            .await;

        let results = client_for(&server).search("Heat", "1995", "movies").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].imdb_id, "tt0113277");
    }

    #[tokio::test]
    async fn test_falls_back_to_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param_is_missing("s"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "False",
                "Error": "Movie not found!"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("s", "Heat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "True",
                "Search": [
                    {"Title": "Heat", "Year": "1995", "imdbID": "tt0113277", "Type": "movie"},
                    {"Title": "Heat", "Year": "1986", "imdbID": "tt0093164", "Type": "movie"}
                ]
            })))
            .mount(&server)
            .await;

        let results = client_for(&server).search("Heat", "", "movies").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_too_many_results_refines_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "False",
                "Error": "Too many results."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).search("The", "2001", "movies").await.unwrap_err();
        assert!(is_too_broad(&err));
        // 精确匹配 + 搜索 + 细化搜索
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_lookup_series_seasons() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("type", "series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "True",
                "Title": "The Wire",
                "Year": "2002–2008",
                "imdbID": "tt0306414",
                "Type": "series",
                "totalSeasons": "5"
            })))
            .mount(&server)
            .await;

        let info = client_for(&server).lookup_series("The Wire", "").await.unwrap();
        assert_eq!(info.total_seasons, Some(5));
        assert_eq!(info.title.title, "The Wire");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = OmdbClient::new(&SearchConfig::default()).unwrap();
        let err = client.search("Heat", "1995", "movies").await.unwrap_err();
        assert!(matches!(err, BeaconError::Config(_)));
    }
}
