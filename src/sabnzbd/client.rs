// SABnzbd HTTP 客户端

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::types::{AddUrlResponse, HistoryResponse, QueueResponse};
use crate::config::SabnzbdConfig;
use crate::error::{BeaconError, BeaconResult};

/// SABnzbd API 客户端
#[derive(Debug, Clone)]
pub struct SabnzbdClient {
    client: Client,
    /// API 基础地址，例如 http://localhost:8080
    api_url: String,
    api_key: String,
}

impl SabnzbdClient {
    pub fn new(config: &SabnzbdConfig) -> BeaconResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BeaconError::Config(format!("failed to build SABnzbd client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api", self.api_url)
    }

    /// 发起一次 API 调用，失败时返回描述文本
    async fn call<T: DeserializeOwned>(
        &self,
        mode: &str,
        params: &[(&str, &str)],
    ) -> Result<T, String> {
        let mut query: Vec<(&str, &str)> = vec![
            ("output", "json"),
            ("apikey", self.api_key.as_str()),
            ("mode", mode),
        ];
        query.extend_from_slice(params);

        debug!("请求 SABnzbd: mode={}", mode);

        let resp = self
            .client
            .get(self.endpoint())
            .query(&query)
            .send()
            .await
            .map_err(|e| format!("failed to reach SABnzbd ({}): {}", mode, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("bad status from SABnzbd API: {}", status));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| format!("failed to read SABnzbd response: {}", e))?;

        serde_json::from_str(&body).map_err(|e| {
            warn!("SABnzbd 响应解析失败: mode={}, body={}", mode, body);
            format!("failed to decode SABnzbd response: {}", e)
        })
    }

    /// 查询队列中的指定任务
    pub async fn queue(&self, nzo_id: &str) -> BeaconResult<QueueResponse> {
        self.call("queue", &[("nzo_ids", nzo_id)])
            .await
            .map_err(BeaconError::ProbeUnavailable)
    }

    /// 查询历史中的指定任务
    pub async fn history(&self, nzo_id: &str) -> BeaconResult<HistoryResponse> {
        self.call("history", &[("nzo_ids", nzo_id)])
            .await
            .map_err(BeaconError::ProbeUnavailable)
    }

    /// 提交 NZB 下载地址，返回下载队列 ID
    pub async fn add_url(&self, nzb_url: &str, category: &str) -> BeaconResult<String> {
        info!("提交 NZB 到 SABnzbd: category={}", category);

        let resp: AddUrlResponse = self
            .call("addurl", &[("name", nzb_url), ("cat", category)])
            .await
            .map_err(BeaconError::Submit)?;

        if !resp.status {
            let reason = resp.error.unwrap_or_else(|| "SABnzbd failed to add NZB".to_string());
            return Err(BeaconError::Submit(reason));
        }

        resp.nzo_ids
            .into_iter()
            .next()
            .ok_or_else(|| BeaconError::Submit("SABnzbd failed to add NZB".to_string()))
    }
}

/// 下载提交接口
#[async_trait]
pub trait DownloadSubmitter: Send + Sync {
    /// 提交 NZB 地址，返回下载队列 ID
    async fn submit(&self, nzb_url: &str, category: &str) -> BeaconResult<String>;
}

#[async_trait]
impl DownloadSubmitter for SabnzbdClient {
    async fn submit(&self, nzb_url: &str, category: &str) -> BeaconResult<String> {
        self.add_url(nzb_url, category).await
    }
}
