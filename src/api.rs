use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::parser::{parse_draw, parse_index_page};
use crate::types::{Draw, DrawIndexEntry};

pub const RECORD_TIMEOUT: Duration = Duration::from_secs(10);
pub const INDEX_TIMEOUT: Duration = Duration::from_secs(15);

/// The upstream feed. Every failure is reported as `None`; callers never see an error.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch_latest(&self) -> Option<Draw>;

    async fn fetch_by_id(&self, id: &str) -> Option<Draw>;

    /// `Some(vec![])` marks the end of the index.
    async fn fetch_index_page(&self, page: u32) -> Option<Vec<DrawIndexEntry>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub record_path: String,
    pub index_path: String,
    pub record_timeout: Duration,
    pub index_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lotto.api.rayriffy.com".to_string(),
            record_path: "record".to_string(),
            index_path: "index".to_string(),
            record_timeout: RECORD_TIMEOUT,
            index_timeout: INDEX_TIMEOUT,
        }
    }
}

pub struct HttpUpstream {
    client: Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, FetchError> {
        let url = self.url(path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(timeout)
                } else {
                    FetchError::Transport(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Decode(e)
            }
        })
    }

    async fn fetch_draw(&self, path: &str) -> Result<Draw, FetchError> {
        let payload = self.get_json(path, self.config.record_timeout).await?;
        Ok(parse_draw(&payload)?)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_latest(&self) -> Option<Draw> {
        match self.fetch_draw("latest").await {
            Ok(draw) => Some(draw),
            Err(e) => {
                warn!(error = %e, "latest fetch failed");
                None
            }
        }
    }

    async fn fetch_by_id(&self, id: &str) -> Option<Draw> {
        let path = format!("{}/{}", self.config.record_path, id);
        match self.fetch_draw(&path).await {
            Ok(draw) => Some(draw),
            Err(e) => {
                warn!(id, error = %e, "record fetch failed");
                None
            }
        }
    }

    async fn fetch_index_page(&self, page: u32) -> Option<Vec<DrawIndexEntry>> {
        let path = format!("{}/{}", self.config.index_path, page);
        let result = match self.get_json(&path, self.config.index_timeout).await {
            Ok(payload) => parse_index_page(&payload).map_err(FetchError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(page, error = %e, "index page fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_without_double_slash() {
        let upstream = HttpUpstream::new(UpstreamConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..UpstreamConfig::default()
        });
        assert_eq!(upstream.url("record/16012567"), "http://localhost:8080/record/16012567");
    }

    #[tokio::test]
    async fn unreachable_host_is_no_result() {
        let upstream = HttpUpstream::new(UpstreamConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            record_timeout: Duration::from_millis(500),
            index_timeout: Duration::from_millis(500),
            ..UpstreamConfig::default()
        });
        assert!(upstream.fetch_latest().await.is_none());
        assert!(upstream.fetch_index_page(1).await.is_none());
    }
}
