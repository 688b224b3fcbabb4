//! HTTP TTS 客户端公共部分：配置、reqwest 客户端构建、错误映射

use reqwest::{Client, Response};
use std::time::Duration;

use crate::application::ports::TtsError;

/// 健康检查超时（秒）
const HEALTH_TIMEOUT_SECS: u64 = 5;

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒），0 表示不限制
    pub timeout_secs: u64,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 0,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// 拼接接口地址，去掉 base_url 末尾多余的 '/'
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// 构建 reqwest 客户端
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder.build()
}

/// 发送失败映射为 TtsError
pub(crate) fn map_send_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
    } else {
        TtsError::NetworkError(e.to_string())
    }
}

/// 非 2xx 响应转为 ServiceError
pub(crate) async fn ensure_success(response: Response) -> Result<Response, TtsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(TtsError::ServiceError(format!("HTTP {}: {}", status, error_text)))
}

/// GET /health，用于 load
pub(crate) async fn check_health(client: &Client, config: &HttpTtsClientConfig) -> Result<(), TtsError> {
    let response = client
        .get(config.url("/health"))
        .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| TtsError::LoadFailed(map_send_error(e).to_string()))?;

    ensure_success(response)
        .await
        .map(|_| ())
        .map_err(|e| TtsError::LoadFailed(e.to_string()))
}

/// POST /api/tts/unload，尽力而为
pub(crate) async fn request_unload(client: &Client, config: &HttpTtsClientConfig) {
    let result = client
        .post(config.url("/api/tts/unload"))
        .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(url = %config.base_url, "TTS engine unloaded");
        }
        Ok(response) => {
            tracing::warn!(status = %response.status(), "TTS engine unload rejected");
        }
        Err(e) => {
            tracing::warn!(error = %e, "TTS engine unload failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpTtsClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 0);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpTtsClientConfig::new("http://example.com:9000/").with_timeout(60);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.url("/health"), "http://example.com:9000/health");
    }
}
