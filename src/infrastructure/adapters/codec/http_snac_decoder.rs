//! HTTP SNAC Decoder - 调用外部神经解码服务
//!
//! 外部 API:
//! POST {base_url}/api/codec/decode
//! Request: {"codes": [[L1...], [L2...], [L3...]]}
//! Response: little-endian f32 PCM，单声道 24 kHz

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{CodecError, NeuralCodecPort, VOICE_DESCRIPTION_SAMPLE_RATE};
use crate::domain::CodecLevels;

#[derive(Debug, Serialize)]
struct DecodeHttpRequest<'a> {
    codes: [&'a [u32]; 3],
}

/// HTTP SNAC 解码器配置
#[derive(Debug, Clone)]
pub struct HttpSnacDecoderConfig {
    pub base_url: String,
    /// 请求超时时间（秒），0 表示不限制
    pub timeout_secs: u64,
}

impl Default for HttpSnacDecoderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout_secs: 0,
        }
    }
}

pub struct HttpSnacDecoder {
    client: Client,
    config: HttpSnacDecoderConfig,
}

impl HttpSnacDecoder {
    pub fn new(config: HttpSnacDecoderConfig) -> Result<Self, CodecError> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| CodecError::NetworkError(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn decode_url(&self) -> String {
        format!("{}/api/codec/decode", self.config.base_url.trim_end_matches('/'))
    }
}

/// f32 小端字节 → 样本
fn parse_f32le(bytes: &[u8]) -> Result<Vec<f32>, CodecError> {
    if bytes.len() % 4 != 0 {
        return Err(CodecError::InvalidResponse(format!(
            "PCM payload of {} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[async_trait]
impl NeuralCodecPort for HttpSnacDecoder {
    fn sample_rate(&self) -> u32 {
        VOICE_DESCRIPTION_SAMPLE_RATE
    }

    async fn decode(&self, levels: &CodecLevels) -> Result<Vec<f32>, CodecError> {
        let body = DecodeHttpRequest {
            codes: [
                levels.level1.as_slice(),
                levels.level2.as_slice(),
                levels.level3.as_slice(),
            ],
        };

        let response = self
            .client
            .post(self.decode_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CodecError::Timeout
                } else {
                    CodecError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CodecError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CodecError::InvalidResponse(e.to_string()))?;

        parse_f32le(&bytes)
    }
}
