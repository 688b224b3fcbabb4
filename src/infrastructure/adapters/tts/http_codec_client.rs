//! HTTP Codec TTS Client - 语音描述引擎
//!
//! 外部服务只负责语言模型推理，返回生成的 token id；
//! 本地把 token 解包为 SNAC 帧，再交给神经解码器还原 24 kHz 音频。
//!
//! 外部 TTS API:
//! POST {base_url}/api/tts/generate
//! Request: {"description": "...", "text": "...", "max_new_tokens": N, "stop_token_id": 128258}
//! Response: {"token_ids": [...]}
//!
//! POST {base_url}/api/tts/generate_batch
//! Request: {"description": "...", "texts": [...], "max_new_tokens": N, "stop_token_id": 128258}
//! Response: {"results": [{"token_ids": [...]}, ...]}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::http_common::{
    build_client, check_health, ensure_success, map_send_error, request_unload,
    HttpTtsClientConfig,
};
use crate::application::codec_decoder::CodecFrameDecoder;
use crate::application::ports::{
    EngineKind, SynthesisRequest, TtsEnginePort, TtsError, VoiceConfig,
};
use crate::domain::codec::{CODE_END_TOKEN_ID, SNAC_TOKENS_PER_FRAME};
use crate::domain::Waveform;

/// 音色描述最大字符数
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// SNAC 每秒帧数
const FRAMES_PER_SECOND: f64 = 47.0;

/// 最少生成 token 数
const MIN_NEW_TOKENS: usize = 2048;

/// 按时长上限推算生成 token 预算
pub fn max_new_tokens(max_duration_secs: f64) -> usize {
    let frames = (max_duration_secs.max(0.0) * FRAMES_PER_SECOND) as usize;
    (frames * SNAC_TOKENS_PER_FRAME).max(MIN_NEW_TOKENS)
}

#[derive(Debug, Serialize)]
struct GenerateHttpRequest<'a> {
    description: &'a str,
    text: &'a str,
    max_new_tokens: usize,
    stop_token_id: u32,
}

#[derive(Debug, Serialize)]
struct GenerateBatchHttpRequest<'a> {
    description: &'a str,
    texts: Vec<&'a str>,
    max_new_tokens: usize,
    stop_token_id: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateHttpResponse {
    token_ids: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateBatchHttpResponse {
    results: Vec<GenerateHttpResponse>,
}

/// 语音描述引擎客户端
pub struct HttpCodecTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
    decoder: CodecFrameDecoder,
    loaded: AtomicBool,
}

impl HttpCodecTtsClient {
    pub fn new(config: HttpTtsClientConfig, decoder: CodecFrameDecoder) -> Result<Self, TtsError> {
        let client = build_client(config.timeout_secs)
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            decoder,
            loaded: AtomicBool::new(false),
        })
    }

    fn ensure_loaded(&self) -> Result<(), TtsError> {
        if self.loaded.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TtsError::NotLoaded)
        }
    }

    async fn decode(&self, token_ids: &[u32]) -> Result<Option<Waveform>, TtsError> {
        Ok(self.decoder.decode(token_ids).await?)
    }

    async fn post_batch(
        &self,
        description: &str,
        requests: &[SynthesisRequest],
    ) -> Result<Vec<GenerateHttpResponse>, TtsError> {
        let max_secs = requests
            .iter()
            .map(|r| r.max_duration_secs)
            .fold(0.0_f64, f64::max);
        let body = GenerateBatchHttpRequest {
            description,
            texts: requests.iter().map(|r| r.text.as_str()).collect(),
            max_new_tokens: max_new_tokens(max_secs),
            stop_token_id: CODE_END_TOKEN_ID,
        };

        let response = self
            .client
            .post(self.config.url("/api/tts/generate_batch"))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let parsed: GenerateBatchHttpResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))?;

        Ok(parsed.results)
    }
}

/// 取出并校验音色描述
fn description_of(voice: &VoiceConfig) -> Result<&str, TtsError> {
    match voice {
        VoiceConfig::Description(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TtsError::InvalidRequest(
                    "voice description is empty".to_string(),
                ));
            }
            if text.chars().count() > MAX_DESCRIPTION_CHARS {
                return Err(TtsError::InvalidRequest(format!(
                    "voice description exceeds {} characters",
                    MAX_DESCRIPTION_CHARS
                )));
            }
            Ok(text)
        }
        VoiceConfig::ReferenceAudio(_) => Err(TtsError::InvalidRequest(
            "voice description engine cannot use reference audio".to_string(),
        )),
    }
}

#[async_trait]
impl TtsEnginePort for HttpCodecTtsClient {
    fn kind(&self) -> EngineKind {
        EngineKind::VoiceDescription
    }

    fn sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    async fn load(&self) -> Result<(), TtsError> {
        if self.loaded.load(Ordering::SeqCst) {
            return Ok(());
        }
        check_health(&self.client, &self.config).await?;
        self.loaded.store(true, Ordering::SeqCst);
        tracing::info!(url = %self.config.base_url, "Voice description engine ready");
        Ok(())
    }

    async fn generate(&self, request: &SynthesisRequest) -> Result<Option<Waveform>, TtsError> {
        self.ensure_loaded()?;
        let description = description_of(&request.voice)?;

        let body = GenerateHttpRequest {
            description,
            text: &request.text,
            max_new_tokens: max_new_tokens(request.max_duration_secs),
            stop_token_id: CODE_END_TOKEN_ID,
        };

        tracing::debug!(
            text_len = request.text.len(),
            max_new_tokens = body.max_new_tokens,
            "Sending TTS generate request"
        );

        let response = self
            .client
            .post(self.config.url("/api/tts/generate"))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let parsed: GenerateHttpResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))?;

        self.decode(&parsed.token_ids).await
    }

    async fn generate_batch(
        &self,
        requests: &[SynthesisRequest],
    ) -> Vec<Result<Option<Waveform>, TtsError>> {
        if requests.is_empty() {
            return Vec::new();
        }
        let prepared = self
            .ensure_loaded()
            .and_then(|_| description_of(&requests[0].voice));
        let description = match prepared {
            Ok(d) => d,
            Err(e) => {
                let message = e.to_string();
                return requests
                    .iter()
                    .map(|_| Err(TtsError::InvalidRequest(message.clone())))
                    .collect();
            }
        };

        let results = match self.post_batch(description, requests).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, batch = requests.len(), "TTS batch request failed");
                let message = e.to_string();
                return requests
                    .iter()
                    .map(|_| Err(TtsError::ServiceError(message.clone())))
                    .collect();
            }
        };

        if results.len() != requests.len() {
            tracing::warn!(
                expected = requests.len(),
                got = results.len(),
                "TTS batch returned a different number of results"
            );
        }

        let mut waves = Vec::with_capacity(requests.len());
        let mut results = results.into_iter();
        for _ in requests {
            match results.next() {
                Some(item) => waves.push(self.decode(&item.token_ids).await),
                None => waves.push(Err(TtsError::InvalidResponse(
                    "missing batch result".to_string(),
                ))),
            }
        }
        waves
    }

    async fn cleanup(&self) {
        if self.loaded.swap(false, Ordering::SeqCst) {
            request_unload(&self.client, &self.config).await;
        }
    }
}
