//! HTTP Clone TTS Client - 声音克隆引擎
//!
//! 外部 TTS API:
//! POST {base_url}/api/tts/clone
//! Request: {"text": "...", "reference_audio": "/path/to/voice.wav"}  (JSON)
//! Response: audio/wav binary，22.05 kHz

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use super::http_common::{
    build_client, check_health, ensure_success, map_send_error, request_unload,
    HttpTtsClientConfig,
};
use super::wav_decode::decode_wav;
use crate::application::ports::{
    EngineKind, SynthesisRequest, TtsEnginePort, TtsError, VoiceConfig, VOICE_CLONE_SAMPLE_RATE,
};
use crate::domain::Waveform;

#[derive(Debug, Serialize)]
struct CloneHttpRequest<'a> {
    text: &'a str,
    /// 参考音频路径（TTS 服务自行读取并缓存）
    reference_audio: String,
}

/// 声音克隆引擎客户端
pub struct HttpCloneTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
    loaded: AtomicBool,
}

impl HttpCloneTtsClient {
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = build_client(config.timeout_secs)
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            loaded: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TtsEnginePort for HttpCloneTtsClient {
    fn kind(&self) -> EngineKind {
        EngineKind::VoiceClone
    }

    async fn load(&self) -> Result<(), TtsError> {
        if self.loaded.load(Ordering::SeqCst) {
            return Ok(());
        }
        check_health(&self.client, &self.config).await?;
        self.loaded.store(true, Ordering::SeqCst);
        tracing::info!(url = %self.config.base_url, "Voice clone engine ready");
        Ok(())
    }

    async fn generate(&self, request: &SynthesisRequest) -> Result<Option<Waveform>, TtsError> {
        if !self.loaded.load(Ordering::SeqCst) {
            return Err(TtsError::NotLoaded);
        }
        let VoiceConfig::ReferenceAudio(reference) = &request.voice else {
            return Err(TtsError::InvalidRequest(
                "voice clone engine requires reference audio".to_string(),
            ));
        };

        let body = CloneHttpRequest {
            text: &request.text,
            reference_audio: reference.display().to_string(),
        };

        tracing::debug!(
            text_len = request.text.len(),
            reference = %body.reference_audio,
            "Sending TTS clone request"
        );

        let response = self
            .client
            .post(self.config.url("/api/tts/clone"))
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let bytes = ensure_success(response)
            .await?
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?;

        if bytes.is_empty() {
            return Ok(None);
        }

        let wave = decode_wav(bytes.to_vec())
            .map_err(|e| TtsError::InvalidResponse(e.to_string()))?;

        if wave.sample_rate() != VOICE_CLONE_SAMPLE_RATE {
            return Err(TtsError::InvalidResponse(format!(
                "expected {} Hz audio, got {} Hz",
                VOICE_CLONE_SAMPLE_RATE,
                wave.sample_rate()
            )));
        }

        tracing::debug!(
            samples = wave.len(),
            duration_ms = wave.duration_ms(),
            "TTS clone completed"
        );

        if wave.is_empty() {
            return Ok(None);
        }
        Ok(Some(wave))
    }

    async fn cleanup(&self) {
        if self.loaded.swap(false, Ordering::SeqCst) {
            request_unload(&self.client, &self.config).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_requires_load() {
        let client = HttpCloneTtsClient::new(HttpTtsClientConfig::new("http://127.0.0.1:9")).unwrap();
        let request = SynthesisRequest {
            text: "Hello.".to_string(),
            voice: VoiceConfig::ReferenceAudio("/voices/a.wav".into()),
            max_duration_secs: 60.0,
        };
        assert!(matches!(client.generate(&request).await, Err(TtsError::NotLoaded)));
        assert_eq!(client.sample_rate(), 22050);
    }
}
