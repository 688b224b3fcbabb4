//! TTS Engine Port - TTS 引擎抽象
//!
//! 两类引擎：
//! - 语音描述引擎：输出 SNAC codec token，经神经解码器得到 24 kHz 音频
//! - 声音克隆引擎：根据参考音频直接输出 22.05 kHz 音频
//!
//! 具体实现在 infrastructure/adapters/tts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use super::CodecError;
use crate::domain::Waveform;

/// 语音描述引擎（codec 路径）采样率
pub const VOICE_DESCRIPTION_SAMPLE_RATE: u32 = 24_000;

/// 声音克隆引擎采样率
pub const VOICE_CLONE_SAMPLE_RATE: u32 = 22_050;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Engine not loaded")]
    NotLoaded,

    #[error("Engine load failed: {0}")]
    LoadFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// 引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// 文本描述音色，codec token 输出
    #[default]
    VoiceDescription,
    /// 参考音频克隆音色
    VoiceClone,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::VoiceDescription => "voice_description",
            EngineKind::VoiceClone => "voice_clone",
        }
    }

    /// 引擎固有采样率
    pub fn sample_rate(&self) -> u32 {
        match self {
            EngineKind::VoiceDescription => VOICE_DESCRIPTION_SAMPLE_RATE,
            EngineKind::VoiceClone => VOICE_CLONE_SAMPLE_RATE,
        }
    }

    /// 是否需要时长校验（仅 codec 路径会出现长时间的幻觉输出）
    pub fn needs_duration_check(&self) -> bool {
        matches!(self, EngineKind::VoiceDescription)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voice_description" => Ok(EngineKind::VoiceDescription),
            "voice_clone" => Ok(EngineKind::VoiceClone),
            other => Err(format!("unknown engine kind: {}", other)),
        }
    }
}

/// 音色配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceConfig {
    /// 自然语言音色描述
    Description(String),
    /// 参考音频路径
    ReferenceAudio(PathBuf),
}

impl VoiceConfig {
    /// 该音色需要的引擎类型
    pub fn engine_kind(&self) -> EngineKind {
        match self {
            VoiceConfig::Description(_) => EngineKind::VoiceDescription,
            VoiceConfig::ReferenceAudio(_) => EngineKind::VoiceClone,
        }
    }

    /// 写入进度文件的音色标识
    pub fn identity(&self) -> String {
        match self {
            VoiceConfig::Description(text) => text.clone(),
            VoiceConfig::ReferenceAudio(path) => path.display().to_string(),
        }
    }
}

/// 单个片段的合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 片段文本
    pub text: String,
    /// 音色
    pub voice: VoiceConfig,
    /// 生成时长上限（秒），用于推算 token 预算
    pub max_duration_secs: f64,
}

/// TTS Engine Port
///
/// 生命周期: load → generate* → cleanup。
/// `generate` 返回 `Ok(None)` 表示模型没有产出可用音频。
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 引擎类型
    fn kind(&self) -> EngineKind;

    /// 输出音频采样率，所有 generate 结果都必须使用该采样率
    fn sample_rate(&self) -> u32 {
        self.kind().sample_rate()
    }

    /// 加载模型（已加载时应直接返回成功）
    async fn load(&self) -> Result<(), TtsError>;

    /// 合成单个片段
    async fn generate(&self, request: &SynthesisRequest) -> Result<Option<Waveform>, TtsError>;

    /// 批量合成，结果与请求一一对应
    async fn generate_batch(
        &self,
        requests: &[SynthesisRequest],
    ) -> Vec<Result<Option<Waveform>, TtsError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.generate(request).await);
        }
        results
    }

    /// 释放模型资源，失败只记录日志
    async fn cleanup(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_sample_rates() {
        assert_eq!(EngineKind::VoiceDescription.sample_rate(), 24000);
        assert_eq!(EngineKind::VoiceClone.sample_rate(), 22050);
        assert!(EngineKind::VoiceDescription.needs_duration_check());
        assert!(!EngineKind::VoiceClone.needs_duration_check());
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("voice_clone".parse::<EngineKind>(), Ok(EngineKind::VoiceClone));
        assert!("maya".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_voice_config_identity() {
        let voice = VoiceConfig::ReferenceAudio(PathBuf::from("/voices/narrator.wav"));
        assert_eq!(voice.engine_kind(), EngineKind::VoiceClone);
        assert_eq!(voice.identity(), "/voices/narrator.wav");
    }
}
