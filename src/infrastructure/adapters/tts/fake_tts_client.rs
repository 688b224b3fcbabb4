//! Fake TTS Client - 用于测试的 TTS 客户端
//!
//! 不调用任何模型，按文本长度生成正弦波音频。
//! 通过规则（文本包含某个标记）模拟空输出、过短音频和引擎错误。

use async_trait::async_trait;
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::application::ports::{EngineKind, SynthesisRequest, TtsEnginePort, TtsError};
use crate::domain::Waveform;

/// 测试音高（Hz）
const TONE_HZ: f32 = 220.0;

/// 测试音振幅
const TONE_AMPLITUDE: f32 = 0.3;

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 模拟的引擎类型，决定输出采样率
    pub kind: EngineKind,
    /// 生成音频对应的朗读速度（字符/秒）
    pub chars_per_second: f64,
    /// 每次生成的模拟延迟（毫秒）
    pub latency_ms: u64,
    /// load 是否失败
    pub fail_load: bool,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::VoiceDescription,
            chars_per_second: 15.0,
            latency_ms: 0,
            fail_load: false,
        }
    }
}

/// 命中规则时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// 正常时长
    Normal,
    /// 不产出音频
    Empty,
    /// 只有正常时长的 10%
    TooShort,
    /// 总是返回错误
    Error,
    /// 前 N 次返回错误，之后正常
    FailTimes(u32),
}

/// Fake TTS Client
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    rules: Vec<(String, FakeBehavior)>,
    failures: Mutex<HashMap<String, u32>>,
    prompts: Mutex<Vec<String>>,
    generate_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    load_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            kind = %config.kind,
            chars_per_second = config.chars_per_second,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            rules: Vec::new(),
            failures: Mutex::new(HashMap::new()),
            prompts: Mutex::new(Vec::new()),
            generate_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            cleanup_calls: AtomicUsize::new(0),
        }
    }

    /// 文本包含 marker 时使用指定行为（按添加顺序匹配第一条）
    pub fn with_rule(mut self, marker: impl Into<String>, behavior: FakeBehavior) -> Self {
        self.rules.push((marker.into(), behavior));
        self
    }

    /// 生成请求次数（批量请求按条计）
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }

    /// 按请求顺序记录的文本
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn behavior_for(&self, text: &str) -> (Option<&str>, FakeBehavior) {
        self.rules
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map(|(marker, behavior)| (Some(marker.as_str()), *behavior))
            .unwrap_or((None, FakeBehavior::Normal))
    }

    /// FailTimes 规则：该标记已失败次数未达上限时返回 true 并计数
    fn should_fail(&self, marker: &str, times: u32) -> bool {
        let Ok(mut failures) = self.failures.lock() else {
            return false;
        };
        let count = failures.entry(marker.to_string()).or_insert(0);
        if *count < times {
            *count += 1;
            true
        } else {
            false
        }
    }

    fn tone(&self, secs: f64) -> Waveform {
        let sample_rate = self.config.kind.sample_rate();
        let len = (secs * sample_rate as f64).round() as usize;
        let step = TAU * TONE_HZ / sample_rate as f32;
        let samples = (0..len)
            .map(|i| (i as f32 * step).sin() * TONE_AMPLITUDE)
            .collect();
        Waveform::new(samples, sample_rate)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Option<Waveform>, TtsError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.text.clone());
        }

        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        let natural_secs = if self.config.chars_per_second > 0.0 {
            request.text.chars().count() as f64 / self.config.chars_per_second
        } else {
            0.0
        };

        let (marker, behavior) = self.behavior_for(&request.text);
        tracing::debug!(
            text_len = request.text.len(),
            behavior = ?behavior,
            "FakeTtsClient: synthesizing tone"
        );

        match behavior {
            FakeBehavior::Normal => Ok(Some(self.tone(natural_secs))),
            FakeBehavior::Empty => Ok(None),
            FakeBehavior::TooShort => Ok(Some(self.tone(natural_secs * 0.1))),
            FakeBehavior::Error => Err(TtsError::ServiceError("fake engine failure".to_string())),
            FakeBehavior::FailTimes(times) => {
                if self.should_fail(marker.unwrap_or_default(), times) {
                    Err(TtsError::ServiceError("fake transient failure".to_string()))
                } else {
                    Ok(Some(self.tone(natural_secs)))
                }
            }
        }
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    fn kind(&self) -> EngineKind {
        self.config.kind
    }

    async fn load(&self) -> Result<(), TtsError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_load {
            return Err(TtsError::LoadFailed("fake load failure".to_string()));
        }
        Ok(())
    }

    async fn generate(&self, request: &SynthesisRequest) -> Result<Option<Waveform>, TtsError> {
        self.synthesize(request).await
    }

    async fn generate_batch(
        &self,
        requests: &[SynthesisRequest],
    ) -> Vec<Result<Option<Waveform>, TtsError>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.synthesize(request).await);
        }
        results
    }

    async fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::VoiceConfig;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: VoiceConfig::Description("test".to_string()),
            max_duration_secs: 60.0,
        }
    }

    #[tokio::test]
    async fn test_tone_length_follows_text() {
        let client = FakeTtsClient::new(FakeTtsClientConfig::default());
        let wave = client.generate(&request(&"x".repeat(30))).await.unwrap().unwrap();

        assert_eq!(wave.sample_rate(), 24000);
        assert_eq!(wave.len(), 48000);
        assert_eq!(client.prompts(), vec!["x".repeat(30)]);
    }

    #[tokio::test]
    async fn test_fail_times_then_recovers() {
        let client = FakeTtsClient::new(FakeTtsClientConfig::default())
            .with_rule("flaky", FakeBehavior::FailTimes(1));

        assert!(client.generate(&request("flaky text")).await.is_err());
        assert!(client.generate(&request("flaky text")).await.unwrap().is_some());
        assert_eq!(client.generate_calls(), 2);
    }
}
