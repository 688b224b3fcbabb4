//! Generation Session - 单片段生成、校验与重试
//!
//! codec 路径的模型偶尔会输出远超文本长度的音频（幻觉），或几乎没有声音。
//! 每次生成后按字符数估算预期时长，偏差超过容差则重试，最多 max_attempts 次。

use std::sync::Arc;

use crate::application::ports::{
    SynthesisRequest, TtsEnginePort, TtsError, VoiceActivityPort, VoiceConfig,
};
use crate::domain::Waveform;

/// 默认朗读速度（字符/秒）
pub const DEFAULT_CHARS_PER_SECOND: f64 = 15.0;

/// 默认时长容差（相对偏差）
pub const DEFAULT_DURATION_TOLERANCE: f64 = 0.5;

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 默认单片段时长上限（秒）
pub const DEFAULT_MAX_DURATION_SECS: f64 = 60.0;

/// 时长校验策略
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// 预期朗读速度（字符/秒）
    pub chars_per_second: f64,
    /// 允许的相对偏差
    pub tolerance: f64,
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 是否启用时长校验
    pub duration_check: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            chars_per_second: DEFAULT_CHARS_PER_SECOND,
            tolerance: DEFAULT_DURATION_TOLERANCE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            duration_check: true,
        }
    }
}

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// 通过校验的音频
    Success(Waveform),
    /// 没有产出音频
    EmptyOutput,
    /// 时长偏差超出容差
    ValidationFailed {
        deviation: f64,
        actual_secs: f64,
        expected_secs: f64,
    },
    /// 引擎报错
    EngineError(String),
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChunkOutcome::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChunkOutcome::Success(_) => "success",
            ChunkOutcome::EmptyOutput => "empty_output",
            ChunkOutcome::ValidationFailed { .. } => "validation_failed",
            ChunkOutcome::EngineError(_) => "engine_error",
        }
    }
}

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Accept,
    Retry,
    GiveUp,
}

/// 根据本次结果与已尝试次数决定下一步
pub fn retry_decision(outcome: &ChunkOutcome, attempt: u32, max_attempts: u32) -> RetryDecision {
    match outcome {
        ChunkOutcome::Success(_) => RetryDecision::Accept,
        _ if attempt < max_attempts => RetryDecision::Retry,
        _ => RetryDecision::GiveUp,
    }
}

/// 按字符数估算朗读时长（秒）
pub fn expected_duration_secs(text: &str, chars_per_second: f64) -> f64 {
    if chars_per_second <= 0.0 {
        return 0.0;
    }
    text.chars().count() as f64 / chars_per_second
}

/// 相对偏差 |actual - expected| / expected，预期为 0 时定义为 0
pub fn duration_deviation(actual_secs: f64, expected_secs: f64) -> f64 {
    if expected_secs <= 0.0 {
        return 0.0;
    }
    (actual_secs - expected_secs).abs() / expected_secs
}

/// 一个片段的最终生成结果
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// 最后一次尝试的结果
    pub outcome: ChunkOutcome,
    /// 实际尝试次数
    pub attempts: u32,
}

impl GenerationReport {
    pub fn into_waveform(self) -> Option<Waveform> {
        match self.outcome {
            ChunkOutcome::Success(wave) => Some(wave),
            _ => None,
        }
    }
}

/// 生成会话
pub struct GenerationSession {
    engine: Arc<dyn TtsEnginePort>,
    vad: Option<Arc<dyn VoiceActivityPort>>,
    policy: ValidationPolicy,
    max_duration_secs: f64,
}

impl GenerationSession {
    pub fn new(engine: Arc<dyn TtsEnginePort>, policy: ValidationPolicy) -> Self {
        Self {
            engine,
            vad: None,
            policy,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }

    /// 时长校验前先裁掉首尾静音
    pub fn with_vad(mut self, vad: Option<Arc<dyn VoiceActivityPort>>) -> Self {
        self.vad = vad;
        self
    }

    pub fn with_max_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    pub fn engine(&self) -> &Arc<dyn TtsEnginePort> {
        &self.engine
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// 输出采样率
    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    /// 时长校验是否生效（需同时满足配置开启且引擎为 codec 路径）
    pub fn duration_check_active(&self) -> bool {
        self.policy.duration_check && self.engine.kind().needs_duration_check()
    }

    fn request(&self, text: &str, voice: &VoiceConfig) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: voice.clone(),
            max_duration_secs: self.max_duration_secs,
        }
    }

    /// 评估一次引擎输出
    pub fn evaluate(
        &self,
        text: &str,
        result: Result<Option<Waveform>, TtsError>,
    ) -> ChunkOutcome {
        let wave = match result {
            Err(e) => return ChunkOutcome::EngineError(e.to_string()),
            Ok(None) => return ChunkOutcome::EmptyOutput,
            Ok(Some(wave)) if wave.is_empty() => return ChunkOutcome::EmptyOutput,
            Ok(Some(wave)) => wave,
        };

        let expected_rate = self.engine.sample_rate();
        if wave.sample_rate() != expected_rate {
            return ChunkOutcome::EngineError(format!(
                "sample rate mismatch: engine declared {} Hz, got {} Hz",
                expected_rate,
                wave.sample_rate()
            ));
        }

        if !self.duration_check_active() {
            return ChunkOutcome::Success(wave);
        }

        let wave = match &self.vad {
            Some(vad) => vad.trim(wave),
            None => wave,
        };
        if wave.is_empty() {
            return ChunkOutcome::EmptyOutput;
        }

        let expected_secs = expected_duration_secs(text, self.policy.chars_per_second);
        let actual_secs = wave.duration_secs();
        let deviation = duration_deviation(actual_secs, expected_secs);

        if deviation > self.policy.tolerance {
            return ChunkOutcome::ValidationFailed {
                deviation,
                actual_secs,
                expected_secs,
            };
        }

        ChunkOutcome::Success(wave)
    }

    /// 生成一个片段，失败时按策略重试
    pub async fn generate(&self, text: &str, voice: &VoiceConfig) -> GenerationReport {
        let request = self.request(text, voice);
        let first = self.evaluate(text, self.engine.generate(&request).await);
        self.retry_from(&request, first).await
    }

    /// 批量生成：首次尝试走引擎批量接口，之后逐个重试
    pub async fn generate_batch(&self, texts: &[&str], voice: &VoiceConfig) -> Vec<GenerationReport> {
        let requests: Vec<SynthesisRequest> =
            texts.iter().map(|text| self.request(text, voice)).collect();

        let mut raw = self.engine.generate_batch(&requests).await.into_iter();
        let mut reports = Vec::with_capacity(requests.len());

        for request in &requests {
            let result = raw.next().unwrap_or_else(|| {
                Err(TtsError::InvalidResponse(
                    "batch returned fewer results than requests".to_string(),
                ))
            });
            let first = self.evaluate(&request.text, result);
            reports.push(self.retry_from(request, first).await);
        }

        reports
    }

    async fn retry_from(&self, request: &SynthesisRequest, first: ChunkOutcome) -> GenerationReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        let mut outcome = first;

        loop {
            match retry_decision(&outcome, attempt, max_attempts) {
                RetryDecision::Accept => break,
                RetryDecision::GiveUp => {
                    tracing::warn!(
                        attempts = attempt,
                        reason = outcome.label(),
                        detail = ?outcome_detail(&outcome),
                        text_chars = request.text.chars().count(),
                        "Chunk generation gave up"
                    );
                    break;
                }
                RetryDecision::Retry => {
                    tracing::info!(
                        attempt,
                        max_attempts,
                        reason = outcome.label(),
                        detail = ?outcome_detail(&outcome),
                        "Chunk attempt rejected, retrying"
                    );
                    attempt += 1;
                    outcome = self.evaluate(&request.text, self.engine.generate(request).await);
                }
            }
        }

        GenerationReport {
            outcome,
            attempts: attempt,
        }
    }
}

fn outcome_detail(outcome: &ChunkOutcome) -> Option<String> {
    match outcome {
        ChunkOutcome::ValidationFailed {
            deviation,
            actual_secs,
            expected_secs,
        } => Some(format!(
            "actual {:.2}s vs expected {:.2}s (deviation {:.2})",
            actual_secs, expected_secs, deviation
        )),
        ChunkOutcome::EngineError(e) => Some(e.clone()),
        _ => None,
    }
}
