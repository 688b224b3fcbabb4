//! Energy VAD - 基于短时 RMS 能量的首尾静音检测
//!
//! 按固定帧长计算 RMS，阈值取 max(峰值帧 RMS × threshold_ratio, min_rms)，
//! 第一帧与最后一帧超过阈值的位置即语音边界，再向两侧各留 padding。

use crate::application::ports::VoiceActivityPort;
use crate::domain::audio::ms_to_samples;
use crate::domain::Waveform;

/// Energy VAD 配置
#[derive(Debug, Clone)]
pub struct EnergyVadConfig {
    /// 分析帧长（毫秒）
    pub frame_ms: u64,
    /// 相对峰值帧的阈值比例
    pub threshold_ratio: f32,
    /// 绝对最低阈值，低于此值视为静音
    pub min_rms: f32,
    /// 语音边界两侧保留的余量（毫秒）
    pub padding_ms: u64,
}

impl Default for EnergyVadConfig {
    fn default() -> Self {
        Self {
            frame_ms: 30,
            threshold_ratio: 0.1,
            min_rms: 0.005,
            padding_ms: 50,
        }
    }
}

/// RMS（均方根）
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

pub struct EnergyVad {
    config: EnergyVadConfig,
}

impl EnergyVad {
    pub fn new(config: EnergyVadConfig) -> Self {
        Self { config }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(EnergyVadConfig::default())
    }
}

impl VoiceActivityPort for EnergyVad {
    fn speech_bounds(&self, waveform: &Waveform) -> Option<(usize, usize)> {
        let samples = waveform.samples();
        let frame_len = (ms_to_samples(self.config.frame_ms, waveform.sample_rate()) as usize).max(1);

        let energies: Vec<f32> = samples.chunks(frame_len).map(compute_rms).collect();
        let peak = energies.iter().copied().fold(0.0_f32, f32::max);
        let threshold = (peak * self.config.threshold_ratio).max(self.config.min_rms);

        let first = energies.iter().position(|&e| e >= threshold)?;
        let last = energies.iter().rposition(|&e| e >= threshold)?;

        let padding = ms_to_samples(self.config.padding_ms, waveform.sample_rate()) as usize;
        let start = (first * frame_len).saturating_sub(padding);
        let end = ((last + 1) * frame_len + padding).min(samples.len());

        Some((start, end))
    }
}
