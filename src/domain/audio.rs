//! Audio - 波形值对象
//!
//! 单声道 f32 PCM，样本范围 [-1.0, 1.0]

/// 单声道 PCM 波形
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// 指定时长的静音
    pub fn silence(duration_ms: u64, sample_rate: u32) -> Self {
        let len = ms_to_samples(duration_ms, sample_rate) as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 时长（秒）
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// 时长（毫秒，向下取整）
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len() as u64, self.sample_rate)
    }

    /// 截取 [start, end) 区间，越界部分会被截断
    pub fn slice(&self, start: usize, end: usize) -> Waveform {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Waveform::new(self.samples[start..end].to_vec(), self.sample_rate)
    }
}

/// 样本数换算为毫秒
pub fn samples_to_ms(samples: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples * 1000 / sample_rate as u64
}

/// 毫秒换算为样本数
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> u64 {
    ms * sample_rate as u64 / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let wave = Waveform::new(vec![0.0; 24000], 24000);
        assert_eq!(wave.duration_ms(), 1000);
        assert!((wave.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_silence_length() {
        let silence = Waveform::silence(400, 22050);
        assert_eq!(silence.len(), 8820);
        assert!(silence.samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_slice_clamps_bounds() {
        let wave = Waveform::new(vec![0.1, 0.2, 0.3, 0.4], 4);
        assert_eq!(wave.slice(1, 3).samples(), &[0.2, 0.3]);
        assert_eq!(wave.slice(3, 10).samples(), &[0.4]);
        assert!(wave.slice(5, 2).is_empty());
    }
}
