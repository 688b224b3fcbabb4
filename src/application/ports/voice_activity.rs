//! Voice Activity Port - 语音活动检测

use crate::domain::Waveform;

pub trait VoiceActivityPort: Send + Sync {
    /// 语音区间 [start, end)（样本下标），未检测到语音时返回 None
    fn speech_bounds(&self, waveform: &Waveform) -> Option<(usize, usize)>;

    /// 裁掉首尾静音，未检测到语音时原样返回
    fn trim(&self, waveform: Waveform) -> Waveform {
        match self.speech_bounds(&waveform) {
            Some((start, end)) => waveform.slice(start, end),
            None => waveform,
        }
    }
}
