//! Codec Frame Decoder - codec token → PCM
//!
//! 1. 截断到结束 token 并过滤非 codec token
//! 2. 按 7 token 一帧解包为三层码本
//! 3. 交给神经解码器还原波形，丢弃预热样本

use std::sync::Arc;

use crate::application::ports::{CodecError, NeuralCodecPort};
use crate::domain::codec::{extract_codec_tokens, trim_warmup, unpack_frames};
use crate::domain::Waveform;

pub struct CodecFrameDecoder {
    codec: Arc<dyn NeuralCodecPort>,
}

impl CodecFrameDecoder {
    pub fn new(codec: Arc<dyn NeuralCodecPort>) -> Self {
        Self { codec }
    }

    /// 输出采样率
    pub fn sample_rate(&self) -> u32 {
        self.codec.sample_rate()
    }

    /// 解码模型生成的 token 序列
    ///
    /// 不足一帧时返回 `Ok(None)`
    pub async fn decode(&self, token_ids: &[u32]) -> Result<Option<Waveform>, CodecError> {
        let codec_tokens = extract_codec_tokens(token_ids);
        let levels = unpack_frames(&codec_tokens);

        if levels.is_empty() {
            tracing::warn!(
                generated = token_ids.len(),
                codec_tokens = codec_tokens.len(),
                "No complete SNAC frame in generated tokens"
            );
            return Ok(None);
        }

        let samples = self.codec.decode(&levels).await?;
        let samples = trim_warmup(samples);

        tracing::debug!(
            frames = levels.frame_count(),
            samples = samples.len(),
            "SNAC frames decoded"
        );

        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(Waveform::new(samples, self.codec.sample_rate())))
    }
}
