//! Neural Codec Port - 神经音频解码器抽象
//!
//! 把三层 SNAC 码本还原为 PCM 波形

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CodecLevels;

/// 解码错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait NeuralCodecPort: Send + Sync {
    /// 解码输出的采样率
    fn sample_rate(&self) -> u32;

    /// 解码为 f32 PCM（含解码器预热样本）
    async fn decode(&self, levels: &CodecLevels) -> Result<Vec<f32>, CodecError>;
}
