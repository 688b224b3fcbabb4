//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、NeuralCodec、ChunkStorage、ProgressStore 等）
//! - codec_decoder: codec token 解码
//! - generation: 单片段生成、时长校验与重试
//! - stitching: 片段拼接与章节标记
//! - conversion: 可断点续做的转换任务
//! - error: 任务失败原因

pub mod codec_decoder;
pub mod conversion;
pub mod error;
pub mod generation;
pub mod ports;
pub mod stitching;

pub use codec_decoder::CodecFrameDecoder;
pub use conversion::{
    discard_resumable, inspect_resumable, Audiobook, ControlSignal, ConversionJob, JobConfig,
    JobOutcome, JobSnapshot, ResumeInfo,
};
pub use error::JobFailure;
pub use generation::{ChunkOutcome, GenerationReport, GenerationSession, ValidationPolicy};
pub use stitching::{ChapterTrackingStitcher, StitchEntry, StitchError, StitchSummary};
