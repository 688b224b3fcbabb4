//! Domain Layer - 领域层
//!
//! - audio: 波形值对象
//! - codec: SNAC 编码帧解包
//! - text_cleaner / text_chunker: 文本清洗与分块
//! - conversion: 转换上下文（片段计划、进度、状态、章节标记）

pub mod audio;
pub mod codec;
pub mod conversion;
pub mod text_chunker;
pub mod text_cleaner;

pub use audio::Waveform;
pub use codec::CodecLevels;
pub use conversion::{
    ChapterMarker, ChapterText, Chunk, ChunkPlan, ConversionProgress, JobState, ProgressError,
};
pub use text_chunker::{ChunkerConfig, TextChunker};
