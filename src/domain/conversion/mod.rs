//! Conversion Context - 有声书转换上下文
//!
//! 片段计划、进度记录、任务状态与章节标记

mod chunk;
mod errors;
mod marker;
mod progress;
mod state;

pub use chunk::{ChapterText, Chunk, ChunkPlan};
pub use errors::ProgressError;
pub use marker::{
    derive_chapter_markers, escape_metadata, render_ffmetadata, ChapterMarker, ChapterTimeline,
    DEFAULT_SILENCE_MS,
};
pub use progress::ConversionProgress;
pub use state::JobState;
