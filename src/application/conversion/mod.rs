//! 转换用例：任务执行与断点续做查询

mod job;
mod resume;

pub use job::{
    Audiobook, ControlSignal, ConversionJob, JobConfig, JobOutcome, JobSnapshot, CHAPTERS_FILE,
    COMBINED_AUDIO_FILE, DEFAULT_BATCH_SIZE,
};
pub use resume::{discard_resumable, inspect_resumable, ResumeInfo};
