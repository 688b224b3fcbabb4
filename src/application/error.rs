//! Application Errors - 转换任务失败原因

use thiserror::Error;

use crate::application::ports::{ProgressStoreError, StorageError, TtsError};
use crate::application::stitching::StitchError;
use crate::domain::ProgressError;

/// 缺失片段在错误信息中最多列出的数量
const MISSING_PREVIEW: usize = 10;

/// 转换任务失败原因
///
/// 除 NoChunks 外，失败时进度文件都会保留，可以断点续做
#[derive(Debug, Error)]
pub enum JobFailure {
    #[error("No chunks to convert")]
    NoChunks,

    #[error("TTS engine failed to load: {0}")]
    EngineLoad(#[from] TtsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Progress checkpoint failed: {0}")]
    Checkpoint(#[from] ProgressStoreError),

    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("{} chunk(s) missing: {}", missing.len(), preview(missing))]
    Incomplete { missing: Vec<usize> },

    #[error("Stitching failed: {0}")]
    Stitch(#[from] StitchError),

    #[error("Worker error: {0}")]
    Worker(String),
}

fn preview(missing: &[usize]) -> String {
    let shown: Vec<String> = missing
        .iter()
        .take(MISSING_PREVIEW)
        .map(|i| i.to_string())
        .collect();
    if missing.len() > MISSING_PREVIEW {
        format!("[{}, ... +{} more]", shown.join(", "), missing.len() - MISSING_PREVIEW)
    } else {
        format!("[{}]", shown.join(", "))
    }
}
