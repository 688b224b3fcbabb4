//! Chunk Audio Storage Port - 片段音频存储
//!
//! 每个片段一个 WAV 文件，拼接时以流式方式写出整本书

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::Waveform;

/// 音频存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),
}

/// 流式音频写出
pub trait WaveformSink: Send {
    /// 追加样本
    fn append(&mut self, samples: &[f32]) -> Result<(), StorageError>;

    /// 追加静音
    fn append_silence(&mut self, samples: u64) -> Result<(), StorageError> {
        const BLOCK: usize = 4096;
        let zeros = [0.0_f32; BLOCK];
        let mut remaining = samples as usize;
        while remaining > 0 {
            let n = remaining.min(BLOCK);
            self.append(&zeros[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    /// 完成写出（写入文件头长度等），之后输出文件才出现在目标路径
    fn finish(self: Box<Self>) -> Result<(), StorageError>;

    /// 放弃写出，删除未完成的文件
    fn abort(self: Box<Self>);
}

#[async_trait]
pub trait ChunkAudioStoragePort: Send + Sync {
    /// 片段目录
    fn chunk_dir(&self) -> PathBuf;

    /// 片段文件路径
    fn chunk_path(&self, index: usize) -> PathBuf;

    /// 写入片段音频，返回文件路径
    async fn write_chunk(&self, index: usize, waveform: &Waveform) -> Result<PathBuf, StorageError>;

    /// 读取片段音频
    async fn read_chunk(&self, path: &Path) -> Result<Waveform, StorageError>;

    /// 创建整本书的输出文件
    async fn create_sink(
        &self,
        path: &Path,
        sample_rate: u32,
    ) -> Result<Box<dyn WaveformSink>, StorageError>;

    /// 删除片段文件，片段目录为空时一并删除，返回删除的文件数
    async fn remove_chunks(&self, paths: &[PathBuf]) -> Result<u64, StorageError>;
}
