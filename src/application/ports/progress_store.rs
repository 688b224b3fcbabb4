//! Progress Store Port - 转换进度持久化

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::ConversionProgress;

#[derive(Debug, Error)]
pub enum ProgressStoreError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 一个输出目录对应一个进度存储
#[async_trait]
pub trait ProgressStorePort: Send + Sync {
    /// 进度文件位置
    fn location(&self) -> PathBuf;

    /// 读取进度；文件不存在或损坏时返回 None
    async fn load(&self) -> Option<ConversionProgress>;

    /// 原子写入：读者只会看到旧版本或新版本的完整内容
    async fn save(&self, progress: &ConversionProgress) -> Result<(), ProgressStoreError>;

    /// 删除进度文件（不存在时视为成功）
    async fn delete(&self) -> Result<(), ProgressStoreError>;
}
