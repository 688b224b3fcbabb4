//! 断点续做查询
//!
//! 启动前查看输出目录中是否有可继续的转换，或放弃并清理旧的中间文件

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::application::error::JobFailure;
use crate::application::ports::{ChunkAudioStoragePort, ProgressStorePort};

/// 可续做的转换概要
#[derive(Debug, Clone, Serialize)]
pub struct ResumeInfo {
    pub source_id: String,
    pub voice_config: String,
    pub selected_chapters: BTreeSet<usize>,
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ResumeInfo {
    /// 完成百分比
    pub fn percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.completed_chunks as f64 * 100.0 / self.total_chunks as f64
    }
}

/// 查看同一本书在该输出目录下是否有可续做的进度
///
/// 只统计片段文件仍然存在的已完成片段；一个都没有时返回 None
pub async fn inspect_resumable(
    store: &dyn ProgressStorePort,
    source_id: &str,
    output_dir: &Path,
) -> Option<ResumeInfo> {
    let mut progress = store.load().await?;
    if !progress.is_same_job(source_id, output_dir) {
        return None;
    }

    progress.retain_existing(|path| path.exists());
    if progress.completed_count() == 0 {
        return None;
    }

    Some(ResumeInfo {
        source_id: progress.source_id.clone(),
        voice_config: progress.voice_config.clone(),
        selected_chapters: progress.selected_chapters.clone(),
        completed_chunks: progress.completed_count(),
        total_chunks: progress.total_chunks,
        started_at: progress.started_at,
        last_updated: progress.last_updated,
    })
}

/// 放弃已有进度：删除记录的片段文件与进度文件
///
/// 返回删除的片段文件数
pub async fn discard_resumable(
    store: &dyn ProgressStorePort,
    storage: &dyn ChunkAudioStoragePort,
) -> Result<u64, JobFailure> {
    let Some(progress) = store.load().await else {
        store.delete().await?;
        return Ok(0);
    };

    let paths: Vec<PathBuf> = progress.chunk_files().map(|(_, p)| p.to_path_buf()).collect();
    let removed = storage.remove_chunks(&paths).await?;
    store.delete().await?;

    tracing::info!(
        source = %progress.source_id,
        removed,
        "Discarded resumable conversion"
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkPlan, ConversionProgress, Waveform};
    use crate::infrastructure::adapters::WavChunkStorage;
    use crate::infrastructure::persistence::JsonProgressStore;
    use tempfile::tempdir;

    async fn seeded(dir: &Path) -> (JsonProgressStore, WavChunkStorage) {
        let store = JsonProgressStore::new(dir);
        let storage = WavChunkStorage::new(dir).await.unwrap();
        let plan = ChunkPlan::from_parts(
            vec![("a".into(), 0), ("b".into(), 0), ("c".into(), 0), ("d".into(), 0)],
            vec!["Only".into()],
        );
        let mut progress =
            ConversionProgress::new("book.epub", dir, BTreeSet::new(), "voice", 24000, &plan);
        let path = storage
            .write_chunk(0, &Waveform::new(vec![0.1; 240], 24000))
            .await
            .unwrap();
        progress.record_chunk(0, path).unwrap();
        store.save(&progress).await.unwrap();
        (store, storage)
    }

    #[tokio::test]
    async fn test_inspect_reports_partial_progress() {
        let dir = tempdir().unwrap();
        let (store, _) = seeded(dir.path()).await;

        let info = inspect_resumable(&store, "book.epub", dir.path()).await.unwrap();
        assert_eq!(info.completed_chunks, 1);
        assert_eq!(info.total_chunks, 4);
        assert!((info.percent() - 25.0).abs() < 1e-9);

        assert!(inspect_resumable(&store, "other.epub", dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_inspect_ignores_missing_files() {
        let dir = tempdir().unwrap();
        let (store, storage) = seeded(dir.path()).await;
        std::fs::remove_file(storage.chunk_path(0)).unwrap();

        assert!(inspect_resumable(&store, "book.epub", dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_discard_removes_files_and_progress() {
        let dir = tempdir().unwrap();
        let (store, storage) = seeded(dir.path()).await;

        let removed = discard_resumable(&store, &storage).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.load().await.is_none());
        assert!(!storage.chunk_path(0).exists());
    }
}
