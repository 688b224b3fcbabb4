//! JSON Progress Store - 进度文件持久化
//!
//! 写入流程: 序列化 → 写 `.tmp` → fsync → rename 覆盖正式文件。
//! rename 在同一目录内是原子的，崩溃时读者只会看到旧文件或新文件。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{ProgressStoreError, ProgressStorePort};
use crate::domain::ConversionProgress;

/// 进度文件名
pub const PROGRESS_FILE_NAME: &str = ".conversion_progress.json";

pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    /// 进度文件放在输出目录下
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Self::path_for(output_dir),
        }
    }

    pub fn path_for(output_dir: impl AsRef<Path>) -> PathBuf {
        output_dir.as_ref().join(PROGRESS_FILE_NAME)
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl ProgressStorePort for JsonProgressStore {
    fn location(&self) -> PathBuf {
        self.path.clone()
    }

    async fn load(&self) -> Option<ConversionProgress> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read progress file");
                return None;
            }
        };

        match serde_json::from_slice::<ConversionProgress>(&data) {
            Ok(progress) => Some(progress),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Progress file is corrupt, ignoring"
                );
                None
            }
        }
    }

    async fn save(&self, progress: &ConversionProgress) -> Result<(), ProgressStoreError> {
        let data = serde_json::to_vec_pretty(progress)
            .map_err(|e| ProgressStoreError::SerializationError(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ProgressStoreError::IoError(e.to_string()))?;
        }

        let tmp = self.tmp_path();
        let io = |e: std::io::Error| ProgressStoreError::IoError(e.to_string());

        let mut file = fs::File::create(&tmp).await.map_err(io)?;
        file.write_all(&data).await.map_err(io)?;
        file.sync_all().await.map_err(io)?;
        drop(file);

        fs::rename(&tmp, &self.path).await.map_err(io)?;

        tracing::debug!(
            path = %self.path.display(),
            completed = progress.completed_count(),
            total = progress.total_chunks,
            "Progress checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self) -> Result<(), ProgressStoreError> {
        for path in [self.path.clone(), self.tmp_path()] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ProgressStoreError::IoError(e.to_string())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkPlan;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn progress(dir: &Path) -> ConversionProgress {
        let plan = ChunkPlan::from_parts(
            vec![("one".into(), 0), ("two".into(), 0), ("three".into(), 1)],
            vec!["A".into(), "B".into()],
        );
        ConversionProgress::new("book.epub", dir, BTreeSet::new(), "narrator", 24000, &plan)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path());
        let mut p = progress(dir.path());
        p.record_chunk(1, dir.path().join("chunk_0001.wav")).unwrap();

        store.save(&p).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, p);
        assert!(!store.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_chunk_keys_are_json_strings() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path());
        let mut p = progress(dir.path());
        p.record_chunk(2, dir.path().join("chunk_0002.wav")).unwrap();
        store.save(&p).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.location()).unwrap()).unwrap();
        assert!(raw["chunk_files"].get("2").is_some());
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_files_load_as_none() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path());
        assert!(store.load().await.is_none());

        std::fs::write(store.location(), b"{\"source_id\": \"trunc").unwrap();
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_leftover_tmp_does_not_shadow_saved_file() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path());
        let p = progress(dir.path());
        store.save(&p).await.unwrap();

        // 上次写入在 rename 前崩溃
        std::fs::write(store.tmp_path(), b"garbage").unwrap();

        assert_eq!(store.load().await.unwrap(), p);
        store.delete().await.unwrap();
        assert!(!store.location().exists());
        assert!(!store.tmp_path().exists());
    }
}
