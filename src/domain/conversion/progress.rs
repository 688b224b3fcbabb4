//! Conversion Context - 转换进度记录
//!
//! 持久化到输出目录下的 `.conversion_progress.json`，用于崩溃后断点续做。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{ChunkPlan, ProgressError};

/// 转换进度
///
/// 不变量:
/// - completed_chunks ⊆ [0, total_chunks)
/// - 每个已完成片段在 chunk_files 中都有对应文件
/// - 一次运行内 completed_chunks 只增不减
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// 源文件标识（通常是书籍路径）
    pub source_id: String,
    /// 输出目录
    pub output_location: PathBuf,
    /// 选中的章节序号
    #[serde(default)]
    pub selected_chapters: BTreeSet<usize>,
    /// 音色配置（描述文本或参考音频路径）
    pub voice_config: String,
    /// 片段音频采样率
    #[serde(default)]
    pub sample_rate: u32,
    /// 片段总数
    pub total_chunks: usize,
    /// 已完成片段
    #[serde(default)]
    completed_chunks: BTreeSet<usize>,
    /// 片段下标 → 音频文件
    #[serde(default)]
    chunk_files: BTreeMap<usize, PathBuf>,
    /// 片段下标 → 章节下标
    #[serde(default)]
    pub chunk_to_chapter: Vec<usize>,
    /// 章节标题（按选中顺序）
    #[serde(default)]
    pub chapter_titles: Vec<String>,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 最后更新时间
    pub last_updated: DateTime<Utc>,
}

impl ConversionProgress {
    /// 为一个新的片段计划创建空进度
    pub fn new(
        source_id: impl Into<String>,
        output_location: impl Into<PathBuf>,
        selected_chapters: BTreeSet<usize>,
        voice_config: impl Into<String>,
        sample_rate: u32,
        plan: &ChunkPlan,
    ) -> Self {
        let now = Utc::now();
        Self {
            source_id: source_id.into(),
            output_location: output_location.into(),
            selected_chapters,
            voice_config: voice_config.into(),
            sample_rate,
            total_chunks: plan.len(),
            completed_chunks: BTreeSet::new(),
            chunk_files: BTreeMap::new(),
            chunk_to_chapter: plan.chunk_to_chapter(),
            chapter_titles: plan.chapter_titles().to_vec(),
            started_at: now,
            last_updated: now,
        }
    }

    /// 记录一个已完成的片段
    pub fn record_chunk(&mut self, index: usize, path: PathBuf) -> Result<(), ProgressError> {
        if index >= self.total_chunks {
            return Err(ProgressError::OutOfRange {
                index,
                total: self.total_chunks,
            });
        }
        self.completed_chunks.insert(index);
        self.chunk_files.insert(index, path);
        self.touch();
        Ok(())
    }

    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.completed_chunks
    }

    pub fn completed_count(&self) -> usize {
        self.completed_chunks.len()
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed_chunks.contains(&index)
    }

    pub fn chunk_file(&self, index: usize) -> Option<&Path> {
        self.chunk_files.get(&index).map(PathBuf::as_path)
    }

    /// 所有已记录的片段文件（按下标排序）
    pub fn chunk_files(&self) -> impl Iterator<Item = (usize, &Path)> {
        self.chunk_files.iter().map(|(i, p)| (*i, p.as_path()))
    }

    /// 尚未完成的片段下标（升序）
    pub fn missing_indices(&self) -> Vec<usize> {
        (0..self.total_chunks)
            .filter(|i| !self.completed_chunks.contains(i))
            .collect()
    }

    /// 是否覆盖了 [0, total_chunks) 的全部片段
    pub fn is_complete(&self) -> bool {
        self.total_chunks > 0
            && self.completed_chunks.len() == self.total_chunks
            && self.completed_chunks.iter().all(|i| *i < self.total_chunks)
    }

    /// 清理无效记录：越界、缺少文件路径或文件已不存在的片段
    ///
    /// 返回被移除的片段下标
    pub fn retain_existing(&mut self, exists: impl Fn(&Path) -> bool) -> Vec<usize> {
        let total = self.total_chunks;
        let mut dropped = Vec::new();

        for index in self.completed_chunks.iter().copied().collect::<Vec<_>>() {
            let valid = index < total
                && self
                    .chunk_files
                    .get(&index)
                    .map(|p| exists(p))
                    .unwrap_or(false);
            if !valid {
                self.completed_chunks.remove(&index);
                dropped.push(index);
            }
        }

        let completed = &self.completed_chunks;
        self.chunk_files.retain(|i, _| completed.contains(i));

        if !dropped.is_empty() {
            self.touch();
        }
        dropped
    }

    /// 是否属于同一本书、同一输出目录
    pub fn is_same_job(&self, source_id: &str, output_location: &Path) -> bool {
        self.source_id == source_id
            && self.output_location.components().eq(output_location.components())
    }

    /// 已保存的进度能否继续用于新的片段计划
    ///
    /// 章节选择、片段划分、音色或采样率任一不同，旧的片段文件都不能复用
    pub fn is_compatible_with(&self, other: &ConversionProgress) -> bool {
        self.is_same_job(&other.source_id, &other.output_location)
            && self.selected_chapters == other.selected_chapters
            && self.voice_config == other.voice_config
            && self.sample_rate == other.sample_rate
            && self.total_chunks == other.total_chunks
            && self.chunk_to_chapter == other.chunk_to_chapter
    }

    /// 更新 last_updated
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(chapters: &[usize]) -> ChunkPlan {
        let titles = (0..=chapters.iter().copied().max().unwrap_or(0))
            .map(|i| format!("Chapter {}", i + 1))
            .collect();
        ChunkPlan::from_parts(
            chapters.iter().map(|c| (format!("text {}", c), *c)).collect(),
            titles,
        )
    }

    fn progress(chapters: &[usize]) -> ConversionProgress {
        ConversionProgress::new(
            "book.epub",
            "/tmp/out",
            BTreeSet::new(),
            "calm narrator",
            24000,
            &plan(chapters),
        )
    }

    #[test]
    fn test_record_and_missing() {
        let mut p = progress(&[0, 0, 1, 1, 1]);
        p.record_chunk(0, PathBuf::from("c0.wav")).unwrap();
        p.record_chunk(3, PathBuf::from("c3.wav")).unwrap();

        assert_eq!(p.missing_indices(), vec![1, 2, 4]);
        assert!(!p.is_complete());
        assert_eq!(p.chunk_file(3), Some(Path::new("c3.wav")));
    }

    #[test]
    fn test_record_out_of_range() {
        let mut p = progress(&[0, 0]);
        assert_eq!(
            p.record_chunk(2, PathBuf::from("x.wav")),
            Err(ProgressError::OutOfRange { index: 2, total: 2 })
        );
        assert_eq!(p.completed_count(), 0);
    }

    #[test]
    fn test_complete_requires_every_index() {
        let mut p = progress(&[0, 0, 0]);
        for i in 0..3 {
            p.record_chunk(i, PathBuf::from(format!("c{}.wav", i))).unwrap();
        }
        assert!(p.is_complete());
        assert!(p.missing_indices().is_empty());
    }

    #[test]
    fn test_empty_plan_is_never_complete() {
        let empty = ConversionProgress::new(
            "b",
            "/o",
            BTreeSet::new(),
            "v",
            24000,
            &ChunkPlan::default(),
        );
        assert!(!empty.is_complete());
    }

    #[test]
    fn test_retain_existing_drops_missing_files() {
        let mut p = progress(&[0, 0, 0]);
        p.record_chunk(0, PathBuf::from("keep.wav")).unwrap();
        p.record_chunk(1, PathBuf::from("gone.wav")).unwrap();

        let dropped = p.retain_existing(|path| path == Path::new("keep.wav"));

        assert_eq!(dropped, vec![1]);
        assert_eq!(p.completed().iter().copied().collect::<Vec<_>>(), vec![0]);
        assert!(p.chunk_file(1).is_none());
    }

    #[test]
    fn test_same_job_ignores_trailing_separator() {
        let p = progress(&[0]);
        assert!(p.is_same_job("book.epub", Path::new("/tmp/out/")));
        assert!(!p.is_same_job("other.epub", Path::new("/tmp/out")));
    }

    #[test]
    fn test_compatibility_checks_plan_and_voice() {
        let stored = progress(&[0, 0, 1]);
        assert!(stored.is_compatible_with(&progress(&[0, 0, 1])));
        assert!(!stored.is_compatible_with(&progress(&[0, 1, 1])));

        let mut other_voice = progress(&[0, 0, 1]);
        other_voice.voice_config = "gravelly pirate".to_string();
        assert!(!stored.is_compatible_with(&other_voice));
    }

    #[test]
    fn test_json_uses_string_keys_for_chunk_files() {
        let mut p = progress(&[0, 0]);
        p.record_chunk(1, PathBuf::from("chunk_0001.wav")).unwrap();

        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"1\":\"chunk_0001.wav\""));

        let back: ConversionProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
