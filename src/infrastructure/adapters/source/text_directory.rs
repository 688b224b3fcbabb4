//! Text Directory Source - 从纯文本目录读取章节
//!
//! 目录中每个 `.txt` 文件是一章，按文件名排序；
//! 第一行非空文本作为章节标题，其余为正文。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::domain::ChapterText;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source directory not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("No chapters found in {0}")]
    Empty(String),
}

/// 拆出标题与正文，标题行前的 Markdown '#' 会被去掉
fn split_title(raw: &str, fallback: &str) -> (String, String) {
    let mut lines = raw.lines();
    for line in lines.by_ref() {
        let title = line.trim().trim_start_matches('#').trim();
        if !title.is_empty() {
            let body: Vec<&str> = lines.collect();
            return (title.to_string(), body.join("\n"));
        }
    }
    (fallback.to_string(), String::new())
}

/// 读取目录下所有章节
pub async fn load_chapters(dir: &Path) -> Result<Vec<ChapterText>, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::NotFound(dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| SourceError::IoError(e.to_string()))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SourceError::IoError(e.to_string()))?
    {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "txt") {
            files.push(path);
        }
    }
    files.sort();

    let mut chapters = Vec::with_capacity(files.len());
    for path in files {
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::IoError(format!("{}: {}", path.display(), e)))?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let (title, content) = split_title(&raw, &fallback);
        if content.trim().is_empty() {
            tracing::warn!(file = %path.display(), "Skipping chapter without text");
            continue;
        }
        chapters.push(ChapterText::new(chapters.len(), title, content));
    }

    if chapters.is_empty() {
        return Err(SourceError::Empty(dir.display().to_string()));
    }

    tracing::info!(dir = %dir.display(), chapters = chapters.len(), "Chapters loaded");
    Ok(chapters)
}

/// 按章节序号筛选，空集合表示全部
pub fn select_chapters<'a>(
    chapters: &'a [ChapterText],
    selected: &'a BTreeSet<usize>,
) -> impl Iterator<Item = &'a ChapterText> + 'a {
    chapters
        .iter()
        .filter(move |c| selected.is_empty() || selected.contains(&c.order))
}
