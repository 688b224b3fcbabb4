//! Conversion Context - 片段与片段计划

use crate::domain::text_chunker::TextChunker;
use crate::domain::text_cleaner::clean_text;

/// 章节原文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterText {
    /// 章节在书中的序号（从 0 开始）
    pub order: usize,
    /// 章节标题
    pub title: String,
    /// 章节正文
    pub content: String,
}

impl ChapterText {
    pub fn new(order: usize, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            order,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// 一次 TTS 生成的文本单元
///
/// 不变量:
/// - index 在计划内从 0 开始连续编号
/// - chapter_index 指向计划内的章节标题列表
/// - text 非空
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    text: String,
    chapter_index: usize,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>, chapter_index: usize) -> Self {
        Self {
            index,
            text: text.into(),
            chapter_index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }
}

/// 片段计划：全书按顺序切分后的片段列表
///
/// chapter_titles 只包含被选中的章节，chapter_index 是在该列表中的位置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkPlan {
    chunks: Vec<Chunk>,
    chapter_titles: Vec<String>,
}

impl ChunkPlan {
    /// 对选中的章节依次清洗、分块
    ///
    /// 没有任何片段的章节仍保留标题，但不会出现在片段映射中
    pub fn build<'a>(
        chunker: &TextChunker,
        chapters: impl IntoIterator<Item = &'a ChapterText>,
    ) -> Self {
        let mut plan = ChunkPlan::default();

        for chapter in chapters {
            let chapter_index = plan.chapter_titles.len();
            plan.chapter_titles.push(chapter.title.clone());

            let cleaned = clean_text(&chapter.content);
            let pieces = chunker.chunk(&cleaned);
            tracing::debug!(
                chapter = chapter.order,
                title = %chapter.title,
                chunks = pieces.len(),
                "Chapter chunked"
            );

            for text in pieces {
                let index = plan.chunks.len();
                plan.chunks.push(Chunk::new(index, text, chapter_index));
            }
        }

        plan
    }

    /// 从已有片段构造（片段会按顺序重新编号）
    pub fn from_parts(texts: Vec<(String, usize)>, chapter_titles: Vec<String>) -> Self {
        let chunks = texts
            .into_iter()
            .enumerate()
            .map(|(index, (text, chapter_index))| Chunk::new(index, text, chapter_index))
            .collect();
        Self {
            chunks,
            chapter_titles,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chapter_titles(&self) -> &[String] {
        &self.chapter_titles
    }

    /// 片段下标 → 章节下标
    pub fn chunk_to_chapter(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.chapter_index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::text_chunker::ChunkerConfig;

    #[test]
    fn test_build_maps_chunks_to_chapters() {
        let chunker = TextChunker::unicode(ChunkerConfig {
            max_words: 4,
            min_words: 1,
            ..Default::default()
        });
        let chapters = vec![
            ChapterText::new(0, "One", "Alpha beta gamma delta. Epsilon zeta."),
            ChapterText::new(1, "Empty", ""),
            ChapterText::new(2, "Three", "Eta theta."),
        ];

        let plan = ChunkPlan::build(&chunker, &chapters);

        assert_eq!(plan.chapter_titles(), &["One", "Empty", "Three"]);
        assert_eq!(plan.chunk_to_chapter(), vec![0, 0, 2]);
        assert!(plan.chunks().iter().enumerate().all(|(i, c)| c.index() == i));
    }

    #[test]
    fn test_from_parts_renumbers() {
        let plan = ChunkPlan::from_parts(
            vec![("a".into(), 0), ("b".into(), 1)],
            vec!["A".into(), "B".into()],
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get(1).map(|c| c.chapter_index()), Some(1));
    }
}
