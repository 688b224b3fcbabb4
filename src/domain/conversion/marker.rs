//! Conversion Context - 章节标记
//!
//! 拼接时在样本域累计时间轴，最后再换算为毫秒，避免逐段取整带来的漂移。
//!
//! 同一章节内相邻片段之间插入 `silence_ms` 静音；
//! 跨章节的相邻片段之间插入 `chapter_gap_ms` 静音（默认为 0，即章节首尾相接）。

use serde::{Deserialize, Serialize};

use crate::domain::audio::{ms_to_samples, samples_to_ms};

/// 片段间默认静音时长
pub const DEFAULT_SILENCE_MS: u64 = 400;

/// 章节标记（毫秒）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMarker {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// 章节时间轴
///
/// 按拼接顺序逐个推入片段，记录每个章节首个片段的起始位置
#[derive(Debug, Clone)]
pub struct ChapterTimeline {
    sample_rate: u32,
    silence_samples: u64,
    chapter_gap_samples: u64,
    position: u64,
    last_chapter: Option<usize>,
    starts: Vec<(usize, u64)>,
}

impl ChapterTimeline {
    pub fn new(sample_rate: u32, silence_ms: u64, chapter_gap_ms: u64) -> Self {
        Self {
            sample_rate,
            silence_samples: ms_to_samples(silence_ms, sample_rate),
            chapter_gap_samples: ms_to_samples(chapter_gap_ms, sample_rate),
            position: 0,
            last_chapter: None,
            starts: Vec::new(),
        }
    }

    /// 推入一个片段，返回应在该片段之前写入的静音样本数
    pub fn push_chunk(&mut self, chapter_index: usize, samples: u64) -> u64 {
        let gap = match self.last_chapter {
            None => 0,
            Some(prev) if prev == chapter_index => self.silence_samples,
            Some(_) => self.chapter_gap_samples,
        };
        self.position += gap;

        if self.last_chapter != Some(chapter_index)
            && !self.starts.iter().any(|(c, _)| *c == chapter_index)
        {
            self.starts.push((chapter_index, self.position));
        }

        self.position += samples;
        self.last_chapter = Some(chapter_index);
        gap
    }

    pub fn total_samples(&self) -> u64 {
        self.position
    }

    pub fn total_ms(&self) -> u64 {
        samples_to_ms(self.position, self.sample_rate)
    }

    /// 生成章节标记
    ///
    /// 每章结束于下一章开始处，最后一章结束于总时长。
    /// 没有任何片段的章节不产生标记。
    pub fn markers(&self, chapter_titles: &[String]) -> Vec<ChapterMarker> {
        self.starts
            .iter()
            .enumerate()
            .map(|(i, (chapter, start))| {
                let end = self
                    .starts
                    .get(i + 1)
                    .map(|(_, next)| *next)
                    .unwrap_or(self.position);
                ChapterMarker {
                    title: chapter_titles
                        .get(*chapter)
                        .cloned()
                        .unwrap_or_else(|| format!("Chapter {}", chapter + 1)),
                    start_ms: samples_to_ms(*start, self.sample_rate),
                    end_ms: samples_to_ms(end, self.sample_rate),
                }
            })
            .collect()
    }
}

/// 根据各片段长度（样本数）与章节映射计算章节标记
pub fn derive_chapter_markers(
    chunk_samples: &[u64],
    chunk_to_chapter: &[usize],
    chapter_titles: &[String],
    sample_rate: u32,
    silence_ms: u64,
    chapter_gap_ms: u64,
) -> Vec<ChapterMarker> {
    let mut timeline = ChapterTimeline::new(sample_rate, silence_ms, chapter_gap_ms);
    for (samples, chapter) in chunk_samples.iter().zip(chunk_to_chapter) {
        timeline.push_chunk(*chapter, *samples);
    }
    timeline.markers(chapter_titles)
}

/// 生成 FFMETADATA1 格式的章节文件
///
/// 时间基为 1/1000（毫秒）
pub fn render_ffmetadata(markers: &[ChapterMarker], book_title: Option<&str>) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    if let Some(title) = book_title.filter(|t| !t.is_empty()) {
        out.push_str(&format!("title={}\n", escape_metadata(title)));
    }

    for marker in markers {
        out.push_str("\n[CHAPTER]\nTIMEBASE=1/1000\n");
        out.push_str(&format!("START={}\n", marker.start_ms));
        out.push_str(&format!("END={}\n", marker.end_ms));
        out.push_str(&format!("title={}\n", escape_metadata(&marker.title)));
    }

    out
}

/// 转义 FFMETADATA 特殊字符：`=` `;` `#` `\` 和换行
pub fn escape_metadata(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '=' | ';' | '#' | '\\' | '\n') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Chapter {}", i + 1)).collect()
    }

    #[test]
    fn test_three_chunks_two_chapters() {
        // 24 kHz 下 1000 ms = 24000 样本
        let markers = derive_chapter_markers(
            &[24000, 24000, 24000],
            &[0, 0, 1],
            &titles(2),
            24000,
            DEFAULT_SILENCE_MS,
            0,
        );

        assert_eq!(
            markers,
            vec![
                ChapterMarker {
                    title: "Chapter 1".into(),
                    start_ms: 0,
                    end_ms: 2400
                },
                ChapterMarker {
                    title: "Chapter 2".into(),
                    start_ms: 2400,
                    end_ms: 3400
                },
            ]
        );
    }

    #[test]
    fn test_silence_between_chunks_of_one_chapter() {
        let mut timeline = ChapterTimeline::new(22050, 400, 0);
        assert_eq!(timeline.push_chunk(0, 22050), 0);
        assert_eq!(timeline.push_chunk(0, 22050), 8820);
        assert_eq!(timeline.push_chunk(0, 22050), 8820);
        // 首尾不加静音
        assert_eq!(timeline.total_ms(), 3000 + 2 * 400);
    }

    #[test]
    fn test_chapter_gap() {
        let markers = derive_chapter_markers(&[1000, 1000], &[0, 1], &titles(2), 1000, 400, 1500);
        assert_eq!(markers[1].start_ms, 2500);
        assert_eq!(markers[1].end_ms, 3500);
    }

    #[test]
    fn test_markers_are_contiguous_and_ordered() {
        let samples = vec![12345, 6789, 24000, 1, 5000, 33333];
        let mapping = vec![0, 0, 1, 2, 2, 4];
        let mut timeline = ChapterTimeline::new(24000, 400, 0);
        for (s, c) in samples.iter().zip(&mapping) {
            timeline.push_chunk(*c, *s);
        }
        let markers = timeline.markers(&titles(5));

        assert_eq!(markers.len(), 4);
        assert_eq!(markers[0].start_ms, 0);
        for pair in markers.windows(2) {
            assert!(pair[0].start_ms < pair[1].start_ms);
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(markers.last().map(|m| m.end_ms), Some(timeline.total_ms()));
        assert_eq!(markers[3].title, "Chapter 5");
    }

    #[test]
    fn test_render_ffmetadata() {
        let markers = vec![ChapterMarker {
            title: "Intro".into(),
            start_ms: 0,
            end_ms: 1500,
        }];
        let text = render_ffmetadata(&markers, Some("My Book"));
        assert_eq!(
            text,
            ";FFMETADATA1\ntitle=My Book\n\n[CHAPTER]\nTIMEBASE=1/1000\nSTART=0\nEND=1500\ntitle=Intro\n"
        );
    }

    #[test]
    fn test_escape_metadata() {
        assert_eq!(escape_metadata("a=b;c#d\\e"), "a\\=b\\;c\\#d\\\\e");
        assert_eq!(escape_metadata("Plain Title"), "Plain Title");
    }
}
