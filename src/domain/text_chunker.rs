//! 文本分块器
//!
//! 将章节文本切分为适合单次 TTS 生成的片段：
//! 1. 句子切分（段落边界总是句子边界）
//! 2. 贪心累积句子，直到字数达到 max_words
//! 3. 末尾不足 min_words 的片段并入前一个片段
//!
//! 超长文本按段落打包成若干批次分别切句，批次大小不影响结果。
//! 句子切分器出错时该批次退化为按 ". " 的朴素切分。

use std::sync::Arc;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use super::text_cleaner::split_paragraphs;

/// 默认每块最大词数
pub const DEFAULT_MAX_WORDS: usize = 40;

/// 默认每块最小词数（仅约束末尾片段）
pub const DEFAULT_MIN_WORDS: usize = 15;

/// 单批次句子切分的最大字符数
pub const DEFAULT_BATCH_CHARS: usize = 500_000;

/// 句子切分错误
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Sentence segmentation failed: {0}")]
    Failed(String),

    #[error("Input too large for segmenter: {0} chars")]
    TooLarge(usize),
}

/// 句子切分器
///
/// 实现必须把段落边界（空行）视为句子边界
pub trait SentenceSegmenter: Send + Sync {
    /// 切分器名称（用于日志）
    fn name(&self) -> &'static str;

    /// 切分为句子，结果不含空句子
    fn sentences(&self, text: &str) -> Result<Vec<String>, SegmentError>;
}

/// 常见缩写，出现在句末时不视为句子结束
const NON_TERMINAL_ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "St.", "Jr.", "Sr.", "vs.", "e.g.", "i.e.", "No.",
];

/// 基于 Unicode 句子边界 (UAX #29) 的切分器
#[derive(Debug, Clone, Default)]
pub struct UnicodeSentenceSegmenter;

impl UnicodeSentenceSegmenter {
    fn ends_with_abbreviation(sentence: &str) -> bool {
        let last_word = sentence.split_whitespace().next_back().unwrap_or("");
        if NON_TERMINAL_ABBREVIATIONS.contains(&last_word) {
            return true;
        }
        // 单个大写字母的姓名缩写，如 "J."
        let mut chars = last_word.chars();
        matches!(
            (chars.next(), chars.next(), chars.next()),
            (Some(c), Some('.'), None) if c.is_uppercase()
        )
    }
}

impl SentenceSegmenter for UnicodeSentenceSegmenter {
    fn name(&self) -> &'static str {
        "unicode"
    }

    fn sentences(&self, text: &str) -> Result<Vec<String>, SegmentError> {
        let mut sentences = Vec::new();

        for paragraph in split_paragraphs(text) {
            let mut pending: Option<String> = None;

            for piece in paragraph.split_sentence_bounds() {
                let piece = piece.trim();
                if piece.is_empty() {
                    continue;
                }
                let sentence = match pending.take() {
                    Some(mut prev) => {
                        prev.push(' ');
                        prev.push_str(piece);
                        prev
                    }
                    None => piece.to_string(),
                };
                if Self::ends_with_abbreviation(&sentence) {
                    pending = Some(sentence);
                } else {
                    sentences.push(sentence);
                }
            }

            if let Some(rest) = pending {
                sentences.push(rest);
            }
        }

        Ok(sentences)
    }
}

/// 朴素切分器：按 ". " 切分，每段补齐句末标点
#[derive(Debug, Clone, Default)]
pub struct NaiveSentenceSegmenter;

impl NaiveSentenceSegmenter {
    fn split(text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        for paragraph in split_paragraphs(text) {
            for part in paragraph.split(". ") {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if part.ends_with(&['.', '!', '?'][..]) {
                    sentences.push(part.to_string());
                } else {
                    sentences.push(format!("{}.", part));
                }
            }
        }
        sentences
    }
}

impl SentenceSegmenter for NaiveSentenceSegmenter {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn sentences(&self, text: &str) -> Result<Vec<String>, SegmentError> {
        Ok(Self::split(text))
    }
}

/// 分块配置
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// 每块最大词数
    pub max_words: usize,
    /// 末尾片段最小词数
    pub min_words: usize,
    /// 单批次切句的最大字符数
    pub batch_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_MAX_WORDS,
            min_words: DEFAULT_MIN_WORDS,
            batch_chars: DEFAULT_BATCH_CHARS,
        }
    }
}

/// 文本分块器
///
/// 不变量:
/// - 输出片段非空，且按顺序拼接后覆盖全部句子
/// - 超过 max_words 的片段要么是单个超长句子，要么是最后一个片段并入了不足 min_words 的末尾
/// - 不足 min_words 的末尾总是并入前一片段，只有全文只产生一个片段时才单独输出
pub struct TextChunker {
    config: ChunkerConfig,
    segmenter: Arc<dyn SentenceSegmenter>,
    degraded: bool,
}

impl TextChunker {
    /// 使用指定的句子切分器创建
    pub fn new(config: ChunkerConfig, segmenter: Arc<dyn SentenceSegmenter>) -> Self {
        Self {
            config,
            segmenter,
            degraded: false,
        }
    }

    /// 使用 Unicode 句子切分器创建
    pub fn unicode(config: ChunkerConfig) -> Self {
        Self::new(config, Arc::new(UnicodeSentenceSegmenter))
    }

    /// 降级模式：只使用朴素切分
    pub fn degraded(config: ChunkerConfig) -> Self {
        tracing::warn!("Sentence segmenter unavailable, falling back to naive '. ' splitting");
        Self {
            config,
            segmenter: Arc::new(NaiveSentenceSegmenter),
            degraded: true,
        }
    }

    /// 是否处于降级模式
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// 将文本切分为 TTS 片段
    pub fn chunk(&self, text: &str) -> Vec<String> {
        group_sentences(
            self.segment(text),
            self.config.max_words,
            self.config.min_words,
        )
    }

    /// 切分句子，超长文本按段落分批处理
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut batch = String::new();

        for paragraph in split_paragraphs(text) {
            if !batch.is_empty() && batch.len() + paragraph.len() + 2 > self.config.batch_chars {
                self.segment_batch(&batch, &mut sentences);
                batch.clear();
            }
            if !batch.is_empty() {
                batch.push_str("\n\n");
            }
            batch.push_str(&paragraph);
        }

        if !batch.is_empty() {
            self.segment_batch(&batch, &mut sentences);
        }

        sentences
    }

    fn segment_batch(&self, batch: &str, out: &mut Vec<String>) {
        match self.segmenter.sentences(batch) {
            Ok(sentences) => out.extend(sentences),
            Err(e) => {
                tracing::warn!(
                    segmenter = self.segmenter.name(),
                    batch_chars = batch.len(),
                    error = %e,
                    "Sentence segmentation failed, using naive splitting for this batch"
                );
                out.extend(NaiveSentenceSegmenter::split(batch));
            }
        }
    }
}

/// 词数（按空白分隔）
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 贪心累积句子为片段
///
/// 当前片段加上下一句会超过 max_words 时先封口；
/// 累积到 max_words 时立即封口；
/// 末尾不足 min_words 的片段并入前一个片段。
pub fn group_sentences(sentences: Vec<String>, max_words: usize, min_words: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0;

    for sentence in sentences {
        let words = word_count(&sentence);
        if words == 0 {
            continue;
        }

        if current_words + words > max_words && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_words = 0;
        }

        current.push(sentence);
        current_words += words;

        if current_words >= max_words {
            chunks.push(current.join(" "));
            current.clear();
            current_words = 0;
        }
    }

    if !current.is_empty() {
        let tail = current.join(" ");
        match chunks.last_mut() {
            Some(last) if current_words < min_words => {
                last.push(' ');
                last.push_str(&tail);
            }
            _ => chunks.push(tail),
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(words: usize, tag: &str) -> String {
        let mut parts: Vec<String> = (0..words).map(|i| format!("{}{}", tag, i)).collect();
        if let Some(last) = parts.last_mut() {
            last.push('.');
        }
        parts.join(" ")
    }

    fn chunker(max_words: usize, min_words: usize) -> TextChunker {
        TextChunker::unicode(ChunkerConfig {
            max_words,
            min_words,
            batch_chars: DEFAULT_BATCH_CHARS,
        })
    }

    struct FailingSegmenter;

    impl SentenceSegmenter for FailingSegmenter {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn sentences(&self, text: &str) -> Result<Vec<String>, SegmentError> {
            Err(SegmentError::TooLarge(text.len()))
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunker(40, 15).chunk("").is_empty());
        assert!(chunker(40, 15).chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_greedy_grouping() {
        let sentences: Vec<String> = (0..5).map(|i| sentence(4, &format!("s{}w", i))).collect();
        let chunks = group_sentences(sentences, 10, 3);
        let counts: Vec<usize> = chunks.iter().map(|c| word_count(c)).collect();
        assert_eq!(counts, vec![8, 8, 4]);
    }

    #[test]
    fn test_oversized_sentence_is_own_chunk() {
        let long = sentence(30, "w");
        let chunks = group_sentences(vec![sentence(3, "a"), long.clone(), sentence(3, "b")], 10, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], long);
    }

    #[test]
    fn test_short_tail_merges_into_previous() {
        let chunks = group_sentences(vec![sentence(8, "a"), sentence(8, "b"), sentence(3, "c")], 10, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(word_count(&chunks[1]), 11);
        assert!(word_count(&chunks[1]) <= 10 + 5 - 1);
    }

    #[test]
    fn test_short_tail_merges_into_oversized_sentence() {
        let long = sentence(30, "a");
        let tail = sentence(2, "b");
        let chunks = group_sentences(vec![long.clone(), tail.clone()], 10, 5);
        assert_eq!(chunks, vec![format!("{} {}", long, tail)]);
        assert_eq!(word_count(&chunks[0]), 32);
    }

    #[test]
    fn test_single_short_chunk_is_kept() {
        let chunks = chunker(40, 15).chunk("Hello there.");
        assert_eq!(chunks, vec!["Hello there.".to_string()]);
    }

    #[test]
    fn test_paragraph_is_sentence_boundary() {
        let chunks = chunker(3, 1).chunk("one two three\n\nfour five six");
        assert_eq!(chunks, vec!["one two three", "four five six"]);
    }

    #[test]
    fn test_abbreviations_do_not_end_sentences() {
        let sentences = UnicodeSentenceSegmenter
            .sentences("Mr. Smith arrived. He sat down.")
            .unwrap();
        assert_eq!(sentences, vec!["Mr. Smith arrived.", "He sat down."]);
    }

    #[test]
    fn test_batching_does_not_change_result() {
        let text: String = (0..40)
            .map(|i| format!("Paragraph {} starts here. It has a second sentence too!", i))
            .collect::<Vec<_>>()
            .join("\n\n");

        let whole = chunker(12, 4).chunk(&text);
        let batched = TextChunker::unicode(ChunkerConfig {
            max_words: 12,
            min_words: 4,
            batch_chars: 120,
        })
        .chunk(&text);

        assert_eq!(whole, batched);
    }

    #[test]
    fn test_failing_segmenter_falls_back_to_naive() {
        let chunker = TextChunker::new(
            ChunkerConfig {
                max_words: 3,
                min_words: 1,
                batch_chars: DEFAULT_BATCH_CHARS,
            },
            Arc::new(FailingSegmenter),
        );
        let chunks = chunker.chunk("one two. three four. five six");
        assert_eq!(chunks, vec!["one two.", "three four.", "five six."]);
    }

    #[test]
    fn test_degraded_mode() {
        let chunker = TextChunker::degraded(ChunkerConfig::default());
        assert!(chunker.is_degraded());
        assert_eq!(
            chunker.segment("First part. Second part!"),
            vec!["First part.", "Second part!"]
        );
    }

    #[test]
    fn test_chunk_invariants_hold_for_generated_text() {
        // 简单的线性同余发生器，保证测试可复现
        let mut seed: u64 = 0x5eed;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };

        for _ in 0..50 {
            let max_words = 5 + next(40) as usize;
            let min_words = 1 + next(max_words as u64) as usize;
            let sentence_count = next(30) as usize;
            let sentences: Vec<String> = (0..sentence_count)
                .map(|i| sentence(1 + next(60) as usize, &format!("s{}w", i)))
                .collect();
            let total_words: usize = sentences.iter().map(|s| word_count(s)).sum();

            let chunks = group_sentences(sentences.clone(), max_words, min_words);

            assert_eq!(chunks.join(" "), sentences.join(" "));
            assert_eq!(chunks.iter().map(|c| word_count(c)).sum::<usize>(), total_words);
            let is_last = |i: usize| i + 1 == chunks.len();
            for (i, chunk) in chunks.iter().enumerate() {
                assert!(!chunk.trim().is_empty());
                let words = word_count(chunk);
                let is_single_sentence = sentences.iter().any(|s| s == chunk);
                let starts_oversized = sentences
                    .iter()
                    .any(|s| word_count(s) > max_words && chunk.starts_with(s.as_str()));
                if is_single_sentence {
                    continue;
                }
                if is_last(i) {
                    assert!(
                        words < max_words + min_words || starts_oversized,
                        "last chunk has {} words",
                        words
                    );
                } else {
                    assert!(words <= max_words, "chunk {} has {} words", i, words);
                }
            }
            if chunks.len() > 1 {
                let last = chunks.last().unwrap();
                assert!(word_count(last) >= min_words, "short tail was not merged");
            }
        }
    }
}
