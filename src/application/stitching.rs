//! Chapter Tracking Stitcher - 片段拼接与章节标记
//!
//! 按片段顺序读取音频，流式写出整本书，同时在样本域记录每章起点。
//! 写文件在阻塞线程上进行，任何错误都不会在目标路径留下半本书。

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::application::ports::{ChunkAudioStoragePort, StorageError, WaveformSink};
use crate::domain::conversion::{ChapterMarker, ChapterTimeline, DEFAULT_SILENCE_MS};
use crate::domain::Waveform;

/// 读取与写出之间最多缓冲的片段数
const SINK_QUEUE: usize = 4;

/// 拼接错误
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("No chunks to stitch")]
    Empty,

    #[error("Chunk {chunk} maps to chapter {chapter}, but only {titles} chapter titles exist")]
    ChapterOutOfRange {
        chunk: usize,
        chapter: usize,
        titles: usize,
    },

    #[error("Chunk {chunk} has sample rate {actual} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        chunk: usize,
        expected: u32,
        actual: u32,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// 待拼接片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchEntry {
    pub index: usize,
    pub path: PathBuf,
    pub chapter_index: usize,
}

/// 拼接结果
#[derive(Debug, Clone)]
pub struct StitchSummary {
    pub output: PathBuf,
    pub markers: Vec<ChapterMarker>,
    pub total_samples: u64,
    pub total_ms: u64,
}

pub struct ChapterTrackingStitcher {
    silence_ms: u64,
    chapter_gap_ms: u64,
}

impl Default for ChapterTrackingStitcher {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_MS)
    }
}

impl ChapterTrackingStitcher {
    pub fn new(silence_ms: u64) -> Self {
        Self {
            silence_ms,
            chapter_gap_ms: 0,
        }
    }

    /// 跨章节时的静音时长
    pub fn with_chapter_gap(mut self, ms: u64) -> Self {
        self.chapter_gap_ms = ms;
        self
    }

    /// 拼接片段并写出到 output
    ///
    /// entries 必须按片段顺序排列
    pub async fn stitch(
        &self,
        storage: &dyn ChunkAudioStoragePort,
        entries: &[StitchEntry],
        chapter_titles: &[String],
        sample_rate: u32,
        output: &Path,
    ) -> Result<StitchSummary, StitchError> {
        if entries.is_empty() {
            return Err(StitchError::Empty);
        }
        if let Some(bad) = entries.iter().find(|e| e.chapter_index >= chapter_titles.len()) {
            return Err(StitchError::ChapterOutOfRange {
                chunk: bad.index,
                chapter: bad.chapter_index,
                titles: chapter_titles.len(),
            });
        }

        let mut timeline = ChapterTimeline::new(sample_rate, self.silence_ms, self.chapter_gap_ms);
        let sink = storage.create_sink(output, sample_rate).await?;

        let (tx, rx) = mpsc::channel(SINK_QUEUE);
        let writer = tokio::task::spawn_blocking(move || write_all(sink, rx));

        let fed = feed(storage, entries, sample_rate, &mut timeline, &tx).await;
        if fed.is_ok() {
            let _ = tx.send(SinkCommand::Finish).await;
        }
        drop(tx);

        let written = writer
            .await
            .map_err(|e| StorageError::IoError(format!("Audio writer panicked: {}", e)))?;
        written?;
        fed?;

        let markers = timeline.markers(chapter_titles);
        tracing::info!(
            output = %output.display(),
            chunks = entries.len(),
            chapters = markers.len(),
            duration_ms = timeline.total_ms(),
            "Audiobook stitched"
        );

        Ok(StitchSummary {
            output: output.to_path_buf(),
            markers,
            total_samples: timeline.total_samples(),
            total_ms: timeline.total_ms(),
        })
    }
}

enum SinkCommand {
    Silence(u64),
    Samples(Waveform),
    Finish,
}

/// 按顺序读取片段并送入写出线程
async fn feed(
    storage: &dyn ChunkAudioStoragePort,
    entries: &[StitchEntry],
    sample_rate: u32,
    timeline: &mut ChapterTimeline,
    tx: &mpsc::Sender<SinkCommand>,
) -> Result<(), StitchError> {
    for entry in entries {
        let wave = storage.read_chunk(&entry.path).await?;
        if wave.sample_rate() != sample_rate {
            return Err(StitchError::SampleRateMismatch {
                chunk: entry.index,
                expected: sample_rate,
                actual: wave.sample_rate(),
            });
        }

        // 写出线程已退出时停止，错误由它报告
        let gap = timeline.push_chunk(entry.chapter_index, wave.len() as u64);
        if gap > 0 && tx.send(SinkCommand::Silence(gap)).await.is_err() {
            break;
        }
        if tx.send(SinkCommand::Samples(wave)).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// 写出线程：收到 Finish 才提交，通道提前关闭或出错都放弃输出
fn write_all(
    mut sink: Box<dyn WaveformSink>,
    mut rx: mpsc::Receiver<SinkCommand>,
) -> Result<(), StorageError> {
    while let Some(command) = rx.blocking_recv() {
        let result = match command {
            SinkCommand::Silence(samples) => sink.append_silence(samples),
            SinkCommand::Samples(wave) => sink.append(wave.samples()),
            SinkCommand::Finish => return sink.finish(),
        };
        if let Err(e) = result {
            sink.abort();
            return Err(e);
        }
    }
    sink.abort();
    Ok(())
}
