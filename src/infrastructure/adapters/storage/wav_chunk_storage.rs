//! WAV Chunk Storage - 片段音频文件存储
//!
//! 实现 ChunkAudioStoragePort：
//! - 片段写入 `<output>/temp_chunks/chunk_NNNN.wav`，16-bit PCM 单声道
//! - 先写临时文件再 rename，崩溃后不会留下半个片段
//! - 拼接输出通过 HoundSink 流式写出，完成后才 rename 到目标路径

use async_trait::async_trait;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{ChunkAudioStoragePort, StorageError, WaveformSink};
use crate::domain::Waveform;

/// 片段目录名
pub const CHUNK_DIR_NAME: &str = "temp_chunks";

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn io_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::IoError(e.to_string())
}

fn write_wav(path: &Path, waveform: &Waveform) -> Result<(), StorageError> {
    let mut writer =
        hound::WavWriter::create(path, wav_spec(waveform.sample_rate())).map_err(io_error)?;
    for &sample in waveform.samples() {
        writer.write_sample(to_i16(sample)).map_err(io_error)?;
    }
    writer.finalize().map_err(io_error)
}

fn read_wav(path: &Path) -> Result<Waveform, StorageError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| StorageError::InvalidAudio(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let invalid = |e: hound::Error| StorageError::InvalidAudio(e.to_string());

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(invalid)?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(invalid)?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(Waveform::new(samples, spec.sample_rate))
}

/// 基于 hound 的流式 WAV 写出
///
/// 先写到 `<path>.tmp`，finish 时 rename 到目标路径
pub struct HoundSink {
    writer: hound::WavWriter<BufWriter<File>>,
    tmp: PathBuf,
    path: PathBuf,
}

impl HoundSink {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let tmp = path.with_extension("wav.tmp");
        let writer = hound::WavWriter::create(&tmp, wav_spec(sample_rate)).map_err(io_error)?;
        Ok(Self {
            writer,
            tmp,
            path: path.to_path_buf(),
        })
    }
}

impl WaveformSink for HoundSink {
    fn append(&mut self, samples: &[f32]) -> Result<(), StorageError> {
        for &sample in samples {
            self.writer.write_sample(to_i16(sample)).map_err(io_error)?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), StorageError> {
        let HoundSink { writer, tmp, path } = *self;
        if let Err(e) = writer.finalize() {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error(e));
        }
        std::fs::rename(&tmp, &path).map_err(io_error)
    }

    fn abort(self: Box<Self>) {
        let HoundSink { writer, tmp, path } = *self;
        drop(writer);
        if let Err(e) = std::fs::remove_file(&tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove partial output");
        }
        tracing::debug!(path = %path.display(), "Discarded unfinished output");
    }
}

/// 文件系统片段存储
pub struct WavChunkStorage {
    chunk_dir: PathBuf,
}

impl WavChunkStorage {
    /// 以输出目录创建，片段放在其下的 temp_chunks 目录
    pub async fn new(output_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let chunk_dir = output_dir.as_ref().join(CHUNK_DIR_NAME);
        fs::create_dir_all(&chunk_dir).await.map_err(io_error)?;
        Ok(Self { chunk_dir })
    }
}

#[async_trait]
impl ChunkAudioStoragePort for WavChunkStorage {
    fn chunk_dir(&self) -> PathBuf {
        self.chunk_dir.clone()
    }

    fn chunk_path(&self, index: usize) -> PathBuf {
        self.chunk_dir.join(format!("chunk_{:04}.wav", index))
    }

    async fn write_chunk(&self, index: usize, waveform: &Waveform) -> Result<PathBuf, StorageError> {
        // 恢复后目录可能已被清理
        fs::create_dir_all(&self.chunk_dir).await.map_err(io_error)?;

        let path = self.chunk_path(index);
        let tmp = path.with_extension("wav.tmp");
        let wave = waveform.clone();
        let tmp_for_write = tmp.clone();

        tokio::task::spawn_blocking(move || write_wav(&tmp_for_write, &wave))
            .await
            .map_err(io_error)??;
        fs::rename(&tmp, &path).await.map_err(io_error)?;

        tracing::debug!(
            index,
            samples = waveform.len(),
            path = %path.display(),
            "Saved chunk audio"
        );
        Ok(path)
    }

    async fn read_chunk(&self, path: &Path) -> Result<Waveform, StorageError> {
        if !path.exists() {
            return Err(StorageError::FileNotFound(path.display().to_string()));
        }
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_wav(&path))
            .await
            .map_err(io_error)?
    }

    async fn create_sink(
        &self,
        path: &Path,
        sample_rate: u32,
    ) -> Result<Box<dyn WaveformSink>, StorageError> {
        let path = path.to_path_buf();
        let sink = tokio::task::spawn_blocking(move || HoundSink::create(&path, sample_rate))
            .await
            .map_err(io_error)??;
        Ok(Box::new(sink))
    }

    async fn remove_chunks(&self, paths: &[PathBuf]) -> Result<u64, StorageError> {
        let mut deleted_count = 0u64;
        for path in paths {
            match fs::remove_file(path).await {
                Ok(()) => deleted_count += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(e)),
            }
        }

        // 目录非空时保留
        let _ = fs::remove_dir(&self.chunk_dir).await;

        tracing::info!(
            files = deleted_count,
            dir = %self.chunk_dir.display(),
            "Removed chunk audio"
        );
        Ok(deleted_count)
    }
}
