//! Bookvox - 电子书转有声书
//!
//! 用法: bookvox [config.toml]
//!
//! 读取章节文本目录，逐片段合成语音，输出 combined.wav 与 chapters.txt。
//! 中断（Ctrl-C 或崩溃）后再次运行会从进度文件继续。

use std::path::PathBuf;
use std::sync::Arc;

use bookvox::application::ports::{
    ChunkAudioStoragePort, EngineKind, TtsEnginePort, VoiceActivityPort,
};
use bookvox::application::{
    discard_resumable, inspect_resumable, CodecFrameDecoder, ChapterTrackingStitcher,
    ConversionJob, GenerationSession, JobConfig, JobOutcome,
};
use bookvox::config::{load_config_from_path, print_config, AppConfig, SegmenterKind};
use bookvox::domain::{ChunkPlan, TextChunker};
use bookvox::infrastructure::adapters::{
    load_chapters, select_chapters, EnergyVad, HttpCloneTtsClient, HttpCodecTtsClient,
    HttpSnacDecoder, HttpSnacDecoderConfig, HttpTtsClientConfig, WavChunkStorage,
};
use bookvox::infrastructure::persistence::JsonProgressStore;
use bookvox::infrastructure::worker::ConversionWorker;

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},bookvox={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<dyn TtsEnginePort>> {
    let tts_config =
        HttpTtsClientConfig::new(config.engine.url.clone()).with_timeout(config.engine.timeout_secs);

    let engine: Arc<dyn TtsEnginePort> = match config.engine.kind {
        EngineKind::VoiceDescription => {
            let codec = HttpSnacDecoder::new(HttpSnacDecoderConfig {
                base_url: config.engine.decoder_url.clone(),
                timeout_secs: config.engine.timeout_secs,
            })?;
            let decoder = CodecFrameDecoder::new(Arc::new(codec));
            Arc::new(HttpCodecTtsClient::new(tts_config, decoder)?)
        }
        EngineKind::VoiceClone => Arc::new(HttpCloneTtsClient::new(tts_config)?),
    };
    Ok(engine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config_from_path(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    tracing::info!("Bookvox - 电子书转有声书");
    print_config(&config);

    // 章节与片段计划
    let chapters = load_chapters(&config.job.source_dir).await?;
    let selected = config.job.selected_chapters();
    let chunker_config = config.chunking.chunker_config();
    let chunker = match config.chunking.segmenter {
        SegmenterKind::Unicode => TextChunker::unicode(chunker_config),
        SegmenterKind::Naive => TextChunker::degraded(chunker_config),
    };
    let plan = ChunkPlan::build(&chunker, select_chapters(&chapters, &selected));
    tracing::info!(
        chapters = plan.chapter_titles().len(),
        chunks = plan.len(),
        "Chunk plan ready"
    );
    if plan.is_empty() {
        anyhow::bail!("Nothing to convert: selected chapters produced no text");
    }

    // 存储
    let output_dir = config.job.output_dir.clone();
    tokio::fs::create_dir_all(&output_dir).await?;
    let storage = Arc::new(WavChunkStorage::new(&output_dir).await?);
    let progress_store = Arc::new(JsonProgressStore::new(&output_dir));
    let source_id = config.job.source_id();

    if config.job.fresh {
        let removed = discard_resumable(progress_store.as_ref(), storage.as_ref()).await?;
        tracing::info!(removed, "Starting fresh, previous progress discarded");
        // 丢弃时空目录会被删除
        tokio::fs::create_dir_all(storage.chunk_dir()).await?;
    } else if let Some(info) =
        inspect_resumable(progress_store.as_ref(), &source_id, &output_dir).await
    {
        tracing::info!(
            completed = info.completed_chunks,
            total = info.total_chunks,
            percent = info.percent(),
            started_at = %info.started_at,
            "Found resumable conversion"
        );
    }

    // 引擎与生成会话
    let engine = build_engine(&config)?;
    let voice = config
        .voice
        .voice_for(engine.kind())
        .ok_or_else(|| anyhow::anyhow!("No voice configured for engine {}", engine.kind()))?;
    let vad: Option<Arc<dyn VoiceActivityPort>> = if config.generation.vad_enabled {
        Some(Arc::new(EnergyVad::default()))
    } else {
        None
    };
    let session = GenerationSession::new(engine, config.generation.policy())
        .with_vad(vad)
        .with_max_duration(config.generation.max_duration_secs);

    let job_config = JobConfig {
        source_id,
        output_dir,
        selected_chapters: selected,
        voice,
        batch_size: config.generation.batch_size,
        book_title: config.job.book_title.clone(),
    };
    let stitcher = ChapterTrackingStitcher::new(config.stitching.silence_ms)
        .with_chapter_gap(config.stitching.chapter_gap_ms);
    let job = ConversionJob::new(job_config, plan, session, storage, progress_store)
        .with_stitcher(stitcher);

    let handle = ConversionWorker::spawn(job);

    // 进度日志
    let mut snapshots = handle.subscribe();
    tokio::spawn(async move {
        let mut last_completed = None;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if last_completed != Some(snapshot.completed_chunks) {
                last_completed = Some(snapshot.completed_chunks);
                tracing::info!(
                    state = %snapshot.state,
                    completed = snapshot.completed_chunks,
                    total = snapshot.total_chunks,
                    "Conversion progress"
                );
            }
        }
    });

    // Ctrl-C: 在当前片段结束后取消，进度保留
    let controller = handle.controller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal, cancelling after current chunk");
            controller.cancel();
        }
    });

    match handle.wait().await? {
        JobOutcome::Completed(book) => {
            tracing::info!(
                audio = %book.audio_path.display(),
                chapters = %book.chapters_path.display(),
                markers = book.markers.len(),
                duration_ms = book.duration_ms,
                "Audiobook ready"
            );
            Ok(())
        }
        JobOutcome::Cancelled { completed, total } => {
            tracing::info!(completed, total, "Conversion cancelled, run again to resume");
            Ok(())
        }
        JobOutcome::Failed(failure) => {
            tracing::error!(error = %failure, "Conversion failed");
            Err(failure.into())
        }
    }
}
