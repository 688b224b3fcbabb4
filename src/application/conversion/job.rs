//! Conversion Job - 可断点续做的有声书转换任务
//!
//! 流程：
//! 1. 读取进度文件，兼容则跳过已完成片段，否则从头开始
//! 2. 逐片段（或逐批）生成音频，每完成一个片段立即写盘并原子更新进度
//! 3. 在片段边界响应暂停/取消，生效前先写一次检查点
//! 4. 全部片段齐全后拼接为 combined.wav 并写出 chapters.txt
//! 5. 成功后删除进度文件与片段目录；失败或取消时保留，供下次续做

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::application::error::JobFailure;
use crate::application::generation::GenerationSession;
use crate::application::ports::{
    ChunkAudioStoragePort, ProgressStorePort, StorageError, VoiceConfig,
};
use crate::application::stitching::{ChapterTrackingStitcher, StitchEntry, StitchError};
use crate::domain::conversion::{render_ffmetadata, ChapterMarker};
use crate::domain::{ChunkPlan, ConversionProgress, JobState, ProgressError};

/// 整本书音频文件名
pub const COMBINED_AUDIO_FILE: &str = "combined.wav";

/// 章节元数据文件名
pub const CHAPTERS_FILE: &str = "chapters.txt";

/// 默认批大小
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// 任务配置
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// 源文件标识
    pub source_id: String,
    /// 输出目录
    pub output_dir: PathBuf,
    /// 选中的章节序号（空表示全部）
    pub selected_chapters: BTreeSet<usize>,
    /// 音色
    pub voice: VoiceConfig,
    /// 每批生成的片段数
    pub batch_size: usize,
    /// 书名（写入章节元数据）
    pub book_title: Option<String>,
}

/// 控制信号，在片段边界生效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlSignal {
    #[default]
    Run,
    Pause,
    Cancel,
}

/// 任务状态快照
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: JobState,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    /// 正在生成的片段
    pub current_chunk: Option<usize>,
    /// 本次运行中放弃的片段
    pub failed_chunks: Vec<usize>,
    pub message: Option<String>,
}

/// 转换产物
#[derive(Debug, Clone)]
pub struct Audiobook {
    pub audio_path: PathBuf,
    pub chapters_path: PathBuf,
    pub markers: Vec<ChapterMarker>,
    pub duration_ms: u64,
}

/// 任务结束结果
#[derive(Debug)]
pub enum JobOutcome {
    Completed(Audiobook),
    Cancelled { completed: usize, total: usize },
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Completed(_) => JobState::Completed,
            JobOutcome::Cancelled { .. } => JobState::Cancelled,
            JobOutcome::Failed(_) => JobState::Failed,
        }
    }
}

/// 中断运行的原因
enum Interrupt {
    Cancelled,
    Failed(JobFailure),
}

impl From<JobFailure> for Interrupt {
    fn from(failure: JobFailure) -> Self {
        Interrupt::Failed(failure)
    }
}

impl From<StorageError> for Interrupt {
    fn from(err: StorageError) -> Self {
        Interrupt::Failed(err.into())
    }
}

impl From<ProgressError> for Interrupt {
    fn from(err: ProgressError) -> Self {
        Interrupt::Failed(err.into())
    }
}

impl From<StitchError> for Interrupt {
    fn from(err: StitchError) -> Self {
        Interrupt::Failed(err.into())
    }
}

pub struct ConversionJob {
    id: Uuid,
    config: JobConfig,
    plan: ChunkPlan,
    session: GenerationSession,
    storage: Arc<dyn ChunkAudioStoragePort>,
    progress_store: Arc<dyn ProgressStorePort>,
    stitcher: ChapterTrackingStitcher,
    state: JobState,
    failed_chunks: Vec<usize>,
    snapshot: watch::Sender<JobSnapshot>,
}

impl ConversionJob {
    pub fn new(
        config: JobConfig,
        plan: ChunkPlan,
        session: GenerationSession,
        storage: Arc<dyn ChunkAudioStoragePort>,
        progress_store: Arc<dyn ProgressStorePort>,
    ) -> Self {
        let id = Uuid::new_v4();
        let (snapshot, _) = watch::channel(JobSnapshot {
            job_id: id,
            state: JobState::Idle,
            total_chunks: plan.len(),
            completed_chunks: 0,
            current_chunk: None,
            failed_chunks: Vec::new(),
            message: None,
        });

        Self {
            id,
            config,
            plan,
            session,
            storage,
            progress_store,
            stitcher: ChapterTrackingStitcher::default(),
            state: JobState::Idle,
            failed_chunks: Vec::new(),
            snapshot,
        }
    }

    pub fn with_stitcher(mut self, stitcher: ChapterTrackingStitcher) -> Self {
        self.stitcher = stitcher;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// 订阅状态快照
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshot.subscribe()
    }

    /// 执行任务直到完成、取消或失败
    pub async fn run(mut self, mut control: watch::Receiver<ControlSignal>) -> JobOutcome {
        self.transition(JobState::Running);
        tracing::info!(
            job_id = %self.id,
            source = %self.config.source_id,
            output = %self.config.output_dir.display(),
            chunks = self.plan.len(),
            chapters = self.plan.chapter_titles().len(),
            "Conversion job started"
        );

        if self.plan.is_empty() {
            return self.fail(JobFailure::NoChunks);
        }

        let mut progress = self.prepare_progress().await;
        self.publish_progress(&progress, None);

        match self.convert(&mut progress, &mut control).await {
            Ok(book) => {
                self.transition(JobState::Completed);
                tracing::info!(
                    job_id = %self.id,
                    audio = %book.audio_path.display(),
                    duration_ms = book.duration_ms,
                    "Conversion job completed"
                );
                JobOutcome::Completed(book)
            }
            Err(Interrupt::Cancelled) => {
                self.transition(JobState::Cancelled);
                tracing::info!(
                    job_id = %self.id,
                    completed = progress.completed_count(),
                    total = progress.total_chunks,
                    "Conversion job cancelled, progress kept for resume"
                );
                JobOutcome::Cancelled {
                    completed: progress.completed_count(),
                    total: progress.total_chunks,
                }
            }
            Err(Interrupt::Failed(failure)) => self.fail(failure),
        }
    }

    /// 读取检查点，不兼容时从头开始
    async fn prepare_progress(&self) -> ConversionProgress {
        let fresh = ConversionProgress::new(
            self.config.source_id.clone(),
            self.config.output_dir.clone(),
            self.config.selected_chapters.clone(),
            self.config.voice.identity(),
            self.session.sample_rate(),
            &self.plan,
        );

        match self.progress_store.load().await {
            Some(mut stored) if stored.is_compatible_with(&fresh) => {
                let dropped = stored.retain_existing(|path| path.exists());
                if !dropped.is_empty() {
                    tracing::warn!(
                        job_id = %self.id,
                        dropped = dropped.len(),
                        "Recorded chunk files are missing and will be regenerated"
                    );
                }
                tracing::info!(
                    job_id = %self.id,
                    completed = stored.completed_count(),
                    total = stored.total_chunks,
                    "Resuming conversion from checkpoint"
                );
                stored
            }
            Some(stored) => {
                tracing::warn!(
                    job_id = %self.id,
                    stored_source = %stored.source_id,
                    stored_chunks = stored.total_chunks,
                    "Checkpoint does not match this job, starting fresh"
                );
                fresh
            }
            None => fresh,
        }
    }

    async fn convert(
        &mut self,
        progress: &mut ConversionProgress,
        control: &mut watch::Receiver<ControlSignal>,
    ) -> Result<Audiobook, Interrupt> {
        // 首个检查点同时验证输出目录可写
        self.checkpoint(progress).await?;

        let pending = progress.missing_indices();
        if pending.is_empty() {
            tracing::info!(job_id = %self.id, "All chunks already generated, skipping engine load");
        } else {
            self.session
                .engine()
                .load()
                .await
                .map_err(JobFailure::EngineLoad)?;
            let generated = self.generate_pending(progress, &pending, control).await;
            self.session.engine().cleanup().await;
            generated?;
        }

        self.await_boundary(progress, control).await?;
        self.verify_complete(progress).await?;
        self.assemble(progress).await
    }

    async fn generate_pending(
        &mut self,
        progress: &mut ConversionProgress,
        pending: &[usize],
        control: &mut watch::Receiver<ControlSignal>,
    ) -> Result<(), Interrupt> {
        let batch_size = self.config.batch_size.max(1);

        for batch in pending.chunks(batch_size) {
            self.await_boundary(progress, control).await?;
            self.publish_progress(progress, batch.first().copied());

            let texts: Vec<&str> = batch
                .iter()
                .map(|i| self.plan.get(*i).map(|c| c.text()).unwrap_or_default())
                .collect();
            let reports = if texts.len() == 1 {
                vec![self.session.generate(texts[0], &self.config.voice).await]
            } else {
                self.session.generate_batch(&texts, &self.config.voice).await
            };

            for (&index, report) in batch.iter().zip(reports) {
                let attempts = report.attempts;
                match report.into_waveform() {
                    Some(wave) => {
                        let path = self.storage.write_chunk(index, &wave).await?;
                        progress.record_chunk(index, path)?;
                        self.checkpoint(progress).await?;
                        tracing::info!(
                            job_id = %self.id,
                            chunk = index,
                            attempts,
                            duration_ms = wave.duration_ms(),
                            completed = progress.completed_count(),
                            total = progress.total_chunks,
                            "Chunk generated"
                        );
                    }
                    None => {
                        self.failed_chunks.push(index);
                        tracing::warn!(
                            job_id = %self.id,
                            chunk = index,
                            attempts,
                            "Chunk produced no usable audio, leaving it for a later run"
                        );
                    }
                }
                self.publish_progress(progress, Some(index));
            }
        }

        Ok(())
    }

    /// 片段边界：处理暂停与取消
    async fn await_boundary(
        &mut self,
        progress: &mut ConversionProgress,
        control: &mut watch::Receiver<ControlSignal>,
    ) -> Result<(), Interrupt> {
        loop {
            let signal = *control.borrow_and_update();
            match signal {
                ControlSignal::Run => {
                    if self.state == JobState::Paused {
                        self.transition(JobState::Running);
                        tracing::info!(job_id = %self.id, "Conversion resumed");
                    }
                    return Ok(());
                }
                ControlSignal::Cancel => {
                    self.checkpoint(progress).await?;
                    return Err(Interrupt::Cancelled);
                }
                ControlSignal::Pause => {
                    if self.state != JobState::Paused {
                        self.checkpoint(progress).await?;
                        self.transition(JobState::Paused);
                        tracing::info!(
                            job_id = %self.id,
                            completed = progress.completed_count(),
                            "Conversion paused"
                        );
                    }
                    if control.changed().await.is_err() {
                        tracing::warn!(job_id = %self.id, "Job controller dropped while paused");
                        return Err(Interrupt::Cancelled);
                    }
                }
            }
        }
    }

    /// 拼接前的完整性校验
    async fn verify_complete(&mut self, progress: &mut ConversionProgress) -> Result<(), Interrupt> {
        let dropped = progress.retain_existing(|path| path.exists());
        if !dropped.is_empty() {
            tracing::warn!(job_id = %self.id, dropped = ?dropped, "Chunk files vanished before stitching");
            self.checkpoint(progress).await?;
        }

        let missing = progress.missing_indices();
        if !missing.is_empty() {
            tracing::error!(
                job_id = %self.id,
                missing = missing.len(),
                total = progress.total_chunks,
                "Refusing to stitch an incomplete audiobook"
            );
            return Err(JobFailure::Incomplete { missing }.into());
        }
        Ok(())
    }

    async fn assemble(&mut self, progress: &ConversionProgress) -> Result<Audiobook, Interrupt> {
        let entries: Vec<StitchEntry> = progress
            .chunk_files()
            .map(|(index, path)| StitchEntry {
                index,
                path: path.to_path_buf(),
                chapter_index: self
                    .plan
                    .get(index)
                    .map(|c| c.chapter_index())
                    .unwrap_or_default(),
            })
            .collect();

        let audio_path = self.config.output_dir.join(COMBINED_AUDIO_FILE);
        let summary = self
            .stitcher
            .stitch(
                self.storage.as_ref(),
                &entries,
                self.plan.chapter_titles(),
                progress.sample_rate,
                &audio_path,
            )
            .await?;

        let chapters_path = self.config.output_dir.join(CHAPTERS_FILE);
        let metadata = render_ffmetadata(&summary.markers, self.config.book_title.as_deref());
        tokio::fs::write(&chapters_path, metadata)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        self.remove_intermediates(progress).await;

        Ok(Audiobook {
            audio_path,
            chapters_path,
            markers: summary.markers,
            duration_ms: summary.total_ms,
        })
    }

    /// 删除片段文件与进度文件，失败只记录日志
    async fn remove_intermediates(&self, progress: &ConversionProgress) {
        let paths: Vec<PathBuf> = progress.chunk_files().map(|(_, p)| p.to_path_buf()).collect();
        match self.storage.remove_chunks(&paths).await {
            Ok(removed) => tracing::debug!(job_id = %self.id, removed, "Chunk files removed"),
            Err(e) => tracing::warn!(job_id = %self.id, error = %e, "Failed to remove chunk files"),
        }
        if let Err(e) = self.progress_store.delete().await {
            tracing::warn!(job_id = %self.id, error = %e, "Failed to delete progress file");
        }
    }

    async fn checkpoint(&self, progress: &mut ConversionProgress) -> Result<(), JobFailure> {
        progress.touch();
        self.progress_store.save(progress).await?;
        Ok(())
    }

    fn fail(&mut self, failure: JobFailure) -> JobOutcome {
        self.transition(JobState::Failed);
        let message = failure.to_string();
        tracing::error!(job_id = %self.id, error = %message, "Conversion job failed");
        self.snapshot.send_modify(|s| s.message = Some(message));
        JobOutcome::Failed(failure)
    }

    fn transition(&mut self, next: JobState) {
        if let Err(e) = self.state.transition(next) {
            tracing::warn!(job_id = %self.id, error = %e, "Ignoring state transition");
            return;
        }
        self.snapshot.send_modify(|s| s.state = next);
    }

    fn publish_progress(&self, progress: &ConversionProgress, current: Option<usize>) {
        let failed = self.failed_chunks.clone();
        self.snapshot.send_modify(|s| {
            s.completed_chunks = progress.completed_count();
            s.current_chunk = current;
            s.failed_chunks = failed;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generation::ValidationPolicy;
    use crate::application::ports::ProgressStorePort;
    use crate::domain::Waveform;
    use crate::infrastructure::adapters::{
        FakeBehavior, FakeTtsClient, FakeTtsClientConfig, WavChunkStorage,
    };
    use crate::infrastructure::persistence::JsonProgressStore;
    use std::path::Path;
    use tempfile::tempdir;

    const TEXTS: [&str; 5] = [
        "The first chunk of the opening chapter.",
        "The second chunk keeps the story moving.",
        "Here the narrator starts to mumble badly.",
        "A new chapter begins with this sentence.",
        "And the book ends with a final line.",
    ];

    fn plan(texts: &[&str], chapters: &[usize]) -> ChunkPlan {
        ChunkPlan::from_parts(
            texts
                .iter()
                .zip(chapters)
                .map(|(t, c)| (t.to_string(), *c))
                .collect(),
            vec!["Opening".to_string(), "Closing".to_string()],
        )
    }

    fn five_chunk_plan() -> ChunkPlan {
        plan(&TEXTS, &[0, 0, 0, 1, 1])
    }

    fn job_config(dir: &Path) -> JobConfig {
        JobConfig {
            source_id: "books/sample.epub".to_string(),
            output_dir: dir.to_path_buf(),
            selected_chapters: BTreeSet::new(),
            voice: VoiceConfig::Description("calm narrator".to_string()),
            batch_size: 1,
            book_title: Some("Sample Book".to_string()),
        }
    }

    async fn build_job(dir: &Path, engine: Arc<FakeTtsClient>, plan: ChunkPlan) -> ConversionJob {
        let session = GenerationSession::new(engine, ValidationPolicy::default());
        let storage = Arc::new(WavChunkStorage::new(dir).await.unwrap());
        let store = Arc::new(JsonProgressStore::new(dir));
        ConversionJob::new(job_config(dir), plan, session, storage, store)
    }

    fn run_signal(signal: ControlSignal) -> (watch::Sender<ControlSignal>, watch::Receiver<ControlSignal>) {
        watch::channel(signal)
    }

    #[tokio::test]
    async fn test_full_conversion_produces_audiobook() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let job = build_job(dir.path(), engine.clone(), plan(&TEXTS[..2], &[0, 1])).await;
        let (_tx, rx) = run_signal(ControlSignal::Run);

        let outcome = job.run(rx).await;

        let book = match outcome {
            JobOutcome::Completed(book) => book,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(book.audio_path.exists());
        assert_eq!(book.markers.len(), 2);
        let chapters = std::fs::read_to_string(&book.chapters_path).unwrap();
        assert!(chapters.starts_with(";FFMETADATA1\ntitle=Sample Book\n"));
        assert_eq!(chapters.matches("[CHAPTER]").count(), 2);

        // 中间文件已清理
        assert!(!JsonProgressStore::path_for(dir.path()).exists());
        assert!(!dir.path().join("temp_chunks").exists());
        assert_eq!(engine.load_calls(), 1);
        assert_eq!(engine.cleanup_calls(), 1);
    }

    #[tokio::test]
    async fn test_bad_chunk_blocks_stitching_and_keeps_progress() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(
            FakeTtsClient::new(FakeTtsClientConfig::default())
                .with_rule("mumble", FakeBehavior::TooShort),
        );
        let job = build_job(dir.path(), engine.clone(), five_chunk_plan()).await;
        let (_tx, rx) = run_signal(ControlSignal::Run);

        let outcome = job.run(rx).await;

        match outcome {
            JobOutcome::Failed(JobFailure::Incomplete { missing }) => assert_eq!(missing, vec![2]),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!dir.path().join(COMBINED_AUDIO_FILE).exists());
        assert_eq!(engine.generate_calls(), 4 + 3);

        let stored = JsonProgressStore::new(dir.path()).load().await.unwrap();
        assert_eq!(
            stored.completed().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 3, 4]
        );
    }

    #[tokio::test]
    async fn test_resume_only_generates_missing_chunks() {
        let dir = tempdir().unwrap();
        let flaky = Arc::new(
            FakeTtsClient::new(FakeTtsClientConfig::default())
                .with_rule("mumble", FakeBehavior::TooShort),
        );
        let (_tx, rx) = run_signal(ControlSignal::Run);
        let first = build_job(dir.path(), flaky, five_chunk_plan()).await.run(rx).await;
        assert_eq!(first.state(), JobState::Failed);

        let healthy = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let (_tx, rx) = run_signal(ControlSignal::Run);
        let second = build_job(dir.path(), healthy.clone(), five_chunk_plan())
            .await
            .run(rx)
            .await;

        assert_eq!(second.state(), JobState::Completed);
        assert_eq!(healthy.generate_calls(), 1);
        assert_eq!(healthy.prompts(), vec![TEXTS[2].to_string()]);
    }

    #[tokio::test]
    async fn test_complete_checkpoint_skips_engine() {
        let dir = tempdir().unwrap();
        let plan = plan(&TEXTS[..3], &[0, 0, 1]);
        let storage = WavChunkStorage::new(dir.path()).await.unwrap();
        let mut progress = ConversionProgress::new(
            "books/sample.epub",
            dir.path(),
            BTreeSet::new(),
            "calm narrator",
            24000,
            &plan,
        );
        for index in 0..3 {
            let wave = Waveform::new(vec![0.2; 24000], 24000);
            let path = storage.write_chunk(index, &wave).await.unwrap();
            progress.record_chunk(index, path).unwrap();
        }
        JsonProgressStore::new(dir.path()).save(&progress).await.unwrap();

        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let (_tx, rx) = run_signal(ControlSignal::Run);
        let outcome = build_job(dir.path(), engine.clone(), plan).await.run(rx).await;

        assert_eq!(outcome.state(), JobState::Completed);
        assert_eq!(engine.generate_calls(), 0);
        assert_eq!(engine.load_calls(), 0);
    }

    #[tokio::test]
    async fn test_incompatible_checkpoint_starts_fresh() {
        let dir = tempdir().unwrap();
        let plan3 = plan(&TEXTS[..3], &[0, 0, 1]);
        let mut stale = ConversionProgress::new(
            "books/sample.epub",
            dir.path(),
            BTreeSet::new(),
            "a completely different voice",
            24000,
            &plan3,
        );
        stale.record_chunk(0, dir.path().join("stale.wav")).unwrap();
        std::fs::write(dir.path().join("stale.wav"), b"not audio").unwrap();
        JsonProgressStore::new(dir.path()).save(&stale).await.unwrap();

        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let (_tx, rx) = run_signal(ControlSignal::Run);
        let outcome = build_job(dir.path(), engine.clone(), plan3).await.run(rx).await;

        assert_eq!(outcome.state(), JobState::Completed);
        assert_eq!(engine.generate_calls(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk_keeps_checkpoint() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let job = build_job(dir.path(), engine.clone(), five_chunk_plan()).await;
        let (_tx, rx) = run_signal(ControlSignal::Cancel);

        let outcome = job.run(rx).await;

        assert!(matches!(
            outcome,
            JobOutcome::Cancelled {
                completed: 0,
                total: 5
            }
        ));
        assert_eq!(engine.generate_calls(), 0);
        assert!(JsonProgressStore::path_for(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_stops_at_chunk_boundary() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig {
            latency_ms: 20,
            ..Default::default()
        }));
        let job = build_job(dir.path(), engine.clone(), five_chunk_plan()).await;
        let mut snapshots = job.subscribe();
        let (tx, rx) = run_signal(ControlSignal::Run);
        let task = tokio::spawn(job.run(rx));

        snapshots
            .wait_for(|s| s.completed_chunks >= 1)
            .await
            .unwrap();
        tx.send_replace(ControlSignal::Cancel);
        let outcome = task.await.unwrap();

        let completed = match outcome {
            JobOutcome::Cancelled { completed, total } => {
                assert_eq!(total, 5);
                completed
            }
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(completed >= 1 && completed < 5);

        let stored = JsonProgressStore::new(dir.path()).load().await.unwrap();
        assert_eq!(stored.completed_count(), completed);
        assert_eq!(engine.cleanup_calls(), 1);
    }

    #[tokio::test]
    async fn test_pause_then_resume() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let job = build_job(dir.path(), engine.clone(), plan(&TEXTS[..2], &[0, 1])).await;
        let mut snapshots = job.subscribe();
        let (tx, rx) = run_signal(ControlSignal::Pause);
        let task = tokio::spawn(job.run(rx));

        snapshots
            .wait_for(|s| s.state == JobState::Paused)
            .await
            .unwrap();
        assert_eq!(engine.generate_calls(), 0);
        assert!(JsonProgressStore::path_for(dir.path()).exists());

        tx.send_replace(ControlSignal::Run);
        let outcome = task.await.unwrap();

        assert_eq!(outcome.state(), JobState::Completed);
        assert_eq!(engine.generate_calls(), 2);
    }

    #[tokio::test]
    async fn test_batched_generation() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let session = GenerationSession::new(engine.clone(), ValidationPolicy::default());
        let storage = Arc::new(WavChunkStorage::new(dir.path()).await.unwrap());
        let store = Arc::new(JsonProgressStore::new(dir.path()));
        let config = JobConfig {
            batch_size: 2,
            ..job_config(dir.path())
        };
        let job = ConversionJob::new(config, five_chunk_plan(), session, storage, store);
        let (_tx, rx) = run_signal(ControlSignal::Run);

        let outcome = job.run(rx).await;

        assert_eq!(outcome.state(), JobState::Completed);
        // 5 个片段分 3 批：2 + 2 + 1（单片段批次走单条接口）
        assert_eq!(engine.batch_calls(), 2);
        assert_eq!(engine.generate_calls(), 5);
    }

    #[tokio::test]
    async fn test_engine_load_failure() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig {
            fail_load: true,
            ..Default::default()
        }));
        let job = build_job(dir.path(), engine.clone(), five_chunk_plan()).await;
        let (_tx, rx) = run_signal(ControlSignal::Run);

        let outcome = job.run(rx).await;

        assert!(matches!(outcome, JobOutcome::Failed(JobFailure::EngineLoad(_))));
        assert_eq!(engine.generate_calls(), 0);
        assert!(JsonProgressStore::path_for(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_empty_plan_fails() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));
        let job = build_job(dir.path(), engine, ChunkPlan::default()).await;
        let (_tx, rx) = run_signal(ControlSignal::Run);

        assert!(matches!(
            job.run(rx).await,
            JobOutcome::Failed(JobFailure::NoChunks)
        ));
    }
}
