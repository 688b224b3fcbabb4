//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::application::generation::{
    ValidationPolicy, DEFAULT_CHARS_PER_SECOND, DEFAULT_DURATION_TOLERANCE, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DURATION_SECS,
};
use crate::application::ports::{EngineKind, VoiceConfig};
use crate::domain::conversion::DEFAULT_SILENCE_MS;
use crate::domain::text_chunker::{
    ChunkerConfig, DEFAULT_BATCH_CHARS, DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS,
};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// TTS 引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 音色配置
    #[serde(default)]
    pub voice: VoiceSettings,

    /// 分块配置
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// 生成与校验配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 拼接配置
    #[serde(default)]
    pub stitching: StitchingConfig,

    /// 任务配置
    #[serde(default)]
    pub job: JobSettings,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// 引擎类型: voice_description / voice_clone
    #[serde(default)]
    pub kind: EngineKind,

    /// TTS 服务基础 URL
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// SNAC 解码服务基础 URL（仅 voice_description）
    #[serde(default = "default_decoder_url")]
    pub decoder_url: String,

    /// 请求超时时间（秒），0 表示不限制
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_engine_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_decoder_url() -> String {
    "http://localhost:8001".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            url: default_engine_url(),
            decoder_url: default_decoder_url(),
            timeout_secs: 0,
        }
    }
}

/// 音色配置
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceSettings {
    /// 语音描述（voice_description 引擎）
    #[serde(default = "default_voice_description")]
    pub description: String,

    /// 参考音频（voice_clone 引擎）
    #[serde(default)]
    pub reference_audio: Option<PathBuf>,
}

fn default_voice_description() -> String {
    "A calm, clear adult narrator with a warm tone, speaking at a steady audiobook pace."
        .to_string()
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            description: default_voice_description(),
            reference_audio: None,
        }
    }
}

impl VoiceSettings {
    /// 按引擎类型取出音色
    pub fn voice_for(&self, kind: EngineKind) -> Option<VoiceConfig> {
        match kind {
            EngineKind::VoiceDescription => {
                Some(VoiceConfig::Description(self.description.trim().to_string()))
            }
            EngineKind::VoiceClone => self
                .reference_audio
                .clone()
                .map(VoiceConfig::ReferenceAudio),
        }
    }
}

/// 句子切分器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmenterKind {
    /// Unicode 句子边界（UAX #29）
    #[default]
    Unicode,
    /// 按 ". " 切分
    Naive,
}

/// 分块配置
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    /// 每个片段最多词数
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// 每个片段最少词数（末尾不足时并入前一片段）
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    #[serde(default)]
    pub segmenter: SegmenterKind,

    /// 分句时每批最多字符数
    #[serde(default = "default_batch_chars")]
    pub batch_chars: usize,
}

fn default_max_words() -> usize {
    DEFAULT_MAX_WORDS
}

fn default_min_words() -> usize {
    DEFAULT_MIN_WORDS
}

fn default_batch_chars() -> usize {
    DEFAULT_BATCH_CHARS
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            min_words: default_min_words(),
            segmenter: SegmenterKind::default(),
            batch_chars: default_batch_chars(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            max_words: self.max_words,
            min_words: self.min_words,
            batch_chars: self.batch_chars,
        }
    }
}

/// 生成与校验配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 预期朗读速度（字符/秒）
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f64,

    /// 时长相对偏差容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// 每个片段最多尝试次数
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 是否启用时长校验
    #[serde(default = "default_true")]
    pub duration_check: bool,

    /// 校验前是否裁掉首尾静音
    #[serde(default = "default_true")]
    pub vad_enabled: bool,

    /// 单片段时长上限（秒）
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,

    /// 每批片段数
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_chars_per_second() -> f64 {
    DEFAULT_CHARS_PER_SECOND
}

fn default_tolerance() -> f64 {
    DEFAULT_DURATION_TOLERANCE
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_duration_secs() -> f64 {
    DEFAULT_MAX_DURATION_SECS
}

fn default_batch_size() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chars_per_second: default_chars_per_second(),
            tolerance: default_tolerance(),
            max_attempts: default_max_attempts(),
            duration_check: true,
            vad_enabled: true,
            max_duration_secs: default_max_duration_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl GenerationConfig {
    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            chars_per_second: self.chars_per_second,
            tolerance: self.tolerance,
            max_attempts: self.max_attempts,
            duration_check: self.duration_check,
        }
    }
}

/// 拼接配置
#[derive(Debug, Clone, Deserialize)]
pub struct StitchingConfig {
    /// 同一章节内片段之间的静音（毫秒）
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,

    /// 章节之间的静音（毫秒）
    #[serde(default)]
    pub chapter_gap_ms: u64,
}

fn default_silence_ms() -> u64 {
    DEFAULT_SILENCE_MS
}

impl Default for StitchingConfig {
    fn default() -> Self {
        Self {
            silence_ms: default_silence_ms(),
            chapter_gap_ms: 0,
        }
    }
}

/// 任务配置
#[derive(Debug, Clone, Deserialize)]
pub struct JobSettings {
    /// 章节文本目录（每章一个 .txt）
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// 输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 选中的章节序号，空表示全部
    #[serde(default)]
    pub chapters: Vec<usize>,

    /// 书名
    #[serde(default)]
    pub book_title: Option<String>,

    /// 忽略已有进度，从头开始
    #[serde(default)]
    pub fresh: bool,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("book")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            chapters: Vec::new(),
            book_title: None,
            fresh: false,
        }
    }
}

impl JobSettings {
    pub fn selected_chapters(&self) -> BTreeSet<usize> {
        self.chapters.iter().copied().collect()
    }

    /// 源标识：章节目录路径
    pub fn source_id(&self) -> String {
        self.source_dir.display().to_string()
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
