//! Bookvox - 电子书转有声书
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 文本清洗与分块（TextChunker）
//! - SNAC codec 帧解包
//! - 转换上下文：片段计划、进度记录、任务状态、章节标记
//!
//! 应用层 (application/):
//! - Ports: TtsEngine, NeuralCodec, VoiceActivity, ChunkAudioStorage, ProgressStore
//! - GenerationSession: 单片段生成、时长校验与重试
//! - ConversionJob: 可断点续做的转换状态机
//! - ChapterTrackingStitcher: 拼接与章节标记
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP TTS 引擎、SNAC 解码、能量 VAD、WAV 片段存储、章节文本目录
//! - Persistence: JSON 进度文件
//! - Worker: 后台任务执行与控制

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
