//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（bookvox.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::application::ports::EngineKind;
use crate::infrastructure::adapters::MAX_DESCRIPTION_CHARS;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["bookvox", "bookvox.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `BOOKVOX_ENGINE__KIND=voice_clone`
/// - `BOOKVOX_ENGINE__URL=http://tts-server:8000`
/// - `BOOKVOX_VOICE__REFERENCE_AUDIO=/voices/narrator.wav`
/// - `BOOKVOX_JOB__CHAPTERS=0,2,3`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("engine.kind", "voice_description")?
        .set_default("engine.url", "http://localhost:8000")?
        .set_default("engine.decoder_url", "http://localhost:8001")?
        .set_default("engine.timeout_secs", 0)?
        .set_default("chunking.max_words", 40)?
        .set_default("chunking.min_words", 15)?
        .set_default("chunking.segmenter", "unicode")?
        .set_default("chunking.batch_chars", 500_000)?
        .set_default("generation.chars_per_second", 15.0)?
        .set_default("generation.tolerance", 0.5)?
        .set_default("generation.max_attempts", 3)?
        .set_default("generation.duration_check", true)?
        .set_default("generation.vad_enabled", true)?
        .set_default("generation.max_duration_secs", 60.0)?
        .set_default("generation.batch_size", 1)?
        .set_default("stitching.silence_ms", 400)?
        .set_default("stitching.chapter_gap_ms", 0)?
        .set_default("job.source_dir", "book")?
        .set_default("job.output_dir", "output")?
        .set_default("job.fresh", false)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 前缀: BOOKVOX_，层级分隔符: __，列表用逗号分隔
    builder = builder.add_source(
        Environment::with_prefix("BOOKVOX")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("job.chapters")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.engine.url.trim().is_empty() {
        return Err(invalid("Engine URL cannot be empty"));
    }

    let chunking = &config.chunking;
    if chunking.max_words == 0 {
        return Err(invalid("chunking.max_words must be greater than 0"));
    }
    if chunking.min_words > chunking.max_words {
        return Err(invalid(format!(
            "chunking.min_words ({}) cannot exceed max_words ({})",
            chunking.min_words, chunking.max_words
        )));
    }
    if chunking.batch_chars == 0 {
        return Err(invalid("chunking.batch_chars must be greater than 0"));
    }

    let generation = &config.generation;
    if generation.max_attempts == 0 {
        return Err(invalid("generation.max_attempts must be at least 1"));
    }
    if generation.batch_size == 0 {
        return Err(invalid("generation.batch_size must be at least 1"));
    }
    if !(generation.tolerance > 0.0) {
        return Err(invalid("generation.tolerance must be positive"));
    }
    if !(generation.chars_per_second > 0.0) {
        return Err(invalid("generation.chars_per_second must be positive"));
    }

    match config.engine.kind {
        EngineKind::VoiceDescription => {
            if config.engine.decoder_url.trim().is_empty() {
                return Err(invalid("Decoder URL cannot be empty for voice_description"));
            }
            let description = config.voice.description.trim();
            if description.is_empty() {
                return Err(invalid("voice.description cannot be empty"));
            }
            if description.chars().count() > MAX_DESCRIPTION_CHARS {
                return Err(invalid(format!(
                    "voice.description exceeds {} characters",
                    MAX_DESCRIPTION_CHARS
                )));
            }
        }
        EngineKind::VoiceClone => {
            if config.voice.reference_audio.is_none() {
                return Err(invalid("voice_clone engine requires voice.reference_audio"));
            }
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Audiobook Configuration ===");
    tracing::info!("Engine: {} @ {}", config.engine.kind, config.engine.url);
    if config.engine.kind == EngineKind::VoiceDescription {
        tracing::info!("Decoder URL: {}", config.engine.decoder_url);
    }
    tracing::info!("Engine Timeout: {}s (0 = none)", config.engine.timeout_secs);
    match &config.voice.reference_audio {
        Some(path) if config.engine.kind == EngineKind::VoiceClone => {
            tracing::info!("Reference Audio: {}", path.display());
        }
        _ => tracing::info!("Voice Description: {}", config.voice.description),
    }
    tracing::info!(
        "Chunking: {}-{} words, segmenter {:?}",
        config.chunking.min_words,
        config.chunking.max_words,
        config.chunking.segmenter
    );
    tracing::info!(
        "Validation: {} chars/s, tolerance {}, {} attempt(s), VAD {}",
        config.generation.chars_per_second,
        config.generation.tolerance,
        config.generation.max_attempts,
        config.generation.vad_enabled
    );
    tracing::info!("Batch Size: {}", config.generation.batch_size);
    tracing::info!(
        "Silence: {} ms between chunks, {} ms between chapters",
        config.stitching.silence_ms,
        config.stitching.chapter_gap_ms
    );
    tracing::info!("Source: {:?}", config.job.source_dir);
    tracing::info!("Output: {:?}", config.job.output_dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("===============================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_validation_passes_for_default_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_min_above_max() {
        let mut config = AppConfig::default();
        config.chunking.min_words = 50;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_attempts() {
        let mut config = AppConfig::default();
        config.generation.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_engine_url() {
        let mut config = AppConfig::default();
        config.engine.url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_clone_engine_requires_reference_audio() {
        let mut config = AppConfig::default();
        config.engine.kind = EngineKind::VoiceClone;
        assert!(validate_config(&config).is_err());

        config.voice.reference_audio = Some(PathBuf::from("/voices/ref.wav"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_description_length_limit() {
        let mut config = AppConfig::default();
        config.voice.description = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[chunking]\nmax_words = 30\nmin_words = 10\n\n[stitching]\nchapter_gap_ms = 1000\n"
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();

        assert_eq!(config.chunking.max_words, 30);
        assert_eq!(config.chunking.min_words, 10);
        assert_eq!(config.stitching.chapter_gap_ms, 1000);
        assert_eq!(config.stitching.silence_ms, 400);
    }
}
