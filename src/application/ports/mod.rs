//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod chunk_storage;
mod neural_codec;
mod progress_store;
mod tts_engine;
mod voice_activity;

pub use chunk_storage::{ChunkAudioStoragePort, StorageError, WaveformSink};
pub use neural_codec::{CodecError, NeuralCodecPort};
pub use progress_store::{ProgressStoreError, ProgressStorePort};
pub use tts_engine::{
    EngineKind, SynthesisRequest, TtsEnginePort, TtsError, VoiceConfig,
    VOICE_CLONE_SAMPLE_RATE, VOICE_DESCRIPTION_SAMPLE_RATE,
};
pub use voice_activity::VoiceActivityPort;
