//! Storage Adapter - 片段音频文件存储

mod wav_chunk_storage;

pub use wav_chunk_storage::{HoundSink, WavChunkStorage, CHUNK_DIR_NAME};
