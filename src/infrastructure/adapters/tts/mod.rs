//! TTS Adapter - TTS 引擎实现
//!
//! - HttpCodecTtsClient: 语音描述引擎（codec token + 神经解码器）
//! - HttpCloneTtsClient: 声音克隆引擎（直接返回 WAV）
//! - FakeTtsClient: 测试用

mod fake_tts_client;
mod http_clone_client;
mod http_codec_client;
mod http_common;
mod wav_decode;

pub use fake_tts_client::{FakeBehavior, FakeTtsClient, FakeTtsClientConfig};
pub use http_clone_client::HttpCloneTtsClient;
pub use http_codec_client::{max_new_tokens, HttpCodecTtsClient, MAX_DESCRIPTION_CHARS};
pub use http_common::HttpTtsClientConfig;
pub use wav_decode::{decode_wav, WavDecodeError};
