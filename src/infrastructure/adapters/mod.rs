//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod codec;
pub mod source;
pub mod storage;
pub mod tts;
pub mod vad;

pub use codec::*;
pub use source::*;
pub use storage::*;
pub use tts::*;
pub use vad::*;
