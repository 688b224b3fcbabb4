//! Source Adapter - 章节文本来源

mod text_directory;

pub use text_directory::{load_chapters, select_chapters, SourceError};
