//! Persistence Layer - 数据持久化
//!
//! 转换进度以 JSON 文件保存在输出目录中

mod json_progress_store;

pub use json_progress_store::{JsonProgressStore, PROGRESS_FILE_NAME};
