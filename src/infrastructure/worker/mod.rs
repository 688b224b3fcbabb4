//! Worker Layer - 后台任务执行
//!
//! 实现 ConversionWorker，在后台运行转换任务

mod conversion_worker;

pub use conversion_worker::{ConversionWorker, JobController, JobHandle};
