//! Conversion Context - 任务状态机

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ProgressError;

/// 转换任务状态
///
/// ```text
/// Idle ──► Running ◄──► Paused
///             │           │
///             ▼           ▼
///   Completed / Cancelled / Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// 尚未启动
    Idle,
    /// 正在生成或拼接
    Running,
    /// 已在片段边界暂停
    Paused,
    /// 有声书已输出
    Completed,
    /// 用户取消，进度已保存
    Cancelled,
    /// 出错或片段不完整，进度已保存
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        }
    }

    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed
        )
    }

    /// 是否允许迁移到目标状态
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Failed)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Cancelled)
                | (Paused, Failed)
        )
    }

    /// 执行状态迁移
    pub fn transition(&mut self, next: JobState) -> Result<(), ProgressError> {
        if !self.can_transition_to(next) {
            return Err(ProgressError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
