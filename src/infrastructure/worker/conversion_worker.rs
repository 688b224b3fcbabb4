//! Conversion Worker - 后台运行转换任务
//!
//! 任务在独立的 tokio task 中执行，调用方通过 JobHandle：
//! - 读取状态快照（watch channel，随时可读）
//! - 暂停 / 继续 / 取消（在片段边界生效）
//! - 等待最终结果

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::application::conversion::{ControlSignal, ConversionJob, JobOutcome, JobSnapshot};
use crate::application::error::JobFailure;

/// 任务控制端，可克隆后交给信号处理等其他 task
#[derive(Clone)]
pub struct JobController {
    signal: Arc<watch::Sender<ControlSignal>>,
}

impl JobController {
    /// 请求暂停，当前片段完成后生效
    pub fn pause(&self) -> bool {
        self.signal.send_if_modified(|signal| {
            if *signal == ControlSignal::Run {
                *signal = ControlSignal::Pause;
                true
            } else {
                false
            }
        })
    }

    /// 从暂停中恢复
    pub fn resume(&self) -> bool {
        self.signal.send_if_modified(|signal| {
            if *signal == ControlSignal::Pause {
                *signal = ControlSignal::Run;
                true
            } else {
                false
            }
        })
    }

    /// 请求取消，已完成的片段与进度文件保留
    pub fn cancel(&self) {
        self.signal.send_replace(ControlSignal::Cancel);
    }

    pub fn signal(&self) -> ControlSignal {
        *self.signal.borrow()
    }
}

/// 运行中任务的句柄
pub struct JobHandle {
    job_id: Uuid,
    controller: JobController,
    snapshots: watch::Receiver<JobSnapshot>,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshots.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.snapshots.clone()
    }

    pub fn controller(&self) -> JobController {
        self.controller.clone()
    }

    /// 等待任务结束
    pub async fn wait(self) -> Result<JobOutcome, JobFailure> {
        self.task.await.map_err(|e| {
            tracing::error!(job_id = %self.job_id, error = %e, "Conversion task aborted");
            JobFailure::Worker(e.to_string())
        })
    }
}

pub struct ConversionWorker;

impl ConversionWorker {
    /// 在后台启动任务
    pub fn spawn(job: ConversionJob) -> JobHandle {
        let job_id = job.id();
        let snapshots = job.subscribe();
        let (tx, rx) = watch::channel(ControlSignal::Run);

        let task = tokio::spawn(async move {
            tracing::info!(job_id = %job_id, "Conversion worker started");
            let outcome = job.run(rx).await;
            tracing::info!(job_id = %job_id, state = %outcome.state(), "Conversion worker stopped");
            outcome
        });

        JobHandle {
            job_id,
            controller: JobController {
                signal: Arc::new(tx),
            },
            snapshots,
            task,
        }
    }
}
