//! 轮询投递器（Enqueuer）
//!
//! 唯一把“已提交的暂存任务”转换为“已投递事件”的组件。每一轮：
//! 1. 按创建时间升序拉取至多 `batch_size` 条暂存任务；
//! 2. 并发地把每条任务交给投递层，成功后删除该任务，失败则原样保留等待下一轮；
//! 3. 无论本轮处理多少条、耗时多久，都等待 `poll_interval` 再进入下一轮。
//!
//! 投递语义为“至少一次”：投递成功与删除之间若进程崩溃或删除失败，
//! 该任务会在下一轮被再次投递，订阅者必须容忍重复。
//! 持续失败的任务按轮询间隔无限重试，没有退避、次数上限或死信。
//!
//! 停止是协作式的：取消信号只在两轮之间（包括等待期间）被观察，
//! 进行中的一轮（拉取 + 整批投递/删除）总会完整结束。
//!
use crate::error::{OutboxError, OutboxResult as Result};
use crate::eventing::DeliveryLayer;
use crate::persist::{StagedJob, StagedJobStore};
use bon::Builder;
use futures_util::{FutureExt, StreamExt, stream};
use std::panic::AssertUnwindSafe;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// 轮询间隔下限，零间隔按此值等待
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Enqueuer：周期性地从暂存存储拉取任务并交给投递层
#[derive(Builder)]
pub struct Enqueuer<S>
where
    S: StagedJobStore,
{
    store: S,
    delivery: Arc<dyn DeliveryLayer>,
    #[builder(default)]
    config: EnqueuerConfig,
}

/// 单轮投递结果
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// 本轮拉取到的任务数
    pub listed: usize,
    /// 投递成功的任务数
    pub delivered: usize,
    /// 投递成功且已删除的任务数
    pub removed: usize,
    /// 投递失败、保留待重试的任务数
    pub failed: usize,
}

impl DrainReport {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Removed => {
                self.delivered += 1;
                self.removed += 1;
            }
            JobOutcome::DeliveredNotRemoved => self.delivered += 1,
            JobOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum JobOutcome {
    Removed,
    DeliveredNotRemoved,
    Failed,
}

impl<S> Enqueuer<S>
where
    S: StagedJobStore + 'static,
{
    pub fn config(&self) -> &EnqueuerConfig {
        &self.config
    }

    /// 在后台启动轮询循环，立即返回可用于停止/等待的句柄
    pub fn start(self: Arc<Self>) -> EnqueuerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));

        EnqueuerHandle {
            token,
            task: Some(task),
        }
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "enqueuer started"
        );

        while !token.is_cancelled() {
            match self.run_once().await {
                Ok(report) if report.listed > 0 => {
                    debug!(
                        listed = report.listed,
                        removed = report.removed,
                        failed = report.failed,
                        "enqueuer iteration finished"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "failed to list staged jobs"),
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(self.config.poll_interval.max(MIN_POLL_INTERVAL)) => {}
            }
        }

        info!("enqueuer stopped");
    }

    /// 执行一轮拉取与投递（不含等待）；仅拉取失败会返回错误
    pub async fn run_once(&self) -> Result<DrainReport> {
        let jobs = self.store.list(self.config.batch_size.max(1), 0).await?;
        let report = DrainReport {
            listed: jobs.len(),
            ..Default::default()
        };

        if jobs.is_empty() {
            return Ok(report);
        }

        let concurrency = self.config.dispatch_concurrency.max(1);
        let report = stream::iter(jobs)
            .map(|job| self.dispatch(job))
            .buffer_unordered(concurrency)
            .fold(report, |mut report, outcome| async move {
                report.record(outcome);
                report
            })
            .await;

        Ok(report)
    }

    async fn dispatch(&self, job: StagedJob) -> JobOutcome {
        let message = job.to_message();
        let delivered = AssertUnwindSafe(self.delivery.emit(&message))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(OutboxError::delivery(
                    job.event_name(),
                    "delivery layer panicked",
                ))
            });

        if let Err(err) = delivered {
            warn!(
                job_id = %job.id(),
                event = job.event_name(),
                error = %err,
                "staged job delivery failed, will retry on next poll"
            );
            return JobOutcome::Failed;
        }

        let removed = AssertUnwindSafe(self.store.remove(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(OutboxError::storage("staged job store panicked on remove")));

        match removed {
            Ok(()) => {
                debug!(job_id = %job.id(), event = job.event_name(), "staged job delivered");
                JobOutcome::Removed
            }
            Err(err) if err.is_not_found() => {
                debug!(job_id = %job.id(), "staged job already removed");
                JobOutcome::Removed
            }
            Err(err) => {
                warn!(
                    job_id = %job.id(),
                    event = job.event_name(),
                    error = %err,
                    "staged job delivered but not removed, it will be delivered again"
                );
                JobOutcome::DeliveredNotRemoved
            }
        }
    }
}

/// 投递器配置
///
/// 构建器不拒绝零值：`batch_size` 与 `dispatch_concurrency` 为零时按 1 处理，
/// `poll_interval` 低于 [`MIN_POLL_INTERVAL`] 时按下限等待。
/// 从环境变量读取时零值直接报配置错误。
#[derive(Clone, Copy, Debug, Builder)]
pub struct EnqueuerConfig {
    /// 每轮拉取的最大任务数
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// 两轮之间的等待间隔
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// 一轮之内同时投递的任务上限
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub dispatch_concurrency: usize,
}

impl Default for EnqueuerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dispatch_concurrency: DEFAULT_BATCH_SIZE,
        }
    }
}

impl EnqueuerConfig {
    pub const ENV_BATCH_SIZE: &'static str = "OUTBOX_BATCH_SIZE";
    pub const ENV_POLL_INTERVAL_MS: &'static str = "OUTBOX_POLL_INTERVAL_MS";
    pub const ENV_DISPATCH_CONCURRENCY: &'static str = "OUTBOX_DISPATCH_CONCURRENCY";

    /// 从环境变量读取，未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::ENV_BATCH_SIZE) {
            config.batch_size = parse_positive(Self::ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_POLL_INTERVAL_MS) {
            config.poll_interval =
                Duration::from_millis(parse_positive(Self::ENV_POLL_INTERVAL_MS, &raw)? as u64);
        }
        if let Some(raw) = lookup(Self::ENV_DISPATCH_CONCURRENCY) {
            config.dispatch_concurrency = parse_positive(Self::ENV_DISPATCH_CONCURRENCY, &raw)?;
        }

        Ok(config)
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    let value: usize = raw.trim().parse().map_err(|e| OutboxError::Config {
        reason: format!("{key}={raw}: {e}"),
    })?;
    if value == 0 {
        return Err(OutboxError::Config {
            reason: format!("{key} must be greater than zero"),
        });
    }
    Ok(value)
}

/// 投递器运行句柄：用于优雅关闭与等待循环结束
pub struct EnqueuerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EnqueuerHandle {
    /// 发出停止信号，不等待
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// 等待循环结束（进行中的一轮会完整执行完）
    pub async fn join(mut self) {
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "enqueuer task terminated abnormally");
        }
    }

    /// 停止并等待
    pub async fn stop(self) {
        self.shutdown();
        self.join().await;
    }
}

impl Drop for EnqueuerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
