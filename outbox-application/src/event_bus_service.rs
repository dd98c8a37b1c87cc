use crate::error::AppResult;
use crate::run_mode::RunMode;
use bon::bon;
use outbox_domain::error::{OutboxError, ensure_event_name};
use outbox_domain::eventing::{
    DeliveryLayer, DrainReport, Enqueuer, EnqueuerConfig, EnqueuerHandle, Subscriber,
    SubscriberContext,
};
use outbox_domain::persist::{EmitOptions, EventMessage, StagedJob, StagedJobStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// `emit_with` 的结果：暂存于事务内，或已直接投递
#[derive(Debug, Clone, PartialEq)]
pub enum EmitOutcome {
    Staged(StagedJob),
    Delivered,
}

/// 事件总线服务（EventBusService）
///
/// 统一的发出入口：
/// - 持有事务句柄时，事件作为暂存任务写入同一事务，提交后才对投递器可见，回滚则随之消失；
/// - 无事务时，直接交给投递层，不做任何持久化；
/// - 后台轮询投递器负责把已提交的暂存任务投递出去并删除（至少一次）。
///
/// 订阅/取消订阅直接透传给投递层。
pub struct EventBusService<S>
where
    S: StagedJobStore,
{
    store: S,
    delivery: Arc<dyn DeliveryLayer>,
    enqueuer: Arc<Enqueuer<S>>,
    run_mode: RunMode,
    running: Mutex<Option<EnqueuerHandle>>,
}

#[bon]
impl<S> EventBusService<S>
where
    S: StagedJobStore + Clone + 'static,
{
    #[builder]
    pub fn new(
        store: S,
        delivery: Arc<dyn DeliveryLayer>,
        #[builder(default)] config: EnqueuerConfig,
        #[builder(default)] run_mode: RunMode,
    ) -> Self {
        let enqueuer = Arc::new(
            Enqueuer::builder()
                .store(store.clone())
                .delivery(delivery.clone())
                .config(config)
                .build(),
        );

        Self {
            store,
            delivery,
            enqueuer,
            run_mode,
            running: Mutex::new(None),
        }
    }
}

impl<S> EventBusService<S>
where
    S: StagedJobStore + Clone + 'static,
{
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// 绑定调用方事务；其上的每次 `emit` 都写入暂存任务而不投递
    pub fn with_transaction<'t>(&self, tx: &'t mut S::Tx) -> TransactionalEventBus<'_, 't, S> {
        TransactionalEventBus { service: self, tx }
    }

    /// 无事务发出：直接交给投递层
    ///
    /// `options` 可传 `None`，等同于空选项。
    pub async fn emit<T, O>(&self, event_name: &str, data: &T, options: O) -> AppResult<()>
    where
        T: Serialize + ?Sized + Sync,
        O: Into<Option<EmitOptions>>,
    {
        self.emit_with(None, event_name, data, options).await?;
        Ok(())
    }

    /// 根据是否持有事务句柄决定暂存还是直接投递
    ///
    /// 事务路径绝不尝试投递：外层事务仍可能回滚。暂存失败会原样返回，
    /// 调用方通常随之回滚事务，从而不会有事件为未提交的变更而逃逸。
    pub async fn emit_with<T, O>(
        &self,
        tx: Option<&mut S::Tx>,
        event_name: &str,
        data: &T,
        options: O,
    ) -> AppResult<EmitOutcome>
    where
        T: Serialize + ?Sized + Sync,
        O: Into<Option<EmitOptions>>,
    {
        let message = build_message(event_name, data, options.into())?;

        match tx {
            Some(tx) => Ok(EmitOutcome::Staged(self.stage(tx, message).await?)),
            None => {
                self.delivery.emit(&message).await?;
                debug!(event = event_name, "event emitted directly");
                Ok(EmitOutcome::Delivered)
            }
        }
    }

    async fn stage(&self, tx: &mut S::Tx, message: EventMessage) -> AppResult<StagedJob> {
        let job = self.store.create(tx, message).await?;
        debug!(job_id = %job.id(), event = job.event_name(), "event staged");
        Ok(job)
    }

    pub fn subscribe(
        &self,
        event_name: &str,
        subscriber: Arc<dyn Subscriber>,
        context: Option<SubscriberContext>,
    ) -> AppResult<&Self> {
        self.delivery.subscribe(event_name, subscriber, context)?;
        Ok(self)
    }

    pub fn unsubscribe(
        &self,
        event_name: &str,
        subscriber: &Arc<dyn Subscriber>,
        context: Option<&SubscriberContext>,
    ) -> AppResult<&Self> {
        self.delivery.unsubscribe(event_name, subscriber, context)?;
        Ok(self)
    }

    /// 启动后台投递器；测试模式下不启动
    ///
    /// 返回调用后投递器是否处于运行状态。重复启动是空操作。
    pub async fn start_enqueuer(&self) -> bool {
        if self.run_mode.is_test() {
            info!("test run mode, enqueuer not started");
            return false;
        }

        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("enqueuer already running");
            return true;
        }

        *running = Some(self.enqueuer.clone().start());
        true
    }

    /// 停止后台投递器并等待进行中的一轮结束
    pub async fn stop_enqueuer(&self) {
        let handle = self.running.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub async fn is_enqueuer_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 手动执行一轮投递，适用于测试模式或运维触发
    pub async fn drain_once(&self) -> AppResult<DrainReport> {
        Ok(self.enqueuer.run_once().await?)
    }
}

/// 绑定了调用方事务的发出器，见 [`EventBusService::with_transaction`]
pub struct TransactionalEventBus<'s, 't, S>
where
    S: StagedJobStore,
{
    service: &'s EventBusService<S>,
    tx: &'t mut S::Tx,
}

impl<S> TransactionalEventBus<'_, '_, S>
where
    S: StagedJobStore + Clone + 'static,
{
    /// 在事务内暂存一条事件，返回创建的暂存任务
    pub async fn emit<T, O>(
        &mut self,
        event_name: &str,
        data: &T,
        options: O,
    ) -> AppResult<StagedJob>
    where
        T: Serialize + ?Sized + Sync,
        O: Into<Option<EmitOptions>>,
    {
        let message = build_message(event_name, data, options.into())?;
        self.service.stage(&mut *self.tx, message).await
    }
}

fn build_message<T>(
    event_name: &str,
    data: &T,
    options: Option<EmitOptions>,
) -> AppResult<EventMessage>
where
    T: Serialize + ?Sized,
{
    ensure_event_name(event_name)?;
    let data = serde_json::to_value(data).map_err(OutboxError::from)?;
    Ok(EventMessage::new(event_name, data, options.unwrap_or_default()))
}
