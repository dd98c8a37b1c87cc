//! 内存版投递层（InMemoryEventBus）
//!
//! 基于 `DashMap` 的进程内订阅表，满足 `DeliveryLayer` 协议：
//! - `subscribe`/`unsubscribe`：按事件名 + 可选订阅上下文注册/移除；
//! - `emit`：并发调用该事件名下的全部订阅者，任一失败（含 panic）即整体失败；
//! - 典型用途：测试环境、示例与单进程部署。
//!
//! 注意：无订阅者时 `emit` 视为成功，事件被丢弃。
use crate::error::{OutboxError, OutboxResult as Result, ensure_event_name};
use crate::eventing::{DeliveryLayer, Subscriber, SubscriberContext};
use crate::persist::EventMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
struct Registration {
    subscriber: Arc<dyn Subscriber>,
    context: Option<SubscriberContext>,
}

impl Registration {
    fn label(&self) -> &str {
        self.context
            .as_ref()
            .map(SubscriberContext::subscriber_id)
            .unwrap_or("anonymous")
    }
}

/// 简单的内存投递层实现
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    subscribers: Arc<DashMap<String, Vec<Registration>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某事件名当前的订阅者数量
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscribers
            .get(event_name)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DeliveryLayer for InMemoryEventBus {
    async fn emit(&self, message: &EventMessage) -> Result<()> {
        // 先拷贝订阅表快照，避免跨 await 持有分片锁
        let registrations: Vec<Registration> = self
            .subscribers
            .get(message.event_name())
            .map(|list| list.value().clone())
            .unwrap_or_default();

        if registrations.is_empty() {
            debug!(event = message.event_name(), "no subscribers, event dropped");
            return Ok(());
        }

        let outcomes = join_all(registrations.iter().map(|r| {
            AssertUnwindSafe(r.subscriber.handle(message)).catch_unwind()
        }))
        .await;

        let mut failures: Vec<String> = Vec::new();
        for (registration, outcome) in registrations.iter().zip(outcomes) {
            let reason = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };
            warn!(
                event = message.event_name(),
                subscriber = registration.label(),
                %reason,
                "subscriber failed"
            );
            failures.push(format!("{}: {}", registration.label(), reason));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OutboxError::delivery(message.event_name(), failures.join("; ")))
        }
    }

    fn subscribe(
        &self,
        event_name: &str,
        subscriber: Arc<dyn Subscriber>,
        context: Option<SubscriberContext>,
    ) -> Result<()> {
        ensure_event_name(event_name)?;

        let mut list = self.subscribers.entry(event_name.to_string()).or_default();
        if let Some(ctx) = &context
            && list.iter().any(|r| r.context.as_ref() == Some(ctx))
        {
            return Err(OutboxError::DuplicateSubscriber {
                event_name: event_name.to_string(),
                subscriber_id: ctx.subscriber_id().to_string(),
            });
        }

        list.push(Registration {
            subscriber,
            context,
        });
        Ok(())
    }

    fn unsubscribe(
        &self,
        event_name: &str,
        subscriber: &Arc<dyn Subscriber>,
        context: Option<&SubscriberContext>,
    ) -> Result<()> {
        ensure_event_name(event_name)?;

        // 分片写锁须在 remove_if 之前释放
        if let Some(mut list) = self.subscribers.get_mut(event_name) {
            list.retain(|r| {
                !(std::ptr::addr_eq(Arc::as_ptr(&r.subscriber), Arc::as_ptr(subscriber))
                    && r.context.as_ref() == context)
            });
        }

        self.subscribers.remove_if(event_name, |_, list| list.is_empty());
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
