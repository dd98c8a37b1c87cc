//! 订阅者（Subscriber）
//!
//! 定义消费某一事件名的处理逻辑，以及区分同名事件多个独立注册的订阅上下文。
//! 订阅者必须容忍重复投递（至少一次语义）。
//!
use crate::error::{OutboxError, OutboxResult};
use crate::persist::EventMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// 订阅者：处理某一事件名的消息
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()>;
}

/// 订阅上下文：同一事件名下以 `subscriber_id` 区分独立的注册
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberContext {
    subscriber_id: String,
}

impl SubscriberContext {
    pub fn new(subscriber_id: impl Into<String>) -> OutboxResult<Self> {
        let subscriber_id = subscriber_id.into();
        if subscriber_id.trim().is_empty() {
            return Err(OutboxError::validation("subscriber id must not be empty"));
        }
        Ok(Self { subscriber_id })
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }
}

/// 闭包适配器，见 [`subscriber_fn`]
pub struct FnSubscriber<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Subscriber for FnSubscriber<F>
where
    F: Fn(EventMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        (self.f)(message.clone()).await
    }
}

/// 将异步闭包包装为订阅者
///
/// ```rust
/// use outbox_domain::eventing::subscriber_fn;
///
/// let printer = subscriber_fn(|msg| async move {
///     println!("{} {}", msg.event_name(), msg.data());
///     anyhow::Ok(())
/// });
/// # let _ = printer;
/// ```
pub fn subscriber_fn<F, Fut>(f: F) -> Arc<dyn Subscriber>
where
    F: Fn(EventMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnSubscriber { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_subscriber_id_is_rejected() {
        assert!(SubscriberContext::new(" ").is_err());
        let ctx = SubscriberContext::new("mailer").unwrap();
        assert_eq!(ctx.subscriber_id(), "mailer");
    }

    #[tokio::test]
    async fn closure_subscriber_sees_message() {
        let sub = subscriber_fn(|msg| async move {
            anyhow::ensure!(msg.event_name() == "order.placed", "unexpected event");
            Ok(())
        });
        let ok = EventMessage::builder()
            .event_name("order.placed")
            .data(json!({}))
            .build();
        let bad = EventMessage::builder()
            .event_name("order.cancelled")
            .data(json!({}))
            .build();

        assert!(sub.handle(&ok).await.is_ok());
        assert!(sub.handle(&bad).await.is_err());
    }
}
