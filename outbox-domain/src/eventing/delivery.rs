//! 投递层（DeliveryLayer）协议
//!
//! 负责订阅者注册与实际扇出。本库只依赖其 emit/subscribe/unsubscribe 契约，
//! 不关心具体传输（进程内、消息队列等）。
//!
use crate::error::OutboxResult as Result;
use crate::eventing::{Subscriber, SubscriberContext};
use crate::persist::EventMessage;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait DeliveryLayer: Send + Sync {
    /// 扇出到该事件名的全部订阅者；任一订阅者失败即返回错误
    async fn emit(&self, message: &EventMessage) -> Result<()>;

    fn subscribe(
        &self,
        event_name: &str,
        subscriber: Arc<dyn Subscriber>,
        context: Option<SubscriberContext>,
    ) -> Result<()>;

    fn unsubscribe(
        &self,
        event_name: &str,
        subscriber: &Arc<dyn Subscriber>,
        context: Option<&SubscriberContext>,
    ) -> Result<()>;
}

#[async_trait]
impl<T> DeliveryLayer for Arc<T>
where
    T: DeliveryLayer + ?Sized,
{
    async fn emit(&self, message: &EventMessage) -> Result<()> {
        (**self).emit(message).await
    }

    fn subscribe(
        &self,
        event_name: &str,
        subscriber: Arc<dyn Subscriber>,
        context: Option<SubscriberContext>,
    ) -> Result<()> {
        (**self).subscribe(event_name, subscriber, context)
    }

    fn unsubscribe(
        &self,
        event_name: &str,
        subscriber: &Arc<dyn Subscriber>,
        context: Option<&SubscriberContext>,
    ) -> Result<()> {
        (**self).unsubscribe(event_name, subscriber, context)
    }
}
