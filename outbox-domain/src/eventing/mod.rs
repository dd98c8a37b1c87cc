//! 事件子系统（eventing）
//!
//! 提供投递与订阅的基础抽象与运行时：
//! - `DeliveryLayer`：订阅者注册与扇出的统一接口；
//! - `Subscriber`/`SubscriberContext`：事件消费者及其注册区分；
//! - `InMemoryEventBus`：进程内投递层实现；
//! - `Enqueuer`：轮询暂存存储并把任务交给投递层的长驻任务。
//!
//! 该模块仅定义协议与投递器，不绑定具体传输实现。
//!
pub mod bus_inmemory;
pub mod delivery;
pub mod enqueuer;
pub mod subscriber;

pub use bus_inmemory::InMemoryEventBus;
pub use delivery::DeliveryLayer;
pub use enqueuer::{
    DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL, DrainReport, Enqueuer, EnqueuerConfig,
    EnqueuerHandle, MIN_POLL_INTERVAL,
};
pub use subscriber::{FnSubscriber, Subscriber, SubscriberContext, subscriber_fn};
