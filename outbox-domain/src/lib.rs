//! 事务性事件暂存库（outbox-domain）
//!
//! 把领域状态变更可靠地转换为异步投递的事件，即使变更与事件发出必须与外层数据库事务原子化：
//! - 暂存持久化（`persist`）：`StagedJob` 模型与参与调用方事务的 `StagedJobStore` 协议；
//! - 事件子系统（`eventing`）：投递层协议、订阅者、内存总线与轮询投递器 `Enqueuer`；
//! - 统一错误（`error`）。
//!
//! 投递语义为“至少一次”：事件可能被投递多次，订阅者需自行幂等。
//!
//! 典型用法：
//! 1. 选择或实现一个 `StagedJobStore`（内存版或启用 `postgres` 特性后的 `PgStagedJobStore`）；
//! 2. 选择或实现一个 `DeliveryLayer` 并注册订阅者；
//! 3. 在事务内通过存储写入暂存任务，提交后由 `Enqueuer` 周期性投递并删除。
//!
pub mod error;
pub mod eventing;
pub mod persist;
