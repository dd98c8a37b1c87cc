//! 暂存持久化（persist）
//!
//! 定义暂存任务模型与存储协议，并提供：
//! - 内存实现（`InMemoryStagedJobStore`），用于测试与本地开发；
//! - PostgreSQL 实现（`PgStagedJobStore`，需启用 `postgres` 特性）。
//!
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod staged_job;
mod staged_job_store;

pub use memory::{InMemoryStagedJobStore, InMemoryTx};
#[cfg(feature = "postgres")]
pub use postgres::{PgStagedJobStore, STAGED_JOB_SCHEMA};
pub use staged_job::{EmitOptions, EventMessage, StagedJob};
pub use staged_job_store::StagedJobStore;
