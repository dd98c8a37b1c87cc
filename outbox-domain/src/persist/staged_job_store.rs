//! 暂存任务存储协议（StagedJobStore）
//!
//! 存储层负责事务语义：事务内创建的任务在提交前对任何读者（包括轮询投递器）不可见，
//! 回滚后彻底消失。本库从不跨越未提交边界读取自己的写入。
//!
use crate::error::OutboxResult as Result;
use crate::persist::{EventMessage, StagedJob};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait StagedJobStore: Send + Sync {
    /// 调用方持有的事务句柄；未提交即被丢弃时视为回滚
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> Result<()>;

    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    /// 在调用方事务内持久化一条暂存任务，由存储层分配 id 与创建时间
    async fn create(&self, tx: &mut Self::Tx, message: EventMessage) -> Result<StagedJob>;

    /// 拉取已提交的任务，按创建时间升序
    async fn list(&self, limit: usize, skip: usize) -> Result<Vec<StagedJob>>;

    /// 删除任务；任务已不存在时可返回 `OutboxError::NotFound`
    async fn remove(&self, job: &StagedJob) -> Result<()>;
}

#[async_trait]
impl<T> StagedJobStore for Arc<T>
where
    T: StagedJobStore + ?Sized,
{
    type Tx = T::Tx;

    async fn begin(&self) -> Result<Self::Tx> {
        (**self).begin().await
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        (**self).commit(tx).await
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        (**self).rollback(tx).await
    }

    async fn create(&self, tx: &mut Self::Tx, message: EventMessage) -> Result<StagedJob> {
        (**self).create(tx, message).await
    }

    async fn list(&self, limit: usize, skip: usize) -> Result<Vec<StagedJob>> {
        (**self).list(limit, skip).await
    }

    async fn remove(&self, job: &StagedJob) -> Result<()> {
        (**self).remove(job).await
    }
}
