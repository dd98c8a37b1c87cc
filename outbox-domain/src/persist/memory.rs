//! 内存版暂存存储（InMemoryStagedJobStore）
//!
//! 以“事务缓冲区 + 已提交列表”模拟数据库的隔离语义：
//! - `create` 只写入事务自身的缓冲区；
//! - `commit` 才把缓冲区并入已提交列表，`list` 只读取已提交列表；
//! - `rollback` 或直接丢弃事务句柄会丢弃缓冲区。
//!
//! 典型用途：测试环境、示例与本地开发。
use crate::error::{OutboxError, OutboxResult as Result};
use crate::persist::{EventMessage, StagedJob, StagedJobStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// 内存事务句柄
#[derive(Debug, Default)]
pub struct InMemoryTx {
    staged: Vec<(u64, StagedJob)>,
}

impl InMemoryTx {
    /// 当前事务内尚未提交的任务
    pub fn staged(&self) -> Vec<&StagedJob> {
        self.staged.iter().map(|(_, job)| job).collect()
    }
}

/// 已提交任务与其写入序号（同一时间戳内的次序依据）
type Committed = Vec<(u64, StagedJob)>;

#[derive(Clone, Default)]
pub struct InMemoryStagedJobStore {
    committed: Arc<Mutex<Committed>>,
    seq: Arc<AtomicU64>,
}

impl InMemoryStagedJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已提交任务的快照（按创建时间升序）
    pub fn snapshot(&self) -> Vec<StagedJob> {
        self.lock().iter().map(|(_, job)| job.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().iter().any(|(_, job)| job.id() == id)
    }

    fn lock(&self) -> MutexGuard<'_, Committed> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StagedJobStore for InMemoryStagedJobStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryTx::default())
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        if tx.staged.is_empty() {
            return Ok(());
        }
        let mut committed = self.lock();
        committed.extend(tx.staged);
        committed.sort_by_key(|(seq, job)| (job.created_at(), *seq));
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        drop(tx);
        Ok(())
    }

    async fn create(&self, tx: &mut Self::Tx, message: EventMessage) -> Result<StagedJob> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let job = StagedJob::from_message(Uuid::now_v7(), Utc::now(), message);
        tx.staged.push((seq, job.clone()));
        Ok(job)
    }

    async fn list(&self, limit: usize, skip: usize) -> Result<Vec<StagedJob>> {
        Ok(self
            .lock()
            .iter()
            .skip(skip)
            .take(limit)
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn remove(&self, job: &StagedJob) -> Result<()> {
        let mut committed = self.lock();
        match committed.iter().position(|(_, j)| j.id() == job.id()) {
            Some(idx) => {
                committed.remove(idx);
                Ok(())
            }
            None => Err(OutboxError::NotFound {
                reason: format!("staged job {}", job.id()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(name: &str) -> EventMessage {
        EventMessage::builder()
            .event_name(name)
            .data(json!({"name": name}))
            .build()
    }

    #[tokio::test]
    async fn uncommitted_jobs_are_invisible() {
        let store = InMemoryStagedJobStore::new();
        let mut tx = store.begin().await.unwrap();
        store.create(&mut tx, msg("a")).await.unwrap();

        assert_eq!(tx.staged().len(), 1);
        assert!(store.list(10, 0).await.unwrap().is_empty());

        store.commit(tx).await.unwrap();
        assert_eq!(store.list(10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rollback_and_drop_discard_jobs() {
        let store = InMemoryStagedJobStore::new();

        let mut tx = store.begin().await.unwrap();
        store.create(&mut tx, msg("a")).await.unwrap();
        store.rollback(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store.create(&mut tx, msg("b")).await.unwrap();
        drop(tx);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_orders_by_creation_and_pages() {
        let store = InMemoryStagedJobStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let a = store.create(&mut first, msg("a")).await.unwrap();
        let b = store.create(&mut second, msg("b")).await.unwrap();
        let c = store.create(&mut first, msg("c")).await.unwrap();

        // 后开始提交的事务不影响按创建时间的顺序
        store.commit(second).await.unwrap();
        store.commit(first).await.unwrap();

        let ids: Vec<Uuid> = store
            .list(10, 0)
            .await
            .unwrap()
            .iter()
            .map(|j| j.id())
            .collect();
        assert_eq!(ids, vec![a.id(), b.id(), c.id()]);

        let page = store.list(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id(), b.id());
    }

    #[tokio::test]
    async fn remove_twice_signals_not_found() {
        let store = InMemoryStagedJobStore::new();
        let mut tx = store.begin().await.unwrap();
        let job = store.create(&mut tx, msg("a")).await.unwrap();
        store.commit(tx).await.unwrap();

        store.remove(&job).await.unwrap();
        assert!(!store.contains(job.id()));

        let err = store.remove(&job).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
