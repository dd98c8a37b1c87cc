use outbox_application::{EventBusService, RunMode};
use outbox_domain::eventing::{EnqueuerConfig, InMemoryEventBus, SubscriberContext, subscriber_fn};
use outbox_domain::persist::{EmitOptions, InMemoryStagedJobStore, StagedJobStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Serialize)]
struct OrderPlaced {
    order_id: String,
    total_cents: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = InMemoryStagedJobStore::new();
    let service = EventBusService::builder()
        .store(store.clone())
        .delivery(Arc::new(InMemoryEventBus::new()))
        .config(EnqueuerConfig::from_env()?)
        .run_mode(RunMode::from_env())
        .build();

    service
        .subscribe(
            "order.placed",
            subscriber_fn(|msg| async move {
                info!(data = %msg.data(), "send confirmation mail");
                anyhow::Ok(())
            }),
            Some(SubscriberContext::new("mailer")?),
        )?
        .subscribe(
            "order.placed",
            subscriber_fn(|msg| async move {
                info!(data = %msg.data(), "update sales projection");
                anyhow::Ok(())
            }),
            Some(SubscriberContext::new("projector")?),
        )?;

    // 提交的订单：事件随事务一同落库，由投递器送达
    let mut tx = store.begin().await?;
    let placed = OrderPlaced {
        order_id: "o_1".into(),
        total_cents: 4200,
    };
    let job = service
        .with_transaction(&mut tx)
        .emit("order.placed", &placed, EmitOptions::new())
        .await?;
    store.commit(tx).await?;
    info!(job_id = %job.id(), "order o_1 committed");

    // 回滚的订单：事件随事务一同消失
    let mut tx = store.begin().await?;
    let rolled_back = OrderPlaced {
        order_id: "o_2".into(),
        total_cents: 100,
    };
    service
        .with_transaction(&mut tx)
        .emit("order.placed", &rolled_back, EmitOptions::new())
        .await?;
    store.rollback(tx).await?;
    info!("order o_2 rolled back");

    if service.start_enqueuer().await {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !store.is_empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .ok();
        service.stop_enqueuer().await;
    } else {
        let report = service.drain_once().await?;
        info!(?report, "drained manually");
    }

    info!(pending = store.len(), "done");
    Ok(())
}
