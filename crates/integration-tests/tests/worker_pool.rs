//! Several workers draining one file-backed database concurrently

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rota_core::application::{build_reserver, stop_channel, ReservationPorts, Worker};
use rota_core::domain::JobState;
use rota_core::port::id_provider::UuidProvider;
use rota_core::port::job_handler::mocks::RecordingHandler;
use rota_core::port::time_provider::SystemTimeProvider;
use rota_core::port::{SubscribedQueues, WorkerRegistry};
use rota_core::SchedulerConfig;
use rota_infra_sqlite::{
    create_pool, run_migrations, SqliteJobStore, SqliteQueueSource, SqliteWorkerRegistry,
};
use serde_json::json;

const WORKERS: usize = 4;
const JOBS_PER_QUEUE: usize = 10;
const QUEUES: [&str; 3] = ["mail", "reports", "video"];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_workers_never_share_a_job() {
    let db_path = std::env::temp_dir().join(format!("rota_pool_{}.db", uuid::Uuid::new_v4()));
    let db_path = db_path.to_string_lossy().into_owned();

    let pool = create_pool(&db_path).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteJobStore::new(
        pool.clone(),
        time_provider.clone(),
        Arc::new(UuidProvider),
    ));
    let registry = Arc::new(SqliteWorkerRegistry::new(pool.clone(), time_provider.clone()));
    let handler = Arc::new(RecordingHandler::new());
    let config = Arc::new(SchedulerConfig::default());

    for queue in QUEUES {
        for i in 0..JOBS_PER_QUEUE {
            store.enqueue(queue, json!({ "n": i })).await.unwrap();
        }
    }

    let ports = ReservationPorts {
        queue_source: Arc::new(SubscribedQueues::new(
            Arc::new(SqliteQueueSource::new(pool.clone())),
            config.subscription.clone(),
        )),
        job_store: store.clone(),
        registry: registry.clone(),
        time_provider,
    };

    let (stop, signal) = stop_channel();
    let mut tasks = Vec::new();
    for n in 0..WORKERS {
        let worker_id = format!("worker-{}", n);
        let worker = Worker::new(
            worker_id.clone(),
            config.subscription.clone(),
            build_reserver(worker_id, config.clone(), ports.clone()),
            store.clone(),
            registry.clone(),
            handler.clone(),
        );
        tasks.push(tokio::spawn(worker.run(signal.clone())));
    }

    let total = QUEUES.len() * JOBS_PER_QUEUE;
    tokio::time::timeout(Duration::from_secs(30), async {
        while handler.handled().len() < total {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("workers did not drain the queues in time");

    stop.stop();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let handled = handler.handled();
    let unique: HashSet<_> = handled.iter().collect();
    assert_eq!(handled.len(), total);
    assert_eq!(unique.len(), total, "a job was handed to two workers");

    for queue in QUEUES {
        assert_eq!(
            store.count_by_state(queue, JobState::Done).await.unwrap(),
            JOBS_PER_QUEUE as i64
        );
    }
    assert!(registry.list_active_workers().await.unwrap().is_empty());

    pool.close().await;
    let _ = std::fs::remove_file(&db_path);
}
