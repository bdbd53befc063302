//! Long-running mode: the poller and a worker pool sharing one queue.

use std::sync::Arc;

use gitrail::broadcast::ChannelPublisher;
use gitrail::queue::{Job, JobQueue, TokioJobQueue, WorkerPool};
use gitrail::repository::projects;
use sea_orm::DatabaseConnection;
use tokio::sync::{broadcast, watch};

use crate::commands::shared::build_context;
use crate::config::Config;

pub(crate) async fn handle_run(
    config: &Config,
    db: Arc<DatabaseConnection>,
    discover: bool,
    print_events: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (queue, receiver) = TokioJobQueue::new();
    let queue = Arc::new(queue);
    let publisher = Arc::new(ChannelPublisher::default());

    let ctx = build_context(config, db, queue.clone(), publisher.clone())?;

    if print_events {
        tokio::spawn(print_events_loop(publisher.subscribe(), shutdown.clone()));
    }

    if discover {
        let linked = projects::find_linked_ids(ctx.db()).await?;
        tracing::info!(projects = linked.len(), "Queueing branch discovery");
        for project_id in linked {
            queue.enqueue(Job::DiscoverBranches { project_id }).await?;
        }
    }

    let worker_config = config.worker_config();
    tracing::info!(
        workers = worker_config.workers,
        job_timeout_secs = worker_config.job_timeout.as_secs(),
        "Starting workers"
    );
    let pool = WorkerPool::spawn(
        receiver,
        Arc::new(ctx.runner()),
        worker_config,
        shutdown.clone(),
    );

    ctx.poller().run(shutdown).await;

    let stats = pool.join().await;
    tracing::info!(
        completed = stats.completed,
        failed = stats.failed,
        "Workers stopped"
    );
    Ok(())
}

/// Write every published message to stdout as one JSON line.
async fn print_events_loop(
    mut events: broadcast::Receiver<gitrail::broadcast::Envelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let envelope = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            received = events.recv() => match received {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        match serde_json::to_string(&envelope.message) {
            Ok(json) => println!("{} {}", envelope.topic, json),
            Err(e) => tracing::warn!(topic = %envelope.topic, error = %e, "Failed to encode event"),
        }
    }
}
