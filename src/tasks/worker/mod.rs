
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::database::sqlite::models::TaskStatus;
use crate::tasks::{ClaimedTask, TaskExecutor, TaskQueue};

/// Fixed set of tokio tasks draining the task queue.
///
/// Workers wake when a task is enqueued or after the poll interval, and stop once
/// the shutdown flag turns true or its sender is dropped. A task already claimed runs to completion.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    #[inline]
    pub fn spawn(
        workers: usize,
        queue: &TaskQueue,
        executor: &Arc<dyn TaskExecutor>,
        shutdown: &watch::Receiver<bool>,
    ) -> Self {
        let workers = workers.max(1);
        info!("Starting {} queue workers", workers);

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    queue.clone(),
                    Arc::clone(executor),
                    shutdown.clone(),
                ))
            })
            .collect();

        Self { handles }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to stop
    #[inline]
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Queue worker panicked: {}", e);
            }
        }
        info!("All queue workers stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    queue: TaskQueue,
    executor: Arc<dyn TaskExecutor>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Worker {} started", worker_id);

    while !*shutdown.borrow() {
        match queue.claim_next().await {
            Ok(Some(task)) => process_task(worker_id, &queue, executor.as_ref(), task).await,
            Ok(None) => {
                tokio::select! {
                    () = queue.notified() => {}
                    () = tokio::time::sleep(queue.poll_interval()) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Worker {} failed to claim a task: {}", worker_id, e);
                tokio::select! {
                    () = tokio::time::sleep(queue.poll_interval()) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

async fn process_task(
    worker_id: usize,
    queue: &TaskQueue,
    executor: &dyn TaskExecutor,
    task: ClaimedTask,
) {
    debug!(
        "Worker {} running task {} ({}) attempt {}/{}",
        worker_id,
        task.id,
        task.payload.kind(),
        task.attempt,
        task.max_attempts
    );

    match executor.execute(&task.payload).await {
        Ok(output) => {
            if let Err(e) = queue.complete(&task.id, &output).await {
                error!("Failed to record completion of task {}: {}", task.id, e);
            }
        }
        Err(e) => {
            let message = e.to_string();
            match queue.fail(&task.id, &message, e.is_retryable()).await {
                Ok(TaskStatus::Failed) => executor.on_failed(&task.payload, &message).await,
                Ok(_) => {}
                Err(record_error) => {
                    warn!(
                        "Failed to record failure of task {}: {}",
                        task.id, record_error
                    );
                }
            }
        }
    }
}
