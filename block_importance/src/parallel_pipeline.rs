// THEORY:
// Batch directories can hold hundreds of dump pairs, and every pair is an
// independent decode-draw-encode job. `BatchRenderer` fans those jobs out over
// a tokio runtime while keeping the sequential semantics callers rely on:
// results come back in job order, one per job.
//
// Key architectural principles:
// 1.  **Bounded Workers**: Rendering is CPU-bound blocking work, so each job runs
//     under `spawn_blocking`, and a semaphore caps how many run at once. The
//     cap defaults to the number of logical CPUs.
// 2.  **Failures Stay Local**: A corrupt dump fails its own job only. Every
//     outcome, good or bad, is returned so the driver can report all of them.

use crate::error::{ImportanceError, Result};
use crate::pipeline::{RenderConfig, RenderJob, RenderSummary, render_job};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Renders many jobs concurrently with a fixed worker cap.
pub struct BatchRenderer {
    config: Arc<RenderConfig>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl BatchRenderer {
    pub fn new(config: RenderConfig, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            config: Arc::new(config),
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// One worker per logical CPU.
    pub fn with_available_parallelism(config: RenderConfig) -> Self {
        Self::new(config, num_cpus::get())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Renders every job and returns their outcomes in the order given.
    pub async fn render(&self, jobs: Vec<RenderJob>) -> Vec<(RenderJob, Result<RenderSummary>)> {
        let handles: Vec<_> = jobs
            .iter()
            .cloned()
            .map(|job| {
                tokio::spawn(run_job(
                    Arc::clone(&self.permits),
                    Arc::clone(&self.config),
                    job,
                ))
            })
            .collect();

        let outcomes = futures::future::join_all(handles).await;

        jobs.into_iter()
            .zip(outcomes)
            .map(|(job, outcome)| {
                let result = outcome.unwrap_or_else(|e| Err(ImportanceError::Worker(e.to_string())));
                (job, result)
            })
            .collect()
    }
}

async fn run_job(
    permits: Arc<Semaphore>,
    config: Arc<RenderConfig>,
    job: RenderJob,
) -> Result<RenderSummary> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| ImportanceError::Worker(e.to_string()))?;

    tokio::task::spawn_blocking(move || render_job(&job, &config))
        .await
        .map_err(|e| ImportanceError::Worker(e.to_string()))?
}
