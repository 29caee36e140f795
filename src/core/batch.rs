// Concurrent extraction of several videos

use crate::core::config::ExtractionConfig;
use crate::core::landmark_provider::LandmarkProvider;
use crate::core::pipeline::ExtractionPipeline;
use crate::models::pose::{ExtractionSummary, PoseError, PoseResult};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionJob {
    pub video: PathBuf,
    pub output: PathBuf,
}

impl ExtractionJob {
    pub fn new(video: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            output: output.into(),
        }
    }
}

/// Run independent extraction jobs concurrently on the blocking pool.
///
/// Each job gets its own provider from `factory` and its own frame source.
/// Output paths must be distinct; duplicates fail the whole batch with
/// `InvalidConfig` before anything runs. Results come back in job order.
pub async fn extract_batch<F>(
    jobs: Vec<ExtractionJob>,
    config: ExtractionConfig,
    factory: F,
) -> PoseResult<Vec<PoseResult<ExtractionSummary>>>
where
    F: Fn(&ExtractionConfig) -> PoseResult<Box<dyn LandmarkProvider>> + Send + Sync + 'static,
{
    extract_batch_with_cancel(jobs, config, factory, Arc::new(AtomicBool::new(false))).await
}

/// [`extract_batch`] with a shared flag that cancels every running job
pub async fn extract_batch_with_cancel<F>(
    jobs: Vec<ExtractionJob>,
    config: ExtractionConfig,
    factory: F,
    cancel: Arc<AtomicBool>,
) -> PoseResult<Vec<PoseResult<ExtractionSummary>>>
where
    F: Fn(&ExtractionConfig) -> PoseResult<Box<dyn LandmarkProvider>> + Send + Sync + 'static,
{
    config.validate()?;

    let mut outputs = HashSet::new();
    for job in &jobs {
        if !outputs.insert(job.output.clone()) {
            return Err(PoseError::InvalidConfig(format!(
                "output {} is used by more than one job",
                job.output.display()
            )));
        }
    }

    info!(jobs = jobs.len(), "starting batch extraction");

    let factory = Arc::new(factory);
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let factory = Arc::clone(&factory);
            let config = config.clone();
            let cancel = Arc::clone(&cancel);
            tokio::task::spawn_blocking(move || {
                let provider = factory(&config)?;
                ExtractionPipeline::new(provider, config)
                    .with_cancel_flag(cancel)
                    .run(&job.video, &job.output)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Only happens while the runtime is shutting down
            Err(_) => Err(PoseError::Cancelled { frame_index: 0 }),
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(succeeded = results.len() - failed, failed, "batch extraction finished");

    Ok(results)
}
