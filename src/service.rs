// Ties the pieces together: startup scan and directory watcher both feed
// one queue of paths, and each queued path is processed on its own task.
// A semaphore caps how many files are worked on at once.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::api::{ApiClient, UploadApi};
use crate::config::AppConfig;
use crate::processor::{FileProcessor, ProcessingOutcome};
use crate::progress::UploadProgress;
use crate::scanner::scan_existing;
use crate::watcher::DirectoryWatcher;

/// Counts of finished attempts over one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Attempts not yet reaped when shutdown was requested.
    pub aborted: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Completed { .. } => self.completed += 1,
            ProcessingOutcome::Failed { .. } => self.failed += 1,
            ProcessingOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

pub struct UploadService<A: UploadApi + ?Sized> {
    processor: FileProcessor<A>,
    video_dir: PathBuf,
    extension: String,
    workers: usize,
}

impl UploadService<ApiClient> {
    /// Service talking to the real platform API described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api = ApiClient::new(&config.api_base_url, &config.token, UploadProgress::stderr())?;
        Ok(Self::new(Arc::new(api), config))
    }
}

impl<A: UploadApi + ?Sized + 'static> UploadService<A> {
    pub fn new(api: Arc<A>, config: &AppConfig) -> Self {
        Self {
            processor: FileProcessor::new(api, config.category_id),
            video_dir: config.video_dir.clone(),
            extension: config.extension.clone(),
            workers: config.workers.max(1),
        }
    }

    /// Process existing videos, then watch for new ones until `shutdown`
    /// resolves. In-flight attempts are aborted on shutdown; their files stay
    /// on disk unless the attempt had already finished.
    pub async fn run<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        ensure_dir(&self.video_dir)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let existing = scan_existing(&self.video_dir, &self.extension)
            .with_context(|| format!("Failed to scan {}", self.video_dir.display()))?;
        tracing::info!("{} existing video(s) found", existing.len());
        for path in existing {
            tracing::info!(file = %path.display(), "queueing existing file");
            tx.send(path).context("processing queue closed")?;
        }

        let mut watcher = DirectoryWatcher::start(&self.video_dir, &self.extension, tx)?;
        tracing::info!(
            "Monitoring directory: {}. Press Ctrl+C to stop.",
            self.video_dir.display()
        );

        let limit = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<ProcessingOutcome> = JoinSet::new();
        let mut summary = RunSummary::default();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("stop requested");
                    break;
                }
                Some(path) = rx.recv() => {
                    let processor = self.processor.clone();
                    let limit = Arc::clone(&limit);
                    tasks.spawn(async move {
                        let _permit = limit.acquire_owned().await;
                        processor.process(&path).await
                    });
                }
                Some(joined) = tasks.join_next() => match joined {
                    Ok(outcome) => summary.record(&outcome),
                    Err(e) => tracing::error!("processing task failed: {}", e),
                },
            }
        }

        watcher.stop();
        drop(rx);

        summary.aborted = tasks.len();
        if summary.aborted > 0 {
            tracing::warn!("aborting {} in-flight upload(s)", summary.aborted);
        }
        tasks.shutdown().await;

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            aborted = summary.aborted,
            "Monitoring service has been stopped."
        );
        Ok(summary)
    }
}

/// Create the watched directory if it does not exist yet.
fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        tracing::info!("Created video directory at {}", dir.display());
    }
    Ok(())
}
