// Moves one local video onto the platform: reserve an upload slot, stream
// the bytes, register the post, then delete the local copy. The steps run
// strictly in order and stop at the first failure, so a file is removed
// only after all three remote calls succeeded in the same attempt.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;

use crate::api::{NewPost, UploadApi};
use crate::error::{UploadError, UploadResult};

/// Step of a processing attempt that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestUploadTarget,
    Upload,
    CreatePost,
    Cleanup,
}

impl Stage {
    pub fn failure_message(self) -> &'static str {
        match self {
            Stage::RequestUploadTarget => "could not obtain upload URL",
            Stage::Upload => "upload failed",
            Stage::CreatePost => "post creation failed",
            Stage::Cleanup => "local file could not be deleted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.failure_message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another attempt for the same path has not finished yet.
    AlreadyInFlight,
    /// The path is gone or is not a regular file.
    NotAFile,
}

#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Post created and local file deleted.
    Completed { path: PathBuf, hash: String },
    /// Abandoned at `stage`. For every stage but `Cleanup` the local file is
    /// still on disk; a `Cleanup` failure means the post exists remotely.
    Failed {
        path: PathBuf,
        stage: Stage,
        error: UploadError,
    },
    Skipped { path: PathBuf, reason: SkipReason },
}

impl ProcessingOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Completed { path, .. } | Self::Failed { path, .. } | Self::Skipped { path, .. } => {
                path
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Removes a path from the in-flight set when the attempt ends, however it ends.
struct InFlightGuard {
    set: Arc<DashSet<PathBuf>>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.path);
    }
}

/// Runs processing attempts against an upload API. Cheap to clone; clones
/// share the in-flight set.
pub struct FileProcessor<A: ?Sized> {
    api: Arc<A>,
    category_id: u32,
    in_flight: Arc<DashSet<PathBuf>>,
}

impl<A: ?Sized> Clone for FileProcessor<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            category_id: self.category_id,
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<A: UploadApi + ?Sized> FileProcessor<A> {
    pub fn new(api: Arc<A>, category_id: u32) -> Self {
        Self {
            api,
            category_id,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Number of paths currently being processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Process one file and log the outcome. Never panics on remote or
    /// local failures; they are returned as `ProcessingOutcome::Failed`.
    pub async fn process(&self, path: &Path) -> ProcessingOutcome {
        let outcome = self.attempt(path).await;
        log_outcome(&outcome);
        outcome
    }

    async fn attempt(&self, path: &Path) -> ProcessingOutcome {
        let path = path.to_path_buf();

        if !self.in_flight.insert(path.clone()) {
            return ProcessingOutcome::Skipped {
                path,
                reason: SkipReason::AlreadyInFlight,
            };
        }
        let _guard = InFlightGuard {
            set: Arc::clone(&self.in_flight),
            path: path.clone(),
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return ProcessingOutcome::Skipped {
                    path,
                    reason: SkipReason::NotAFile,
                }
            }
        }

        tracing::info!(file = %path.display(), "processing");
        match self.run_steps(&path).await {
            Ok(hash) => ProcessingOutcome::Completed { path, hash },
            Err((stage, error)) => ProcessingOutcome::Failed { path, stage, error },
        }
    }

    async fn run_steps(&self, path: &Path) -> Result<String, (Stage, UploadError)> {
        let target = self
            .api
            .request_upload_target()
            .await
            .map_err(|e| (Stage::RequestUploadTarget, e))?;
        tracing::debug!(file = %path.display(), hash = %target.hash, "upload slot reserved");

        self.api
            .upload_bytes(path, &target.url)
            .await
            .map_err(|e| (Stage::Upload, e))?;

        let post = NewPost::private(title_for(path), target.hash.clone(), self.category_id);
        self.api
            .create_post(&post)
            .await
            .map_err(|e| (Stage::CreatePost, e))?;

        remove_local(path).await.map_err(|e| (Stage::Cleanup, e))?;
        Ok(target.hash)
    }
}

/// Post title: the file's base name.
pub fn title_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn remove_local(path: &Path) -> UploadResult<()> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| UploadError::io(path, e))
}

fn log_outcome(outcome: &ProcessingOutcome) {
    match outcome {
        ProcessingOutcome::Completed { path, hash } => {
            tracing::info!(file = %path.display(), %hash, "video processed and uploaded");
        }
        ProcessingOutcome::Failed {
            path,
            stage: Stage::Cleanup,
            error,
        } => {
            tracing::error!(
                file = %path.display(),
                "post created but {}: {}",
                Stage::Cleanup,
                error
            );
        }
        ProcessingOutcome::Failed { path, stage, error } => {
            tracing::warn!(file = %path.display(), "{}: {}; file kept", stage, error);
        }
        ProcessingOutcome::Skipped { path, reason } => {
            tracing::debug!(file = %path.display(), ?reason, "skipped");
        }
    }
}
