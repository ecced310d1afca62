// Bridges OS file-creation notifications to the processing queue. The
// `notify` callback runs on the watcher's own thread; it only filters and
// forwards paths, so slow uploads never hold up event delivery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::scanner::has_video_extension;

/// Paths from `event` that should be handed to the file processor: files
/// created directly in the watched directory with the video extension.
pub fn creation_candidates(event: &Event, extension: &str) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .filter(|path| has_video_extension(path, extension))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Live, non-recursive watch over one directory. Events stop when this
/// value is stopped or dropped.
pub struct DirectoryWatcher {
    watcher: Option<RecommendedWatcher>,
    dir: PathBuf,
}

impl DirectoryWatcher {
    /// Start watching `dir`, sending each matching created path on `sender`.
    pub fn start(dir: &Path, extension: &str, sender: UnboundedSender<PathBuf>) -> Result<Self> {
        let extension = extension.to_string();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                tracing::debug!(kind = ?event.kind, paths = ?event.paths, "watch event");
                for path in creation_candidates(&event, &extension) {
                    tracing::info!(file = %path.display(), "new video detected");
                    if sender.send(path).is_err() {
                        tracing::debug!("processing queue closed, dropping event");
                    }
                }
            }
            Err(e) => tracing::warn!("file watcher error: {}", e),
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(Self {
            watcher: Some(watcher),
            dir: dir.to_path_buf(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop receiving notifications. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                tracing::debug!("unwatch {} failed: {}", self.dir.display(), e);
            }
            tracing::info!("stopped watching {}", self.dir.display());
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event::new(kind).add_path(path)
    }

    #[test]
    fn created_video_file_is_a_candidate() {
        let ev = event(
            EventKind::Create(CreateKind::File),
            PathBuf::from("/videos/new.mp4"),
        );
        assert_eq!(
            creation_candidates(&ev, "mp4"),
            vec![PathBuf::from("/videos/new.mp4")]
        );
    }

    #[test]
    fn folder_creation_is_ignored() {
        let ev = event(
            EventKind::Create(CreateKind::Folder),
            PathBuf::from("/videos/season.mp4"),
        );
        assert!(creation_candidates(&ev, "mp4").is_empty());
    }

    #[test]
    fn created_directory_reported_as_any_is_ignored() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("odd.mp4");
        fs::create_dir(&sub).unwrap();
        let ev = event(EventKind::Create(CreateKind::Any), sub);
        assert!(creation_candidates(&ev, "mp4").is_empty());
    }

    #[test]
    fn other_extensions_are_ignored() {
        let ev = event(
            EventKind::Create(CreateKind::File),
            PathBuf::from("/videos/notes.txt"),
        );
        assert!(creation_candidates(&ev, "mp4").is_empty());
    }

    #[test]
    fn writes_to_existing_files_are_not_creations() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            PathBuf::from("/videos/new.mp4"),
        );
        assert!(creation_candidates(&ev, "mp4").is_empty());
    }

    #[tokio::test]
    async fn watcher_forwards_new_video_files() {
        let dir = tempdir().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = DirectoryWatcher::start(dir.path(), "mp4", tx).unwrap();
        assert!(watcher.is_running());

        fs::write(dir.path().join("skip.txt"), b"x").unwrap();
        fs::write(dir.path().join("clip.mp4"), b"video").unwrap();

        let path = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        assert_eq!(path.file_name().unwrap(), "clip.mp4");

        watcher.stop();
        assert!(!watcher.is_running());
    }
}
