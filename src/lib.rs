// Library root
// -----------
// The binary (`main.rs`) only parses configuration, installs logging and
// hands control to `service`.
//
// Module responsibilities:
// - `api`: the three remote calls (upload slot, byte upload, post).
// - `processor`: runs those calls for one file and deletes it on success.
// - `scanner`: finds videos already present at startup.
// - `watcher`: turns file-creation notifications into queued paths.
// - `service`: queue, worker limit and shutdown.
// - `config`, `error`, `progress`: settings, error types, upload bars.
pub mod api;
pub mod config;
pub mod error;
pub mod processor;
pub mod progress;
pub mod scanner;
pub mod service;
pub mod watcher;

pub use api::{ApiClient, NewPost, UploadApi, UploadTarget};
pub use config::AppConfig;
pub use error::{UploadError, UploadResult};
pub use processor::{FileProcessor, ProcessingOutcome, SkipReason, Stage};
pub use service::{RunSummary, UploadService};
