// Terminal progress for uploads. Several files can upload at once, so all
// bars hang off one `MultiProgress` and each upload gets its own bar.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

#[derive(Clone)]
pub struct UploadProgress {
    bars: MultiProgress,
}

impl UploadProgress {
    /// Bars drawn on stderr; indicatif hides them when stderr is not a terminal.
    pub fn stderr() -> Self {
        Self {
            bars: MultiProgress::new(),
        }
    }

    /// Never draws anything. Used by tests and headless runs.
    pub fn hidden() -> Self {
        Self {
            bars: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Add a byte-counting bar for one upload of `total` bytes.
    pub fn upload_bar(&self, name: &str, total: u64) -> ProgressBar {
        let bar = self.bars.add(ProgressBar::new(total));
        match ProgressStyle::with_template(BAR_TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => tracing::debug!("invalid progress template: {}", e),
        }
        bar.set_message(name.to_string());
        bar
    }
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::stderr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_tracks_total_and_name() {
        let progress = UploadProgress::hidden();
        let bar = progress.upload_bar("clip.mp4", 2048);
        bar.inc(1024);
        assert_eq!(bar.length(), Some(2048));
        assert_eq!(bar.position(), 1024);
        assert_eq!(bar.message(), "clip.mp4");
    }
}
