// Startup configuration: command-line flags, then environment variables,
// then defaults. The API token is resolved here once and handed on.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_API_BASE_URL: &str = "https://api.socialverseapp.com";
pub const DEFAULT_VIDEO_DIR: &str = "videos/";
pub const DEFAULT_CATEGORY_ID: u32 = 25;
pub const DEFAULT_EXTENSION: &str = "mp4";
pub const DEFAULT_WORKERS: usize = 4;

/// File in the home directory holding the token when neither the flag nor
/// `FLIC_TOKEN` is set.
pub const TOKEN_FILE: &str = ".flic_token";

/// Settings resolved once at startup and passed down explicitly.
#[derive(Clone)]
pub struct AppConfig {
    pub video_dir: PathBuf,
    pub token: String,
    pub api_base_url: String,
    pub category_id: u32,
    /// Without the leading dot.
    pub extension: String,
    pub workers: usize,
}

// Hand-written so the token never reaches the logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("video_dir", &self.video_dir)
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("category_id", &self.category_id)
            .field("extension", &self.extension)
            .field("workers", &self.workers)
            .finish()
    }
}

/// Command-line options. Each one overrides its environment variable.
#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a directory and upload new videos to Socialverse")]
pub struct Args {
    /// Directory to watch (overrides UPLOADER_VIDEO_DIR)
    #[arg(long)]
    pub video_dir: Option<PathBuf>,

    /// API token sent as Flic-Token (overrides FLIC_TOKEN and ~/.flic_token)
    #[arg(long)]
    pub token: Option<String>,

    /// Base URL of the platform API (overrides UPLOADER_API_BASE_URL)
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Category assigned to created posts (overrides UPLOADER_CATEGORY_ID)
    #[arg(long)]
    pub category_id: Option<u32>,

    /// Video file extension to pick up, without the dot (overrides UPLOADER_EXTENSION)
    #[arg(long)]
    pub extension: Option<String>,

    /// Maximum number of files processed at once (overrides UPLOADER_WORKERS)
    #[arg(long)]
    pub workers: Option<usize>,
}

impl AppConfig {
    /// Parse CLI arguments and merge them with the environment.
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Merge parsed arguments with environment variables and defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        let video_dir = match args.video_dir {
            Some(dir) => dir,
            None => env::var("UPLOADER_VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_VIDEO_DIR)),
        };

        let token = match args.token {
            Some(token) => token,
            None => resolve_token()?,
        };
        if token.trim().is_empty() {
            bail!("API token is empty");
        }

        let api_base_url = args.api_base_url.unwrap_or_else(|| {
            env::var("UPLOADER_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into())
        });

        let category_id = match args.category_id {
            Some(id) => id,
            None => env_parse("UPLOADER_CATEGORY_ID", DEFAULT_CATEGORY_ID)?,
        };

        let extension = args
            .extension
            .unwrap_or_else(|| env::var("UPLOADER_EXTENSION").unwrap_or_else(|_| DEFAULT_EXTENSION.into()));
        let extension = extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            bail!("video extension must not be empty");
        }

        let workers = match args.workers {
            Some(n) => n,
            None => env_parse("UPLOADER_WORKERS", DEFAULT_WORKERS)?,
        };
        if workers == 0 {
            bail!("workers must be at least 1");
        }

        Ok(Self {
            video_dir,
            token: token.trim().to_string(),
            api_base_url,
            category_id,
            extension,
            workers,
        })
    }
}

/// Read a typed environment variable, using `default` when it is unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

/// `FLIC_TOKEN`, else the token file in the user's home directory.
fn resolve_token() -> Result<String> {
    if let Ok(token) = env::var("FLIC_TOKEN") {
        return Ok(token);
    }
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    read_token_file(&dir.join(TOKEN_FILE))
}

fn read_token_file(path: &Path) -> Result<String> {
    let data = std::fs::read_to_string(path).with_context(|| {
        format!(
            "no API token: pass --token, set FLIC_TOKEN or create {}",
            path.display()
        )
    })?;
    Ok(data.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn full_args() -> Args {
        Args::try_parse_from([
            "socialverse-uploader",
            "--video-dir",
            "/tmp/incoming",
            "--token",
            " flic_abc \n",
            "--api-base-url",
            "http://localhost:8080",
            "--category-id",
            "7",
            "--extension",
            ".mov",
            "--workers",
            "2",
        ])
        .unwrap()
    }

    #[test]
    fn flags_override_everything() {
        let cfg = AppConfig::from_args(full_args()).unwrap();
        assert_eq!(cfg.video_dir, PathBuf::from("/tmp/incoming"));
        assert_eq!(cfg.token, "flic_abc");
        assert_eq!(cfg.api_base_url, "http://localhost:8080");
        assert_eq!(cfg.category_id, 7);
        assert_eq!(cfg.extension, "mov");
        assert_eq!(cfg.workers, 2);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut args = full_args();
        args.workers = Some(0);
        assert!(AppConfig::from_args(args).is_err());
    }

    #[test]
    fn blank_token_is_rejected() {
        let mut args = full_args();
        args.token = Some("   ".into());
        assert!(AppConfig::from_args(args).is_err());
    }

    #[test]
    fn debug_output_hides_token() {
        let cfg = AppConfig::from_args(full_args()).unwrap();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("flic_abc"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn token_file_is_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TOKEN_FILE);
        std::fs::write(&path, "flic_from_file\n").unwrap();
        assert_eq!(read_token_file(&path).unwrap(), "flic_from_file");
    }

    #[test]
    fn missing_token_file_explains_how_to_configure() {
        let dir = tempdir().unwrap();
        let err = read_token_file(&dir.path().join(TOKEN_FILE)).unwrap_err();
        assert!(err.to_string().contains("FLIC_TOKEN"));
    }
}
