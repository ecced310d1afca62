// API client module: the three remote calls that move one video onto the
// platform. Each call is a single attempt; callers decide what a failure
// means for the local file.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Response};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::{UploadError, UploadResult};
use crate::progress::UploadProgress;

/// Header carrying the account token on authenticated calls (`Flic-Token`).
pub const TOKEN_HEADER: &str = "flic-token";

const UPLOAD_URL_PATH: &str = "/posts/generate-upload-url";
const POSTS_PATH: &str = "/posts";

/// Upload slot reserved by the platform: a presigned, single-use URL and
/// the content hash that later ties the post to the uploaded bytes.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub url: String,
    pub hash: String,
}

/// Payload for the post-creation endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub hash: String,
    pub is_available_in_public_feed: bool,
    pub category_id: u32,
}

impl NewPost {
    /// A post kept out of the public feed.
    pub fn private(title: impl Into<String>, hash: impl Into<String>, category_id: u32) -> Self {
        Self {
            title: title.into(),
            hash: hash.into(),
            is_available_in_public_feed: false,
            category_id,
        }
    }
}

/// The remote operations the file processor depends on.
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Reserve an upload slot.
    async fn request_upload_target(&self) -> UploadResult<UploadTarget>;

    /// Stream the file at `path` to a presigned URL.
    async fn upload_bytes(&self, path: &Path, upload_url: &str) -> UploadResult<()>;

    /// Register uploaded content as a post.
    async fn create_post(&self, post: &NewPost) -> UploadResult<()>;
}

/// Async API client that holds a reqwest client, the base URL of the
/// platform API and the token sent on authenticated calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: HeaderMap,
    progress: UploadProgress,
}

impl ApiClient {
    /// Build a client for `base_url`. The token is validated as a header
    /// value once here rather than on every request.
    pub fn new(base_url: &str, token: &str, progress: UploadProgress) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let mut auth = HeaderMap::new();
        let value = HeaderValue::from_str(token).context("Token is not a valid header value")?;
        auth.insert(HeaderName::from_static(TOKEN_HEADER), value);
        auth.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            progress,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-2xx response into `UploadError::Status`, keeping the body text.
async fn check_status(endpoint: &str, res: Response) -> UploadResult<Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(UploadError::Status {
        endpoint: endpoint.to_string(),
        status,
        body,
    })
}

fn transport(endpoint: &str) -> impl FnOnce(reqwest::Error) -> UploadError + '_ {
    move |source| UploadError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

#[async_trait]
impl UploadApi for ApiClient {
    async fn request_upload_target(&self) -> UploadResult<UploadTarget> {
        let url = self.endpoint(UPLOAD_URL_PATH);
        let res = self
            .client
            .get(&url)
            .headers(self.auth.clone())
            .send()
            .await
            .map_err(transport(&url))?;
        let res = check_status(&url, res).await?;
        res.json::<UploadTarget>()
            .await
            .map_err(|source| UploadError::Decode {
                endpoint: url.clone(),
                source,
            })
    }

    async fn upload_bytes(&self, path: &Path, upload_url: &str) -> UploadResult<()> {
        let file = File::open(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| UploadError::io(path, e))?
            .len();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bar = self.progress.upload_bar(&name, size);

        // The bar advances as reqwest pulls chunks off the file.
        let counter = bar.clone();
        let stream = ReaderStream::new(file).inspect_ok(move |chunk| counter.inc(chunk.len() as u64));

        let result = self
            .client
            .put(upload_url)
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(transport(upload_url));
        bar.finish_and_clear();

        check_status(upload_url, result?).await?;
        tracing::info!(file = %path.display(), bytes = size, "uploaded");
        Ok(())
    }

    async fn create_post(&self, post: &NewPost) -> UploadResult<()> {
        let url = self.endpoint(POSTS_PATH);
        let res = self
            .client
            .post(&url)
            .headers(self.auth.clone())
            .json(post)
            .send()
            .await
            .map_err(transport(&url))?;
        check_status(&url, res).await?;
        tracing::info!(title = %post.title, "post created");
        Ok(())
    }
}
