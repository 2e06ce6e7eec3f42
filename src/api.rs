// API client module: a small blocking HTTP client for the TikTok Content
// Posting API. Every job goes through the same three calls, in order:
// `initialize_upload`, one `upload_chunk` per chunk, then `publish`.

use crate::chunk::{ChunkPlan, DEFAULT_CHUNK_SIZE};
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::error::{Result, SchedulerError};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const INIT_ENDPOINT: &str = "/post/publish/inbox/video/init/";
const PUBLISH_ENDPOINT: &str = "/post/publish/";
const SOURCE_FILE_UPLOAD: &str = "FILE_UPLOAD";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";
const COVER_TIMESTAMP_MS: u64 = 1000;

/// Blocking client holding the HTTP connection pool, the API base URL and
/// the access token. Credentials never change after construction.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: HeaderValue,
    chunk_size: u64,
}

/// Server-side handle for one video's upload, valid for a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub upload_url: String,
    pub session_id: String,
}

#[derive(Serialize, Debug)]
struct InitRequest {
    source_info: InitSourceInfo,
}

#[derive(Serialize, Debug)]
struct InitSourceInfo {
    source: &'static str,
    video_size: u64,
    chunk_size: u64,
    total_chunk_count: u64,
}

#[derive(Deserialize, Debug, Default)]
struct InitResponse {
    #[serde(default)]
    data: InitData,
}

#[derive(Deserialize, Debug, Default)]
struct InitData {
    upload_url: Option<String>,
    upload_session_id: Option<String>,
}

/// Publish payload. `schedule_time` is epoch seconds and is left out for an
/// immediate post.
#[derive(Serialize, Debug)]
pub struct PublishRequest {
    pub post_info: PostInfo,
    pub source_info: PublishSourceInfo,
}

#[derive(Serialize, Debug)]
pub struct PostInfo {
    pub title: String,
    pub privacy_level: String,
    pub disable_duet: bool,
    pub disable_comment: bool,
    pub disable_stitch: bool,
    pub video_cover_timestamp_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<i64>,
}

#[derive(Serialize, Debug)]
pub struct PublishSourceInfo {
    pub source: &'static str,
    pub video_id: String,
}

impl PublishRequest {
    pub fn new(
        session_id: &str,
        caption: &str,
        privacy_level: &str,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Self {
        PublishRequest {
            post_info: PostInfo {
                title: caption.to_string(),
                privacy_level: privacy_level.to_string(),
                disable_duet: false,
                disable_comment: false,
                disable_stitch: false,
                video_cover_timestamp_ms: COVER_TIMESTAMP_MS,
                schedule_time: schedule_time.map(|t| t.timestamp()),
            },
            source_info: PublishSourceInfo {
                source: SOURCE_FILE_UPLOAD,
                video_id: session_id.to_string(),
            },
        }
    }
}

impl ApiClient {
    /// Create an ApiClient from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::build(
            &config.api_base_url,
            &config.access_token,
            Some(config.request_timeout),
        )
    }

    /// Create a client against an explicit base URL, e.g. a local mock.
    pub fn with_base_url(base_url: &str, access_token: &str) -> Result<Self> {
        Self::build(base_url, access_token, None)
    }

    fn build(base_url: &str, access_token: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| {
            SchedulerError::configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| SchedulerError::configuration("access_token is not a valid header value"))?;
        auth.set_sensitive(true);
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Override the chunk size (bytes). Zero is ignored.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Headers for the JSON endpoints.
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// POST a JSON payload to `endpoint` and return the parsed response.
    fn post_json<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "POST");
        let res = self
            .client
            .post(&url)
            .headers(self.auth_headers())
            .json(payload)
            .send()
            .map_err(SchedulerError::transport)?;
        let res = check_status(res)?;
        let text = res.text().map_err(SchedulerError::transport)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| SchedulerError::transport(format!("Invalid JSON response: {}", e)))
    }

    /// Announce an upload and obtain the URL chunks are sent to.
    pub fn initialize_upload(&self, video_path: &Path) -> Result<UploadSession> {
        let file_size = video_size(video_path)?;
        let plan = ChunkPlan::new(file_size, self.chunk_size);
        let payload = InitRequest {
            source_info: InitSourceInfo {
                source: SOURCE_FILE_UPLOAD,
                video_size: file_size,
                chunk_size: self.chunk_size,
                total_chunk_count: plan.total_chunks(),
            },
        };

        let body = self.post_json(INIT_ENDPOINT, &payload)?;
        let resp: InitResponse = serde_json::from_value(body).unwrap_or_default();
        match (resp.data.upload_url, resp.data.upload_session_id) {
            (Some(upload_url), Some(session_id))
                if !upload_url.is_empty() && !session_id.is_empty() =>
            {
                Ok(UploadSession {
                    upload_url,
                    session_id,
                })
            }
            _ => Err(SchedulerError::Api {
                status: None,
                message: "Failed to get upload URL from initialization".into(),
            }),
        }
    }

    /// PUT chunk `chunk_index` of the file to `upload_url`. Any failure is
    /// reported as an upload-chunk error for that index.
    pub fn upload_chunk(
        &self,
        upload_url: &str,
        video_path: &Path,
        chunk_index: u64,
        chunk_size: u64,
    ) -> Result<()> {
        let fail = |reason: String| SchedulerError::upload_chunk(chunk_index, reason);

        if chunk_size == 0 {
            return Err(fail("chunk size must be non-zero".into()));
        }
        let mut file = File::open(video_path).map_err(|e| fail(e.to_string()))?;
        let file_size = file.metadata().map_err(|e| fail(e.to_string()))?.len();
        let range = ChunkPlan::new(file_size, chunk_size)
            .range(chunk_index)
            .ok_or_else(|| fail(format!("chunk starts past end of file ({} bytes)", file_size)))?;

        file.seek(SeekFrom::Start(range.start))
            .map_err(|e| fail(e.to_string()))?;
        let mut data = Vec::with_capacity(range.len() as usize);
        file.take(range.len())
            .read_to_end(&mut data)
            .map_err(|e| fail(e.to_string()))?;
        if data.len() as u64 != range.len() {
            return Err(fail(format!(
                "short read: expected {} bytes, got {}",
                range.len(),
                data.len()
            )));
        }

        debug!(chunk = chunk_index, range = %range.content_range(), "PUT chunk");
        let res = self
            .client
            .put(upload_url)
            .header(CONTENT_TYPE, VIDEO_CONTENT_TYPE)
            .header(CONTENT_RANGE, range.content_range())
            .body(data)
            .send()
            .map_err(|e| fail(e.to_string()))?;
        check_status(res).map_err(|e| fail(e.to_string()))?;
        Ok(())
    }

    /// Publish an uploaded video. With `schedule_time` the provider posts it
    /// at that instant; without it the post goes live immediately.
    pub fn publish(
        &self,
        session_id: &str,
        caption: &str,
        privacy_level: &str,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<Value> {
        let payload = PublishRequest::new(session_id, caption, privacy_level, schedule_time);
        self.post_json(PUBLISH_ENDPOINT, &payload)
    }
}

/// Size of the video in bytes, or `FileNotFound` if it is not a regular file.
pub fn video_size(video_path: &Path) -> Result<u64> {
    match std::fs::metadata(video_path) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        _ => Err(SchedulerError::FileNotFound(video_path.to_path_buf())),
    }
}

/// Turn a non-2xx response into an API error carrying the status and the
/// provider's `error.message`, or the raw body when that is absent.
fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let txt = res.text().unwrap_or_default();
    Err(SchedulerError::http(status.as_u16(), error_message(&txt)))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_message_prefers_structured_field() {
        assert_eq!(error_message(r#"{"error":{"message":"x","code":"bad"}}"#), "x");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
        assert_eq!(error_message(r#"{"error":{}}"#), r#"{"error":{}}"#);
    }

    #[test]
    fn test_publish_payload_with_schedule() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();
        let req = PublishRequest::new("sess-1", "My caption", "SELF_ONLY", Some(at));
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["post_info"]["title"], "My caption");
        assert_eq!(v["post_info"]["privacy_level"], "SELF_ONLY");
        assert_eq!(v["post_info"]["schedule_time"], 1_705_329_000i64);
        assert_eq!(v["post_info"]["disable_duet"], false);
        assert_eq!(v["post_info"]["disable_comment"], false);
        assert_eq!(v["post_info"]["disable_stitch"], false);
        assert_eq!(v["source_info"]["source"], "FILE_UPLOAD");
        assert_eq!(v["source_info"]["video_id"], "sess-1");
    }

    #[test]
    fn test_publish_payload_immediate() {
        let req = PublishRequest::new("sess-1", "Now", "PUBLIC_TO_EVERYONE", None);
        let v = serde_json::to_value(&req).unwrap();
        assert!(v["post_info"].get("schedule_time").is_none());
    }

    #[test]
    fn test_video_size_missing_file() {
        let err = video_size(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, SchedulerError::FileNotFound(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::with_base_url("http://localhost:1234/v2/", "tok").unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v2");
        assert_eq!(client.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(client.with_chunk_size(0).chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_invalid_token_rejected_at_construction() {
        let err = ApiClient::with_base_url("http://localhost:1234", "tok\nen")
            .err()
            .expect("token with a newline must be rejected");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("access_token"));
    }
}
