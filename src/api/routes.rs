use crate::AppState;
use crate::api::error::ApiError;
use axum::body::Body;
use axum::extract::Extension;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::time::Instant;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

pub const DOWNLOAD_ROUTE: &str = "/api/download-video";

const VIDEO_CONTENT_TYPE: &str = "video/mp4";
const MAX_VIDEO_ID_LEN: usize = 128;
const REQUIRED_FIELDS: [&str; 2] = ["url", "videoId"];

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(rename = "videoId")]
    pub video_id: String,
}

impl DownloadRequest {
    /// Parse a request body. The body must be a JSON object; a field that is
    /// absent or empty (`null`, `""`, `0`, `false`, `[]`, `{}`) counts as missing.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        let fields: Map<String, Value> = serde_json::from_slice(body).map_err(ApiError::internal)?;

        if REQUIRED_FIELDS
            .iter()
            .any(|name| fields.get(*name).is_none_or(is_empty_value))
        {
            return Err(ApiError::MissingField);
        }

        let request: Self =
            serde_json::from_value(Value::Object(fields)).map_err(ApiError::internal)?;
        if !is_valid_video_id(&request.video_id) {
            return Err(ApiError::InvalidVideoId);
        }

        Ok(request)
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Video ids become file names, so only `[A-Za-z0-9_-]` is accepted
fn is_valid_video_id(video_id: &str) -> bool {
    !video_id.is_empty()
        && video_id.len() <= MAX_VIDEO_ID_LEN
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub async fn download_video(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let DownloadRequest { url, video_id } = DownloadRequest::from_body(&body)?;

    let _permit = state
        .download_permits
        .acquire()
        .await
        .map_err(ApiError::internal)?;

    // Removed on drop, whichever way this function returns
    let temp_dir = tempfile::Builder::new()
        .prefix("video-fetch-")
        .tempdir_in(state.temp_root())?;
    let video_path = temp_dir.path().join(format!("{video_id}.mp4"));

    info!(%video_id, %url, "Downloading video");
    let started = Instant::now();
    state
        .downloader
        .fetch(&url, &video_path)
        .await
        .inspect_err(|error| error!(%video_id, %error, "Failed to download video"))?;

    let video = tokio::fs::read(&video_path).await.inspect_err(|error| {
        error!(%video_id, ?video_path, %error, "Downloaded file could not be read");
    })?;

    let temp_path = temp_dir.path().to_path_buf();
    if let Err(error) = temp_dir.close() {
        warn!(%video_id, ?temp_path, %error, "Failed to remove temp directory");
    }

    info!(
        %video_id,
        bytes = video.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Serving downloaded video"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, VIDEO_CONTENT_TYPE.to_string()),
            (header::CONTENT_LENGTH, video.len().to_string()),
        ],
        video,
    )
        .into_response())
}

/// Everything that is not the download endpoint: preflight, unknown POSTs
/// and static files.
pub async fn fallback(
    Extension(state): Extension<AppState>,
    req: Request<Body>,
) -> Result<Response, Infallible> {
    match *req.method() {
        Method::OPTIONS => Ok(StatusCode::OK.into_response()),
        Method::POST => Ok(StatusCode::NOT_FOUND.into_response()),
        _ => {
            debug!(uri = %req.uri(), "Serving static file");
            let res = ServeDir::new(state.static_dir()).oneshot(req).await?;
            Ok(res.map(Body::new))
        }
    }
}
