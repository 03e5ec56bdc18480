pub mod error;
pub mod middleware;
pub mod routes;

// Re-export public types and functions
pub use error::ApiError;
pub use middleware::{CROSS_ORIGIN_HEADERS, cross_origin_headers, log_request_errors};
pub use routes::{DOWNLOAD_ROUTE, DownloadRequest, download_video, fallback};
