use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::store::kv::KvStore;
use crate::store::{FormRepository, SubmissionRepository};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub forms: Arc<dyn FormRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    /// Backing store for per-client drafts and submission markers.
    pub kv: Arc<dyn KvStore>,
    pub s3: S3Client,
    pub config: Config,
}
