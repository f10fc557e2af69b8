use geo::MultiPolygon;
use thiserror::Error;

use crate::dates::DateRange;

use super::Dataset;

/// One region reduction: mean of `dataset` over `region`.
#[derive(Debug, Clone, Copy)]
pub struct RegionRequest<'a> {
    pub dataset: &'a Dataset,
    pub dates: Option<&'a DateRange>,
    pub region: &'a MultiPolygon<f64>,
}

/// A remote image-collection service that can reduce a band over a region.
pub trait ImageBackend: Send + Sync {
    /// Raw (still encoded) mean over the region; `Ok(None)` when the backend
    /// found no pixels. Failures to reach or compute are `Err`.
    fn reduce_region(&self, request: &RegionRequest<'_>) -> Result<Option<f64>, BackendError>;
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend is not configured: {0}")]
    Config(String),
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend response: {0}")]
    Decode(String),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<BackendError> },
}

impl BackendError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout | BackendError::Transport(_) => true,
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// True if the failure (or the last retried failure) was a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            BackendError::Timeout => true,
            BackendError::RetriesExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}
