//! Error types for classification requests
//!
//! Every failure a request can hit is a [`DetectError`]. Each variant knows the
//! transport status code it maps to, so the HTTP layer and the CLI report
//! failures the same way. Errors are terminal for a request: nothing retries,
//! and nothing is downgraded to a low-confidence answer.

use serde::Serialize;
use std::fmt;

/// Failures while acquiring audio bytes from a remote URL
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionError {
    /// URL did not parse or was not http/https
    InvalidUrl { url: String },

    /// Remote answered with a non-success status
    Status { status: u16 },

    /// Body exceeded the download cap
    TooLarge { limit: u64 },

    /// Fetch did not finish within the configured timeout
    Timeout,

    /// Connection or protocol failure
    Transport { details: String },
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::InvalidUrl { url } => write!(f, "invalid audio URL: {}", url),
            AcquisitionError::Status { status } => {
                write!(f, "failed to download audio (HTTP {})", status)
            }
            AcquisitionError::TooLarge { limit } => {
                write!(f, "audio exceeds the {} byte download limit", limit)
            }
            AcquisitionError::Timeout => write!(f, "timed out downloading audio"),
            AcquisitionError::Transport { details } => {
                write!(f, "failed to download audio: {}", details)
            }
        }
    }
}

/// Every way a classification request can fail
///
/// Status code mapping:
///
/// | Variant | Status |
/// |---------|--------|
/// | `Auth` | 401 |
/// | `Acquisition(Timeout)` | 408 |
/// | `Acquisition(_)`, `InvalidRequest`, decode failures | 400 |
/// | `Processing` | 500 |
#[derive(Debug, Clone, PartialEq)]
pub enum DetectError {
    /// API key missing or wrong
    Auth,

    /// Fetching the audio failed
    Acquisition(AcquisitionError),

    /// Request payload was malformed (bad JSON, bad base64, no audio given)
    InvalidRequest { reason: String },

    /// Container could not be probed or has no decodable track
    UnsupportedFormat { reason: String },

    /// Decoding produced no samples or hit a structural error
    CorruptAudio { reason: String },

    /// Decoded audio is shorter than the analyzable minimum
    InsufficientAudio { duration_secs: f64, min_secs: f64 },

    /// Unexpected failure during feature extraction or scoring
    Processing { reason: String },
}

impl DetectError {
    /// Transport status code for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            DetectError::Auth => 401,
            DetectError::Acquisition(AcquisitionError::Timeout) => 408,
            DetectError::Acquisition(_)
            | DetectError::InvalidRequest { .. }
            | DetectError::UnsupportedFormat { .. }
            | DetectError::CorruptAudio { .. }
            | DetectError::InsufficientAudio { .. } => 400,
            DetectError::Processing { .. } => 500,
        }
    }

    /// Short stable identifier, used in logs and CSV reports
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::Auth => "auth_error",
            DetectError::Acquisition(_) => "acquisition_error",
            DetectError::InvalidRequest { .. } => "invalid_request",
            DetectError::UnsupportedFormat { .. } => "unsupported_format",
            DetectError::CorruptAudio { .. } => "corrupt_audio",
            DetectError::InsufficientAudio { .. } => "insufficient_audio",
            DetectError::Processing { .. } => "processing_error",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            status_code: self.status_code(),
        }
    }
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::Auth => write!(f, "Not authenticated"),
            DetectError::Acquisition(e) => write!(f, "{}", e),
            DetectError::InvalidRequest { reason } => write!(f, "Invalid request: {}", reason),
            DetectError::UnsupportedFormat { reason } => {
                write!(f, "Unsupported audio format: {}", reason)
            }
            DetectError::CorruptAudio { reason } => write!(f, "Corrupt audio: {}", reason),
            DetectError::InsufficientAudio {
                duration_secs,
                min_secs,
            } => write!(
                f,
                "Insufficient audio: {:.3}s decoded, at least {:.3}s required",
                duration_secs, min_secs
            ),
            DetectError::Processing { reason } => write!(f, "Processing error: {}", reason),
        }
    }
}

impl std::error::Error for DetectError {}

impl From<AcquisitionError> for DetectError {
    fn from(err: AcquisitionError) -> Self {
        DetectError::Acquisition(err)
    }
}

/// Structured error body returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}
