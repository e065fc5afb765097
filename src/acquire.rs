//! Getting audio bytes into the pipeline
//!
//! Two sources are supported: an http/https URL fetched with a blocking
//! `reqwest` client, and an inline base64 string (optionally a `data:` URL).
//! Both are held to the same byte cap. A download whose declared
//! `Content-Length` exceeds the cap is refused before the body is read; one
//! without a usable length is read through a limiter and refused as soon as it
//! overruns.

use crate::analyzer::decode::AudioFormat;
use crate::config::Limits;
use crate::error::{AcquisitionError, DetectError};
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::io::{self, Read};
use tracing::{debug, warn};

/// Downloaded payload plus any format hint the server gave us
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    pub format: Option<AudioFormat>,
}

/// Bounded HTTP downloader
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_bytes: u64,
}

impl Fetcher {
    pub fn new(limits: &Limits) -> Result<Self, DetectError> {
        let client = Client::builder()
            .timeout(limits.fetch_timeout)
            .user_agent(concat!("voicecheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DetectError::Processing {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, max_bytes: limits.max_download_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn fetch(&self, url: &str) -> Result<FetchedAudio, AcquisitionError> {
        let parsed = Url::parse(url.trim()).map_err(|_| AcquisitionError::InvalidUrl { url: url.to_string() })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AcquisitionError::InvalidUrl { url: url.to_string() });
        }

        let response = self.client.get(parsed.clone()).send().map_err(|e| {
            warn!(url = %parsed, error = %e, "fetch failed");
            transport_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %parsed, status = status.as_u16(), "remote returned non-success status");
            return Err(AcquisitionError::Status { status: status.as_u16() });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(AcquisitionError::TooLarge { limit: self.max_bytes });
            }
        }

        let format = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| AudioFormat::parse(ct.split(';').next().unwrap_or(ct)))
            .or_else(|| format_from_path(parsed.path()));

        let bytes = read_capped(response, self.max_bytes)?;
        debug!(url = %parsed, bytes = bytes.len(), ?format, "downloaded audio");

        Ok(FetchedAudio { bytes, format })
    }
}

fn format_from_path(path: &str) -> Option<AudioFormat> {
    let (_, ext) = path.rsplit_once('.')?;
    AudioFormat::parse(ext)
}

/// Read at most `max_bytes`; one more byte than that is an overrun
fn read_capped<R: Read>(reader: R, max_bytes: u64) -> Result<Vec<u8>, AcquisitionError> {
    let mut bytes = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(io_error)?;

    if bytes.len() as u64 > max_bytes {
        return Err(AcquisitionError::TooLarge { limit: max_bytes });
    }
    Ok(bytes)
}

fn transport_error(err: reqwest::Error) -> AcquisitionError {
    if err.is_timeout() {
        AcquisitionError::Timeout
    } else {
        AcquisitionError::Transport { details: err.to_string() }
    }
}

fn io_error(err: io::Error) -> AcquisitionError {
    if err.kind() == io::ErrorKind::TimedOut {
        return AcquisitionError::Timeout;
    }
    let timed_out = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .map_or(false, |e| e.is_timeout());
    if timed_out {
        AcquisitionError::Timeout
    } else {
        AcquisitionError::Transport { details: err.to_string() }
    }
}

/// Decode an inline base64 payload, accepting a `data:<mime>;base64,` prefix
///
/// Returns the bytes and, when the prefix names one, the declared format.
pub fn decode_base64_payload(
    payload: &str,
    max_bytes: u64,
) -> Result<(Vec<u8>, Option<AudioFormat>), DetectError> {
    let payload = payload.trim();
    let (mime, data) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest.split_once(',').ok_or_else(|| DetectError::InvalidRequest {
                reason: "malformed data URL".to_string(),
            })?;
            (header.split(';').next(), data)
        }
        None => (None, payload),
    };

    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(DetectError::InvalidRequest { reason: "empty base64 audio".to_string() });
    }

    // 4 characters carry 3 bytes
    let estimated = (cleaned.len() as u64 / 4).saturating_mul(3);
    if estimated > max_bytes {
        return Err(AcquisitionError::TooLarge { limit: max_bytes }.into());
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| DetectError::InvalidRequest { reason: format!("invalid base64 audio: {}", e) })?;

    if bytes.len() as u64 > max_bytes {
        return Err(AcquisitionError::TooLarge { limit: max_bytes }.into());
    }

    Ok((bytes, mime.and_then(AudioFormat::parse)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // BASE64 PAYLOADS
    // ==========================================================================

    #[test]
    fn test_plain_base64() {
        let (bytes, format) = decode_base64_payload("aGVsbG8=", 1024).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(format, None);
    }

    #[test]
    fn test_data_url_prefix() {
        let (bytes, format) = decode_base64_payload("data:audio/mpeg;base64,aGVsbG8=", 1024).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(format, Some(AudioFormat::Mp3));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let (bytes, _) = decode_base64_payload("aGVs\nbG8=\n", 1024).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_invalid_base64() {
        let err = decode_base64_payload("not base64!!", 1024).unwrap_err();
        assert!(matches!(err, DetectError::InvalidRequest { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(
            decode_base64_payload("  ", 1024),
            Err(DetectError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_base64_over_cap() {
        let err = decode_base64_payload("aGVsbG8gd29ybGQ=", 4).unwrap_err();
        assert_eq!(err, DetectError::Acquisition(AcquisitionError::TooLarge { limit: 4 }));
    }

    // ==========================================================================
    // CAPPED READS
    // ==========================================================================

    #[test]
    fn test_read_capped_exact_limit() {
        let data = vec![7u8; 100];
        assert_eq!(read_capped(&data[..], 100).unwrap().len(), 100);
    }

    #[test]
    fn test_read_capped_overrun() {
        let data = vec![7u8; 101];
        assert_eq!(
            read_capped(&data[..], 100).unwrap_err(),
            AcquisitionError::TooLarge { limit: 100 }
        );
    }

    #[test]
    fn test_io_timeout_maps_to_timeout() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(io_error(err), AcquisitionError::Timeout);
    }

    // ==========================================================================
    // URL VALIDATION
    // ==========================================================================

    #[test]
    fn test_rejects_non_http_scheme() {
        let fetcher = Fetcher::new(&Limits::default()).unwrap();
        assert!(matches!(
            fetcher.fetch("ftp://example.com/a.wav"),
            Err(AcquisitionError::InvalidUrl { .. })
        ));
        assert!(matches!(fetcher.fetch("not a url"), Err(AcquisitionError::InvalidUrl { .. })));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(format_from_path("/clips/a.MP3"), Some(AudioFormat::Mp3));
        assert_eq!(format_from_path("/clips/a.wav"), Some(AudioFormat::Wav));
        assert_eq!(format_from_path("/clips/a"), None);
    }
}
