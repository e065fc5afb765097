//! Audio decoding
//!
//! Turns a raw WAV or MP3 byte buffer into a mono PCM waveform using
//! symphonia. The container is taken from the caller's declaration when there
//! is one and sniffed from the leading bytes otherwise; either way it is only a
//! probe hint, symphonia still validates the stream.
//!
//! ```text
//! Bytes                        | Sniffed as
//! -----------------------------|-----------
//! "RIFF" ???? "WAVE"           | WAV
//! "ID3"                        | MP3 (ID3v2 tag)
//! 0xFF 0xE? (frame sync)       | MP3
//! ```

use crate::config::Limits;
use crate::error::DetectError;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Containers the decoder accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// Parse a declared format name or file extension ("wav", "audio/mpeg", ...)
    pub fn parse(declared: &str) -> Option<Self> {
        let name = declared.trim().to_ascii_lowercase();
        let name = name.strip_prefix("audio/").unwrap_or(&name);
        match name {
            "wav" | "wave" | "x-wav" | "vnd.wave" => Some(AudioFormat::Wav),
            "mp3" | "mpeg" | "mpeg3" | "x-mpeg-3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    /// Recognize the container from its leading bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if data.len() >= 3 && &data[0..3] == b"ID3" {
            return Some(AudioFormat::Mp3);
        }
        if data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xE0) == 0xE0 {
            return Some(AudioFormat::Mp3);
        }
        None
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// Resolve the format for a buffer: declaration first, then sniffing
    pub fn resolve(declared: Option<&str>, data: &[u8]) -> Result<Self, DetectError> {
        match declared.map(str::trim).filter(|d| !d.is_empty()) {
            Some(name) => Self::parse(name).ok_or_else(|| DetectError::UnsupportedFormat {
                reason: format!("'{}' is not WAV or MP3", name),
            }),
            None => Self::sniff(data).ok_or_else(|| DetectError::UnsupportedFormat {
                reason: "unrecognized container (expected WAV or MP3)".to_string(),
            }),
        }
    }
}

/// Decoded mono waveform
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode `data` into an [`AudioSignal`], enforcing the minimum duration
pub fn decode(data: &[u8], format: AudioFormat, limits: &Limits) -> Result<AudioSignal, DetectError> {
    let cursor = std::io::Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DetectError::UnsupportedFormat {
            reason: format!("failed to probe container: {}", e),
        })?;

    let mut reader = probed.format;
    let track = reader.default_track().ok_or_else(|| DetectError::UnsupportedFormat {
        reason: "no audio track found".to_string(),
    })?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .filter(|&sr| sr > 0)
        .ok_or_else(|| DetectError::UnsupportedFormat {
            reason: "unknown sample rate".to_string(),
        })?;

    let declared_frames = track.codec_params.n_frames;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DetectError::UnsupportedFormat {
            reason: format!("no decoder for track: {}", e),
        })?;

    let max_samples = (limits.max_analysis_secs * sample_rate as f64) as usize;
    let mut samples: Vec<f64> = Vec::new();
    let mut skipped_packets = 0usize;
    let mut capped = false;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(DetectError::CorruptAudio {
                    reason: format!("failed to read packet: {}", e),
                })
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(e) => {
                return Err(DetectError::CorruptAudio {
                    reason: format!("failed to decode packet: {}", e),
                })
            }
        };

        let spec = *decoded.spec();
        let channel_count = spec.channels.count().max(1);
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        // Downmix to mono
        for chunk in buf.samples().chunks(channel_count) {
            let mono = chunk.iter().map(|&s| s as f64).sum::<f64>() / chunk.len() as f64;
            samples.push(if mono.is_finite() { mono } else { 0.0 });
        }

        if samples.len() >= max_samples {
            samples.truncate(max_samples);
            capped = true;
            break;
        }
    }

    if samples.is_empty() {
        return Err(DetectError::CorruptAudio {
            reason: format!("decoding produced no samples ({} packets rejected)", skipped_packets),
        });
    }

    let signal = AudioSignal { samples, sample_rate };
    debug!(
        container = format.extension(),
        sample_rate,
        samples = signal.samples.len(),
        skipped_packets,
        "decoded audio"
    );

    if !capped {
        if let Some(missing) = missing_frames(declared_frames, signal.samples.len()) {
            debug!(
                declared_frames = ?declared_frames,
                decoded_frames = signal.samples.len(),
                missing,
                "stream ended before its declared length"
            );
        }
    }

    if signal.duration_secs() < limits.min_duration_secs {
        return Err(DetectError::InsufficientAudio {
            duration_secs: signal.duration_secs(),
            min_secs: limits.min_duration_secs,
        });
    }

    Ok(signal)
}

/// Frames the container header promised but the stream never delivered
fn missing_frames(declared: Option<u64>, decoded: usize) -> Option<u64> {
    declared
        .map(|n| n.saturating_sub(decoded as u64))
        .filter(|&missing| missing > 0)
}
