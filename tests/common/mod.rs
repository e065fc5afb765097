//! Shared fixtures: in-memory WAV encoding, synthetic signals, and a tiny
//! static HTTP server standing in for remote audio hosts.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::thread;
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 16000;

/// Encode mono samples as 16-bit PCM WAV
pub fn wav_bytes(samples: &[f64], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f64) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn tone(freq: f64, secs: f64, amplitude: f64) -> Vec<f64> {
    let n = (secs * SAMPLE_RATE as f64) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE as f64).sin())
        .collect()
}

fn rescale(segment: &mut [f64], target_rms: f64) {
    let rms = (segment.iter().map(|s| s * s).sum::<f64>() / segment.len() as f64).sqrt();
    if rms > 0.0 {
        for s in segment.iter_mut() {
            *s *= target_rms / rms;
        }
    }
}

/// Noise that jumps between a dark, quiet band and a bright, loud one
///
/// Segments of 4096 samples alternate between heavily low-passed noise at RMS
/// 0.05 and double-differenced (high-passed) noise at RMS 0.5. Every frame-
/// level statistic the scorers look at swings widely.
pub fn switching_noise(secs: f64, seed: u64) -> Vec<f64> {
    const SEGMENT: usize = 4096;
    let mut rng = StdRng::seed_from_u64(seed);
    let n = (secs * SAMPLE_RATE as f64) as usize;
    let mut out = Vec::with_capacity(n);

    let mut dark = true;
    while out.len() < n {
        let len = SEGMENT.min(n - out.len());
        let white: Vec<f64> = (0..len + 2).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut segment: Vec<f64> = if dark {
            let (mut a, mut b) = (0.0, 0.0);
            white[2..]
                .iter()
                .map(|&x| {
                    a += 0.02 * (x - a);
                    b += 0.02 * (a - b);
                    b
                })
                .collect()
        } else {
            white.windows(3).map(|w| w[2] - 2.0 * w[1] + w[0]).collect()
        };

        rescale(&mut segment, if dark { 0.05 } else { 0.5 });
        out.extend(segment);
        dark = !dark;
    }

    out
}

/// Serve one canned response to every request; returns the base URL
pub fn serve_static(status: u16, body: Vec<u8>, content_type: &str, chunked: bool, delay: Option<Duration>) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let content_type = content_type.to_string();

    thread::spawn(move || {
        for request in server.incoming_requests() {
            if let Some(d) = delay {
                thread::sleep(d);
            }
            let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap();
            let length = if chunked { None } else { Some(body.len()) };
            let response = tiny_http::Response::new(
                tiny_http::StatusCode(status),
                vec![header],
                Cursor::new(body.clone()),
                length,
                None,
            );
            let _ = request.respond(response);
        }
    });

    format!("http://{}", addr)
}
