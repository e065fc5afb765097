//! HTTP detection service
//!
//! `voicecheck serve` → listens on a port, classifies audio posted to
//! `/predict`.
//!
//! ```text
//! GET  /          liveness, {"status":"ok"}
//! GET  /health    version and component checks
//! POST /predict   JSON body  { audio_url | audioBase64, audioFormat?, language? }
//! GET  /predict   same fields as a query string
//! ```
//!
//! The accept loop only hands requests off; each one is decoded and scored on
//! its own thread. A panic while handling a request is caught and answered
//! with a 500 instead of taking the server down.

use crate::acquire::{decode_base64_payload, Fetcher};
use crate::analyzer::aggregate::Classification;
use crate::config::Config;
use crate::error::{AcquisitionError, DetectError, ErrorResponse};
use crate::Analyzer;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

/// Body of a prediction request
///
/// Both camelCase and snake_case spellings are accepted.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct PredictRequest {
    #[serde(default, alias = "audioUrl")]
    pub audio_url: Option<String>,
    #[serde(default, rename = "audioBase64", alias = "audio_base64")]
    pub audio_base64: Option<String>,
    #[serde(default, rename = "audioFormat", alias = "audio_format")]
    pub audio_format: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PredictionResponse {
    pub classification: Classification,
    pub confidence: f64,
    pub language: String,
    pub explanation: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HealthChecks {
    pub api: &'static str,
    pub audio_processing: &'static str,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

/// Shared, read-only per-process state
struct AppState {
    analyzer: Analyzer,
    fetcher: Fetcher,
}

pub struct ApiServer {
    server: Server,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Bind a listener; port 0 picks a free one
    pub fn bind(addr: &str, config: Config) -> io::Result<Self> {
        let fetcher = Fetcher::new(&config.limits).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let server = Server::http(addr).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        Ok(Self {
            server,
            state: Arc::new(AppState {
                analyzer: Analyzer::with_config(config),
                fetcher,
            }),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until the listener closes
    pub fn run(self) {
        for request in self.server.incoming_requests() {
            let state = Arc::clone(&self.state);
            thread::spawn(move || handle_request(request, &state));
        }
    }
}

/// Bind, print the banner, and serve forever
pub fn start(host: &str, port: u16, config: Config) -> io::Result<()> {
    let auth = config.api_key.is_some();
    let server = ApiServer::bind(&format!("{}:{}", host, port), config)?;
    let addr = server
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|| format!("{}:{}", host, port));

    eprintln!("\n\x1b[1;32m🎙  voicecheck\x1b[0m");
    eprintln!("   http://{}", addr);
    eprintln!("   API key {}\n", if auth { "required" } else { "not required" });
    info!(%addr, auth, "listening");

    server.run();
    Ok(())
}

fn handle_request(mut request: Request, state: &AppState) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let (status, body) = match panic::catch_unwind(AssertUnwindSafe(|| route(&mut request, state))) {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(%method, %url, "handler panicked");
            let err = DetectError::Processing { reason: "internal error while handling request".to_string() };
            (err.status_code(), to_json(&err.to_response()))
        }
    };

    let response = json_response(status, body);
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "failed to write response");
    }

    info!(
        %method,
        path = url.split('?').next().unwrap_or("/"),
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
}

/// Status code and JSON body for one request
fn route(request: &mut Request, state: &AppState) -> (u16, String) {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("/");
    let method = request.method().clone();

    match (&method, path) {
        (&Method::Get, "/") => (200, to_json(&StatusResponse { status: "ok" })),

        (&Method::Get, "/health") => (200, to_json(&health(state.analyzer.config()))),

        (&Method::Get, "/predict") | (&Method::Post, "/predict") => match predict(request, state) {
            Ok(prediction) => (200, to_json(&prediction)),
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "prediction failed");
                (err.status_code(), to_json(&err.to_response()))
            }
        },

        _ => {
            let not_found = ErrorResponse { error: "Not found".to_string(), status_code: 404 };
            (404, to_json(&not_found))
        }
    }
}

fn health(config: &Config) -> HealthResponse {
    let size = config.frames.frame_size;
    let fft_ok = panic::catch_unwind(|| FftPlanner::<f64>::new().plan_fft_forward(size).len() == size).unwrap_or(false);

    HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            api: "ok",
            audio_processing: if fft_ok { "ok" } else { "error" },
        },
    }
}

fn predict(request: &mut Request, state: &AppState) -> Result<PredictionResponse, DetectError> {
    authorize(request, state.analyzer.config())?;
    let params = parse_params(request, state.fetcher.max_bytes())?;

    let (bytes, hinted) = match params.audio_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            debug!(url, "fetching audio");
            let fetched = state.fetcher.fetch(url)?;
            (fetched.bytes, fetched.format)
        }
        None => match params.audio_base64.as_deref().filter(|b| !b.trim().is_empty()) {
            Some(payload) => decode_base64_payload(payload, state.fetcher.max_bytes())?,
            None => {
                return Err(DetectError::InvalidRequest {
                    reason: "either audio_url or audioBase64 is required".to_string(),
                })
            }
        },
    };

    let declared = params
        .audio_format
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .or_else(|| hinted.map(|f| f.extension()));

    let result = state.analyzer.classify(&bytes, declared, params.language.as_deref())?;

    Ok(PredictionResponse {
        classification: result.classification,
        confidence: round2(result.confidence),
        language: result.language,
        explanation: result.explanation,
    })
}

fn authorize(request: &Request, config: &Config) -> Result<(), DetectError> {
    let Some(expected) = config.api_key.as_deref() else {
        return Ok(());
    };

    let supplied = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("x-api-key"))
        .map(|h| h.value.as_str());

    match supplied {
        Some(key) if key == expected => Ok(()),
        _ => Err(DetectError::Auth),
    }
}

fn parse_params(request: &mut Request, max_bytes: u64) -> Result<PredictRequest, DetectError> {
    if *request.method() == Method::Get {
        let url = request.url().to_string();
        return match url.split_once('?') {
            Some((_, query)) => serde_urlencoded::from_str::<PredictRequest>(query).map_err(|e| {
                DetectError::InvalidRequest { reason: format!("bad query string: {}", e) }
            }),
            None => Ok(PredictRequest::default()),
        };
    }

    // Base64 inflates by 4/3; leave room for the JSON around it
    let limit = max_bytes.saturating_mul(4) / 3 + 64 * 1024;
    let mut body = Vec::new();
    request
        .as_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|e| DetectError::InvalidRequest { reason: format!("failed to read body: {}", e) })?;

    if body.len() as u64 > limit {
        return Err(AcquisitionError::TooLarge { limit: max_bytes }.into());
    }
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(PredictRequest::default());
    }

    serde_json::from_slice(&body).map_err(|e| DetectError::InvalidRequest { reason: format!("bad JSON body: {}", e) })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| r#"{"error":"failed to serialize response","status_code":500}"#.to_string())
}

fn json_response(status: u16, body: String) -> Response<Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    response
}
