//! Client for the PlaneWave ps3cli solver protocol
//!
//! Every exchange is one JSON object terminated by a blank line
//! (`\r\n\r\n`) in each direction. Requests carry `method` and optional
//! `params`; replies carry either `result` or `error`.

use mast_core::{MastError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Message terminator in both directions
pub const TERMINATOR: &str = "\r\n\r\n";

const READ_CHUNK: usize = 4096;

/// Where the solver finds the image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ImageSource {
    /// FITS file readable by the solver
    File { image_file_path: String },
    /// 16-bit image placed in named shared memory
    SharedMemory { shm_image: SharedMemoryImage },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedMemoryImage {
    pub shm_key: String,
    pub width_pixels: u32,
    pub height_pixels: u32,
}

/// Parameters of `begin_platesolve`
///
/// Optional members are omitted from the request when unset, so the
/// solver applies its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatesolveParams {
    #[serde(flatten)]
    pub image: ImageSource,
    pub arcsec_per_pixel: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_all_sky_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_local_quad_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_local_triangle_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ra_guess_j2000_rads: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dec_guess_j2000_rads: Option<f64>,
}

impl PlatesolveParams {
    /// Solve a file with only the plate-scale guess.
    pub fn file(image_file_path: impl Into<String>, arcsec_per_pixel: f64) -> Self {
        Self::new(
            ImageSource::File {
                image_file_path: image_file_path.into(),
            },
            arcsec_per_pixel,
        )
    }

    /// Solve a shared-memory image with only the plate-scale guess.
    pub fn shared_memory(
        shm_key: impl Into<String>,
        width_pixels: u32,
        height_pixels: u32,
        arcsec_per_pixel: f64,
    ) -> Self {
        Self::new(
            ImageSource::SharedMemory {
                shm_image: SharedMemoryImage {
                    shm_key: shm_key.into(),
                    width_pixels,
                    height_pixels,
                },
            },
            arcsec_per_pixel,
        )
    }

    fn new(image: ImageSource, arcsec_per_pixel: f64) -> Self {
        Self {
            image,
            arcsec_per_pixel,
            enable_all_sky_match: None,
            enable_local_quad_match: None,
            enable_local_triangle_match: None,
            ra_guess_j2000_rads: None,
            dec_guess_j2000_rads: None,
        }
    }

    pub fn with_radec_guess(mut self, ra_rads: f64, dec_rads: f64) -> Self {
        self.ra_guess_j2000_rads = Some(ra_rads);
        self.dec_guess_j2000_rads = Some(dec_rads);
        self
    }
}

/// Encode one request, terminator included.
pub fn encode_request(method: &str, params: Option<Value>) -> Result<String> {
    let mut request = Map::new();
    request.insert("method".to_string(), Value::String(method.to_string()));
    if let Some(params) = params {
        request.insert("params".to_string(), params);
    }
    let body = serde_json::to_string(&Value::Object(request))?;
    Ok(format!("{}{}", body.trim(), TERMINATOR))
}

/// Turn a decoded reply into its result.
///
/// An `error` member wins over `result`; a reply with neither is `null`.
pub fn reply_result(reply: Value) -> Result<Value> {
    match reply {
        Value::Object(mut members) => {
            if let Some(error) = members.remove("error") {
                return Err(MastError::SolverResponse(error.to_string()));
            }
            Ok(members.remove("result").unwrap_or(Value::Null))
        }
        other => Err(MastError::SolverResponse(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Connection to a running solver server
pub struct Ps3CliClient {
    stream: TcpStream,
    endpoint: String,
    timeout: Duration,
    /// Bytes received past the last terminator
    pending: Vec<u8>,
}

impl Ps3CliClient {
    /// Connect to `endpoint` (`host:port`).
    ///
    /// `timeout` bounds the connection attempt and every later exchange.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| MastError::Timeout(format!("connecting to solver at {}", endpoint)))?
            .map_err(|e| {
                MastError::Solver(format!("failed to connect to {}: {}", endpoint, e))
            })?;
        debug!("Connected to solver at {}", endpoint);

        Ok(Self {
            stream,
            endpoint: endpoint.to_string(),
            timeout,
            pending: Vec::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current plate-solve state, as reported by the solver
    pub async fn platesolve_status(&mut self) -> Result<Value> {
        self.call("platesolve_status", None).await
    }

    /// Start an asynchronous plate solve; poll [`Self::platesolve_status`] for the outcome.
    pub async fn begin_platesolve(&mut self, params: &PlatesolveParams) -> Result<Value> {
        let params = serde_json::to_value(params)?;
        self.call("begin_platesolve", Some(params)).await
    }

    pub async fn platesolve_cancel(&mut self) -> Result<Value> {
        self.call("platesolve_cancel", None).await
    }

    /// Analyze the focus of a series of images.
    ///
    /// The solver answers only when the analysis is done, so callers
    /// should connect with a generous timeout.
    pub async fn analyze_focus(&mut self, files: &[String]) -> Result<Value> {
        let params = serde_json::json!({ "files": files });
        self.call("analyze_focus", Some(params)).await
    }

    /// Send one request and wait for its reply.
    pub async fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = encode_request(method, params)?;
        trace!("SEND {}: {}", self.endpoint, request.trim_end());

        tokio::time::timeout(self.timeout, self.stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| self.timed_out(method))?
            .map_err(|e| MastError::Solver(format!("send to {} failed: {}", self.endpoint, e)))?;

        let reply = tokio::time::timeout(self.timeout, self.read_message())
            .await
            .map_err(|_| self.timed_out(method))??;
        trace!("RECV {}: {}", self.endpoint, reply);

        let reply: Value = serde_json::from_str(&reply).map_err(|e| {
            MastError::SolverResponse(format!("invalid JSON from {}: {}", self.endpoint, e))
        })?;
        reply_result(reply)
    }

    fn timed_out(&self, method: &str) -> MastError {
        MastError::Timeout(format!(
            "solver at {} did not answer '{}'",
            self.endpoint, method
        ))
    }

    /// Read up to the next terminator, keeping any surplus for the next reply.
    async fn read_message(&mut self) -> Result<String> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(end) = find_terminator(&self.pending) {
                let rest = self.pending.split_off(end + TERMINATOR.len());
                let message = std::mem::replace(&mut self.pending, rest);
                return String::from_utf8(message)
                    .map(|s| s.trim().to_string())
                    .map_err(|_| {
                        MastError::SolverResponse(format!(
                            "non UTF-8 reply from {}",
                            self.endpoint
                        ))
                    });
            }

            let n = self.stream.read(&mut chunk).await.map_err(|e| {
                MastError::Solver(format!("receive from {} failed: {}", self.endpoint, e))
            })?;
            if n == 0 {
                return Err(MastError::Solver(format!(
                    "solver at {} closed the connection",
                    self.endpoint
                )));
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR.as_bytes())
}
