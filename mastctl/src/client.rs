//! HTTP client for communicating with a MAST unit daemon.

use anyhow::{Context, Result};
use mast_core::api::{
    self, InfoResponse, OutletStatus, PowerSequenceResponse, PowerStatusResponse, PresetsResponse,
    SolverStatusResponse, API_BASE,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Normalize a server URL by removing trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Extract the `error` member of an error envelope, if the body is one.
fn envelope_error(text: &str) -> Option<String> {
    match serde_json::from_str::<api::ApiResponse<serde_json::Value>>(text) {
        Ok(api::ApiResponse::Error { error }) => Some(error),
        _ => None,
    }
}

/// Which transport failures a request may be retried on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Connection failures and timeouts
    Transport,
    /// Only failures to connect; a timed-out request may have been acted on
    ConnectOnly,
}

/// HTTP client for the unit daemon's REST API.
///
/// Requests that fail before a response arrives (connection refused,
/// timeouts) are retried with a linearly growing delay. Requests that
/// start a sequence or cycle an outlet are only retried when the
/// connection could not be made. Any HTTP response, including 4xx and 5xx,
/// is final.
///
/// # Examples
///
/// ```no_run
/// use mastctl::client::MastClient;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = MastClient::with_config(
///     "http://mast01:8000".to_string(),
///     10,
///     3,
///     Duration::from_millis(500),
/// )?;
///
/// let info = client.get_info().await?;
/// println!("{} runs version {}", info.unit, info.version);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MastClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl MastClient {
    /// Create a client for the daemon at `server_url`.
    ///
    /// No request is sent until the first call.
    pub fn with_config(
        server_url: String,
        timeout_secs: u64,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("mastctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: normalize_url(&server_url),
            max_retries,
            retry_delay,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}/{}", self.base_url, API_BASE, endpoint)
    }

    /// Process an HTTP response and extract the API data.
    ///
    /// Error envelopes are reported with the daemon's own message.
    async fn handle_response<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", endpoint))?;

        if !status.is_success() {
            let detail = envelope_error(&text).unwrap_or(text);
            let error_msg = match status {
                StatusCode::NOT_FOUND => format!("Endpoint {} not found", endpoint),
                StatusCode::BAD_REQUEST => format!("Bad request to {}: {}", endpoint, detail),
                StatusCode::SERVICE_UNAVAILABLE => {
                    format!("Service unavailable at {}: {}", endpoint, detail)
                }
                StatusCode::BAD_GATEWAY => format!("Solver rejected {}: {}", endpoint, detail),
                StatusCode::INTERNAL_SERVER_ERROR => {
                    format!("Server error at {}: {}", endpoint, detail)
                }
                _ => format!("HTTP {} error at {}: {}", status, endpoint, detail),
            };
            return Err(anyhow::anyhow!(error_msg));
        }

        let api_response: api::ApiResponse<T> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response from {}", endpoint))?;

        match api_response {
            api::ApiResponse::Success { data } => Ok(data),
            api::ApiResponse::Error { error } => {
                Err(anyhow::anyhow!("Server error at {}: {}", endpoint, error))
            }
        }
    }

    /// Execute an HTTP request, retrying on transport failures.
    ///
    /// The delay before retry `n` is `retry_delay * n`.
    async fn execute_with_retry<F, Fut, T>(
        &self,
        endpoint: &str,
        retry: Retry,
        request_fn: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
        T: DeserializeOwned,
    {
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..=self.max_retries {
            attempts += 1;
            match request_fn().await {
                Ok(response) => {
                    return Self::handle_response(response, endpoint).await;
                }
                Err(e) => {
                    let should_retry = match retry {
                        Retry::Transport => e.is_connect() || e.is_timeout() || e.is_request(),
                        Retry::ConnectOnly => e.is_connect(),
                    };
                    last_error = Some(e);

                    if attempt < self.max_retries && should_retry {
                        tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
                        continue;
                    } else {
                        break;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(anyhow::anyhow!(
            "Failed to reach {} after {} attempt(s): {}",
            endpoint,
            attempts,
            reason
        ))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.get_with(endpoint, Retry::Transport).await
    }

    async fn get_with<T: DeserializeOwned>(&self, endpoint: &str, retry: Retry) -> Result<T> {
        let url = self.url(endpoint);
        self.execute_with_retry(endpoint, retry, || self.client.get(&url).send())
            .await
    }

    /// Daemon version, unit name, uptime and solver reachability.
    pub async fn get_info(&self) -> Result<InfoResponse> {
        self.get("unit/info").await
    }

    /// State of every configured outlet.
    pub async fn power_status(&self) -> Result<PowerStatusResponse> {
        self.get("unit/power/status").await
    }

    /// Outlet endpoint for `outlet`, which is a number or a device name.
    fn outlet_endpoint(outlet: &str, action: &str) -> String {
        format!(
            "unit/power/outlet/{}/{}",
            urlencoding::encode(outlet.trim()),
            action
        )
    }

    /// Turn an outlet on.
    pub async fn outlet_on(&self, outlet: &str) -> Result<OutletStatus> {
        self.get(&Self::outlet_endpoint(outlet, "on")).await
    }

    /// Turn an outlet off.
    pub async fn outlet_off(&self, outlet: &str) -> Result<OutletStatus> {
        self.get(&Self::outlet_endpoint(outlet, "off")).await
    }

    /// Power-cycle an outlet. Returns once the outlet is back on.
    pub async fn outlet_cycle(&self, outlet: &str) -> Result<OutletStatus> {
        self.get_with(&Self::outlet_endpoint(outlet, "cycle"), Retry::ConnectOnly)
            .await
    }

    /// Start powering every outlet on; the daemon switches them in the background.
    pub async fn startup(&self) -> Result<PowerSequenceResponse> {
        self.get_with("unit/startup", Retry::ConnectOnly).await
    }

    /// Start powering every outlet off.
    pub async fn shutdown(&self) -> Result<PowerSequenceResponse> {
        self.get_with("unit/shutdown", Retry::ConnectOnly).await
    }

    pub async fn solver_status(&self) -> Result<SolverStatusResponse> {
        self.get("unit/solver/status").await
    }

    pub async fn presets(&self) -> Result<PresetsResponse> {
        self.get("stage/presets").await
    }
}
