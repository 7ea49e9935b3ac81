//! Digital Loggers web power switch driver
//!
//! Talks to the switch's REST API:
//!
//! - `GET  /restapi/relay/outlets/<i>/state/` -> `true` / `false`
//! - `PUT  /restapi/relay/outlets/<i>/state/` with form `value=true|false`
//!
//! The REST API numbers outlets from 0; configuration numbers them from 1.

use async_trait::async_trait;
use mast_core::{MastError, PowerSwitchConfig, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::power_switch::PowerSwitch;

/// REST client for one DLI switch
#[derive(Debug, Clone)]
pub struct DliPowerSwitch {
    client: Client,
    base_url: String,
    userid: String,
    password: String,
}

impl DliPowerSwitch {
    /// Build a driver from the unit's effective power-switch settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no host is configured or the HTTP client cannot be built.
    pub fn from_config(config: &PowerSwitchConfig) -> Result<Self> {
        let host = config.host.as_deref().ok_or_else(|| {
            MastError::Config("power_switch.host is not set for this unit".to_string())
        })?;
        Self::new(
            format!("http://{}:{}", host, config.port),
            &config.userid,
            &config.password,
            Duration::from_secs(config.timeout),
        )
    }

    /// Build a driver for the switch at `base_url` (e.g. `http://10.23.1.20:80`).
    pub fn new(base_url: String, userid: &str, password: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mast-unit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MastError::PowerSwitch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            userid: userid.to_string(),
            password: password.to_string(),
        })
    }

    fn state_url(&self, outlet: u32) -> Result<String> {
        let index = outlet.checked_sub(1).ok_or_else(|| {
            MastError::InvalidInput("outlet numbers start at 1".to_string())
        })?;
        Ok(format!(
            "{}/restapi/relay/outlets/{}/state/",
            self.base_url, index
        ))
    }

    fn map_transport_error(&self, outlet: u32, e: reqwest::Error) -> MastError {
        if e.is_timeout() {
            MastError::Timeout(format!(
                "power switch {} did not answer for outlet {}",
                self.base_url, outlet
            ))
        } else {
            MastError::PowerSwitch(format!(
                "power switch {} unreachable: {}",
                self.base_url, e
            ))
        }
    }

    fn check_status(&self, outlet: u32, status: StatusCode) -> Result<()> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MastError::PowerSwitch(
                format!("power switch {} rejected the credentials", self.base_url),
            )),
            StatusCode::NOT_FOUND => Err(MastError::PowerSwitch(format!(
                "power switch {} has no outlet {}",
                self.base_url, outlet
            ))),
            s => Err(MastError::PowerSwitch(format!(
                "power switch {} answered HTTP {} for outlet {}",
                self.base_url, s, outlet
            ))),
        }
    }
}

#[async_trait]
impl PowerSwitch for DliPowerSwitch {
    async fn outlet_state(&self, outlet: u32) -> Result<bool> {
        let url = self.state_url(outlet)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.userid, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_transport_error(outlet, e))?;
        self.check_status(outlet, response.status())?;

        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(outlet, e))?;
        parse_state(&text).ok_or_else(|| {
            warn!("Unexpected outlet state body from {}: {:?}", url, text);
            MastError::PowerSwitch(format!(
                "unexpected state '{}' for outlet {}",
                text.trim(),
                outlet
            ))
        })
    }

    async fn set_outlet(&self, outlet: u32, on: bool) -> Result<()> {
        let url = self.state_url(outlet)?;
        debug!("PUT {} value={}", url, on);

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.userid, Some(&self.password))
            .header("X-CSRF", "x")
            .form(&[("value", if on { "true" } else { "false" })])
            .send()
            .await
            .map_err(|e| self.map_transport_error(outlet, e))?;
        self.check_status(outlet, response.status())
    }

    fn describe(&self) -> String {
        format!("DLI switch at {}", self.base_url)
    }
}

/// The switch answers a bare JSON boolean, sometimes wrapped in a list.
fn parse_state(body: &str) -> Option<bool> {
    match serde_json::from_str::<serde_json::Value>(body.trim()).ok()? {
        serde_json::Value::Bool(b) => Some(b),
        serde_json::Value::Array(values) => match values.as_slice() {
            [serde_json::Value::Bool(b)] => Some(*b),
            _ => None,
        },
        _ => None,
    }
}
