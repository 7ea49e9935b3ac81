//! Power switch abstraction
//!
//! Outlets are addressed by their 1-based number, as written in the
//! `[power_switch.outlets]` configuration table.

use async_trait::async_trait;
use mast_core::{MastError, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Network power switch with individually switchable outlets
#[async_trait]
pub trait PowerSwitch: Send + Sync {
    /// Whether `outlet` is currently powered
    async fn outlet_state(&self, outlet: u32) -> Result<bool>;

    /// Turn `outlet` on or off
    async fn set_outlet(&self, outlet: u32, on: bool) -> Result<()>;

    /// Turn `outlet` off, wait `off_time`, turn it back on
    async fn cycle_outlet(&self, outlet: u32, off_time: Duration) -> Result<()> {
        self.set_outlet(outlet, false).await?;
        tokio::time::sleep(off_time).await;
        self.set_outlet(outlet, true).await
    }

    /// Short description for logs and the info endpoint
    fn describe(&self) -> String;
}

/// In-memory switch used in mock mode and tests
pub struct MockPowerSwitch {
    outlets: Mutex<BTreeMap<u32, bool>>,
    /// Outlets that exist on the simulated hardware
    outlet_count: u32,
    /// Every `set_outlet` call, in order
    history: Mutex<Vec<(u32, bool)>>,
}

impl MockPowerSwitch {
    /// A switch with `outlet_count` outlets, all off
    pub fn new(outlet_count: u32) -> Self {
        Self {
            outlets: Mutex::new((1..=outlet_count).map(|n| (n, false)).collect()),
            outlet_count,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(outlet, on)` transitions
    pub fn history(&self) -> Vec<(u32, bool)> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    fn check(&self, outlet: u32) -> Result<()> {
        if outlet == 0 || outlet > self.outlet_count {
            return Err(MastError::PowerSwitch(format!(
                "outlet {} does not exist (switch has {} outlets)",
                outlet, self.outlet_count
            )));
        }
        Ok(())
    }

    fn poisoned() -> MastError {
        MastError::PowerSwitch("mock switch state poisoned".to_string())
    }
}

#[async_trait]
impl PowerSwitch for MockPowerSwitch {
    async fn outlet_state(&self, outlet: u32) -> Result<bool> {
        self.check(outlet)?;
        let outlets = self.outlets.lock().map_err(|_| Self::poisoned())?;
        Ok(outlets.get(&outlet).copied().unwrap_or(false))
    }

    async fn set_outlet(&self, outlet: u32, on: bool) -> Result<()> {
        self.check(outlet)?;
        debug!("Mock switch: outlet {} -> {}", outlet, if on { "on" } else { "off" });
        self.outlets
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert(outlet, on);
        self.history
            .lock()
            .map_err(|_| Self::poisoned())?
            .push((outlet, on));
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mock switch ({} outlets)", self.outlet_count)
    }
}
