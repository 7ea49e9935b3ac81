//! Outlet control for the unit's power switch
//!
//! Outlets are addressed by number or by the device name configured in
//! `[power_switch.outlets]`. Multi-outlet sequences (startup, shutdown) hold
//! a sequence lock so two requests never interleave their switching.
//!
//! Startup and shutdown requests only launch the sequence on a background
//! task. While one runs, further startup or shutdown requests are ignored.

use mast_core::api::{OutletStatus, PowerActivity, PowerSequenceResponse, PowerStatusResponse};
use mast_core::{MastError, OutletRef, OutletState, PowerSwitchConfig, Result, UnitConfig};
use mast_hardware::PowerSwitch;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// One configured outlet
#[derive(Debug, Clone)]
struct Outlet {
    name: String,
    delay_after_on: Duration,
}

/// Background sequence bookkeeping
#[derive(Debug, Default)]
struct SequenceState {
    activity: PowerActivity,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Sequence {
    Startup,
    Shutdown,
}

impl Sequence {
    fn activity(self) -> PowerActivity {
        match self {
            Sequence::Startup => PowerActivity::StartingUp,
            Sequence::Shutdown => PowerActivity::ShuttingDown,
        }
    }
}

/// Power sequencing for one unit
pub(crate) struct PowerManager {
    /// `None` when the unit has no switch configured
    switch: Option<Arc<dyn PowerSwitch>>,
    config: PowerSwitchConfig,
    outlets: BTreeMap<u32, Outlet>,
    cycle_time: Duration,
    sequence: Mutex<()>,
    state: StdMutex<SequenceState>,
}

impl PowerManager {
    pub fn new(unit: &UnitConfig, switch: Option<Arc<dyn PowerSwitch>>) -> Self {
        let outlets = unit
            .power_switch
            .outlet_map()
            .into_iter()
            .map(|(number, name)| {
                let delay_after_on = Duration::from_secs(unit.delay_after_on(&name));
                (
                    number,
                    Outlet {
                        name,
                        delay_after_on,
                    },
                )
            })
            .collect();

        Self {
            switch,
            config: unit.power_switch.clone(),
            outlets,
            cycle_time: Duration::from_secs(unit.power_switch.cycle_time),
            sequence: Mutex::new(()),
            state: StdMutex::new(SequenceState::default()),
        }
    }

    /// Attached switch driver, for the info endpoint
    pub fn describe(&self) -> Option<String> {
        self.switch.as_ref().map(|s| s.describe())
    }

    fn sequence_state(&self) -> MutexGuard<'_, SequenceState> {
        // the state is two plain fields, still consistent after a panic
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sequence currently running
    pub fn activity(&self) -> PowerActivity {
        self.sequence_state().activity
    }

    /// Why the most recent startup or shutdown failed, if it did
    pub fn last_error(&self) -> Option<String> {
        self.sequence_state().last_error.clone()
    }

    fn switch(&self) -> Result<&Arc<dyn PowerSwitch>> {
        self.switch.as_ref().ok_or_else(|| {
            MastError::PowerSwitch("no power switch is configured for this unit".to_string())
        })
    }

    /// Query one outlet; failures read as `Unknown`.
    async fn read_state(&self, number: u32) -> OutletState {
        let Some(switch) = &self.switch else {
            return OutletState::Unknown;
        };
        match switch.outlet_state(number).await {
            Ok(on) => OutletState::from_bool(on),
            Err(e) => {
                warn!("Cannot read outlet {}: {}", number, e);
                OutletState::Unknown
            }
        }
    }

    fn status_of(&self, number: u32, state: OutletState) -> OutletStatus {
        OutletStatus {
            number,
            name: self
                .outlets
                .get(&number)
                .map(|o| o.name.clone())
                .unwrap_or_default(),
            state,
        }
    }

    /// State of every configured outlet, in outlet order.
    pub async fn status(&self) -> Vec<OutletStatus> {
        let mut statuses = Vec::with_capacity(self.outlets.len());
        for &number in self.outlets.keys() {
            let state = self.read_state(number).await;
            statuses.push(self.status_of(number, state));
        }
        statuses
    }

    /// Outlet states together with the background sequence state.
    pub async fn power_status(&self) -> PowerStatusResponse {
        let outlets = self.status().await;
        let state = self.sequence_state();
        PowerStatusResponse::from_outlets(outlets)
            .with_activity(state.activity, state.last_error.clone())
    }

    /// Turn one outlet on or off.
    pub async fn set_outlet(&self, outlet: &OutletRef, on: bool) -> Result<OutletStatus> {
        let (number, name) = self.config.resolve_outlet(outlet)?;
        let switch = self.switch()?;
        let _sequence = self.sequence.lock().await;

        info!(
            "Turning outlet {} ({}) {}",
            number,
            name,
            if on { "on" } else { "off" }
        );
        switch.set_outlet(number, on).await?;
        Ok(self.status_of(number, OutletState::from_bool(on)))
    }

    /// Turn one outlet off, wait `cycle_time`, turn it back on.
    pub async fn cycle_outlet(&self, outlet: &OutletRef) -> Result<OutletStatus> {
        let (number, name) = self.config.resolve_outlet(outlet)?;
        let switch = self.switch()?;
        let _sequence = self.sequence.lock().await;

        info!(
            "Cycling outlet {} ({}), off for {:?}",
            number, name, self.cycle_time
        );
        switch.cycle_outlet(number, self.cycle_time).await?;
        Ok(self.status_of(number, OutletState::On))
    }

    /// Launch [`startup`](Self::startup) on a background task and return.
    ///
    /// Ignored (`accepted: false`) while another sequence runs.
    pub fn begin_startup(self: &Arc<Self>) -> Result<PowerSequenceResponse> {
        self.begin(Sequence::Startup)
    }

    /// Launch [`shutdown`](Self::shutdown) on a background task and return.
    pub fn begin_shutdown(self: &Arc<Self>) -> Result<PowerSequenceResponse> {
        self.begin(Sequence::Shutdown)
    }

    fn begin(self: &Arc<Self>, sequence: Sequence) -> Result<PowerSequenceResponse> {
        self.switch()?;

        {
            let mut state = self.sequence_state();
            if state.activity != PowerActivity::Idle {
                info!(
                    "Ignoring {:?} request, unit is {}",
                    sequence, state.activity
                );
                return Ok(PowerSequenceResponse {
                    accepted: false,
                    activity: state.activity,
                });
            }
            state.activity = sequence.activity();
            state.last_error = None;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = match sequence {
                Sequence::Startup => manager.startup().await,
                Sequence::Shutdown => manager.shutdown().await,
            };

            let mut state = manager.sequence_state();
            match result {
                Ok(_) => info!("Unit {:?} complete", sequence),
                Err(e) => {
                    error!("Unit {:?} failed: {}", sequence, e);
                    state.last_error = Some(e.to_string());
                }
            }
            state.activity = PowerActivity::Idle;
        });

        Ok(PowerSequenceResponse {
            accepted: true,
            activity: sequence.activity(),
        })
    }

    /// Power every outlet on in outlet order.
    ///
    /// After each outlet the device's `delay_after_on` is waited out before
    /// the next one is switched. Stops at the first failure.
    pub async fn startup(&self) -> Result<Vec<OutletStatus>> {
        let switch = self.switch()?;
        let _sequence = self.sequence.lock().await;
        info!("Unit startup: powering on {} outlet(s)", self.outlets.len());

        let mut statuses = Vec::with_capacity(self.outlets.len());
        for (&number, outlet) in &self.outlets {
            info!("Powering on outlet {} ({})", number, outlet.name);
            switch.set_outlet(number, true).await?;
            statuses.push(self.status_of(number, OutletState::On));

            if !outlet.delay_after_on.is_zero() {
                debug!(
                    "Waiting {:?} for {} to come up",
                    outlet.delay_after_on, outlet.name
                );
                tokio::time::sleep(outlet.delay_after_on).await;
            }
        }
        Ok(statuses)
    }

    /// Power every outlet off, highest outlet first.
    ///
    /// Keeps going past failures and returns the last one.
    pub async fn shutdown(&self) -> Result<Vec<OutletStatus>> {
        let switch = self.switch()?;
        let _sequence = self.sequence.lock().await;
        info!("Unit shutdown: powering off {} outlet(s)", self.outlets.len());

        let mut statuses = Vec::with_capacity(self.outlets.len());
        let mut last_error = None;
        for &number in self.outlets.keys().rev() {
            match switch.set_outlet(number, false).await {
                Ok(()) => statuses.push(self.status_of(number, OutletState::Off)),
                Err(e) => {
                    warn!("Failed to power off outlet {}: {}", number, e);
                    statuses.push(self.status_of(number, OutletState::Unknown));
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(statuses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mast_hardware::MockPowerSwitch;

    const UNIT: &str = r#"
[camera]
delay_after_on = 0

[power_switch]
host = "mast01-ps"
cycle_time = 0
delay_after_on = 0
[power_switch.outlets]
1 = "Mount"
2 = "Camera"
3 = "Stage"
5 = "Focuser"
"#;

    fn manager() -> (PowerManager, Arc<MockPowerSwitch>) {
        let unit = UnitConfig::from_toml(UNIT, "mast01").unwrap();
        let switch = Arc::new(MockPowerSwitch::new(8));
        let manager = PowerManager::new(&unit, Some(switch.clone() as Arc<dyn PowerSwitch>));
        (manager, switch)
    }

    #[tokio::test]
    async fn test_status_lists_configured_outlets() {
        let (manager, switch) = manager();
        switch.set_outlet(2, true).await.unwrap();

        let status = manager.status().await;
        let summary: Vec<_> = status
            .iter()
            .map(|o| (o.number, o.name.as_str(), o.state))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "Mount", OutletState::Off),
                (2, "Camera", OutletState::On),
                (3, "Stage", OutletState::Off),
                (5, "Focuser", OutletState::Off),
            ]
        );
    }

    #[tokio::test]
    async fn test_status_without_switch_is_unknown() {
        let unit = UnitConfig::from_toml(UNIT, "mast01").unwrap();
        let manager = PowerManager::new(&unit, None);

        assert_eq!(manager.describe(), None);
        assert!(manager
            .status()
            .await
            .iter()
            .all(|o| o.state == OutletState::Unknown));
    }

    #[tokio::test]
    async fn test_set_outlet_by_name_and_number() {
        let (manager, switch) = manager();

        let status = manager
            .set_outlet(&OutletRef::Name("camera".to_string()), true)
            .await
            .unwrap();
        assert_eq!(status.number, 2);
        assert_eq!(status.state, OutletState::On);

        manager
            .set_outlet(&OutletRef::Number(5), true)
            .await
            .unwrap();
        assert_eq!(switch.history(), vec![(2, true), (5, true)]);
    }

    #[tokio::test]
    async fn test_unknown_outlet() {
        let (manager, switch) = manager();

        let err = manager
            .set_outlet(&OutletRef::Number(4), true)
            .await
            .unwrap_err();
        assert!(matches!(err, MastError::OutletNotFound(_)));

        let err = manager
            .set_outlet(&OutletRef::Name("Dome".to_string()), true)
            .await
            .unwrap_err();
        assert!(matches!(err, MastError::OutletNotFound(_)));
        assert!(switch.history().is_empty());
    }

    #[tokio::test]
    async fn test_no_switch_is_a_power_switch_error() {
        let unit = UnitConfig::from_toml(UNIT, "mast01").unwrap();
        let manager = PowerManager::new(&unit, None);

        let err = manager
            .set_outlet(&OutletRef::Number(1), true)
            .await
            .unwrap_err();
        assert!(matches!(err, MastError::PowerSwitch(_)));
    }

    #[tokio::test]
    async fn test_startup_in_outlet_order() {
        let (manager, switch) = manager();

        let statuses = manager.startup().await.unwrap();
        assert_eq!(statuses.len(), 4);
        assert_eq!(
            switch.history(),
            vec![(1, true), (2, true), (3, true), (5, true)]
        );
    }

    #[tokio::test]
    async fn test_startup_stops_at_first_failure() {
        let unit = UnitConfig::from_toml(UNIT, "mast01").unwrap();
        // outlet 5 does not exist on a 3-outlet switch
        let switch = Arc::new(MockPowerSwitch::new(3));
        let manager = PowerManager::new(&unit, Some(switch.clone() as Arc<dyn PowerSwitch>));

        assert!(manager.startup().await.is_err());
        assert_eq!(switch.history(), vec![(1, true), (2, true), (3, true)]);
    }

    #[tokio::test]
    async fn test_shutdown_in_reverse_order() {
        let (manager, switch) = manager();
        manager.startup().await.unwrap();

        let statuses = manager.shutdown().await.unwrap();
        assert!(statuses.iter().all(|o| o.state == OutletState::Off));
        assert_eq!(
            switch.history()[4..],
            [(5, false), (3, false), (2, false), (1, false)]
        );
    }

    #[tokio::test]
    async fn test_cycle_outlet() {
        let (manager, switch) = manager();

        let status = manager
            .cycle_outlet(&OutletRef::Name("Stage".to_string()))
            .await
            .unwrap();
        assert_eq!(status.state, OutletState::On);
        assert_eq!(switch.history(), vec![(3, false), (3, true)]);
    }

    const SLOW_UNIT: &str = r#"
[power_switch]
host = "mast01-ps"
delay_after_on = 3
[power_switch.outlets]
1 = "Mount"
2 = "Camera"
3 = "Stage"
4 = "Focuser"
5 = "Covers"
"#;

    fn slow_manager() -> (Arc<PowerManager>, Arc<MockPowerSwitch>) {
        let unit = UnitConfig::from_toml(SLOW_UNIT, "mast01").unwrap();
        let switch = Arc::new(MockPowerSwitch::new(8));
        let manager = PowerManager::new(&unit, Some(switch.clone() as Arc<dyn PowerSwitch>));
        (Arc::new(manager), switch)
    }

    fn all_on() -> Vec<(u32, bool)> {
        (1..=5).map(|n| (n, true)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_completes_after_request_returns() {
        let (manager, switch) = slow_manager();

        let response = manager.begin_startup().unwrap();
        assert!(response.accepted);
        assert_eq!(response.activity, PowerActivity::StartingUp);
        assert_eq!(manager.activity(), PowerActivity::StartingUp);
        assert!(switch.history().is_empty());

        // five outlets, 3 s each
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(manager.activity(), PowerActivity::Idle);
        assert_eq!(manager.last_error(), None);
        assert_eq!(switch.history(), all_on());
        assert!(manager.power_status().await.is_operational);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_sequence_requests_are_ignored() {
        let (manager, switch) = slow_manager();
        assert!(manager.begin_startup().unwrap().accepted);

        tokio::time::sleep(Duration::from_secs(4)).await;
        let again = manager.begin_startup().unwrap();
        assert!(!again.accepted);
        assert_eq!(again.activity, PowerActivity::StartingUp);
        assert!(!manager.begin_shutdown().unwrap().accepted);
        assert_eq!(
            manager.power_status().await.activity,
            PowerActivity::StartingUp
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(switch.history(), all_on());

        let shutdown = manager.begin_shutdown().unwrap();
        assert!(shutdown.accepted);
        assert_eq!(shutdown.activity, PowerActivity::ShuttingDown);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.activity(), PowerActivity::Idle);
        assert_eq!(
            switch.history()[5..],
            [(5, false), (4, false), (3, false), (2, false), (1, false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_outlet_request_waits_for_running_startup() {
        let (manager, switch) = slow_manager();
        let started = tokio::time::Instant::now();
        manager.begin_startup().unwrap();

        // outlet 1 is on, the sequence is waiting out its delay
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(switch.history(), vec![(1, true)]);

        let status = manager
            .set_outlet(&OutletRef::Number(1), false)
            .await
            .unwrap();
        assert_eq!(status.state, OutletState::Off);
        assert!(started.elapsed() >= Duration::from_secs(15));

        let mut expected = all_on();
        expected.push((1, false));
        assert_eq!(switch.history(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_startups_do_not_interleave() {
        let (manager, switch) = slow_manager();

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.startup().await }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.startup().await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let mut expected = all_on();
        expected.extend(all_on());
        assert_eq!(switch.history(), expected);
    }

    #[tokio::test]
    async fn test_failed_startup_is_reported() {
        let unit = UnitConfig::from_toml(UNIT, "mast01").unwrap();
        let switch = Arc::new(MockPowerSwitch::new(3));
        let manager = Arc::new(PowerManager::new(
            &unit,
            Some(switch.clone() as Arc<dyn PowerSwitch>),
        ));

        manager.begin_startup().unwrap();
        for _ in 0..50 {
            if manager.activity() == PowerActivity::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status = manager.power_status().await;
        assert_eq!(status.activity, PowerActivity::Idle);
        let error = status.last_error.unwrap();
        assert!(error.contains("outlet 5"), "{}", error);
    }

    #[tokio::test]
    async fn test_begin_without_switch_fails() {
        let unit = UnitConfig::from_toml(UNIT, "mast01").unwrap();
        let manager = Arc::new(PowerManager::new(&unit, None));

        let err = manager.begin_startup().unwrap_err();
        assert!(matches!(err, MastError::PowerSwitch(_)));
        assert_eq!(manager.activity(), PowerActivity::Idle);
    }

    #[test]
    fn test_device_delays() {
        let unit = UnitConfig::from_toml(
            r#"
[stage]
delay_after_on = 7
[power_switch]
delay_after_on = 2
[power_switch.outlets]
1 = "Mount"
3 = "Stage"
"#,
            "mast01",
        )
        .unwrap();
        let manager = PowerManager::new(&unit, None);

        assert_eq!(manager.outlets[&1].delay_after_on, Duration::from_secs(2));
        assert_eq!(manager.outlets[&3].delay_after_on, Duration::from_secs(7));
    }
}
