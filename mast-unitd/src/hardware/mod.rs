//! Hardware layer of the unit daemon
//!
//! Wraps the drivers from `mast_hardware` with the unit's configuration:
//! [`PowerManager`] sequences the power switch outlets and
//! [`SolverSupervisor`] keeps the ps3cli solver server available.

mod power_manager;
mod solver_supervisor;

pub(crate) use power_manager::PowerManager;
pub(crate) use solver_supervisor::SolverSupervisor;

/// Power switch selection
pub(crate) mod connection {
    use mast_core::PowerSwitchConfig;
    use mast_hardware::{DliPowerSwitch, MockPowerSwitch, PowerSwitch};
    use std::sync::Arc;
    use tracing::{info, warn};

    /// Outlets simulated by the mock switch when none are configured
    const MOCK_OUTLET_COUNT: u32 = 8;

    /// Pick the power switch driver for this unit.
    ///
    /// Returns `None` when the unit has no switch host configured, in which
    /// case the power endpoints answer 503.
    pub fn power_switch(config: &PowerSwitchConfig, mock: bool) -> Option<Arc<dyn PowerSwitch>> {
        if mock {
            let count = config
                .outlet_map()
                .keys()
                .copied()
                .max()
                .unwrap_or(0)
                .max(MOCK_OUTLET_COUNT);
            info!("Mock mode: simulated power switch with {} outlets", count);
            return Some(Arc::new(MockPowerSwitch::new(count)));
        }

        match DliPowerSwitch::from_config(config) {
            Ok(switch) => {
                info!("Power switch: {}", switch.describe());
                Some(Arc::new(switch))
            }
            Err(e) => {
                warn!("Power switch disabled: {}", e);
                None
            }
        }
    }

}
