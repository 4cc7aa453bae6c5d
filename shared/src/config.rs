//! Runtime configuration handed to the core by the shell.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::FlowEndpoint;
use crate::sos::SimulatorSettings;
use crate::store::SyncMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid flow base URL: {0}")]
    InvalidFlowUrl(String),
    #[error("{field} must be a probability between 0 and 1")]
    InvalidProbability { field: &'static str },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the prompt flow service. Flows are unavailable when unset.
    pub flow_base_url: Option<String>,
    pub remote_sync: bool,
    pub developer_diagnostics: bool,
    pub vitals_tick_ms: u64,
    pub crisis_pause_ms: u64,
    pub breathing_phase_ms: u64,
    pub sos_countdown_secs: u32,
    pub hr_panic_threshold: f64,
    pub spo2_low_threshold: f64,
    pub hr_spike_probability: f64,
    pub spo2_drop_probability: f64,
    pub max_emergency_contacts: usize,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            flow_base_url: None,
            remote_sync: true,
            developer_diagnostics: false,
            vitals_tick_ms: millis(crate::VITALS_TICK),
            crisis_pause_ms: millis(crate::CRISIS_PAUSE),
            breathing_phase_ms: millis(crate::BREATHING_PHASE),
            sos_countdown_secs: crate::SOS_COUNTDOWN_SECS,
            hr_panic_threshold: crate::HR_PANIC_THRESHOLD,
            spo2_low_threshold: crate::SPO2_LOW_THRESHOLD,
            hr_spike_probability: crate::HR_SPIKE_PROBABILITY,
            spo2_drop_probability: crate::SPO2_DROP_PROBABILITY,
            max_emergency_contacts: crate::MAX_EMERGENCY_CONTACTS,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.flow_base_url {
            FlowEndpoint::new(url).map_err(|e| ConfigError::InvalidFlowUrl(e.to_string()))?;
        }
        for (field, value) in [
            ("vitals_tick_ms", self.vitals_tick_ms),
            ("crisis_pause_ms", self.crisis_pause_ms),
            ("breathing_phase_ms", self.breathing_phase_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.sos_countdown_secs == 0 {
            return Err(ConfigError::Zero {
                field: "sos_countdown_secs",
            });
        }
        for (field, p) in [
            ("hr_spike_probability", self.hr_spike_probability),
            ("spo2_drop_probability", self.spo2_drop_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidProbability { field });
            }
        }
        if !(50.0..=160.0).contains(&self.hr_panic_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "hr_panic_threshold",
            });
        }
        if !(88.0..=100.0).contains(&self.spo2_low_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "spo2_low_threshold",
            });
        }
        if self.max_emergency_contacts == 0 {
            return Err(ConfigError::Zero {
                field: "max_emergency_contacts",
            });
        }
        // Guest snapshots holding more contacts than this fail to decode.
        if self.max_emergency_contacts > crate::MAX_EMERGENCY_CONTACTS {
            return Err(ConfigError::OutOfRange {
                field: "max_emergency_contacts",
            });
        }
        Ok(())
    }

    /// The configured flow endpoint, if any. Only call on a validated config.
    #[must_use]
    pub fn flow_endpoint(&self) -> Option<FlowEndpoint> {
        self.flow_base_url
            .as_deref()
            .and_then(|url| FlowEndpoint::new(url).ok())
    }

    #[must_use]
    pub fn sync_mode(&self) -> SyncMode {
        if self.remote_sync {
            SyncMode::Remote
        } else {
            SyncMode::LocalOnly
        }
    }

    #[must_use]
    pub fn simulator_settings(&self) -> SimulatorSettings {
        SimulatorSettings {
            hr_panic_threshold: self.hr_panic_threshold,
            spo2_low_threshold: self.spo2_low_threshold,
            hr_spike_probability: self.hr_spike_probability,
            spo2_drop_probability: self.spo2_drop_probability,
            countdown_secs: self.sos_countdown_secs,
        }
    }

    #[must_use]
    pub fn vitals_tick(&self) -> Duration {
        Duration::from_millis(self.vitals_tick_ms)
    }

    #[must_use]
    pub fn crisis_pause(&self) -> Duration {
        Duration::from_millis(self.crisis_pause_ms)
    }

    #[must_use]
    pub fn breathing_phase(&self) -> Duration {
        Duration::from_millis(self.breathing_phase_ms)
    }
}
