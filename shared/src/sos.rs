//! Simulated vitals and the SOS confirmation flow.
//!
//! ```text
//! Monitoring --anomaly/breach--> Alerting{countdown} --"I'm okay"--> Monitoring
//!                                     |  "I need help" / countdown hits 0
//!                                     v
//!                                 Escalating --notice shown--> Monitoring
//! ```
//!
//! Timers are owned by the caller; this module only moves between states.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capabilities::{Coordinates, LocationFailure};
use crate::{ToastKind, ToastMessage, SOS_TOAST_DURATION_MS};

const HR_RANGE: (f64, f64) = (50.0, 160.0);
const SPO2_RANGE: (f64, f64) = (88.0, 100.0);
const HR_INJECTION_OFFSET: f64 = 10.0;
const SPO2_INJECTION_OFFSET: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u16,
    pub diastolic: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub heart_rate: f64,
    pub spo2: f64,
    pub blood_pressure: BloodPressure,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            heart_rate: 75.0,
            spo2: 98.0,
            blood_pressure: BloodPressure {
                systolic: 120,
                diastolic: 80,
            },
        }
    }
}

impl Vitals {
    /// Rejects NaN and infinite readings from the shell.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.heart_rate.is_finite() && self.spo2.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertReason {
    HighHeartRate,
    LowSpo2,
}

impl AlertReason {
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::HighHeartRate => "High heart rate detected (panic attack risk).",
            Self::LowSpo2 => "Low SpO2 detected (faint / collapse risk).",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertResponse {
    ImOkay,
    NeedHelp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SosPhase {
    #[default]
    Monitoring,
    Alerting {
        reason: AlertReason,
        remaining_secs: u32,
    },
    Escalating,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatorSettings {
    pub hr_panic_threshold: f64,
    pub spo2_low_threshold: f64,
    pub hr_spike_probability: f64,
    pub spo2_drop_probability: f64,
    pub countdown_secs: u32,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            hr_panic_threshold: crate::HR_PANIC_THRESHOLD,
            spo2_low_threshold: crate::SPO2_LOW_THRESHOLD,
            hr_spike_probability: crate::HR_SPIKE_PROBABILITY,
            spo2_drop_probability: crate::SPO2_DROP_PROBABILITY,
            countdown_secs: crate::SOS_COUNTDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    Remaining(u32),
    Expired,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Dismissed,
    Escalate,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationStep {
    /// Nobody to notify; the flow is over.
    Aborted(SosNotice),
    RequestLocation,
    Ignored,
}

/// The local notification shown when an SOS completes or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SosNotice {
    pub title: String,
    pub description: String,
}

impl SosNotice {
    fn no_contacts() -> Self {
        Self {
            title: "SOS Failed: No Contacts".into(),
            description: "Please add emergency contacts in settings to use the SOS feature."
                .into(),
        }
    }

    fn triggered(location: Result<Coordinates, LocationFailure>) -> Self {
        let description = match location {
            Ok(coords) => format!(
                "Notifying emergency contacts. Live location: {}",
                coords.maps_link()
            ),
            Err(_) => "Notifying emergency contacts. (Location permission denied)".into(),
        };
        Self {
            title: "SOS ALERT TRIGGERED".into(),
            description,
        }
    }

    #[must_use]
    pub fn into_toast(self) -> ToastMessage {
        ToastMessage::new(self.title, ToastKind::Error)
            .with_description(self.description)
            .with_duration_ms(SOS_TOAST_DURATION_MS)
    }
}

#[derive(Debug, Clone)]
pub struct VitalsMonitor {
    settings: SimulatorSettings,
    vitals: Vitals,
    phase: SosPhase,
    breached: bool,
}

impl VitalsMonitor {
    #[must_use]
    pub fn new(settings: SimulatorSettings) -> Self {
        Self {
            settings,
            vitals: Vitals::default(),
            phase: SosPhase::Monitoring,
            breached: false,
        }
    }

    #[must_use]
    pub fn vitals(&self) -> Vitals {
        self.vitals
    }

    #[must_use]
    pub fn phase(&self) -> SosPhase {
        self.phase
    }

    #[must_use]
    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SimulatorSettings) {
        self.settings = settings;
    }

    #[must_use]
    pub fn heart_rate_alarming(&self) -> bool {
        self.vitals.heart_rate > self.settings.hr_panic_threshold
    }

    #[must_use]
    pub fn spo2_alarming(&self) -> bool {
        self.vitals.spo2 < self.settings.spo2_low_threshold
    }

    /// Drops any open alert and returns to monitoring.
    pub fn reset(&mut self) {
        self.phase = SosPhase::Monitoring;
        self.breached = false;
    }

    /// Advances the simulation by one sample. Returns the reason if this
    /// sample opened an alert.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> Option<AlertReason> {
        if rng.gen_bool(self.settings.hr_spike_probability) {
            self.vitals.heart_rate = self.settings.hr_panic_threshold + HR_INJECTION_OFFSET;
            return self.assess(Some(AlertReason::HighHeartRate));
        }
        if rng.gen_bool(self.settings.spo2_drop_probability) {
            self.vitals.spo2 = self.settings.spo2_low_threshold - SPO2_INJECTION_OFFSET;
            return self.assess(Some(AlertReason::LowSpo2));
        }

        let hr = self.vitals.heart_rate + rng.gen_range(-2.0_f64..2.0);
        let spo2 = self.vitals.spo2 + rng.gen_range(-0.225_f64..0.275);
        self.vitals = Vitals {
            heart_rate: hr.clamp(HR_RANGE.0, HR_RANGE.1),
            spo2: spo2.clamp(SPO2_RANGE.0, SPO2_RANGE.1),
            blood_pressure: BloodPressure {
                systolic: rng.gen_range(110..=120),
                diastolic: rng.gen_range(70..=80),
            },
        };
        self.assess(None)
    }

    /// Takes a reading supplied from outside the simulator.
    pub fn observe(&mut self, vitals: Vitals) -> Option<AlertReason> {
        if !vitals.is_plausible() {
            warn!("ignoring implausible vitals reading");
            return None;
        }
        self.vitals = vitals;
        self.assess(None)
    }

    fn threshold_reason(&self) -> Option<AlertReason> {
        if self.heart_rate_alarming() {
            Some(AlertReason::HighHeartRate)
        } else if self.spo2_alarming() {
            Some(AlertReason::LowSpo2)
        } else {
            None
        }
    }

    // A breach only alerts on the sample where it starts, so a reading that
    // stays out of range after "I'm okay" does not re-open the dialog.
    fn assess(&mut self, injected: Option<AlertReason>) -> Option<AlertReason> {
        let breach = self.threshold_reason();
        let newly_breached = breach.is_some() && !self.breached;
        self.breached = breach.is_some();

        let reason = injected.or(if newly_breached { breach } else { None })?;
        self.open_alert(reason)
    }

    fn open_alert(&mut self, reason: AlertReason) -> Option<AlertReason> {
        if self.phase != SosPhase::Monitoring {
            debug!(?reason, "alert already open");
            return None;
        }
        info!(?reason, "vitals alert opened");
        self.phase = SosPhase::Alerting {
            reason,
            remaining_secs: self.settings.countdown_secs,
        };
        Some(reason)
    }

    pub fn countdown_tick(&mut self) -> CountdownStep {
        let SosPhase::Alerting {
            reason,
            remaining_secs,
        } = self.phase
        else {
            return CountdownStep::Inactive;
        };
        let remaining = remaining_secs.saturating_sub(1);
        if remaining == 0 {
            self.phase = SosPhase::Escalating;
            return CountdownStep::Expired;
        }
        self.phase = SosPhase::Alerting {
            reason,
            remaining_secs: remaining,
        };
        CountdownStep::Remaining(remaining)
    }

    pub fn acknowledge(&mut self, response: AlertResponse) -> AckOutcome {
        if !matches!(self.phase, SosPhase::Alerting { .. }) {
            return AckOutcome::Ignored;
        }
        match response {
            AlertResponse::ImOkay => {
                self.phase = SosPhase::Monitoring;
                AckOutcome::Dismissed
            }
            AlertResponse::NeedHelp => {
                self.phase = SosPhase::Escalating;
                AckOutcome::Escalate
            }
        }
    }

    pub fn begin_escalation(&mut self, contact_count: usize) -> EscalationStep {
        if self.phase != SosPhase::Escalating {
            return EscalationStep::Ignored;
        }
        if contact_count == 0 {
            warn!("SOS escalation aborted: no emergency contacts");
            self.phase = SosPhase::Monitoring;
            return EscalationStep::Aborted(SosNotice::no_contacts());
        }
        EscalationStep::RequestLocation
    }

    pub fn complete_escalation(
        &mut self,
        location: Result<Coordinates, LocationFailure>,
    ) -> Option<SosNotice> {
        if self.phase != SosPhase::Escalating {
            return None;
        }
        self.phase = SosPhase::Monitoring;
        info!(located = location.is_ok(), "SOS alert triggered");
        Some(SosNotice::triggered(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn monitor() -> VitalsMonitor {
        VitalsMonitor::new(SimulatorSettings::default())
    }

    fn quiet_monitor() -> VitalsMonitor {
        VitalsMonitor::new(SimulatorSettings {
            hr_spike_probability: 0.0,
            spo2_drop_probability: 0.0,
            ..SimulatorSettings::default()
        })
    }

    fn breach() -> Vitals {
        Vitals {
            heart_rate: 145.0,
            ..Vitals::default()
        }
    }

    #[test]
    fn drift_stays_in_range() {
        let mut m = quiet_monitor();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            m.tick(&mut rng);
            let v = m.vitals();
            assert!((HR_RANGE.0..=HR_RANGE.1).contains(&v.heart_rate));
            assert!((SPO2_RANGE.0..=SPO2_RANGE.1).contains(&v.spo2));
            assert!((110..=120).contains(&v.blood_pressure.systolic));
            assert!((70..=80).contains(&v.blood_pressure.diastolic));
        }
    }

    #[test]
    fn forced_spike_opens_alert() {
        let mut m = VitalsMonitor::new(SimulatorSettings {
            hr_spike_probability: 1.0,
            ..SimulatorSettings::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(m.tick(&mut rng), Some(AlertReason::HighHeartRate));
        assert!((m.vitals().heart_rate - 140.0).abs() < f64::EPSILON);
        assert_eq!(
            m.phase(),
            SosPhase::Alerting {
                reason: AlertReason::HighHeartRate,
                remaining_secs: 10
            }
        );
    }

    #[test]
    fn forced_spo2_drop_opens_alert() {
        let mut m = VitalsMonitor::new(SimulatorSettings {
            hr_spike_probability: 0.0,
            spo2_drop_probability: 1.0,
            ..SimulatorSettings::default()
        });
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(m.tick(&mut rng), Some(AlertReason::LowSpo2));
        assert!((m.vitals().spo2 - 87.0).abs() < f64::EPSILON);
    }

    #[test]
    fn persistent_breach_opens_exactly_one_alert() {
        let mut m = monitor();
        let opened = (0..20).filter(|_| m.observe(breach()).is_some()).count();
        assert_eq!(opened, 1);

        // Still breached after the person says they are fine.
        assert_eq!(m.acknowledge(AlertResponse::ImOkay), AckOutcome::Dismissed);
        assert_eq!(m.observe(breach()), None);
        assert_eq!(m.phase(), SosPhase::Monitoring);

        // A fresh breach after recovery alerts again.
        m.observe(Vitals::default());
        assert_eq!(m.observe(breach()), Some(AlertReason::HighHeartRate));
    }

    #[test]
    fn injected_anomaly_is_guarded_while_alerting() {
        let mut m = VitalsMonitor::new(SimulatorSettings {
            hr_spike_probability: 1.0,
            ..SimulatorSettings::default()
        });
        let mut rng = StdRng::seed_from_u64(3);
        assert!(m.tick(&mut rng).is_some());
        assert!(m.tick(&mut rng).is_none());
    }

    #[test]
    fn countdown_expires_into_escalation() {
        let mut m = monitor();
        m.observe(breach());
        for expected in (1..10).rev() {
            assert_eq!(m.countdown_tick(), CountdownStep::Remaining(expected));
        }
        assert_eq!(m.countdown_tick(), CountdownStep::Expired);
        assert_eq!(m.phase(), SosPhase::Escalating);
        assert_eq!(m.countdown_tick(), CountdownStep::Inactive);
    }

    #[test]
    fn need_help_escalates_immediately() {
        let mut m = monitor();
        m.observe(breach());
        assert_eq!(m.acknowledge(AlertResponse::NeedHelp), AckOutcome::Escalate);
        assert_eq!(m.phase(), SosPhase::Escalating);
        assert_eq!(m.acknowledge(AlertResponse::ImOkay), AckOutcome::Ignored);
    }

    #[test]
    fn escalation_without_contacts_aborts() {
        let mut m = monitor();
        m.observe(breach());
        m.acknowledge(AlertResponse::NeedHelp);
        let EscalationStep::Aborted(notice) = m.begin_escalation(0) else {
            panic!("expected abort");
        };
        assert_eq!(notice.title, "SOS Failed: No Contacts");
        assert_eq!(m.phase(), SosPhase::Monitoring);
    }

    #[test]
    fn escalation_with_location_builds_maps_link() {
        let mut m = monitor();
        m.observe(breach());
        m.acknowledge(AlertResponse::NeedHelp);
        assert_eq!(m.begin_escalation(2), EscalationStep::RequestLocation);

        let coords = Coordinates::new(12.97, 77.59).unwrap();
        let notice = m.complete_escalation(Ok(coords)).unwrap();
        assert_eq!(notice.title, "SOS ALERT TRIGGERED");
        assert!(notice
            .description
            .contains("https://www.google.com/maps?q=12.97,77.59"));
        assert_eq!(m.phase(), SosPhase::Monitoring);

        let toast = notice.into_toast();
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.duration_ms, SOS_TOAST_DURATION_MS);
    }

    #[test]
    fn escalation_degrades_without_location() {
        let mut m = monitor();
        m.observe(breach());
        m.acknowledge(AlertResponse::NeedHelp);
        m.begin_escalation(1);
        let notice = m
            .complete_escalation(Err(LocationFailure::PermissionDenied))
            .unwrap();
        assert!(notice.description.ends_with("(Location permission denied)"));
    }

    #[test]
    fn implausible_readings_are_ignored() {
        let mut m = monitor();
        let reading = Vitals {
            heart_rate: f64::NAN,
            ..Vitals::default()
        };
        assert_eq!(m.observe(reading), None);
        assert!((m.vitals().heart_rate - 75.0).abs() < f64::EPSILON);
    }
}
