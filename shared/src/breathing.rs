use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BreathingPhase {
    #[default]
    BreatheIn,
    HoldIn,
    BreatheOut,
    HoldOut,
}

impl BreathingPhase {
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::BreatheIn => Self::HoldIn,
            Self::HoldIn => Self::BreatheOut,
            Self::BreatheOut => Self::HoldOut,
            Self::HoldOut => Self::BreatheIn,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BreatheIn => "Breathe In",
            Self::HoldIn | Self::HoldOut => "Hold",
            Self::BreatheOut => "Breathe Out",
        }
    }

    /// Whether the guide circle should be animating (growing or shrinking).
    #[must_use]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::BreatheIn | Self::BreatheOut)
    }
}

/// Box breathing guide. Advanced by a timer owned by the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreathingExercise {
    phase: Option<BreathingPhase>,
    cycles: u32,
}

impl BreathingExercise {
    #[must_use]
    pub fn phase(&self) -> Option<BreathingPhase> {
        self.phase
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase.is_some()
    }

    #[must_use]
    pub fn completed_cycles(&self) -> u32 {
        self.cycles
    }

    pub fn start(&mut self) {
        self.phase = Some(BreathingPhase::BreatheIn);
        self.cycles = 0;
    }

    pub fn stop(&mut self) {
        self.phase = None;
    }

    /// Moves to the next phase. Returns `None` if the exercise is not running.
    pub fn advance(&mut self) -> Option<BreathingPhase> {
        let next = self.phase?.next();
        if next == BreathingPhase::BreatheIn {
            self.cycles += 1;
        }
        self.phase = Some(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_four_phases() {
        let mut ex = BreathingExercise::default();
        assert_eq!(ex.advance(), None);

        ex.start();
        let labels: Vec<_> = (0..4).filter_map(|_| ex.advance()).map(BreathingPhase::label).collect();
        assert_eq!(labels, ["Hold", "Breathe Out", "Hold", "Breathe In"]);
        assert_eq!(ex.completed_cycles(), 1);
    }

    #[test]
    fn stop_clears_phase() {
        let mut ex = BreathingExercise::default();
        ex.start();
        ex.stop();
        assert!(!ex.is_running());
        assert_eq!(ex.advance(), None);
    }
}
