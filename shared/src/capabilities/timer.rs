use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerPurpose {
    CrisisPause,
    VitalsTick,
    SosCountdown,
    BreathingPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId {
    pub purpose: TimerPurpose,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOperation {
    Start { id: TimerId, millis: u64 },
    Cancel { id: TimerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOutput {
    Fired,
    Cancelled,
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

/// One-shot timers run by the shell.
pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Capability<Ev> for Timer<Ev> {
    type Operation = TimerOperation;
    type MappedSelf<MappedEv> = Timer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Timer::new(self.context.map_event(f))
    }
}

impl<Ev> Timer<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn start<F>(&self, id: TimerId, after: Duration, make_event: F)
    where
        F: FnOnce(TimerOutput) -> Ev + Send + 'static,
    {
        let millis = u64::try_from(after.as_millis()).unwrap_or(u64::MAX);
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx
                .request_from_shell(TimerOperation::Start { id, millis })
                .await;
            ctx.update_app(make_event(output));
        });
    }

    pub fn cancel(&self, id: TimerId) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(TimerOperation::Cancel { id }).await;
        });
    }
}

/// Holds the live timer id for one purpose. Anything else that fires is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSlot {
    live: Option<TimerId>,
}

impl TimerSlot {
    #[must_use]
    pub fn live(&self) -> Option<TimerId> {
        self.live
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    crisis_pause: TimerSlot,
    vitals_tick: TimerSlot,
    sos_countdown: TimerSlot,
    breathing_phase: TimerSlot,
    next_generation: u64,
}

impl Timers {
    fn slot_mut(&mut self, purpose: TimerPurpose) -> &mut TimerSlot {
        match purpose {
            TimerPurpose::CrisisPause => &mut self.crisis_pause,
            TimerPurpose::VitalsTick => &mut self.vitals_tick,
            TimerPurpose::SosCountdown => &mut self.sos_countdown,
            TimerPurpose::BreathingPhase => &mut self.breathing_phase,
        }
    }

    #[must_use]
    pub fn slot(&self, purpose: TimerPurpose) -> TimerSlot {
        match purpose {
            TimerPurpose::CrisisPause => self.crisis_pause,
            TimerPurpose::VitalsTick => self.vitals_tick,
            TimerPurpose::SosCountdown => self.sos_countdown,
            TimerPurpose::BreathingPhase => self.breathing_phase,
        }
    }

    #[must_use]
    pub fn is_armed(&self, purpose: TimerPurpose) -> bool {
        self.slot(purpose).live.is_some()
    }

    /// Allocates a fresh id for `purpose`. Returns the new id and the id it
    /// replaced, which the caller should cancel.
    pub fn arm(&mut self, purpose: TimerPurpose) -> (TimerId, Option<TimerId>) {
        self.next_generation += 1;
        let id = TimerId {
            purpose,
            generation: self.next_generation,
        };
        let replaced = self.slot_mut(purpose).live.replace(id);
        (id, replaced)
    }

    /// Retires the live id for `purpose`, returning it for cancellation.
    pub fn disarm(&mut self, purpose: TimerPurpose) -> Option<TimerId> {
        self.slot_mut(purpose).live.take()
    }

    /// Accepts a fire for `id` if it is the live one, clearing the slot.
    pub fn accept(&mut self, id: TimerId) -> bool {
        let slot = self.slot_mut(id.purpose);
        if slot.live == Some(id) {
            slot.live = None;
            true
        } else {
            false
        }
    }
}
