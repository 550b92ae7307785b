use crate::types::Tick;

/// Fires once every `period` host ticks. Starts due, so the first tick after
/// construction (or after load) runs a pass immediately.
pub(crate) struct TickTimer {
    period: Tick,
    next: Tick,
}

impl TickTimer {
    pub(crate) fn new(period: Tick) -> Self {
        Self {
            period: period.max(1),
            next: 0,
        }
    }

    /// True when the timer is due; re-arms for one period from `now`.
    pub(crate) fn ring(&mut self, now: Tick) -> bool {
        if now >= self.next {
            self.next = now + self.period;
            return true;
        }
        false
    }
}
