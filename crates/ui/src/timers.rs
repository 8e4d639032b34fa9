//! Settle-delay timers on a virtual clock.
//!
//! The shell is single-threaded: nothing fires until the host advances the
//! clock. Timers carry a plain action value instead of a callback; the owner
//! pops due actions and interprets them against its current state.

use std::time::Duration;

/// Timer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u32);

#[derive(Clone, Debug)]
struct Timer<T> {
    id: TimerId,
    /// Clock reading at which the timer is due.
    due: Duration,
    action: T,
}

/// Pending timers ordered by due time, ties broken by scheduling order.
#[derive(Clone, Debug)]
pub struct TimerQueue<T> {
    /// Current clock reading.
    now: Duration,
    /// Pending timers.
    timers: Vec<Timer<T>>,
    /// Timer ID counter.
    timer_counter: u32,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            timers: Vec::new(),
            timer_counter: 0,
        }
    }

    /// Current clock reading.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arm a timer `delay` from now.
    pub fn schedule(&mut self, delay: Duration, action: T) -> TimerId {
        self.timer_counter += 1;
        let id = TimerId(self.timer_counter);
        self.timers.push(Timer {
            id,
            due: self.now + delay,
            action,
        });
        id
    }

    /// Disarm a timer. Unknown ids are ignored.
    pub fn cancel(&mut self, id: TimerId) {
        self.timers.retain(|t| t.id != id);
    }

    /// Disarm every timer whose action matches.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) {
        self.timers.retain(|t| !pred(&t.action));
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// moving the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<T> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;

        let timer = self.timers.remove(index);
        if timer.due > self.now {
            self.now = timer.due;
        }
        Some(timer.action)
    }

    /// Move the clock forward to `to` without firing anything.
    pub fn set_now(&mut self, to: Duration) {
        if to > self.now {
            self.now = to;
        }
    }

    /// Due time of the next pending timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.due).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fires_in_due_order() {
        let mut q = TimerQueue::new();
        q.schedule(ms(500), "replay");
        q.schedule(ms(50), "restore");
        q.schedule(ms(50), "restore-target");

        assert_eq!(q.pop_due(ms(40)), None);
        assert_eq!(q.pop_due(ms(1000)), Some("restore"));
        assert_eq!(q.now(), ms(50));
        assert_eq!(q.pop_due(ms(1000)), Some("restore-target"));
        assert_eq!(q.pop_due(ms(1000)), Some("replay"));
        assert_eq!(q.now(), ms(500));
        assert!(q.is_empty());
    }

    #[test]
    fn test_schedule_relative_to_clock() {
        let mut q = TimerQueue::new();
        q.set_now(ms(100));
        q.schedule(ms(50), 1);
        assert_eq!(q.next_due(), Some(ms(150)));
        assert_eq!(q.pop_due(ms(149)), None);
        assert_eq!(q.pop_due(ms(150)), Some(1));
    }

    #[test]
    fn test_cancel() {
        let mut q = TimerQueue::new();
        let a = q.schedule(ms(10), 'a');
        q.schedule(ms(10), 'b');
        q.schedule(ms(10), 'c');
        q.cancel(a);
        q.cancel_where(|c| *c == 'c');
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_due(ms(10)), Some('b'));
    }

    #[test]
    fn test_clock_never_goes_backwards() {
        let mut q: TimerQueue<()> = TimerQueue::new();
        q.set_now(ms(30));
        q.set_now(ms(10));
        assert_eq!(q.now(), ms(30));
    }
}
