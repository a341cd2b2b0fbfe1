//! Update batcher - coalescing queues in front of the variable store
//!
//! Two independent queues keyed by variable name, last write wins inside a
//! window:
//!
//! - **normal** state (talk, call, cue...) is debounced: every update pushes
//!   the flush back, so a burst settles and flushes once.
//! - **high-frequency** telemetry (levels, gains) is throttled: the first
//!   update arms the timer and later ones ride along, so a fader move flushes
//!   at a fixed cadence rather than being deferred forever.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

use super::timer::{DebounceTimer, ThrottleTimer};

/// Which queue a flush came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Normal,
    HighFrequency,
}

/// Coalesced updates released by one timer expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushBatch {
    pub kind: QueueKind,
    pub updates: Vec<(String, i32)>,
}

/// Debounced normal queue plus throttled high-frequency queue
#[derive(Debug)]
pub struct UpdateBatcher {
    normal: HashMap<String, i32>,
    high_frequency: HashMap<String, i32>,
    debounce: DebounceTimer,
    throttle: ThrottleTimer,
}

impl UpdateBatcher {
    pub fn new(debounce: Duration, throttle: Duration) -> Self {
        Self {
            normal: HashMap::new(),
            high_frequency: HashMap::new(),
            debounce: DebounceTimer::new(debounce),
            throttle: ThrottleTimer::new(throttle),
        }
    }

    /// Queue an update
    pub fn collect(&mut self, key: String, value: i32, high_frequency: bool, now: Instant) {
        if high_frequency {
            self.high_frequency.insert(key, value);
            self.throttle.start_if_idle(now);
        } else {
            self.normal.insert(key, value);
            self.debounce.restart(now);
        }
    }

    /// Release every queue whose timer has expired, earliest expiry first
    pub fn poll(&mut self, now: Instant) -> Vec<FlushBatch> {
        let mut due = Vec::with_capacity(2);
        if let Some(deadline) = self.debounce.deadline() {
            if self.debounce.fire(now) {
                due.push((deadline, QueueKind::Normal));
            }
        }
        if let Some(deadline) = self.throttle.deadline() {
            if self.throttle.fire(now) {
                due.push((deadline, QueueKind::HighFrequency));
            }
        }
        due.sort_by_key(|(deadline, _)| *deadline);

        due.into_iter()
            .map(|(_, kind)| {
                let queue = match kind {
                    QueueKind::Normal => &mut self.normal,
                    QueueKind::HighFrequency => &mut self.high_frequency,
                };
                let updates: Vec<(String, i32)> = queue.drain().collect();
                trace!("Flushing {:?} queue ({} updates)", kind, updates.len());
                FlushBatch { kind, updates }
            })
            .collect()
    }

    /// Earliest pending flush
    pub fn next_deadline(&self) -> Option<Instant> {
        super::timer::earliest([self.debounce.deadline(), self.throttle.deadline()])
    }

    /// Drop everything queued and disarm both timers
    pub fn cancel(&mut self) {
        self.normal.clear();
        self.high_frequency.clear();
        self.debounce.cancel();
        self.throttle.cancel();
    }

    pub fn pending(&self) -> usize {
        self.normal.len() + self.high_frequency.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn batcher() -> UpdateBatcher {
        UpdateBatcher::new(ms(3), ms(350))
    }

    #[test]
    fn test_burst_of_normal_updates_flushes_once_with_last_value() {
        let t0 = Instant::now();
        let mut b = batcher();

        for (i, value) in [0, 2, 3, 4, 2].into_iter().enumerate() {
            b.collect("state_talk_ch1".into(), value, false, t0 + ms(i as u64));
        }

        // Last update at t0+4ms, flush due at t0+7ms
        assert!(b.poll(t0 + ms(6)).is_empty());
        let flushed = b.poll(t0 + ms(7));
        assert_eq!(
            flushed,
            vec![FlushBatch {
                kind: QueueKind::Normal,
                updates: vec![("state_talk_ch1".to_string(), 2)],
            }]
        );
        assert!(b.poll(t0 + ms(100)).is_empty());
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn test_sustained_level_stream_is_throttled() {
        let t0 = Instant::now();
        let mut b = batcher();
        let mut flushes = 0;

        // One level report per millisecond for two seconds
        for i in 0..2000u64 {
            let now = t0 + ms(i);
            b.collect("state_level_main".into(), (i % 60) as i32 - 60, true, now);
            flushes += b.poll(now).len();
        }

        // 2000ms / 350ms -> 5 complete windows
        assert_eq!(flushes, 5);
    }

    #[test]
    fn test_queues_are_independent() {
        let t0 = Instant::now();
        let mut b = batcher();

        b.collect("state_level_ch1".into(), -10, true, t0);
        b.collect("state_talk_ch1".into(), 2, false, t0 + ms(1));

        let first = b.poll(t0 + ms(4));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, QueueKind::Normal);
        assert_eq!(b.next_deadline(), Some(t0 + ms(350)));

        let second = b.poll(t0 + ms(350));
        assert_eq!(second[0].kind, QueueKind::HighFrequency);
        assert_eq!(second[0].updates, vec![("state_level_ch1".to_string(), -10)]);
    }

    #[test]
    fn test_both_due_flush_in_expiry_order() {
        let t0 = Instant::now();
        let mut b = UpdateBatcher::new(ms(5), ms(5));

        b.collect("state_level_ch1".into(), -10, true, t0);
        b.collect("state_talk_ch1".into(), 2, false, t0 + ms(2));

        let kinds: Vec<QueueKind> = b.poll(t0 + ms(10)).into_iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![QueueKind::HighFrequency, QueueKind::Normal]);
    }

    #[test]
    fn test_cancel_drops_pending_updates() {
        let t0 = Instant::now();
        let mut b = batcher();

        b.collect("state_talk_ch1".into(), 2, false, t0);
        b.collect("state_level_ch1".into(), -3, true, t0);
        b.cancel();

        assert_eq!(b.pending(), 0);
        assert_eq!(b.next_deadline(), None);
        assert!(b.poll(t0 + ms(1000)).is_empty());
    }
}
