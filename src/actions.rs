//! Value helpers for outbound commands that depend on the current state
//!
//! Both helpers work on the latest flushed value from the variable store; the
//! bridge actor reads and sends within one command so no batch flush can land
//! in between.

use std::ops::RangeInclusive;

use crate::state::SENTINEL_LEVEL;

/// Talk key state cycle (off, latch, momentary, auto)
pub const TALK_CYCLE: [i32; 4] = [0, 2, 3, 4];

/// Level range accepted by the device, in dB
pub const LEVEL_RANGE: RangeInclusive<i32> = -63..=12;

/// Next entry after `current` in `table`, wrapping around
///
/// A current value not found in the table (including the "unknown" sentinel)
/// restarts the cycle at the first entry. Returns `None` for an empty table.
pub fn cycle_next(current: i32, table: &[i32]) -> Option<i32> {
    let first = *table.first()?;
    match table.iter().position(|v| *v == current) {
        Some(index) => Some(table[(index + 1) % table.len()]),
        None => Some(first),
    }
}

/// `current + step`, clamped to `range`
///
/// Returns `None` when `current` is still the unreported level sentinel.
/// `-1` is a real level here, not the unknown marker.
pub fn step_clamped(current: i32, step: i32, range: &RangeInclusive<i32>) -> Option<i32> {
    if current == SENTINEL_LEVEL {
        return None;
    }
    let next = current.saturating_add(step);
    Some(next.clamp(*range.start(), *range.end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_advances_and_wraps() {
        assert_eq!(cycle_next(2, &TALK_CYCLE), Some(3));
        assert_eq!(cycle_next(4, &TALK_CYCLE), Some(0));
        assert_eq!(cycle_next(0, &TALK_CYCLE), Some(2));
    }

    #[test]
    fn test_cycle_from_unknown_value_starts_over() {
        assert_eq!(cycle_next(-1, &TALK_CYCLE), Some(0));
        assert_eq!(cycle_next(1, &TALK_CYCLE), Some(0));
        assert_eq!(cycle_next(1, &[]), None);
    }

    #[test]
    fn test_step_clamps_to_range() {
        assert_eq!(step_clamped(10, 5, &LEVEL_RANGE), Some(12));
        assert_eq!(step_clamped(-60, -10, &LEVEL_RANGE), Some(-63));
        assert_eq!(step_clamped(-20, 3, &LEVEL_RANGE), Some(-17));
    }

    #[test]
    fn test_step_from_sentinel_is_refused() {
        assert_eq!(step_clamped(-99, 1, &LEVEL_RANGE), None);
        assert_eq!(step_clamped(-1, 1, &LEVEL_RANGE), Some(0));
    }
}
