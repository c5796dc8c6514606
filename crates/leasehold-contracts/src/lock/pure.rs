//! Pure lease computations.
//!
//! Time is passed in explicitly so every function here is deterministic.
//! Arithmetic saturates instead of overflowing.

use std::time::Duration;

/// Check whether a lease has expired.
///
/// A lease is expired once `now` reaches its expiry.
#[inline]
pub fn is_lease_expired<T: PartialOrd>(expires_at: T, now: T) -> bool {
    now >= expires_at
}

/// Priority bonus earned by waiting.
///
/// One point per full `aging_interval` waited. A zero interval disables
/// aging.
#[inline]
pub fn aging_bonus(waited: Duration, aging_interval: Duration) -> i64 {
    let interval_ms = aging_interval.as_millis();
    if interval_ms == 0 {
        return 0;
    }
    i64::try_from(waited.as_millis() / interval_ms).unwrap_or(i64::MAX)
}

/// Priority a waiter competes with after aging.
#[inline]
pub fn effective_priority(priority: i64, waited: Duration, aging_interval: Duration) -> i64 {
    priority.saturating_add(aging_bonus(waited, aging_interval))
}

/// Queue entry as seen by the selection function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaiterView {
    /// Arrival sequence number; lower arrived earlier
    pub seq: u64,
    /// Requested priority
    pub priority: i64,
    /// Time spent waiting so far
    pub waited: Duration,
}

/// Pick the waiter to grant next.
///
/// Highest effective priority wins; ties go to the earliest arrival.
/// Returns the position of the winner in `waiters`.
pub fn select_next<I>(waiters: I, aging_interval: Duration) -> Option<usize>
where
    I: IntoIterator<Item = WaiterView>,
{
    waiters
        .into_iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let pa = effective_priority(a.priority, a.waited, aging_interval);
            let pb = effective_priority(b.priority, b.waited, aging_interval);
            pa.cmp(&pb).then_with(|| b.seq.cmp(&a.seq))
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn view(seq: u64, priority: i64, waited_ms: u64) -> WaiterView {
        WaiterView {
            seq,
            priority,
            waited: Duration::from_millis(waited_ms),
        }
    }

    #[test]
    fn expiry_is_inclusive() {
        assert!(is_lease_expired(10u64, 10));
        assert!(is_lease_expired(10u64, 11));
        assert!(!is_lease_expired(10u64, 9));
    }

    #[test]
    fn zero_interval_disables_aging() {
        assert_eq!(aging_bonus(Duration::from_secs(100), Duration::ZERO), 0);
    }

    #[test]
    fn bonus_counts_whole_intervals() {
        let interval = Duration::from_millis(100);
        assert_eq!(aging_bonus(Duration::from_millis(99), interval), 0);
        assert_eq!(aging_bonus(Duration::from_millis(250), interval), 2);
        assert_eq!(effective_priority(i64::MAX, Duration::from_secs(1), interval), i64::MAX);
    }

    #[test]
    fn highest_priority_then_fifo() {
        let waiters = [view(0, 5, 0), view(1, 5, 0), view(2, 10, 0)];
        assert_eq!(select_next(waiters, HOUR), Some(2));

        let waiters = [view(0, 5, 0), view(1, 5, 0)];
        assert_eq!(select_next(waiters, HOUR), Some(0));
    }

    #[test]
    fn aged_waiter_overtakes() {
        let interval = Duration::from_millis(10);
        // waited 50ms => effective 0 + 5, ties with the fresh priority 5 waiter
        // and wins on arrival order
        let waiters = [view(7, 0, 50), view(9, 5, 0)];
        assert_eq!(select_next(waiters, interval), Some(0));
    }

    #[test]
    fn empty_queue_selects_nothing() {
        assert_eq!(select_next(Vec::new(), HOUR), None);
    }

    proptest! {
        #[test]
        fn selected_waiter_is_never_outranked(
            entries in proptest::collection::vec((-5i64..5, 0u64..1_000), 1..16)
        ) {
            let interval = Duration::from_millis(100);
            let waiters: Vec<_> = entries
                .iter()
                .enumerate()
                .map(|(i, (p, w))| view(i as u64, *p, *w))
                .collect();
            let winner = waiters[select_next(waiters.clone(), interval).unwrap()];
            let best = effective_priority(winner.priority, winner.waited, interval);
            for other in &waiters {
                let p = effective_priority(other.priority, other.waited, interval);
                prop_assert!(p < best || (p == best && other.seq >= winner.seq));
            }
        }
    }
}
