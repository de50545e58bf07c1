//! Bounded Relay Implementation

use crate::{OverflowPolicy, RelayError};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default relay capacity (frames)
pub const DEFAULT_CAPACITY: usize = 2;

/// Result of a non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Item stored without discarding anything
    Stored,
    /// Relay was full; one item was discarded per the overflow policy
    Dropped,
    /// Relay is closed; the item was discarded
    Closed,
}

/// Relay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Total items offered to the relay
    pub pushed: u64,
    /// Items discarded on overflow or after close
    pub dropped: u64,
    /// Items handed to the consumer
    pub taken: u64,
}

struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
    stats: RelayStats,
}

/// Fixed-capacity multi-thread relay with non-blocking push and timed take
pub struct FrameRelay<T> {
    slots: Mutex<Slots<T>>,
    available: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> FrameRelay<T> {
    /// Create a relay holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        info!("Creating frame relay: capacity={}, policy={:?}", capacity, policy);
        Self {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                stats: RelayStats::default(),
            }),
            available: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Create a relay with the default capacity, dropping the oldest item on overflow
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY, OverflowPolicy::DropOldest)
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        // A panicking holder cannot leave the deque half-updated, so the data stays usable.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer an item without blocking
    pub fn push(&self, item: T) -> PushOutcome {
        let mut slots = self.lock();
        slots.stats.pushed += 1;

        if slots.closed {
            slots.stats.dropped += 1;
            return PushOutcome::Closed;
        }

        let outcome = if slots.items.len() < self.capacity {
            slots.items.push_back(item);
            PushOutcome::Stored
        } else {
            slots.stats.dropped += 1;
            match self.policy {
                OverflowPolicy::DropOldest => {
                    slots.items.pop_front();
                    slots.items.push_back(item);
                }
                OverflowPolicy::DropNewest => drop(item),
            }
            PushOutcome::Dropped
        };

        drop(slots);
        self.available.notify_one();
        outcome
    }

    /// Take the oldest buffered item, waiting at most `timeout`
    ///
    /// Buffered items are still handed out after [`close`](Self::close);
    /// `Closed` is only reported once the relay is drained.
    pub fn try_take(&self, timeout: Duration) -> Result<T, RelayError> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.lock();

        loop {
            if let Some(item) = slots.items.pop_front() {
                slots.stats.taken += 1;
                return Ok(item);
            }
            if slots.closed {
                return Err(RelayError::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(RelayError::Timeout);
            }

            slots = self
                .available
                .wait_timeout(slots, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Close the relay; further pushes are discarded and waiting consumers wake up
    pub fn close(&self) {
        let mut slots = self.lock();
        if !slots.closed {
            slots.closed = true;
            debug!("Frame relay closed with {} buffered item(s)", slots.items.len());
        }
        drop(slots);
        self.available.notify_all();
    }

    /// Check whether the producer closed the relay
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy in effect
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Snapshot of the relay counters
    pub fn stats(&self) -> RelayStats {
        self.lock().stats
    }
}

impl<T> Default for FrameRelay<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    fn drain(relay: &FrameRelay<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Ok(item) = relay.try_take(Duration::ZERO) {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_stalled_consumer_keeps_most_recent() {
        let relay = FrameRelay::new(2, OverflowPolicy::DropOldest);

        let outcomes: Vec<_> = (1..=5).map(|i| relay.push(i)).collect();

        assert_eq!(outcomes[0], PushOutcome::Stored);
        assert_eq!(outcomes[1], PushOutcome::Stored);
        assert!(outcomes[2..].iter().all(|o| *o == PushOutcome::Dropped));
        assert_eq!(relay.len(), 2);
        assert_eq!(drain(&relay), vec![4, 5]);

        let stats = relay.stats();
        assert_eq!(stats.pushed, 5);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.taken, 2);
    }

    #[test]
    fn test_drop_newest_keeps_first_frames() {
        let relay = FrameRelay::new(2, OverflowPolicy::DropNewest);
        for i in 1..=5 {
            relay.push(i);
        }
        assert_eq!(drain(&relay), vec![1, 2]);
    }

    #[test]
    fn test_take_times_out_when_empty() {
        let relay: FrameRelay<u32> = FrameRelay::with_default_capacity();
        let started = Instant::now();

        assert_eq!(relay.try_take(Duration::from_millis(20)), Err(RelayError::Timeout));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_close_drains_before_reporting_closed() {
        let relay = FrameRelay::new(2, OverflowPolicy::DropOldest);
        relay.push(7);
        relay.close();

        assert_eq!(relay.push(8), PushOutcome::Closed);
        assert_eq!(relay.try_take(Duration::ZERO), Ok(7));
        assert_eq!(relay.try_take(Duration::from_secs(5)), Err(RelayError::Closed));
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let relay: Arc<FrameRelay<u32>> = Arc::new(FrameRelay::with_default_capacity());
        let consumer = {
            let relay = relay.clone();
            thread::spawn(move || relay.try_take(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        relay.close();

        assert_eq!(consumer.join().unwrap(), Err(RelayError::Closed));
    }

    #[test]
    fn test_cross_thread_delivery() {
        let relay: Arc<FrameRelay<u32>> = Arc::new(FrameRelay::new(4, OverflowPolicy::DropOldest));
        let producer = {
            let relay = relay.clone();
            thread::spawn(move || {
                relay.push(42);
                relay.close();
            })
        };

        assert_eq!(relay.try_take(Duration::from_secs(5)), Ok(42));
        producer.join().unwrap();
        assert_eq!(relay.try_take(Duration::from_secs(5)), Err(RelayError::Closed));
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(capacity in 1usize..8, pushes in 0u32..64) {
            let relay = FrameRelay::new(capacity, OverflowPolicy::DropOldest);
            for i in 0..pushes {
                relay.push(i);
                prop_assert!(relay.len() <= capacity);
            }

            let kept = drain(&relay);
            let expected: Vec<u32> = (pushes.saturating_sub(capacity as u32)..pushes).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
