//! Per-key single-flight registry for detail generation.
//!
//! The first caller to miss on a key becomes the leader and runs the
//! generator; concurrent callers for the same key become followers and await
//! the leader's outcome instead of duplicating the work. If the leader is
//! dropped before completing, followers observe an abort and fall back to
//! generating on their own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::cache::record::{CacheKey, DetailRecord};

/// Shared outcome of one generation flight.
#[derive(Debug, Clone)]
pub enum FlightOutcome {
    Success(DetailRecord),
    Failed(String),
    TimedOut,
    /// The leader went away without producing an outcome.
    Aborted,
}

/// A follower's handle on an in-flight generation.
pub type Slot = watch::Receiver<Option<FlightOutcome>>;

/// Registry of in-flight generations, keyed by entity.
#[derive(Clone, Default)]
pub struct FlightGroup {
    inner: Arc<Mutex<HashMap<CacheKey, Slot>>>,
}

/// What joining a flight made you.
pub enum Flight {
    /// This caller runs the generation and must resolve the lease.
    Leader(FlightLease),
    /// Another caller is already generating; await its outcome.
    Follower(Slot),
}

impl FlightGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `key`, becoming leader if none is active.
    pub fn join(&self, key: &CacheKey) -> Flight {
        let mut inflight = self.inner.lock().expect("flight registry poisoned");

        if let Some(slot) = inflight.get(key) {
            return Flight::Follower(slot.clone());
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(key.clone(), rx);
        Flight::Leader(FlightLease {
            key: key.clone(),
            tx,
            group: self.clone(),
            resolved: false,
        })
    }

    fn retire(&self, key: &CacheKey) {
        self.inner
            .lock()
            .expect("flight registry poisoned")
            .remove(key);
    }

    /// Await a follower slot until the leader resolves it.
    pub async fn wait(mut slot: Slot) -> FlightOutcome {
        match slot.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone().unwrap_or(FlightOutcome::Aborted),
            // Sender gone without a value: treat as an abort.
            Err(_) => FlightOutcome::Aborted,
        }
    }
}

/// The leader's handle on a flight. Must be resolved with [`complete`];
/// dropping it unresolved broadcasts an abort so followers never hang.
///
/// [`complete`]: FlightLease::complete
pub struct FlightLease {
    key: CacheKey,
    tx: watch::Sender<Option<FlightOutcome>>,
    group: FlightGroup,
    resolved: bool,
}

impl FlightLease {
    /// Publish the flight's outcome and retire it from the registry.
    ///
    /// The registry entry is removed before the broadcast, so a caller
    /// arriving afterwards starts a fresh flight rather than reading a stale
    /// slot.
    pub fn complete(mut self, outcome: FlightOutcome) {
        self.group.retire(&self.key);
        let _ = self.tx.send(Some(outcome));
        self.resolved = true;
    }
}

impl Drop for FlightLease {
    fn drop(&mut self) {
        if !self.resolved {
            self.group.retire(&self.key);
            let _ = self.tx.send(Some(FlightOutcome::Aborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::record::BasicRecord;

    fn key() -> CacheKey {
        CacheKey::new("players", 9)
    }

    fn record() -> DetailRecord {
        DetailRecord {
            basic: BasicRecord {
                id: 9,
                category: "players".to_string(),
                name: "nine".to_string(),
                headline: "ninth".to_string(),
                tags: Vec::new(),
                updated_at: 0,
            },
            sections: Vec::new(),
            generated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_first_joiner_leads_second_follows() {
        let group = FlightGroup::new();

        let first = group.join(&key());
        assert!(matches!(first, Flight::Leader(_)));

        let second = group.join(&key());
        assert!(matches!(second, Flight::Follower(_)));
    }

    #[tokio::test]
    async fn test_follower_receives_leader_outcome() {
        let group = FlightGroup::new();

        let Flight::Leader(lease) = group.join(&key()) else {
            panic!("expected leader");
        };
        let Flight::Follower(slot) = group.join(&key()) else {
            panic!("expected follower");
        };

        let waiter = tokio::spawn(FlightGroup::wait(slot));
        lease.complete(FlightOutcome::Success(record()));

        match waiter.await.unwrap() {
            FlightOutcome::Success(r) => assert_eq!(r, record()),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_lease_aborts_followers() {
        let group = FlightGroup::new();

        let Flight::Leader(lease) = group.join(&key()) else {
            panic!("expected leader");
        };
        let Flight::Follower(slot) = group.join(&key()) else {
            panic!("expected follower");
        };

        drop(lease);

        assert!(matches!(
            FlightGroup::wait(slot).await,
            FlightOutcome::Aborted
        ));
    }

    #[tokio::test]
    async fn test_completed_flight_allows_a_new_leader() {
        let group = FlightGroup::new();

        let Flight::Leader(lease) = group.join(&key()) else {
            panic!("expected leader");
        };
        lease.complete(FlightOutcome::TimedOut);

        assert!(matches!(group.join(&key()), Flight::Leader(_)));
    }

    #[tokio::test]
    async fn test_distinct_keys_fly_independently() {
        let group = FlightGroup::new();

        let a = group.join(&CacheKey::new("players", 1));
        let b = group.join(&CacheKey::new("players", 2));
        assert!(matches!(a, Flight::Leader(_)));
        assert!(matches!(b, Flight::Leader(_)));
    }
}
