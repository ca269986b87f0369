//! Per-tier byte accounting.
//!
//! The accountant is the single source of truth for budget enforcement:
//! every tier insert reserves capacity before storing and every removal
//! releases it afterwards, so the sum of entry sizes in a tier can never
//! drift past its budget even under concurrent inserts and evictions.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cache::record::Tier;

/// Usage counter and budget for one storage tier.
#[derive(Debug)]
struct TierAccount {
    used: AtomicUsize,
    budget: usize,
}

impl TierAccount {
    fn new(budget: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            budget,
        }
    }

    fn try_reserve(&self, bytes: usize) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                (next <= self.budget).then_some(next)
            })
            .is_ok()
    }

    fn release(&self, bytes: usize) {
        // Saturating on underflow: a release that exceeds usage indicates a
        // bookkeeping bug elsewhere, but must not wrap the counter.
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(bytes))
            })
            .ok();
    }

    fn reset(&self, bytes: usize) -> usize {
        self.used.swap(bytes, Ordering::AcqRel)
    }

    fn usage(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

/// Tracks byte usage for the basic and promoted tiers.
///
/// The generation tier holds no bytes; reservations against it always fail.
#[derive(Debug)]
pub struct SizeAccountant {
    basic: TierAccount,
    promoted: TierAccount,
}

impl SizeAccountant {
    pub fn new(basic_budget: usize, promoted_budget: usize) -> Self {
        Self {
            basic: TierAccount::new(basic_budget),
            promoted: TierAccount::new(promoted_budget),
        }
    }

    fn account(&self, tier: Tier) -> Option<&TierAccount> {
        match tier {
            Tier::Basic => Some(&self.basic),
            Tier::Promoted => Some(&self.promoted),
            Tier::Generated => None,
        }
    }

    /// Atomically reserve `bytes` in the tier, failing if the budget would be
    /// exceeded. Zero-byte reservations always succeed on accounted tiers.
    pub fn try_reserve(&self, tier: Tier, bytes: usize) -> bool {
        match self.account(tier) {
            Some(account) => account.try_reserve(bytes),
            None => false,
        }
    }

    /// Return previously reserved bytes to the tier.
    pub fn release(&self, tier: Tier, bytes: usize) {
        if let Some(account) = self.account(tier) {
            account.release(bytes);
        }
    }

    /// Replace the tier's usage wholesale, returning the previous value.
    /// Used when a tier's contents are swapped or cleared as a unit.
    pub fn reset(&self, tier: Tier, bytes: usize) -> usize {
        match self.account(tier) {
            Some(account) => account.reset(bytes),
            None => 0,
        }
    }

    pub fn usage(&self, tier: Tier) -> usize {
        self.account(tier).map_or(0, TierAccount::usage)
    }

    pub fn budget(&self, tier: Tier) -> usize {
        self.account(tier).map_or(0, |account| account.budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_up_to_budget() {
        let acct = SizeAccountant::new(100, 50);

        assert!(acct.try_reserve(Tier::Basic, 60));
        assert!(acct.try_reserve(Tier::Basic, 40));
        assert_eq!(acct.usage(Tier::Basic), 100);

        // Budget exhausted.
        assert!(!acct.try_reserve(Tier::Basic, 1));
    }

    #[test]
    fn test_release_frees_capacity() {
        let acct = SizeAccountant::new(100, 50);

        assert!(acct.try_reserve(Tier::Promoted, 50));
        assert!(!acct.try_reserve(Tier::Promoted, 10));

        acct.release(Tier::Promoted, 30);
        assert_eq!(acct.usage(Tier::Promoted), 20);
        assert!(acct.try_reserve(Tier::Promoted, 30));
    }

    #[test]
    fn test_tiers_are_independent() {
        let acct = SizeAccountant::new(100, 50);

        assert!(acct.try_reserve(Tier::Basic, 100));
        assert!(acct.try_reserve(Tier::Promoted, 50));
        assert_eq!(acct.usage(Tier::Basic), 100);
        assert_eq!(acct.usage(Tier::Promoted), 50);
    }

    #[test]
    fn test_generated_tier_holds_nothing() {
        let acct = SizeAccountant::new(100, 50);

        assert!(!acct.try_reserve(Tier::Generated, 1));
        assert_eq!(acct.usage(Tier::Generated), 0);
        assert_eq!(acct.budget(Tier::Generated), 0);
    }

    #[test]
    fn test_reset_returns_previous_usage() {
        let acct = SizeAccountant::new(100, 50);

        assert!(acct.try_reserve(Tier::Basic, 80));
        let previous = acct.reset(Tier::Basic, 25);
        assert_eq!(previous, 80);
        assert_eq!(acct.usage(Tier::Basic), 25);
    }

    #[test]
    fn test_release_never_underflows() {
        let acct = SizeAccountant::new(100, 50);

        assert!(acct.try_reserve(Tier::Basic, 10));
        acct.release(Tier::Basic, 1000);
        assert_eq!(acct.usage(Tier::Basic), 0);
    }

    #[test]
    fn test_concurrent_reservations_respect_budget() {
        use std::sync::Arc;

        let acct = Arc::new(SizeAccountant::new(1000, 0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let acct = acct.clone();
            handles.push(std::thread::spawn(move || {
                let mut reserved = 0usize;
                for _ in 0..100 {
                    if acct.try_reserve(Tier::Basic, 7) {
                        reserved += 7;
                    }
                }
                reserved
            }));
        }

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, acct.usage(Tier::Basic));
        assert!(acct.usage(Tier::Basic) <= 1000);
    }
}
