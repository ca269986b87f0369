//! Integration tests for the tier 3 promotion cache and its LRU eviction.

use record_cache_tier::cache::accountant::SizeAccountant;
use record_cache_tier::cache::codec::RecordCodec;
use record_cache_tier::cache::promoted::{PromoteError, PromotionCache};
use record_cache_tier::cache::record::{
    AnalysisSection, BasicRecord, CacheKey, DetailRecord, Tier,
};

/// Low-compressibility body text so compressed sizes scale with word count.
fn body(seed: u64, words: usize) -> String {
    (0..words as u64)
        .map(|i| format!("{:016x}", (seed + i).wrapping_mul(0x9e37_79b9_7f4a_7c15)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn detail(id: u64, body: &str) -> DetailRecord {
    DetailRecord {
        basic: BasicRecord {
            id,
            category: "players".to_string(),
            name: format!("player-{id}"),
            headline: format!("headline {id}"),
            tags: Vec::new(),
            updated_at: 1_700_000_000,
        },
        sections: vec![AnalysisSection {
            title: "analysis".to_string(),
            body: body.to_string(),
            score: 0.25,
        }],
        generated_at: 1_700_000_500,
    }
}

fn key(id: u64) -> CacheKey {
    CacheKey::new("players", id)
}

fn size_of(codec: &RecordCodec, record: &DetailRecord) -> usize {
    codec.encode(record).unwrap().len()
}

#[test]
fn test_insert_evicts_oldest_access_first() {
    let codec = RecordCodec::default();

    // A and B are large, C mid-sized, D small, so evicting A always frees
    // enough room for D.
    let a = detail(1, &body(1, 32));
    let b = detail(2, &body(2, 32));
    let c = detail(3, &body(3, 16));
    let d = detail(4, &body(4, 2));

    let budget = size_of(&codec, &a) + size_of(&codec, &b) + size_of(&codec, &c);
    let accountant = SizeAccountant::new(0, budget);
    let mut cache = PromotionCache::new(codec);

    // Access order A, B, C leaves A the least recently used.
    cache.insert(key(1), &a, &accountant).unwrap();
    cache.insert(key(2), &b, &accountant).unwrap();
    cache.insert(key(3), &c, &accountant).unwrap();

    let evicted = cache.insert(key(4), &d, &accountant).unwrap();
    assert_eq!(evicted, vec![key(1)]);

    // Final resident set: B, C, D.
    assert!(!cache.contains(&key(1)));
    assert!(cache.contains(&key(2)));
    assert!(cache.contains(&key(3)));
    assert!(cache.contains(&key(4)));
}

#[test]
fn test_read_refreshes_recency_before_eviction() {
    let codec = RecordCodec::default();

    let a = detail(1, &body(1, 32));
    let b = detail(2, &body(2, 32));
    let c = detail(3, &body(3, 2));

    let budget = size_of(&codec, &a) + size_of(&codec, &b);
    let accountant = SizeAccountant::new(0, budget);
    let mut cache = PromotionCache::new(codec);

    cache.insert(key(1), &a, &accountant).unwrap();
    cache.insert(key(2), &b, &accountant).unwrap();

    // Reading A demotes B to least recently used.
    assert!(cache.get(&key(1), &accountant).is_some());

    let evicted = cache.insert(key(3), &c, &accountant).unwrap();
    assert_eq!(evicted, vec![key(2)]);
    assert!(cache.contains(&key(1)));
    assert!(cache.contains(&key(3)));
}

#[test]
fn test_budget_invariant_holds_after_every_insert() {
    let codec = RecordCodec::default();
    let probe = detail(0, &body(0, 20));
    let budget = size_of(&codec, &probe) * 4;
    let accountant = SizeAccountant::new(0, budget);
    let mut cache = PromotionCache::new(codec);

    for id in 0..100 {
        let record = detail(id, &body(id, 20));
        let _ = cache.insert(key(id), &record, &accountant);
        assert!(
            accountant.usage(Tier::Promoted) <= budget,
            "budget exceeded after insert {id}"
        );
    }
}

#[test]
fn test_record_larger_than_budget_is_rejected() {
    let codec = RecordCodec::default();
    let huge = detail(1, &body(1, 512));

    let accountant = SizeAccountant::new(0, 64);
    let mut cache = PromotionCache::new(codec);

    let result = cache.insert(key(1), &huge, &accountant);
    assert!(matches!(
        result,
        Err(PromoteError::BudgetExceeded { .. })
    ));
    assert!(cache.is_empty());
    assert_eq!(accountant.usage(Tier::Promoted), 0);
}

#[test]
fn test_eviction_continues_until_new_record_fits() {
    let codec = RecordCodec::default();

    // Four small records fill the budget; one record close to three of them
    // then forces several evictions at once.
    let smalls: Vec<DetailRecord> = (1..=4)
        .map(|id| detail(id, &body(id, 16)))
        .collect();
    let budget: usize = smalls.iter().map(|r| size_of(&codec, r)).sum();
    let accountant = SizeAccountant::new(0, budget);
    let mut cache = PromotionCache::new(codec);

    for (id, record) in (1..=4).zip(&smalls) {
        cache.insert(key(id), record, &accountant).unwrap();
    }

    let big = detail(9, &body(9, 44));
    assert!(size_of(&codec, &big) <= budget);

    let evicted = cache.insert(key(9), &big, &accountant).unwrap();
    assert!(evicted.len() >= 2, "expected multiple evictions");
    // Victims come off the cold end in order.
    assert_eq!(evicted[0], key(1));
    assert_eq!(evicted[1], key(2));
    assert!(cache.contains(&key(9)));
    assert!(accountant.usage(Tier::Promoted) <= budget);
}
