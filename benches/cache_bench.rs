//! Benchmarks for the record cache subsystem.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use record_cache_tier::cache::accountant::SizeAccountant;
use record_cache_tier::cache::codec::RecordCodec;
use record_cache_tier::cache::popularity::PopularityTracker;
use record_cache_tier::cache::promoted::PromotionCache;
use record_cache_tier::cache::record::{
    AnalysisSection, BasicRecord, CacheKey, DetailRecord,
};

fn detail(id: u64) -> DetailRecord {
    DetailRecord {
        basic: BasicRecord {
            id,
            category: "players".to_string(),
            name: format!("player-{id}"),
            headline: format!("benchmark headline for player {id}"),
            tags: vec!["bench".to_string()],
            updated_at: 1_700_000_000,
        },
        sections: (0..4)
            .map(|section| AnalysisSection {
                title: format!("section-{section}"),
                body: format!("analysis body {section} for player {id} ").repeat(16),
                score: section as f64 / 4.0,
            })
            .collect(),
        generated_at: 1_700_000_500,
    }
}

fn bench_codec_roundtrip(c: &mut Criterion) {
    let codec = RecordCodec::default();
    let record = detail(1);
    let payload = codec.encode(&record).unwrap();

    c.bench_function("codec_encode_detail", |b| {
        b.iter(|| {
            let encoded = codec.encode(black_box(&record)).unwrap();
            black_box(encoded);
        })
    });

    c.bench_function("codec_decode_detail", |b| {
        b.iter(|| {
            let decoded: DetailRecord = codec.decode(black_box(&payload)).unwrap();
            black_box(decoded);
        })
    });
}

fn bench_promotion_churn(c: &mut Criterion) {
    let codec = RecordCodec::default();
    let probe_size = codec.encode(&detail(0)).unwrap().len();

    c.bench_function("promotion_insert_with_eviction_1k", |b| {
        b.iter(|| {
            // Budget for ~32 entries so most inserts evict.
            let accountant = SizeAccountant::new(0, probe_size * 32);
            let mut cache = PromotionCache::new(codec);
            for id in 0..1_000u64 {
                let _ = cache.insert(
                    CacheKey::new("players", id),
                    black_box(&detail(id)),
                    &accountant,
                );
            }
            black_box(cache.len());
        })
    });
}

fn bench_promoted_get(c: &mut Criterion) {
    let codec = RecordCodec::default();
    let accountant = SizeAccountant::new(0, 1 << 24);
    let mut cache = PromotionCache::new(codec);
    for id in 0..100u64 {
        cache
            .insert(CacheKey::new("players", id), &detail(id), &accountant)
            .unwrap();
    }

    c.bench_function("promoted_get_hot_100", |b| {
        b.iter(|| {
            for id in 0..100u64 {
                let record = cache.get(&CacheKey::new("players", id), &accountant);
                black_box(record);
            }
        })
    });
}

fn bench_popularity_tracking(c: &mut Criterion) {
    c.bench_function("popularity_record_access_10k", |b| {
        b.iter(|| {
            let mut tracker =
                PopularityTracker::new(3, std::time::Duration::from_secs(60));
            for id in 0..10_000u64 {
                let key = CacheKey::new("players", id % 512);
                tracker.record_access(&key);
                black_box(tracker.should_promote(&key));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_codec_roundtrip,
    bench_promotion_churn,
    bench_promoted_get,
    bench_popularity_tracking,
);
criterion_main!(benches);
