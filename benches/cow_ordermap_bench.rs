use cow_ordermap::CowOrderMap;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("cow_ordermap_insert_10k", |b| {
        b.iter_batched(
            CowOrderMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("cow_ordermap_get_hit", |b| {
        let mut m = CowOrderMap::new();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.insert(k.clone(), i as u64).unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("cow_ordermap_get_miss", |b| {
        let mut m = CowOrderMap::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.insert(key(x), i as u64).unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            let k = key(miss.next().unwrap());
            black_box(m.get(k.as_str()));
        })
    });
}

// Cost of the first write after cloning: one state clone plus the write.
fn bench_clone_then_first_write(c: &mut Criterion) {
    c.bench_function("cow_ordermap_clone_first_write_10k", |b| {
        let mut m = CowOrderMap::new();
        for (i, x) in lcg(3).take(10_000).enumerate() {
            m.insert(key(x), i as u64).unwrap();
        }
        b.iter_batched(
            || m.clone(),
            |mut n| {
                n.insert(key(0), 0).unwrap();
                black_box(n)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("cow_ordermap_merge_1k_into_10k", |b| {
        let mut base = CowOrderMap::new();
        for (i, x) in lcg(5).take(10_000).enumerate() {
            base.insert(key(x), i as u64).unwrap();
        }
        let mut other = CowOrderMap::new();
        for (i, x) in lcg(9).take(1_000).enumerate() {
            other.insert(key(x), i as u64).unwrap();
        }
        b.iter_batched(
            || base.clone(),
            |mut m| {
                m.merge(&other).unwrap();
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_get_hit,
    bench_get_miss,
    bench_clone_then_first_write,
    bench_merge
);
criterion_main!(benches);
