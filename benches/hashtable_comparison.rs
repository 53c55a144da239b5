use core::hash::Hash;
use core::hash::Hasher;
use core::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::BenchmarkGroup;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::measurement::WallTime;
use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Zipf;
use siphasher::sip::SipHasher;

trait KeyValuePair: Clone {
    fn new(key: u64) -> Self;

    fn hash_key(&self) -> u64;
    fn eq_key(&self, other: &Self) -> bool;
}

fn sip_hash(value: impl Hash) -> u64 {
    let mut hasher = SipHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone)]
struct SmallItem {
    key: u64,
}

impl KeyValuePair for SmallItem {
    fn new(key: u64) -> Self {
        black_box(Self { key })
    }

    fn hash_key(&self) -> u64 {
        sip_hash(self.key)
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Clone)]
struct StringItem {
    key: String,
    _value: u64,
}

impl KeyValuePair for StringItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key: format!("key_{:016X}", key),
            _value: key,
        })
    }

    fn hash_key(&self) -> u64 {
        sip_hash(&self.key)
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Clone)]
struct LargeItem {
    key: u64,
    _payload: [u8; 256],
}

impl KeyValuePair for LargeItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key,
            _payload: [key as u8; 256],
        })
    }

    fn hash_key(&self) -> u64 {
        sip_hash(self.key)
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// The operations every workload needs, implemented for both tables so each
/// workload is written once.
trait BenchTable<T: KeyValuePair> {
    const NAME: &'static str;

    fn with_capacity(capacity: usize) -> Self;
    fn capacity(&self) -> usize;
    fn insert_if_absent(&mut self, hash: u64, item: T) -> bool;
    fn contains(&self, hash: u64, item: &T) -> bool;
    fn remove(&mut self, hash: u64, item: &T) -> Option<T>;
    fn sum_lens(&self) -> usize;
}

impl<T: KeyValuePair> BenchTable<T> for swiss_hash::HashTable<T> {
    const NAME: &'static str = "swiss_hash";

    fn with_capacity(capacity: usize) -> Self {
        swiss_hash::HashTable::with_capacity(capacity)
    }

    fn capacity(&self) -> usize {
        swiss_hash::HashTable::capacity(self)
    }

    fn insert_if_absent(&mut self, hash: u64, item: T) -> bool {
        match self.entry(hash, |v| v.eq_key(&item), |v| v.hash_key()) {
            swiss_hash::hash_table::Entry::Vacant(entry) => {
                black_box(entry.insert(item));
                true
            }
            swiss_hash::hash_table::Entry::Occupied(_) => false,
        }
    }

    fn contains(&self, hash: u64, item: &T) -> bool {
        self.find(hash, |v| v.eq_key(item)).is_some()
    }

    fn remove(&mut self, hash: u64, item: &T) -> Option<T> {
        swiss_hash::HashTable::remove(self, hash, |v| v.eq_key(item))
    }

    fn sum_lens(&self) -> usize {
        self.iter().map(|v| black_box(v).hash_key() as usize & 1).sum()
    }
}

impl<T: KeyValuePair> BenchTable<T> for hashbrown::HashTable<T> {
    const NAME: &'static str = "hashbrown";

    fn with_capacity(capacity: usize) -> Self {
        hashbrown::HashTable::with_capacity(capacity)
    }

    fn capacity(&self) -> usize {
        hashbrown::HashTable::capacity(self)
    }

    fn insert_if_absent(&mut self, hash: u64, item: T) -> bool {
        match self.entry(hash, |v| v.eq_key(&item), |v| v.hash_key()) {
            hashbrown::hash_table::Entry::Vacant(entry) => {
                black_box(entry.insert(item));
                true
            }
            hashbrown::hash_table::Entry::Occupied(_) => false,
        }
    }

    fn contains(&self, hash: u64, item: &T) -> bool {
        self.find(hash, |v| v.eq_key(item)).is_some()
    }

    fn remove(&mut self, hash: u64, item: &T) -> Option<T> {
        match self.find_entry(hash, |v| v.eq_key(item)) {
            Ok(entry) => Some(entry.remove().0),
            Err(_) => None,
        }
    }

    fn sum_lens(&self) -> usize {
        self.iter().map(|v| black_box(v).hash_key() as usize & 1).sum()
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 12),
    (1 << 14),
    (1 << 16),
    (1 << 18),
];

fn random_items<T: KeyValuePair>(count: usize) -> Vec<(u64, T)> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| {
            let item = T::new(rng.try_next_u64().unwrap());
            (item.hash_key(), item)
        })
        .collect()
}

fn shuffled<T: Clone>(items: &[T]) -> Vec<T> {
    let mut items = items.to_vec();
    items.shuffle(&mut SmallRng::from_os_rng());
    items
}

fn filled<T: KeyValuePair, Table: BenchTable<T>>(items: &[(u64, T)]) -> Table {
    let mut table = Table::with_capacity(0);
    for (hash, item) in items {
        table.insert_if_absent(*hash, item.clone());
    }
    table
}

fn group_for<'a>(c: &'a mut Criterion, name: &str) -> BenchmarkGroup<'a, WallTime> {
    let mut group = c.benchmark_group(name);
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    group
}

fn insert_random<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    size: usize,
    preallocate: bool,
) {
    let items = random_items::<T>(Table::with_capacity(size).capacity());
    group.throughput(Throughput::Elements(items.len() as u64));
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || shuffled(&items),
            |items| {
                let mut table = Table::with_capacity(if preallocate { items.len() } else { 0 });
                for (hash, item) in items {
                    table.insert_if_absent(hash, item);
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert<T: KeyValuePair>(c: &mut Criterion, max_size: usize, preallocate: bool) {
    let mut group = group_for(
        c,
        &format!(
            "insert_random{}_{}",
            if preallocate { "_preallocated" } else { "" },
            core::any::type_name::<T>()
        ),
    );
    for &size in &SIZES[..=max_size] {
        insert_random::<T, swiss_hash::HashTable<T>>(&mut group, size, preallocate);
        insert_random::<T, hashbrown::HashTable<T>>(&mut group, size, preallocate);
    }
    group.finish();
}

fn find_hit_miss<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    size: usize,
) {
    let present = random_items::<T>(size);
    let absent = random_items::<T>(size);
    let table: Table = filled(&present);
    let mut probes: Vec<_> = present.iter().chain(absent.iter()).cloned().collect();
    probes.shuffle(&mut SmallRng::from_os_rng());

    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function(Table::NAME, |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for (hash, item) in &probes {
                hits += table.contains(*hash, item) as usize;
            }
            black_box(hits)
        })
    });
}

fn bench_find_hit_miss<T: KeyValuePair>(c: &mut Criterion, max_size: usize) {
    let mut group = group_for(
        c,
        &format!("find_hit_miss_{}", core::any::type_name::<T>()),
    );
    for &size in &SIZES[..=max_size] {
        find_hit_miss::<T, swiss_hash::HashTable<T>>(&mut group, size);
        find_hit_miss::<T, hashbrown::HashTable<T>>(&mut group, size);
    }
    group.finish();
}

/// Repeatedly removes and reinserts keys at a steady size, which exercises
/// tombstone reuse and same-capacity rehashing.
fn churn<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    size: usize,
) {
    let resident = random_items::<T>(size);
    let fresh = random_items::<T>(size);

    group.throughput(Throughput::Elements(size as u64 * 2));
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || filled::<T, Table>(&resident),
            |mut table| {
                for ((old_hash, old), (new_hash, new)) in resident.iter().zip(fresh.iter()) {
                    black_box(table.remove(*old_hash, old));
                    table.insert_if_absent(*new_hash, new.clone());
                }
                black_box(table)
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_churn<T: KeyValuePair>(c: &mut Criterion, max_size: usize) {
    let mut group = group_for(c, &format!("churn_{}", core::any::type_name::<T>()));
    for &size in &SIZES[..=max_size] {
        churn::<T, swiss_hash::HashTable<T>>(&mut group, size);
        churn::<T, hashbrown::HashTable<T>>(&mut group, size);
    }
    group.finish();
}

/// Insert, lookup and remove drawn from a Zipf distribution over a key pool,
/// so a few hot keys dominate.
fn mixed_zipf<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    size: usize,
) {
    let pool = random_items::<T>(size);
    let zipf = Zipf::new(size as f64, 1.1).unwrap();
    let mut rng = SmallRng::from_os_rng();
    let operations: Vec<(u8, usize)> = (0..size * 2)
        .map(|_| {
            let index = (rng.sample(zipf) as usize).saturating_sub(1).min(size - 1);
            (rng.random_range(0..10), index)
        })
        .collect();

    group.throughput(Throughput::Elements(operations.len() as u64));
    group.bench_function(Table::NAME, |b| {
        b.iter_batched(
            || Table::with_capacity(0),
            |mut table| {
                for &(op, index) in &operations {
                    let (hash, item) = &pool[index];
                    match op {
                        0..=3 => {
                            table.insert_if_absent(*hash, item.clone());
                        }
                        4..=8 => {
                            black_box(table.contains(*hash, item));
                        }
                        _ => {
                            black_box(table.remove(*hash, item));
                        }
                    }
                }
                black_box(table)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_mixed_zipf<T: KeyValuePair>(c: &mut Criterion, max_size: usize) {
    let mut group = group_for(c, &format!("mixed_zipf_{}", core::any::type_name::<T>()));
    for &size in &SIZES[..=max_size] {
        mixed_zipf::<T, swiss_hash::HashTable<T>>(&mut group, size);
        mixed_zipf::<T, hashbrown::HashTable<T>>(&mut group, size);
    }
    group.finish();
}

fn iteration<T: KeyValuePair, Table: BenchTable<T>>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    size: usize,
) {
    let table: Table = filled(&random_items::<T>(size));
    group.throughput(Throughput::Elements(size as u64));
    group.bench_function(Table::NAME, |b| b.iter(|| black_box(table.sum_lens())));
}

fn bench_iteration<T: KeyValuePair>(c: &mut Criterion, max_size: usize) {
    let mut group = group_for(c, &format!("iteration_{}", core::any::type_name::<T>()));
    for &size in &SIZES[..=max_size] {
        iteration::<T, swiss_hash::HashTable<T>>(&mut group, size);
        iteration::<T, hashbrown::HashTable<T>>(&mut group, size);
    }
    group.finish();
}

fn bench_map_add(c: &mut Criterion) {
    let mut group = group_for(c, "map_add_duplicates");
    let keys: Vec<u64> = (0..1u64 << 14).map(|k| k % 4096).collect();

    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("swiss_hash", |b| {
        b.iter(|| {
            let mut map = swiss_hash::HashMap::new();
            for &k in &keys {
                black_box(map.add(k, k).inserted());
            }
            black_box(map)
        })
    });
    group.bench_function("hashbrown", |b| {
        b.iter(|| {
            let mut map = hashbrown::HashMap::new();
            for &k in &keys {
                let inserted = match map.entry(k) {
                    hashbrown::hash_map::Entry::Occupied(_) => false,
                    hashbrown::hash_map::Entry::Vacant(entry) => {
                        entry.insert(k);
                        true
                    }
                };
                black_box(inserted);
            }
            black_box(map)
        })
    });
    group.finish();
}

fn benches(c: &mut Criterion) {
    bench_insert::<SmallItem>(c, 4, false);
    bench_insert::<StringItem>(c, 4, false);
    bench_insert::<LargeItem>(c, 2, false);
    bench_insert::<SmallItem>(c, 4, true);
    bench_insert::<StringItem>(c, 4, true);
    bench_find_hit_miss::<SmallItem>(c, 4);
    bench_find_hit_miss::<StringItem>(c, 4);
    bench_find_hit_miss::<LargeItem>(c, 2);
    bench_churn::<SmallItem>(c, 4);
    bench_churn::<StringItem>(c, 4);
    bench_mixed_zipf::<SmallItem>(c, 4);
    bench_mixed_zipf::<StringItem>(c, 4);
    bench_iteration::<SmallItem>(c, 4);
    bench_iteration::<LargeItem>(c, 2);
    bench_map_add(c);
}

criterion_group!(comparison, benches);
criterion_main!(comparison);
