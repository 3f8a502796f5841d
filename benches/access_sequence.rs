use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

// 导入项目模块
use kv_loadbench::config::{AccessPattern, KeySpace};
use kv_loadbench::workload::{AccessSequence, assign, format_key, format_value};

/// 每次迭代抽取的键数量
const DRAWS: u64 = 10_000;

/// 节点数量
const NODES: usize = 4;

// ----------------------------------------------------------------
// 基准循环每次查询前的热路径：抽键 → 分区 → 格式化
// ----------------------------------------------------------------
fn bench_hot_path(c: &mut Criterion) {
    let key_space = KeySpace::from_memory_mb(16);

    let mut group = c.benchmark_group("Per-Query Key Generation");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(DRAWS));

    group.bench_function("uniform_xorshift", |b| {
        let mut seq = AccessSequence::new(0, key_space.num_keys);
        b.iter(|| {
            for _ in 0..DRAWS {
                let key_id = seq.next_key();
                black_box((assign(key_id, NODES), format_key(key_id)));
            }
        })
    });

    group.bench_function("zipf_0.99", |b| {
        let mut seq = AccessSequence::with_pattern(
            0,
            key_space.num_keys,
            AccessPattern::Zipf { exponent: 0.99 },
        )
        .expect("Failed to create Zipf distribution");
        b.iter(|| {
            for _ in 0..DRAWS {
                let key_id = seq.next_key();
                black_box((assign(key_id, NODES), format_key(key_id)));
            }
        })
    });

    group.finish();

    // 填充阶段每个键的格式化开销
    let mut group = c.benchmark_group("Population Formatting");
    group.throughput(Throughput::Elements(DRAWS));
    group.bench_function("key_and_value", |b| {
        b.iter(|| {
            for key_id in key_space.assigned(0, 1).take(DRAWS as usize) {
                black_box((format_key(key_id), format_value(key_id)));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_hot_path);
criterion_main!(benches);
