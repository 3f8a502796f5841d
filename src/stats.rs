//! 统计模块
//! 工作线程本地计数、跨线程汇总以及最终报告

use crate::config::{AccessPattern, BenchConfig, Protocol};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 工作线程本地计数器，只由所属线程修改
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkerCounters {
    pub success: u64,
    pub not_found: u64,
    pub errors: u64,
    pub populated: u64,
    pub populate_failed: u64,
}

impl WorkerCounters {
    /// 基准阶段发出的查询数
    #[inline]
    pub fn queries(&self) -> u64 {
        self.success + self.not_found + self.errors
    }

    /// 完成的查询数（命中 + 未找到）
    #[inline]
    pub fn completed(&self) -> u64 {
        self.success + self.not_found
    }
}

/// 全局汇总计数，仅通过原子加法更新
#[derive(Debug, Default)]
pub struct AggregateStats {
    queries: AtomicU64,
    success: AtomicU64,
    not_found: AtomicU64,
    errors: AtomicU64,
    populated: AtomicU64,
    populate_failed: AtomicU64,
}

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把一个工作线程的计数并入汇总
    pub fn absorb(&self, c: &WorkerCounters) {
        // 线程 join 之后才读取，Relaxed 足够
        self.queries.fetch_add(c.queries(), Ordering::Relaxed);
        self.success.fetch_add(c.success, Ordering::Relaxed);
        self.not_found.fetch_add(c.not_found, Ordering::Relaxed);
        self.errors.fetch_add(c.errors, Ordering::Relaxed);
        self.populated.fetch_add(c.populated, Ordering::Relaxed);
        self.populate_failed.fetch_add(c.populate_failed, Ordering::Relaxed);
    }

    /// 读取当前汇总值
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            populated: self.populated.load(Ordering::Relaxed),
            populate_failed: self.populate_failed.load(Ordering::Relaxed),
        }
    }
}

/// 汇总计数的只读快照
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub queries: u64,
    pub success: u64,
    pub not_found: u64,
    pub errors: u64,
    pub populated: u64,
    pub populate_failed: u64,
}

/// 控制线程在各屏障前后记录的时间点
#[derive(Clone, Copy, Debug)]
pub struct PhaseClock {
    started: Instant,
    populated: Option<Instant>,
    bench_start: Option<Instant>,
    bench_end: Option<Instant>,
}

impl PhaseClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            populated: None,
            bench_start: None,
            bench_end: None,
        }
    }

    /// 屏障 A 之后
    pub fn mark_populated(&mut self) {
        self.populated = Some(Instant::now());
    }

    /// 屏障 B 之后
    pub fn mark_bench_start(&mut self) {
        self.bench_start = Some(Instant::now());
    }

    /// 屏障 C 之后
    pub fn mark_bench_end(&mut self) {
        self.bench_end = Some(Instant::now());
    }

    /// 连接、验证和填充的耗时
    pub fn populate_elapsed(&self) -> Duration {
        self.populated
            .map(|t| t.duration_since(self.started))
            .unwrap_or_default()
    }

    /// 基准阶段耗时
    pub fn bench_elapsed(&self) -> Duration {
        match (self.bench_start, self.bench_end) {
            (Some(s), Some(e)) => e.duration_since(s),
            _ => Duration::ZERO,
        }
    }
}

/// 吞吐量：`completed * 1000 / elapsed_ms`，耗时不足1ms按1ms计
pub fn throughput(completed: u64, elapsed: Duration) -> f64 {
    let ms = elapsed.as_millis().max(1) as f64;
    completed as f64 * 1000.0 / ms
}

/// 单个工作线程的结果
#[derive(Clone, Copy, Debug, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub counters: WorkerCounters,
}

/// 最终报告
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub protocol: Protocol,
    pub pattern: AccessPattern,
    pub nodes: usize,
    pub workers: usize,
    pub num_keys: u64,
    pub populated: u64,
    pub populate_skipped: u64,
    #[serde(rename = "populate_elapsed_ms")]
    #[serde(serialize_with = "as_millis")]
    pub populate_elapsed: Duration,
    #[serde(rename = "bench_elapsed_ms")]
    #[serde(serialize_with = "as_millis")]
    pub bench_elapsed: Duration,
    pub queries: u64,
    /// 各工作线程返回的完成数之和
    pub completed: u64,
    pub success: u64,
    pub not_found: u64,
    pub errors: u64,
    pub queries_per_sec: f64,
    pub expected_queries: Option<u64>,
    pub completion_ratio: Option<f64>,
    pub per_worker: Vec<WorkerReport>,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl Report {
    pub fn build(
        config: &BenchConfig,
        num_keys: u64,
        stats: StatsSnapshot,
        clock: &PhaseClock,
        per_worker: Vec<WorkerReport>,
    ) -> Self {
        let completed = per_worker.iter().map(|w| w.counters.completed()).sum();
        let bench_elapsed = clock.bench_elapsed();
        let expected_queries = config.expected_queries();
        Self {
            protocol: config.protocol,
            pattern: config.pattern,
            nodes: config.node_count(),
            workers: config.num_workers,
            num_keys,
            populated: stats.populated,
            populate_skipped: stats.populate_failed,
            populate_elapsed: clock.populate_elapsed(),
            bench_elapsed,
            queries: stats.queries,
            completed,
            success: stats.success,
            not_found: stats.not_found,
            errors: stats.errors,
            queries_per_sec: throughput(completed, bench_elapsed),
            expected_queries,
            completion_ratio: expected_queries.map(|e| stats.queries as f64 / e as f64),
            per_worker,
        }
    }

    /// 以 JSON 格式写入文件
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Load Benchmark Report ===")?;
        writeln!(
            f,
            "nodes: {}  workers: {}  protocol: {:?}  pattern: {:?}",
            self.nodes, self.workers, self.protocol, self.pattern
        )?;
        writeln!(f, "keys targeted: {}", self.num_keys)?;
        writeln!(
            f,
            "populated: {} added, {} skipped in {:.3} s",
            self.populated,
            self.populate_skipped,
            self.populate_elapsed.as_secs_f64()
        )?;
        writeln!(
            f,
            "Elapsed time: {}.{:09} seconds",
            self.bench_elapsed.as_secs(),
            self.bench_elapsed.subsec_nanos()
        )?;
        writeln!(f, "benchmark took {} ms", self.bench_elapsed.as_millis())?;
        writeln!(f, "benchmark took {:.0} queries / second", self.queries_per_sec)?;
        writeln!(
            f,
            "queries: {} (success {}, not found {}, errors {})",
            self.queries, self.success, self.not_found, self.errors
        )?;
        match (self.expected_queries, self.completion_ratio) {
            (Some(expected), Some(ratio)) => writeln!(
                f,
                "benchmark executed {} / {} queries ({:.2}%)",
                self.queries,
                expected,
                ratio * 100.0
            ),
            _ => writeln!(f, "benchmark executed {} queries (unbounded)", self.queries),
        }
    }
}
