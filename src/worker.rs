//! 工作线程模块
//! 连接 → 验证 → 填充 → 屏障A → 静置 → 屏障B → 基准 → 屏障C → 汇报

use crate::barrier::PhaseBarrier;
use crate::config::{
    BenchConfig, DEADLINE_CHECK_INTERVAL, KeySpace, PROGRESS_STEPS, messages, validation,
};
use crate::error::{AppError, Result};
use crate::stats::{AggregateStats, WorkerCounters, WorkerReport};
use crate::store::{Connector, StoreClient, StoreError};
use crate::workload::{AccessSequence, assign, format_key, format_value};
use std::borrow::Cow;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// 所有工作线程共享的只读上下文
pub struct WorkerContext<'a, C: Connector> {
    pub config: &'a BenchConfig,
    pub key_space: KeySpace,
    pub barrier: &'a PhaseBarrier,
    pub stats: &'a AggregateStats,
    pub connector: &'a C,
}

impl<C: Connector> Clone for WorkerContext<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Connector> Copy for WorkerContext<'_, C> {}

/// panic 时中止屏障，避免其它参与方永久阻塞
struct AbortOnPanic<'a>(&'a PhaseBarrier);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

/// 工作线程入口：致命错误时记录诊断并中止屏障
pub fn run_worker<C: Connector>(id: usize, ctx: WorkerContext<'_, C>) -> Result<WorkerReport> {
    let _guard = AbortOnPanic(ctx.barrier);
    let result = Worker::new(id, ctx).and_then(Worker::run);
    if let Err(e) = &result {
        if !e.is_abort() {
            error!(worker = id, "{}", e);
            ctx.barrier.abort();
        }
    }
    result
}

/// 单个工作线程的状态，只由所属线程访问
pub struct Worker<'a, C: Connector> {
    id: usize,
    ctx: WorkerContext<'a, C>,
    conns: Vec<C::Client>,
    sequence: AccessSequence,
    counters: WorkerCounters,
}

impl<'a, C: Connector> Worker<'a, C> {
    pub fn new(id: usize, ctx: WorkerContext<'a, C>) -> Result<Self> {
        let sequence =
            AccessSequence::with_pattern(id, ctx.key_space.num_keys, ctx.config.pattern)?;
        Ok(Self {
            id,
            ctx,
            conns: Vec::with_capacity(ctx.config.node_count()),
            sequence,
            counters: WorkerCounters::default(),
        })
    }

    /// 按顺序执行所有阶段
    pub fn run(mut self) -> Result<WorkerReport> {
        debug!(worker = self.id, "started");
        self.connect()?;
        self.validate()?;
        self.populate()?;

        info!(worker = self.id, "waiting for others");
        self.cross("populated")?;
        thread::sleep(self.ctx.config.settle);
        self.cross("bench-start")?;

        self.benchmark();
        self.cross("bench-done")?;

        self.ctx.stats.absorb(&self.counters);
        self.conns.clear();
        self.log_summary();

        Ok(WorkerReport {
            worker_id: self.id,
            counters: self.counters,
        })
    }

    fn cross(&self, phase: &'static str) -> Result<()> {
        trace!(worker = self.id, phase, "barrier wait");
        let crossed = self.ctx.barrier.wait().map_err(|_| {
            AppError::Aborted(format!("worker {} at {}: {}", self.id, phase, messages::PEER_FAILED))
        })?;
        if crossed.is_leader {
            trace!(worker = self.id, phase, generation = crossed.generation, "released barrier");
        }
        Ok(())
    }

    /// 为每个节点建立一个连接
    fn connect(&mut self) -> Result<()> {
        for (node, endpoint) in self.ctx.config.endpoints.iter().enumerate() {
            debug!(worker = self.id, node, %endpoint, "connecting");
            let conn = self.ctx.connector.connect(endpoint).map_err(|source| AppError::Connect {
                worker: self.id,
                node,
                source,
            })?;
            self.conns.push(conn);
        }
        Ok(())
    }

    /// 对每个节点做一次写读往返；任何节点失败都是致命的
    fn validate(&mut self) -> Result<()> {
        let key = validation::KEY.as_bytes();
        let mut first_failure = None;

        for (node, conn) in self.conns.iter_mut().enumerate() {
            let round_trip = conn
                .put(key, validation::VALUE.as_bytes(), 0, validation::FLAGS)
                .and_then(|()| conn.get(key));
            match round_trip {
                Ok((value, flags)) => {
                    debug!(
                        worker = self.id,
                        node,
                        value = %String::from_utf8_lossy(&value),
                        flags,
                        "validated"
                    );
                }
                Err(source) => {
                    error!(worker = self.id, node, error = %source, "failed to validate server");
                    first_failure.get_or_insert(AppError::Validate {
                        worker: self.id,
                        node,
                        source,
                    });
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 写入本线程负责的键：`id, id+W, id+2W, ...`
    fn populate(&mut self) -> Result<()> {
        let workers = self.ctx.config.num_workers;
        let assigned = self.ctx.key_space.assigned_len(self.id, workers);
        let step = (assigned / PROGRESS_STEPS).max(1);
        let nodes = self.conns.len();
        info!(worker = self.id, keys = assigned, "populating database");

        for (n, key_id) in self.ctx.key_space.assigned(self.id, workers).enumerate() {
            let key = format_key(key_id);
            let value = format_value(key_id);
            let node = assign(key_id, nodes);
            match self.conns[node].put(&key, &value, 0, 0) {
                Ok(()) => self.counters.populated += 1,
                Err(e) => {
                    self.counters.populate_failed += 1;
                    debug!(worker = self.id, key_id, node, error = %e, "failed to set key");
                }
            }

            let done = n as u64 + 1;
            if done % step == 0 {
                if self.ctx.barrier.is_aborted() {
                    return Err(AppError::Aborted(format!(
                        "worker {} while populating: {}",
                        self.id,
                        messages::PEER_FAILED
                    )));
                }
                info!(worker = self.id, done, total = assigned, "population progress");
            }
        }

        info!(
            worker = self.id,
            added = self.counters.populated,
            total = assigned,
            "population finished"
        );
        if self.counters.populate_failed > 0 {
            warn!(
                worker = self.id,
                failed = self.counters.populate_failed,
                "some keys were not stored"
            );
        }
        Ok(())
    }

    /// 基准循环：达到查询数或超过时长即结束，时长每128次检查一次
    fn benchmark(&mut self) {
        let limit = self.ctx.config.query_limit();
        let deadline = Instant::now() + self.ctx.config.effective_duration();
        let nodes = self.conns.len();
        debug!(worker = self.id, limit, "running queries");

        let mut issued = 0u64;
        while issued < limit {
            if issued % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                break;
            }
            let key_id = self.sequence.next_key();
            let key = format_key(key_id);
            let node = assign(key_id, nodes);

            match self.conns[node].get(&key) {
                Ok((value, _)) => {
                    self.counters.success += 1;
                    debug!(
                        worker = self.id,
                        key_id,
                        node,
                        value = %printable(&value),
                        "hit"
                    );
                }
                Err(StoreError::NotFound) => {
                    self.counters.not_found += 1;
                    debug!(worker = self.id, key_id, node, "not found");
                }
                Err(e) => {
                    self.counters.errors += 1;
                    debug!(worker = self.id, key_id, node, error = %e, "failed to get key");
                }
            }
            issued += 1;
        }
        debug!(worker = self.id, issued, "finished");
    }

    fn log_summary(&self) {
        let c = &self.counters;
        info!(worker = self.id, queries = c.queries(), "executed queries");
        if c.not_found > 0 {
            warn!(worker = self.id, not_found = c.not_found, "keys not found");
        }
        if c.errors > 0 {
            warn!(worker = self.id, errors = c.errors, "query errors");
        }
    }
}

/// 去掉值尾部的 NUL 填充后用于日志
fn printable(value: &[u8]) -> Cow<'_, str> {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    String::from_utf8_lossy(&value[..end])
}
