//! 控制器模块
//! 创建工作线程，与之一起穿过三道屏障以划定各阶段的计时，最后汇总报告

use crate::barrier::PhaseBarrier;
use crate::config::{BenchConfig, messages};
use crate::error::{AppError, Result};
use crate::stats::{AggregateStats, PhaseClock, Report, WorkerReport};
use crate::store::Connector;
use crate::worker::{WorkerContext, run_worker};
use std::thread;
use tracing::{debug, info};

/// 基准测试控制器
pub struct Controller<C: Connector> {
    config: BenchConfig,
    connector: C,
}

impl<C: Connector> Controller<C> {
    /// 校验配置并创建控制器
    pub fn new(config: BenchConfig, connector: C) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
            connector,
        })
    }

    /// 运行完整的基准测试
    pub fn run(&self) -> Result<Report> {
        let config = &self.config;
        let key_space = config.key_space();
        let workers = config.num_workers;
        // 控制线程也算一个参与方
        let barrier = PhaseBarrier::new(workers + 1);
        let stats = AggregateStats::new();

        info!(
            nodes = config.node_count(),
            workers,
            keys = key_space.num_keys,
            protocol = ?config.protocol,
            "starting benchmark"
        );

        let mut clock = PhaseClock::start();
        let ctx = WorkerContext {
            config,
            key_space,
            barrier: &barrier,
            stats: &stats,
            connector: &self.connector,
        };

        let per_worker = thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", id))
                    .spawn_scoped(s, move || run_worker(id, ctx));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        barrier.abort();
                        return Err(AppError::Spawn { worker: id, source });
                    }
                }
            }

            let bracketed = bracket_phases(&barrier, &mut clock);

            let mut reports = Vec::with_capacity(workers);
            let mut failure: Option<AppError> = None;
            for (id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(report)) => reports.push(report),
                    Ok(Err(e)) => keep_root_cause(&mut failure, e),
                    Err(_) => keep_root_cause(&mut failure, AppError::WorkerPanic(id)),
                }
            }
            if let Err(e) = bracketed {
                keep_root_cause(&mut failure, e);
            }

            match failure {
                Some(e) => Err(e),
                None => Ok(reports),
            }
        })?;

        let report = Report::build(
            config,
            key_space.num_keys,
            stats.snapshot(),
            &clock,
            per_worker,
        );
        info!(
            elapsed_ms = report.bench_elapsed.as_millis() as u64,
            queries = report.queries,
            qps = report.queries_per_sec,
            "benchmark finished"
        );
        Ok(report)
    }
}

/// 与工作线程一起穿过屏障 A/B/C，并记录时间点
fn bracket_phases(barrier: &PhaseBarrier, clock: &mut PhaseClock) -> Result<()> {
    let aborted = |_| AppError::Aborted(format!("controller: {}", messages::PEER_FAILED));

    barrier.wait().map_err(aborted)?;
    clock.mark_populated();
    info!(
        elapsed_ms = clock.populate_elapsed().as_millis() as u64,
        "all workers populated"
    );

    barrier.wait().map_err(aborted)?;
    clock.mark_bench_start();
    debug!("benchmark phase started");

    barrier.wait().map_err(aborted)?;
    clock.mark_bench_end();
    debug!("benchmark phase done");
    Ok(())
}

/// 保留真正的错误源头，而不是连带的中止
fn keep_root_cause(slot: &mut Option<AppError>, err: AppError) {
    match slot {
        None => *slot = Some(err),
        Some(current) if current.is_abort() && !err.is_abort() => *slot = Some(err),
        Some(_) => {}
    }
}
