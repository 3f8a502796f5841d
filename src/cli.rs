//! 命令行参数模块

use crate::config::{AccessPattern, BenchConfig, DEFAULT_IO_TIMEOUT_MS, Protocol};
use crate::endpoint;
use crate::error::{ErrorContext, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// memcached 兼容存储的多线程负载基准
#[derive(Debug, Parser)]
#[command(
    name = "loadbench",
    version,
    about = "Multi-worker load benchmark for memcached-compatible stores"
)]
pub struct Cli {
    /// Comma-separated servers: tcp://host[:port] or unix:///path (max 8)
    #[arg(short = 's', long)]
    pub servers: String,

    /// Use the binary protocol instead of the text protocol
    #[arg(short = 'b', long)]
    pub binary: bool,

    /// Queries per worker (0 = unbounded)
    #[arg(short = 'n', long = "num-queries", default_value_t = 1000)]
    pub num_queries: u64,

    /// Backend memory budget in MB, determines the number of keys
    #[arg(short = 'm', long = "max-memory", default_value_t = 16)]
    pub max_memory: u64,

    /// Number of worker threads
    #[arg(short = 'c', long = "num-threads", default_value_t = 1)]
    pub num_threads: usize,

    /// Benchmark duration in seconds (0 = unbounded)
    #[arg(short = 't', long, default_value_t = 0)]
    pub duration: u64,

    /// Log every operation outcome
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Alias of --verbose
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Draw benchmark keys from a Zipf distribution with this exponent
    #[arg(long, value_name = "EXPONENT")]
    pub zipf: Option<f64>,

    /// Socket read/write timeout in milliseconds (0 = none)
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_IO_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Also write the report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose || self.debug
    }

    /// 转换为基准配置（尚未校验）
    pub fn to_config(&self) -> Result<BenchConfig> {
        let endpoints = endpoint::parse_list(&self.servers).with_context("--servers")?;
        Ok(BenchConfig {
            endpoints,
            protocol: if self.binary { Protocol::Binary } else { Protocol::Text },
            num_queries: self.num_queries,
            duration: Duration::from_secs(self.duration),
            max_memory_mb: self.max_memory,
            num_workers: self.num_threads,
            io_timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
            pattern: match self.zipf {
                Some(exponent) => AccessPattern::Zipf { exponent },
                None => AccessPattern::Uniform,
            },
            ..Default::default()
        })
    }
}
