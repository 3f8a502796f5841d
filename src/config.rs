//! 配置模块
//! 定义所有应用级别的常量和配置

use crate::endpoint::Endpoint;
use crate::error::{AppError, Result};
use serde::Serialize;
use std::time::Duration;

/// 最多支持的后端节点数量
pub const SERVER_MAX: usize = 8;

/// memcached 默认端口
pub const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// 键长度（8位十六进制）
pub const KEY_SIZE: usize = 8;

/// 值长度（字节）
pub const VALUE_SIZE: usize = 64;

/// 后端条目头部开销（字节）
pub const ITEM_HEADER_SIZE: usize = 48;

/// 后端条目额外簿记开销（字节）
pub const ITEM_BOOKKEEPING_SIZE: usize = 4;

/// 单个条目在后端占用的估算内存
pub const ITEM_SIZE: usize = ITEM_HEADER_SIZE + KEY_SIZE + VALUE_SIZE + ITEM_BOOKKEEPING_SIZE;

/// 访问序列种子常量，与工作线程编号异或
pub const SEQUENCE_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// 每隔多少次查询检查一次截止时间
pub const DEADLINE_CHECK_INTERVAL: u64 = 128;

/// 时长为0时的上限（24小时）
pub const UNBOUNDED_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// 填充完成后的静置时间
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// 填充进度日志的分段数
pub const PROGRESS_STEPS: u64 = 10;

/// 默认 socket 读写超时（毫秒）
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5000;

/// 连接验证配置
pub mod validation {
    /// 验证用的键
    pub const KEY: &str = "abc";

    /// 验证用的值
    pub const VALUE: &str = "my data";

    /// 验证用的 flags
    pub const FLAGS: u32 = 0xcafe_babe;
}

/// 错误消息常量
pub mod messages {
    pub const NO_SERVERS: &str = "No server specified";
    pub const TOO_MANY_SERVERS: &str = "Too many servers specified";
    pub const ZERO_MEMORY: &str = "Memory budget must be at least 1 MB";
    pub const ZIPF_CREATE_FAILED: &str = "Failed to create Zipf distribution";
    pub const REPORT_WRITE_FAILED: &str = "Failed to write JSON report";
    pub const PEER_FAILED: &str = "another worker hit a fatal error";
}

/// 通信协议
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Text,
    Binary,
}

/// 基准阶段的键访问模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum AccessPattern {
    /// xorshift 均匀分布
    #[default]
    Uniform,
    /// Zipf 分布，热点集中在小编号的键上
    Zipf { exponent: f64 },
}

/// 基准测试配置，启动后不再修改
#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub endpoints: Vec<Endpoint>,
    pub protocol: Protocol,
    /// 每个工作线程的查询数，0 表示不限
    pub num_queries: u64,
    /// 基准阶段时长，0 表示不限（24小时上限）
    pub duration: Duration,
    /// 后端内存预算（MB）
    pub max_memory_mb: u64,
    pub num_workers: usize,
    pub settle: Duration,
    pub io_timeout: Option<Duration>,
    pub pattern: AccessPattern,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            protocol: Protocol::Text,
            num_queries: 1000,
            duration: Duration::ZERO,
            max_memory_mb: 16,
            num_workers: 1,
            settle: SETTLE_DELAY,
            io_timeout: Some(Duration::from_millis(DEFAULT_IO_TIMEOUT_MS)),
            pattern: AccessPattern::Uniform,
        }
    }
}

impl BenchConfig {
    /// 校验并规范化配置
    pub fn validate(mut self) -> Result<Self> {
        if self.endpoints.is_empty() {
            return Err(AppError::Config(messages::NO_SERVERS.into()));
        }
        if self.endpoints.len() > SERVER_MAX {
            return Err(AppError::Config(format!(
                "{}: {} given, maximum {} supported",
                messages::TOO_MANY_SERVERS,
                self.endpoints.len(),
                SERVER_MAX
            )));
        }
        if self.max_memory_mb == 0 {
            return Err(AppError::Config(messages::ZERO_MEMORY.into()));
        }
        if let AccessPattern::Zipf { exponent } = self.pattern {
            if !(exponent > 0.0 && exponent.is_finite()) {
                return Err(AppError::Config(format!(
                    "Zipf exponent must be positive, got {}",
                    exponent
                )));
            }
        }
        if self.num_workers == 0 {
            self.num_workers = 1;
        }
        Ok(self)
    }

    /// 节点数量
    #[inline]
    pub fn node_count(&self) -> usize {
        self.endpoints.len()
    }

    /// 基准阶段的有效时长
    pub fn effective_duration(&self) -> Duration {
        if self.duration.is_zero() {
            UNBOUNDED_DURATION
        } else {
            self.duration
        }
    }

    /// 有效查询上限
    pub fn query_limit(&self) -> u64 {
        if self.num_queries == 0 {
            u64::MAX
        } else {
            self.num_queries
        }
    }

    /// 预期的总查询数（仅在配置了查询数时有意义）
    pub fn expected_queries(&self) -> Option<u64> {
        (self.num_queries > 0).then(|| self.num_queries.saturating_mul(self.num_workers as u64))
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::from_memory_mb(self.max_memory_mb)
    }
}

/// 由内存预算推导出的键空间
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct KeySpace {
    pub num_keys: u64,
}

impl KeySpace {
    pub fn from_memory_mb(mb: u64) -> Self {
        let bytes = mb.saturating_mul(1 << 20);
        Self {
            num_keys: (bytes / ITEM_SIZE as u64).max(1),
        }
    }

    /// 某个工作线程负责填充的键：`w, w+W, w+2W, ...`
    pub fn assigned(self, worker_id: usize, num_workers: usize) -> impl Iterator<Item = u64> {
        (worker_id as u64..self.num_keys).step_by(num_workers.max(1))
    }

    /// 某个工作线程负责填充的键数量
    pub fn assigned_len(&self, worker_id: usize, num_workers: usize) -> u64 {
        let (w, n) = (worker_id as u64, num_workers.max(1) as u64);
        if w >= self.num_keys {
            0
        } else {
            (self.num_keys - w).div_ceil(n)
        }
    }
}
