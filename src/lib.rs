//! 键值存储负载基准库
//!
//! 对 memcached 兼容的分布式键值存储做多阶段、多线程的压力测试，
//! 测量吞吐量与错误率。
//!
//! 特性：
//! - 每个工作线程独占到所有节点的连接，阻塞式 I/O（`memcache` 客户端）
//! - 三道可重用屏障隔离填充阶段与基准阶段
//! - xorshift 确定性访问序列，可复现
//! - 原子计数汇总与 JSON 报告

pub mod barrier;
pub mod cli;
pub mod config;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod stats;
pub mod store;
pub mod worker;
pub mod workload;
