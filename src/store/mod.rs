//! 存储客户端抽象模块
//! 定义基准测试对后端节点的统一接口

pub mod memcache;
#[cfg(test)]
pub(crate) mod memory;

use crate::endpoint::Endpoint;
use thiserror::Error;

pub use memcache::{MemcacheConnection, MemcacheConnector};

/// 键的最大长度
pub const MAX_KEY_LEN: usize = 250;

/// 单次存储操作的错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 键不存在（基准阶段的预期结果之一）
    #[error("key not found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// 服务器返回的错误
    #[error("server error: {0}")]
    Server(String),
    /// 无法解析的响应
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid key length {0}")]
    InvalidKey(usize),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl StoreError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// 单个后端节点的连接，由一个工作线程独占
pub trait StoreClient {
    /// 写入键值对
    fn put(&mut self, key: &[u8], value: &[u8], ttl: u32, flags: u32) -> Result<(), StoreError>;

    /// 读取键，返回值和 flags
    fn get(&mut self, key: &[u8]) -> Result<(Vec<u8>, u32), StoreError>;
}

/// 连接工厂，在所有工作线程之间共享
pub trait Connector: Sync {
    type Client: StoreClient;

    /// 建立到某个节点的连接
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Client, StoreError>;
}

/// 检查键长度
#[inline]
pub(crate) fn check_key(key: &[u8]) -> Result<(), StoreError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        Err(StoreError::InvalidKey(key.len()))
    } else {
        Ok(())
    }
}
