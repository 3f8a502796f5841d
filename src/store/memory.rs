//! 测试用的内存后端，可注入故障

use super::{Connector, StoreClient, StoreError, check_key};
use crate::endpoint::Endpoint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type Table = Arc<Mutex<HashMap<Vec<u8>, (Vec<u8>, u32)>>>;

/// 故障注入选项
#[derive(Clone, Copy, Debug, Default)]
pub struct Faults {
    /// 连接总是失败
    pub refuse_connect: bool,
    /// 所有写入都失败
    pub reject_puts: bool,
    /// 键编号为奇数的写入被静默丢弃（模拟淘汰）
    pub drop_odd_keys: bool,
    /// 每 N 次读取返回一次错误
    pub get_error_every: Option<u64>,
}

pub struct MemoryConnector {
    nodes: Vec<(Endpoint, Table)>,
    faults: Faults,
    gets: Arc<AtomicU64>,
}

impl MemoryConnector {
    pub fn new(endpoints: &[Endpoint], faults: Faults) -> Self {
        Self {
            nodes: endpoints
                .iter()
                .map(|e| (e.clone(), Table::default()))
                .collect(),
            faults,
            gets: Arc::default(),
        }
    }

    /// 某个节点上保存的键（排序后）
    pub fn keys(&self, node: usize) -> Vec<Vec<u8>> {
        let mut keys: Vec<_> = self.nodes[node].1.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// 所有连接上的读取总数
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }
}

impl Connector for MemoryConnector {
    type Client = MemoryClient;

    fn connect(&self, endpoint: &Endpoint) -> Result<MemoryClient, StoreError> {
        if self.faults.refuse_connect {
            return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
        }
        let table = self
            .nodes
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| StoreError::Unsupported(endpoint.to_string()))?;
        Ok(MemoryClient {
            table,
            faults: self.faults,
            gets: self.gets.clone(),
            local_gets: 0,
        })
    }
}

pub struct MemoryClient {
    table: Table,
    faults: Faults,
    gets: Arc<AtomicU64>,
    local_gets: u64,
}

impl StoreClient for MemoryClient {
    fn put(&mut self, key: &[u8], value: &[u8], _ttl: u32, flags: u32) -> Result<(), StoreError> {
        check_key(key)?;
        if self.faults.reject_puts {
            return Err(StoreError::Server("SERVER_ERROR out of memory".into()));
        }
        let odd = std::str::from_utf8(key)
            .ok()
            .and_then(|k| u64::from_str_radix(k, 16).ok())
            .is_some_and(|id| id % 2 == 1);
        if self.faults.drop_odd_keys && odd {
            return Ok(());
        }
        self.table.lock().insert(key.to_vec(), (value.to_vec(), flags));
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<(Vec<u8>, u32), StoreError> {
        check_key(key)?;
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.local_gets += 1;
        if let Some(n) = self.faults.get_error_every {
            if self.local_gets % n == 0 {
                return Err(StoreError::Server("SERVER_ERROR busy".into()));
            }
        }
        self.table.lock().get(key).cloned().ok_or(StoreError::NotFound)
    }
}
