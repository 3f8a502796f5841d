//! memcached 客户端
//! 基于 `memcache` crate，每个节点一个连接，支持文本与二进制协议、TCP 与 Unix socket

use super::{Connector, StoreClient, StoreError, check_key};
use crate::config::Protocol;
use crate::endpoint::Endpoint;
use memcache::{Client, FromMemcacheValue, MemcacheError, ToMemcacheValue};
use std::io::{self, Write};
use std::time::Duration;

/// memcached 连接工厂
#[derive(Clone, Debug)]
pub struct MemcacheConnector {
    protocol: Protocol,
    timeout: Option<Duration>,
}

impl MemcacheConnector {
    pub fn new(protocol: Protocol, timeout: Option<Duration>) -> Self {
        Self { protocol, timeout }
    }

    /// 由节点地址拼出客户端 URL
    pub fn url(&self, endpoint: &Endpoint) -> String {
        let mut url = match endpoint {
            Endpoint::Tcp { host, port } if host.contains(':') => {
                format!("memcache://[{}]:{}", host, port)
            }
            Endpoint::Tcp { host, port } => format!("memcache://{}:{}", host, port),
            Endpoint::Unix { path } => format!("memcache://{}", path.display()),
        };

        let mut params = Vec::with_capacity(4);
        if self.protocol == Protocol::Binary {
            params.push("protocol=binary".to_string());
        }
        if let Some(t) = self.timeout {
            let secs = t.as_secs_f64();
            params.push(format!("timeout={}", secs));
            params.push(format!("connect_timeout={}", secs));
        }
        if matches!(endpoint, Endpoint::Tcp { .. }) {
            params.push("tcp_nodelay=true".to_string());
        }

        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }
}

impl Connector for MemcacheConnector {
    type Client = MemcacheConnection;

    fn connect(&self, endpoint: &Endpoint) -> Result<MemcacheConnection, StoreError> {
        let client = Client::connect(self.url(endpoint))?;
        Ok(MemcacheConnection { client })
    }
}

/// 到单个 memcached 节点的阻塞连接
pub struct MemcacheConnection {
    client: Client,
}

impl StoreClient for MemcacheConnection {
    fn put(&mut self, key: &[u8], value: &[u8], ttl: u32, flags: u32) -> Result<(), StoreError> {
        let key = key_str(key)?;
        self.client.set(key, Flagged { value, flags }, ttl)?;
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<(Vec<u8>, u32), StoreError> {
        let key = key_str(key)?;
        match self.client.get::<Fetched>(key)? {
            Some(Fetched(value, flags)) => Ok((value, flags)),
            None => Err(StoreError::NotFound),
        }
    }
}

fn key_str(key: &[u8]) -> Result<&str, StoreError> {
    check_key(key)?;
    std::str::from_utf8(key).map_err(|e| StoreError::Protocol(format!("key is not utf-8: {}", e)))
}

/// 带 flags 的写入值
struct Flagged<'a> {
    value: &'a [u8],
    flags: u32,
}

impl<W: Write> ToMemcacheValue<W> for Flagged<'_> {
    fn get_flags(&self) -> u32 {
        self.flags
    }

    fn get_length(&self) -> usize {
        self.value.len()
    }

    fn write_to(&self, stream: &mut W) -> io::Result<()> {
        stream.write_all(self.value)
    }
}

/// 读取结果：值和 flags
struct Fetched(Vec<u8>, u32);

impl FromMemcacheValue for Fetched {
    fn from_memcache_value(value: Vec<u8>, flags: u32) -> Result<Self, MemcacheError> {
        Ok(Fetched(value, flags))
    }
}

impl From<MemcacheError> for StoreError {
    fn from(e: MemcacheError) -> Self {
        match e {
            MemcacheError::IOError(e) => StoreError::Io(e),
            other => StoreError::Server(other.to_string()),
        }
    }
}
