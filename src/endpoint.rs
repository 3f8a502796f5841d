//! 后端地址模块
//! 解析 `tcp://host[:port]` 与 `unix:///path` 形式的服务器列表

use crate::config::{DEFAULT_MEMCACHED_PORT, SERVER_MAX, messages};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 单个后端节点地址
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "transport")]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

impl FromStr for Endpoint {
    type Err = AppError;

    fn from_str(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if let Some(path) = spec.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(AppError::Endpoint(format!("{} (empty socket path)", spec)));
            }
            return Ok(Endpoint::Unix { path: PathBuf::from(path) });
        }

        let Some(addr) = spec.strip_prefix("tcp://") else {
            return Err(AppError::Endpoint(spec.to_string()));
        };

        let (host, port) = split_host_port(addr)
            .ok_or_else(|| AppError::Endpoint(spec.to_string()))?;
        if host.is_empty() {
            return Err(AppError::Endpoint(format!("{} (empty host)", spec)));
        }

        // 端口缺省或为0时使用默认端口
        let port = match port {
            None | Some("") => DEFAULT_MEMCACHED_PORT,
            Some(p) => match p.parse::<u16>() {
                Ok(0) => DEFAULT_MEMCACHED_PORT,
                Ok(p) => p,
                Err(_) => return Err(AppError::Endpoint(format!("{} (bad port)", spec))),
            },
        };

        Ok(Endpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

/// 拆分 `host[:port]`，支持 `[v6]:port`
fn split_host_port(addr: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail {
            "" => Some((host, None)),
            t => Some((host, Some(t.strip_prefix(':')?))),
        };
    }
    match addr.split_once(':') {
        Some((host, port)) => Some((host, Some(port))),
        None => Some((addr, None)),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{}]:{}", host, port)
            }
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// 解析逗号分隔的服务器列表
pub fn parse_list(list: &str) -> Result<Vec<Endpoint>> {
    let endpoints = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Endpoint::from_str)
        .collect::<Result<Vec<_>>>()?;

    if endpoints.is_empty() {
        return Err(AppError::Config(format!("{}: {:?}", messages::NO_SERVERS, list)));
    }
    if endpoints.len() > SERVER_MAX {
        return Err(AppError::Config(format!(
            "{}. Maximum {} supported.",
            messages::TOO_MANY_SERVERS,
            SERVER_MAX
        )));
    }
    Ok(endpoints)
}
