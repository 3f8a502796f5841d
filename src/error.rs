//! 错误处理模块
//! 定义了所有应用级别的错误类型

use crate::store::StoreError;
use thiserror::Error;

/// 应用主错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
    /// 服务器地址解析错误
    #[error("Invalid server specification: {0}")]
    Endpoint(String),
    /// 连接建立失败（致命）
    #[error("Worker {worker} failed to connect to server {node}: {source}")]
    Connect {
        worker: usize,
        node: usize,
        #[source]
        source: StoreError,
    },
    /// 连接验证失败（致命）
    #[error("Worker {worker} failed to validate server {node}: {source}")]
    Validate {
        worker: usize,
        node: usize,
        #[source]
        source: StoreError,
    },
    /// 线程创建失败
    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
    /// 其它线程发生致命错误，本线程随之退出
    #[error("Run aborted: {0}")]
    Aborted(String),
    /// 工作线程 panic
    #[error("Worker {0} panicked")]
    WorkerPanic(usize),
    /// 访问分布创建错误
    #[error("Access distribution create error: {0}")]
    Distribution(String),
    /// IO错误
    #[error("IO error: {0}")]
    Io(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl AppError {
    /// 是否为致命错误导致的连带中止（而非错误源头）
    pub fn is_abort(&self) -> bool {
        matches!(self, AppError::Aborted(_))
    }
}

/// 错误上下文扩展trait
pub trait ErrorContext<T> {
    /// 添加上下文信息
    fn with_context(self, context: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_context(self, context: &str) -> Result<T> {
        self.map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {}", context, msg)),
            AppError::Endpoint(msg) => AppError::Endpoint(format!("{}: {}", context, msg)),
            AppError::Aborted(msg) => AppError::Aborted(format!("{}: {}", context, msg)),
            AppError::Distribution(msg) => {
                AppError::Distribution(format!("{}: {}", context, msg))
            }
            AppError::Io(msg) => AppError::Io(format!("{}: {}", context, msg)),
            other => other,
        })
    }
}
