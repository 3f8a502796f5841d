//! 工作负载模块
//! 键分区、确定性访问序列以及键值格式化

use crate::config::{AccessPattern, KEY_SIZE, SEQUENCE_SEED, VALUE_SIZE, messages};
use crate::error::{AppError, Result};
use rand::prelude::*;
use rand_distr::Zipf;

/// 把键编号映射到节点下标，填充和基准阶段必须使用同一个函数
#[inline]
pub fn assign(key_id: u64, node_count: usize) -> usize {
    (key_id % node_count as u64) as usize
}

/// 64位 xorshift 生成器（13/7/17）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// 状态为0时生成器会停在0，此时改用种子常量
    pub fn new(state: u64) -> Self {
        Self {
            state: if state == 0 { SEQUENCE_SEED } else { state },
        }
    }
}

impl RngCore for XorShift64 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl SeedableRng for XorShift64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }
}

/// 由工作线程编号得到生成器初始状态
pub fn seed(worker_id: usize) -> XorShift64 {
    XorShift64::new(SEQUENCE_SEED ^ worker_id as u64)
}

/// 每个工作线程私有的键访问序列
pub struct AccessSequence {
    rng: XorShift64,
    num_keys: u64,
    zipf: Option<Zipf<f64>>,
}

impl AccessSequence {
    /// 创建均匀分布的访问序列
    pub fn new(worker_id: usize, num_keys: u64) -> Self {
        Self {
            rng: seed(worker_id),
            num_keys: num_keys.max(1),
            zipf: None,
        }
    }

    /// 按访问模式创建访问序列
    pub fn with_pattern(worker_id: usize, num_keys: u64, pattern: AccessPattern) -> Result<Self> {
        let mut seq = Self::new(worker_id, num_keys);
        if let AccessPattern::Zipf { exponent } = pattern {
            let zipf = Zipf::new(seq.num_keys as f64, exponent).map_err(|e| {
                AppError::Distribution(format!("{}: {}", messages::ZIPF_CREATE_FAILED, e))
            })?;
            seq.zipf = Some(zipf);
        }
        Ok(seq)
    }

    /// 抽取下一个键编号，范围 `[0, num_keys)`
    #[inline]
    pub fn next_key(&mut self) -> u64 {
        match &self.zipf {
            None => self.rng.next_u64() % self.num_keys,
            // Zipf 的取值范围是 [1, n]
            Some(zipf) => (zipf.sample(&mut self.rng) as u64).saturating_sub(1) % self.num_keys,
        }
    }
}

impl Iterator for AccessSequence {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        Some(self.next_key())
    }
}

/// 8位十六进制的定长键
#[inline]
pub fn format_key(key_id: u64) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    let hex = format!("{:08x}", key_id as u32);
    key.copy_from_slice(hex.as_bytes());
    key
}

/// 64字节定长值：`value-` 加16位十六进制编号，其余补0
pub fn format_value(key_id: u64) -> [u8; VALUE_SIZE] {
    let mut value = [0u8; VALUE_SIZE];
    let text = format!("value-{:016x}", key_id);
    value[..text.len()].copy_from_slice(text.as_bytes());
    value
}
