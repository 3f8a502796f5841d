//! 阶段屏障模块
//! 可重复使用的汇合点：所有参与方到齐后一起放行，按代计数自动复位

use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// 屏障被中止（某个参与方遇到致命错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierAborted;

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    /// 本次通过的是第几代
    pub generation: u64,
    /// 是否为最后一个到达的参与方
    pub is_leader: bool,
}

struct State {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// 按代计数的可重用屏障
pub struct PhaseBarrier {
    parties: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

impl PhaseBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// 阻塞直到所有参与方到达，或屏障被中止
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierAborted> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(BarrierAborted);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.cvar.notify_all();
            trace!(generation, "barrier released");
            return Ok(BarrierWaitResult {
                generation,
                is_leader: true,
            });
        }

        while state.generation == generation && !state.aborted {
            self.cvar.wait(&mut state);
        }
        if state.generation == generation {
            return Err(BarrierAborted);
        }
        Ok(BarrierWaitResult {
            generation,
            is_leader: false,
        })
    }

    /// 中止屏障，唤醒所有等待者；之后的等待立即失败
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if !state.aborted {
            state.aborted = true;
            self.cvar.notify_all();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}
