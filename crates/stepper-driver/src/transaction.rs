//! 事务状态机
//!
//! 一个事务 = 一次请求/应答交换（含重发）。状态只向前推进：
//!
//! ```text
//! Pending ──► Completed(frame)
//!    │
//!    ├──► TimedOut ──┐
//!    └──► ChecksumError ─┴─► 重试（回到 Pending）或放弃
//! ```

use crate::error::FailureReason;
use crate::retry::RetryPolicy;
use stepper_protocol::{Frame, ProtocolError};
use std::time::{Duration, Instant};

/// 一次尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// 等待应答中
    Pending,
    /// 收到地址和功能码都匹配的有效应答
    Completed(Frame),
    /// 截止时间内没有完整应答
    TimedOut,
    /// 应答损坏
    ChecksumError,
}

/// 一次尝试结束后的下一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// 完成，交付应答
    Completed(Frame),
    /// 等待 `delay` 后进行第 `attempt` 次尝试
    Retry { attempt: u32, delay: Duration },
    /// 重试预算耗尽
    Exhausted(FailureReason),
}

impl FailureReason {
    /// 对应的事务结果
    pub fn outcome(self) -> TransactionOutcome {
        match self {
            FailureReason::TimedOut => TransactionOutcome::TimedOut,
            FailureReason::ChecksumError => TransactionOutcome::ChecksumError,
        }
    }
}

/// 在途事务
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    request: Frame,
    wire: Vec<u8>,
    response_len: usize,
    deadline: Instant,
    attempts: u32,
    outcome: TransactionOutcome,
}

impl Transaction {
    /// 创建事务
    ///
    /// 请求帧在此编码一次，重发时原样复用。
    ///
    /// # 错误
    /// - `ProtocolError::InvalidArgument`: 请求帧不符合载荷表
    pub fn new(id: u64, request: Frame) -> Result<Self, ProtocolError> {
        let wire = request.encode()?;
        let response_len = request.function.response_frame_len();
        Ok(Self {
            id,
            request,
            wire,
            response_len,
            deadline: Instant::now(),
            attempts: 0,
            outcome: TransactionOutcome::Pending,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &Frame {
        &self.request
    }

    /// 编码后的请求字节
    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// 期望的应答帧长度
    pub fn response_len(&self) -> usize {
        self.response_len
    }

    /// 当前尝试的截止时间
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// 已进行的尝试次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn outcome(&self) -> &TransactionOutcome {
        &self.outcome
    }

    /// 开始新一次尝试，截止时间从 `now` 起算
    pub fn begin_attempt(&mut self, now: Instant, timeout: Duration) {
        self.attempts += 1;
        self.deadline = now + timeout;
        self.outcome = TransactionOutcome::Pending;
    }

    /// 应答是否属于本事务（地址和功能码都匹配）
    pub fn matches(&self, frame: &Frame) -> bool {
        frame.address == self.request.address && frame.function == self.request.function
    }

    /// 记录本次尝试的结果
    pub fn resolve(&mut self, outcome: TransactionOutcome) {
        self.outcome = outcome;
    }

    /// 根据结果和重试策略决定下一步
    ///
    /// `Completed` 时应答帧从事务中移出。
    pub fn next_step(&mut self, policy: &RetryPolicy) -> NextStep {
        let reason = match std::mem::replace(&mut self.outcome, TransactionOutcome::Pending) {
            TransactionOutcome::Completed(frame) => return NextStep::Completed(frame),
            TransactionOutcome::TimedOut | TransactionOutcome::Pending => FailureReason::TimedOut,
            TransactionOutcome::ChecksumError => FailureReason::ChecksumError,
        };
        self.outcome = reason.outcome();

        if self.attempts >= policy.max_attempts {
            NextStep::Exhausted(reason)
        } else {
            let attempt = self.attempts + 1;
            NextStep::Retry {
                attempt,
                delay: policy.delay_before(attempt),
            }
        }
    }
}
