//! 重试策略
//!
//! 读超时或应答损坏时原样重发请求帧，两次尝试之间线性退避：
//! 第 n 次重试前等待 `n × base_delay`，给忙碌的设备留出恢复时间。

use std::time::Duration;

/// 默认最大尝试次数（含首次发送）
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 默认退避基准
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(20);

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次发送，至少为 1）
    pub max_attempts: u32,
    /// 线性退避基准
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 只尝试一次
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// 第 `attempt` 次尝试（从 1 开始）之前的退避时间
    ///
    /// 首次尝试不等待；第 2 次等待 1 × base，第 3 次等待 2 × base，依此类推。
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }

    /// 全部尝试都失败时累计的退避时间
    pub fn total_backoff(&self) -> Duration {
        (2..=self.max_attempts).map(|attempt| self.delay_before(attempt)).sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}
