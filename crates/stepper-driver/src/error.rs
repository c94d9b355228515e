//! 驱动层错误类型定义

use stepper_protocol::ProtocolError;
use stepper_serial::SerialError;
use thiserror::Error;

/// 事务失败原因（最后一次尝试的结果）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// 设备沉默，读到截止时间
    TimedOut,
    /// 应答损坏（校验和错误、功能码未知、帧结构损坏）
    ChecksumError,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::TimedOut => write!(f, "timed out"),
            FailureReason::ChecksumError => write!(f, "corrupted response"),
        }
    }
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误（不可恢复，会话随之关闭）
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 协议错误（请求帧不符合载荷表）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 重试耗尽
    #[error("Transaction failed after {attempts} attempts: {reason}")]
    TransactionFailed { reason: FailureReason, attempts: u32 },

    /// 等待总线令牌超过调用方截止时间（未消耗重试预算）
    #[error("Timed out waiting for bus access")]
    QueueTimeout,

    /// 总线会话已关闭
    #[error("Bus session closed")]
    BusClosed,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DriverError {
    /// 是否为超时类失败（重试耗尽于超时）
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DriverError::TransactionFailed {
                reason: FailureReason::TimedOut,
                ..
            }
        )
    }
}
