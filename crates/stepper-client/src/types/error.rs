//! 错误类型体系
//!
//! 区分三类失败：
//!
//! - **通信失败**（`Driver`）：串口故障、重试耗尽、排队超时
//! - **校验失败**（`NotConfigured` / `OutOfRange` / `InvalidState` / `InvalidArgument`）：
//!   发送前拒绝，不占用总线
//! - **设备拒绝**（`Rejected`）：设备收到请求但应答不是"接受"
//!
//! 设备上报的故障标志不是错误，它们作为状态快照的一部分返回。

use crate::axis::AxisState;
use crate::config::ConfigError;
use stepper_driver::DriverError;
use stepper_protocol::{AckCode, FunctionCode, ProtocolError};
use thiserror::Error;

/// 客户端错误类型
#[derive(Debug, Error)]
pub enum ClientError {
    /// 事务层错误
    #[error("Bus error: {0}")]
    Driver(#[from] DriverError),

    /// 应答载荷无法解析
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 地址没有对应的轴配置
    #[error("Axis 0x{0:02X} is not configured")]
    NotConfigured(u8),

    /// 名称无法解析为已配置的轴
    #[error("Unknown axis '{0}'")]
    UnknownAxis(String),

    /// 目标位置超出软限位
    #[error("Axis 0x{address:02X}: target {target:.3} outside soft limits [{min:.3}, {max:.3}]")]
    OutOfRange {
        /// 轴地址
        address: u8,
        /// 目标位置（用户单位）
        target: f64,
        /// 下限
        min: f64,
        /// 上限
        max: f64,
    },

    /// 当前轴状态不允许该命令
    #[error("Axis 0x{address:02X}: {command} not allowed while {state}")]
    InvalidState {
        /// 轴地址
        address: u8,
        /// 当前状态
        state: AxisState,
        /// 命令名称
        command: &'static str,
    },

    /// 参数无法换算到协议范围（速度、步数溢出等）
    #[error("Axis 0x{address:02X}: {reason}")]
    InvalidArgument {
        /// 轴地址
        address: u8,
        /// 原因
        reason: String,
    },

    /// 设备拒绝执行
    #[error("Axis 0x{address:02X} rejected {function:?}: {code:?}")]
    Rejected {
        /// 轴地址
        address: u8,
        /// 被拒绝的功能码
        function: FunctionCode,
        /// 应答码
        code: AckCode,
    },
}

impl ClientError {
    /// 是否在发送前被拒绝（未占用总线）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::NotConfigured(_)
                | ClientError::UnknownAxis(_)
                | ClientError::OutOfRange { .. }
                | ClientError::InvalidState { .. }
                | ClientError::InvalidArgument { .. }
        )
    }

    /// 是否为通信失败
    pub fn is_communication(&self) -> bool {
        matches!(self, ClientError::Driver(_) | ClientError::Protocol(_))
    }
}
