//! 功能码目录
//!
//! 每个功能码固定对应一种请求载荷长度和一种应答形态。
//! 应答帧沿用请求帧的功能码。

use crate::constants::FRAME_OVERHEAD;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 功能码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    /// 清除故障（解除堵转保护）
    ClearFault = 0x0E,
    /// 读取固件/硬件版本（地址确认）
    Identify = 0x1F,
    /// 读取实时状态
    ReadStatus = 0x43,
    /// 设置驱动参数
    SetParameter = 0x48,
    /// 回零
    Home = 0x9A,
    /// 使能/失能
    Enable = 0xF3,
    /// 位置模式运动（绝对/相对）
    Move = 0xFD,
    /// 立即停止
    Stop = 0xFE,
}

impl FunctionCode {
    /// 全部已支持的功能码
    pub const ALL: [FunctionCode; 8] = [
        FunctionCode::ClearFault,
        FunctionCode::Identify,
        FunctionCode::ReadStatus,
        FunctionCode::SetParameter,
        FunctionCode::Home,
        FunctionCode::Enable,
        FunctionCode::Move,
        FunctionCode::Stop,
    ];

    /// 请求载荷固定长度
    pub const fn request_len(self) -> usize {
        match self {
            FunctionCode::ClearFault
            | FunctionCode::Identify
            | FunctionCode::ReadStatus
            | FunctionCode::Stop => 0,
            FunctionCode::Enable | FunctionCode::Home => 1,
            FunctionCode::SetParameter => 5,
            FunctionCode::Move => 8,
        }
    }

    /// 应答形态
    pub const fn response_shape(self) -> ResponseShape {
        match self {
            FunctionCode::Identify => ResponseShape::Identity,
            FunctionCode::SetParameter => ResponseShape::Ack,
            FunctionCode::ClearFault
            | FunctionCode::ReadStatus
            | FunctionCode::Home
            | FunctionCode::Enable
            | FunctionCode::Move
            | FunctionCode::Stop => ResponseShape::Status,
        }
    }

    /// 应答帧总长度（事务层据此确定一次读取的字节数）
    pub const fn response_frame_len(self) -> usize {
        self.response_shape().frame_len()
    }
}

/// 应答形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// 单字节确认码
    Ack,
    /// 版本信息
    Identity,
    /// 实时状态
    Status,
}

impl ResponseShape {
    /// 应答载荷长度
    pub const fn payload_len(self) -> usize {
        match self {
            ResponseShape::Ack => 1,
            ResponseShape::Identity => 3,
            ResponseShape::Status => 10,
        }
    }

    /// 应答帧总长度
    pub const fn frame_len(self) -> usize {
        FRAME_OVERHEAD + self.payload_len()
    }
}
