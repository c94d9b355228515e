//! 应答帧结构体定义
//!
//! 包含所有应答载荷的结构体，提供从 `Frame` 解析的方法，
//! 以及供模拟设备使用的反向构建方法。

use crate::function::{FunctionCode, ResponseShape};
use crate::{Frame, ProtocolError, i32_to_bytes_be, read_i32_be};
use bilge::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 校验应答载荷长度
fn expect_response(frame: &Frame, shape: ResponseShape) -> Result<(), ProtocolError> {
    if frame.function.response_shape() != shape {
        return Err(ProtocolError::InvalidArgument(format!(
            "{:?} does not answer with a {shape:?} payload",
            frame.function
        )));
    }
    let expected = shape.payload_len();
    if frame.payload.len() != expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: frame.payload.len(),
        });
    }
    Ok(())
}

// ============================================================================
// 状态位域
// ============================================================================

/// 运行状态位域（状态应答 Byte 8）
///
/// - Bit 0: 使能（0：失能 1：使能）
/// - Bit 1: 运动中（0：到位 1：运动中）
/// - Bit 2: 回零中
/// - Bit 3-7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFlags {
    pub enabled: bool, // Bit 0
    pub moving: bool,  // Bit 1
    pub homing: bool,  // Bit 2
    pub reserved: u5,  // Bit 3-7: 保留
}

/// 故障位域（状态应答 Byte 9）
///
/// - Bit 0: 堵转
/// - Bit 1: 过流
/// - Bit 2: 过温
/// - Bit 3: 欠压
/// - Bit 4: 编码器异常
/// - Bit 5: 限位触发
/// - Bit 6-7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultFlags {
    pub stall: bool,            // Bit 0
    pub overcurrent: bool,      // Bit 1
    pub over_temperature: bool, // Bit 2
    pub under_voltage: bool,    // Bit 3
    pub encoder: bool,          // Bit 4
    pub limit_switch: bool,     // Bit 5
    pub reserved: u2,           // Bit 6-7: 保留
}

impl StateFlags {
    /// 从原始字节构建
    pub fn from_raw(raw: u8) -> Self {
        StateFlags::from(u8::new(raw))
    }

    /// 原始字节
    pub fn raw(&self) -> u8 {
        u8::from(*self)
    }
}

impl FaultFlags {
    /// 有效故障位掩码（排除保留位）
    const MASK: u8 = 0b0011_1111;

    /// 无故障
    pub fn none() -> Self {
        FaultFlags::from(u8::new(0))
    }

    /// 从原始字节构建
    pub fn from_raw(raw: u8) -> Self {
        FaultFlags::from(u8::new(raw))
    }

    /// 原始字节
    pub fn raw(&self) -> u8 {
        u8::from(*self)
    }

    /// 是否存在任一故障
    pub fn any(&self) -> bool {
        self.raw() & Self::MASK != 0
    }

    /// 已置位故障的名称列表（用于日志和展示）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.stall() {
            names.push("stall");
        }
        if self.overcurrent() {
            names.push("overcurrent");
        }
        if self.over_temperature() {
            names.push("over-temperature");
        }
        if self.under_voltage() {
            names.push("under-voltage");
        }
        if self.encoder() {
            names.push("encoder");
        }
        if self.limit_switch() {
            names.push("limit-switch");
        }
        names
    }
}

// ============================================================================
// 状态应答
// ============================================================================

/// 状态应答（ReadStatus / Enable / Move / Home / Stop / ClearFault）
///
/// 载荷 10 字节：
/// - Byte 0-3: 实时位置（步，i32 大端）
/// - Byte 4-7: 实时速度（步/秒，i32 大端）
/// - Byte 8: 运行状态位域
/// - Byte 9: 故障位域
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFeedback {
    pub position_steps: i32,
    pub velocity_steps: i32,
    pub state: StateFlags,
    pub faults: FaultFlags,
}

impl StatusFeedback {
    /// 序列化载荷（模拟设备使用）
    pub fn to_payload(&self) -> [u8; 10] {
        let mut payload = [0u8; 10];
        payload[0..4].copy_from_slice(&i32_to_bytes_be(self.position_steps));
        payload[4..8].copy_from_slice(&i32_to_bytes_be(self.velocity_steps));
        payload[8] = self.state.raw();
        payload[9] = self.faults.raw();
        payload
    }

    /// 构建应答帧（模拟设备使用）
    pub fn to_frame(&self, address: u8, function: FunctionCode) -> Frame {
        Frame::new(address, function, &self.to_payload())
    }
}

impl TryFrom<&Frame> for StatusFeedback {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_response(frame, ResponseShape::Status)?;
        let payload = frame.payload();
        Ok(Self {
            position_steps: read_i32_be(payload, 0),
            velocity_steps: read_i32_be(payload, 4),
            state: StateFlags::from_raw(payload[8]),
            faults: FaultFlags::from_raw(payload[9]),
        })
    }
}

// ============================================================================
// 版本应答
// ============================================================================

/// 版本应答（Identify）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityFeedback {
    pub firmware_major: u8,    // Byte 0
    pub firmware_minor: u8,    // Byte 1
    pub hardware_revision: u8, // Byte 2
}

impl IdentityFeedback {
    pub fn to_frame(&self, address: u8) -> Frame {
        Frame::new(
            address,
            FunctionCode::Identify,
            &[
                self.firmware_major,
                self.firmware_minor,
                self.hardware_revision,
            ],
        )
    }
}

impl std::fmt::Display for IdentityFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fw {}.{} / hw rev {}",
            self.firmware_major, self.firmware_minor, self.hardware_revision
        )
    }
}

impl TryFrom<&Frame> for IdentityFeedback {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_response(frame, ResponseShape::Identity)?;
        Ok(Self {
            firmware_major: frame.payload[0],
            firmware_minor: frame.payload[1],
            hardware_revision: frame.payload[2],
        })
    }
}

// ============================================================================
// 确认应答
// ============================================================================

/// 确认码
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum AckCode {
    /// 指令已接受
    Accepted = 0x02,
    /// 条件不满足（例如运动中修改参数）
    ConditionNotMet = 0xE2,
    /// 指令不支持
    Unsupported = 0xEE,
}

/// 确认应答（SetParameter）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFeedback {
    pub function: FunctionCode,
    pub code: AckCode,
}

impl AckFeedback {
    pub fn accepted(function: FunctionCode) -> Self {
        Self {
            function,
            code: AckCode::Accepted,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.code == AckCode::Accepted
    }

    pub fn to_frame(&self, address: u8) -> Frame {
        Frame::new(address, self.function, &[self.code.into()])
    }
}

impl TryFrom<&Frame> for AckFeedback {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_response(frame, ResponseShape::Ack)?;
        let code = AckCode::try_from(frame.payload[0]).map_err(|_| ProtocolError::InvalidValue {
            field: "AckCode".to_string(),
            value: frame.payload[0],
        })?;
        Ok(Self {
            function: frame.function,
            code,
        })
    }
}

// ============================================================================
// 统一应答
// ============================================================================

/// 按功能码应答形态分派的应答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Ack(AckFeedback),
    Identity(IdentityFeedback),
    Status(StatusFeedback),
}

impl TryFrom<&Frame> for Feedback {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        match frame.function.response_shape() {
            ResponseShape::Ack => AckFeedback::try_from(frame).map(Feedback::Ack),
            ResponseShape::Identity => IdentityFeedback::try_from(frame).map(Feedback::Identity),
            ResponseShape::Status => StatusFeedback::try_from(frame).map(Feedback::Status),
        }
    }
}
