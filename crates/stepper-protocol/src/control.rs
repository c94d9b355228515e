//! 控制帧结构体定义
//!
//! 包含所有请求帧的载荷构建方法，以及从 `Frame` 反向解析的方法
//! （供模拟设备和总线监视使用）。载荷中的数值全部为驱动器原始单位（步、步/秒），
//! 物理单位换算在客户端命令层完成。

use crate::function::FunctionCode;
use crate::{
    Frame, ProtocolError, bytes_to_u16_be, i32_to_bytes_be, read_i32_be, u16_to_bytes_be,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 校验请求载荷长度
fn expect_request(frame: &Frame, function: FunctionCode) -> Result<(), ProtocolError> {
    if frame.function != function {
        return Err(ProtocolError::InvalidArgument(format!(
            "expected {function:?} frame, got {:?}",
            frame.function
        )));
    }
    let expected = function.request_len();
    if frame.payload.len() != expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: frame.payload.len(),
        });
    }
    Ok(())
}

// ============================================================================
// 使能指令
// ============================================================================

/// 使能/失能指令 (0xF3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableCommand {
    pub enable: bool, // Byte 0: 0x01 使能, 0x00 失能
}

impl EnableCommand {
    pub fn new(enable: bool) -> Self {
        Self { enable }
    }

    pub fn to_frame(&self, address: u8) -> Frame {
        Frame::new(address, FunctionCode::Enable, &[u8::from(self.enable)])
    }
}

impl TryFrom<&Frame> for EnableCommand {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_request(frame, FunctionCode::Enable)?;
        match frame.payload[0] {
            0x00 => Ok(Self { enable: false }),
            0x01 => Ok(Self { enable: true }),
            value => Err(ProtocolError::InvalidValue {
                field: "enable".to_string(),
                value,
            }),
        }
    }
}

// ============================================================================
// 位置运动指令
// ============================================================================

/// 运动模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MoveMode {
    /// 绝对位置
    #[default]
    Absolute = 0x00,
    /// 相对当前位置
    Relative = 0x01,
}

/// 位置运动指令 (0xFD)
///
/// 载荷 8 字节：
/// - Byte 0-3: 目标位置/位移（步，i32 大端）
/// - Byte 4-5: 速度（步/秒，u16 大端）
/// - Byte 6: 加速度档位（0 = 固件默认，直接启动）
/// - Byte 7: 运动模式（0 绝对，1 相对）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    pub steps: i32,
    pub speed: u16,
    pub acceleration: u8,
    pub mode: MoveMode,
}

impl MoveCommand {
    /// 绝对位置运动
    pub fn absolute(steps: i32, speed: u16, acceleration: u8) -> Self {
        Self {
            steps,
            speed,
            acceleration,
            mode: MoveMode::Absolute,
        }
    }

    /// 相对运动
    pub fn relative(steps: i32, speed: u16, acceleration: u8) -> Self {
        Self {
            steps,
            speed,
            acceleration,
            mode: MoveMode::Relative,
        }
    }

    pub fn to_frame(&self, address: u8) -> Frame {
        let mut payload = [0u8; 8];
        payload[0..4].copy_from_slice(&i32_to_bytes_be(self.steps));
        payload[4..6].copy_from_slice(&u16_to_bytes_be(self.speed));
        payload[6] = self.acceleration;
        payload[7] = self.mode.into();
        Frame::new(address, FunctionCode::Move, &payload)
    }
}

impl TryFrom<&Frame> for MoveCommand {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_request(frame, FunctionCode::Move)?;
        let payload = frame.payload();
        let mode = MoveMode::try_from(payload[7]).map_err(|_| ProtocolError::InvalidValue {
            field: "MoveMode".to_string(),
            value: payload[7],
        })?;
        Ok(Self {
            steps: read_i32_be(payload, 0),
            speed: bytes_to_u16_be([payload[4], payload[5]]),
            acceleration: payload[6],
            mode,
        })
    }
}

// ============================================================================
// 回零指令
// ============================================================================

/// 回零模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum HomingMode {
    /// 就近回零
    #[default]
    Nearest = 0x00,
    /// 按方向回零
    Direction = 0x01,
    /// 限位开关回零
    LimitSwitch = 0x02,
}

/// 回零指令 (0x9A)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeCommand {
    pub mode: HomingMode, // Byte 0
}

impl HomeCommand {
    pub fn new(mode: HomingMode) -> Self {
        Self { mode }
    }

    pub fn to_frame(&self, address: u8) -> Frame {
        Frame::new(address, FunctionCode::Home, &[self.mode.into()])
    }
}

impl TryFrom<&Frame> for HomeCommand {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_request(frame, FunctionCode::Home)?;
        let mode =
            HomingMode::try_from(frame.payload[0]).map_err(|_| ProtocolError::InvalidValue {
                field: "HomingMode".to_string(),
                value: frame.payload[0],
            })?;
        Ok(Self { mode })
    }
}

// ============================================================================
// 参数设置指令
// ============================================================================

/// 驱动参数键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum ParameterKey {
    /// 最大速度（步/秒）
    MaxSpeed = 0x01,
    /// 加速度档位
    Acceleration = 0x02,
    /// 运行电流（mA）
    RunCurrent = 0x03,
    /// 保持电流百分比
    HoldCurrentPercent = 0x04,
    /// 细分数
    Microstep = 0x05,
}

impl std::str::FromStr for ParameterKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "max-speed" => Ok(ParameterKey::MaxSpeed),
            "acceleration" => Ok(ParameterKey::Acceleration),
            "run-current" => Ok(ParameterKey::RunCurrent),
            "hold-current" | "hold-current-percent" => Ok(ParameterKey::HoldCurrentPercent),
            "microstep" => Ok(ParameterKey::Microstep),
            other => Err(ProtocolError::InvalidArgument(format!(
                "unknown parameter key '{other}'"
            ))),
        }
    }
}

/// 参数设置指令 (0x48)
///
/// 载荷 5 字节：Byte 0 参数键，Byte 1-4 参数值（i32 大端）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetParameterCommand {
    pub key: ParameterKey,
    pub value: i32,
}

impl SetParameterCommand {
    pub fn new(key: ParameterKey, value: i32) -> Self {
        Self { key, value }
    }

    pub fn to_frame(&self, address: u8) -> Frame {
        let mut payload = [0u8; 5];
        payload[0] = self.key.into();
        payload[1..5].copy_from_slice(&i32_to_bytes_be(self.value));
        Frame::new(address, FunctionCode::SetParameter, &payload)
    }
}

impl TryFrom<&Frame> for SetParameterCommand {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        expect_request(frame, FunctionCode::SetParameter)?;
        let payload = frame.payload();
        let key = ParameterKey::try_from(payload[0]).map_err(|_| ProtocolError::InvalidValue {
            field: "ParameterKey".to_string(),
            value: payload[0],
        })?;
        Ok(Self {
            key,
            value: read_i32_be(payload, 1),
        })
    }
}

// ============================================================================
// 无载荷指令
// ============================================================================

/// 构建无载荷请求帧（Identify / ReadStatus / Stop / ClearFault）
///
/// # 错误
/// - `ProtocolError::InvalidArgument`: 该功能码需要载荷
pub fn bare_request(address: u8, function: FunctionCode) -> Result<Frame, ProtocolError> {
    if function.request_len() != 0 {
        return Err(ProtocolError::InvalidArgument(format!(
            "{function:?} requires a {}-byte payload",
            function.request_len()
        )));
    }
    Ok(Frame::new(address, function, &[]))
}
