//! # Stepper Protocol
//!
//! 串口总线步进驱动器协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `function`: 功能码目录与应答形态
//! - `constants`: 协议常量定义
//! - `codec`: 帧编码/解码与校验和
//! - `control`: 控制帧载荷构建
//! - `feedback`: 应答帧载荷解析
//!
//! ## 帧格式
//!
//! ```text
//! [address][function][payload...][checksum]
//! ```
//!
//! 校验和为前面所有字节的累加和（模 256）。多字节整数使用大端字节序。

pub mod codec;
pub mod constants;
pub mod control;
pub mod feedback;
pub mod function;

// 重新导出常用类型
pub use codec::{checksum, decode, encode};
pub use constants::*;
pub use control::*;
pub use feedback::*;
pub use function::{FunctionCode, ResponseShape};

use smallvec::SmallVec;
use thiserror::Error;

/// 帧载荷缓冲区
///
/// 最长载荷为状态应答的 10 字节，栈上预留 12 字节，避免堆分配。
pub type Payload = SmallVec<[u8; 12]>;

/// 一个已校验的协议帧
///
/// 协议层和串口层之间的中间抽象：
///
/// ```text
/// Command Set (stepper-client)
///     ↓ control::*::to_frame() 构建 / feedback::* 解析
/// Frame (此类型)
///     ↓ codec::encode / codec::decode
/// Serial Layer (stepper-serial)
/// ```
///
/// 校验和不单独存储，始终由地址、功能码和载荷计算得出，
/// 因此任何 `Frame` 值都满足校验不变量。
///
/// # 示例
///
/// ```rust
/// use stepper_protocol::{Frame, FunctionCode, decode};
///
/// let frame = Frame::new(0x05, FunctionCode::ReadStatus, &[]);
/// let bytes = frame.encode().unwrap();
/// assert_eq!(bytes, vec![0x05, 0x43, 0x48]);
/// assert_eq!(decode(&bytes).unwrap(), frame);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 设备地址（1..=254）
    pub address: u8,

    /// 功能码
    pub function: FunctionCode,

    /// 载荷（长度由功能码决定）
    pub payload: Payload,
}

impl Frame {
    /// 创建帧（不做载荷长度校验，校验在 `encode()` 中进行）
    pub fn new(address: u8, function: FunctionCode, payload: &[u8]) -> Self {
        Self {
            address,
            function,
            payload: SmallVec::from_slice(payload),
        }
    }

    /// 获取载荷切片
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 计算本帧的校验和
    pub fn checksum(&self) -> u8 {
        checksum(&[self.address, u8::from(self.function)]).wrapping_add(checksum(&self.payload))
    }

    /// 按请求载荷表编码为线上字节
    ///
    /// # 错误
    /// - `ProtocolError::InvalidArgument`: 地址越界或载荷长度与功能码不符
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self.address, self.function, &self.payload)
    }

    /// 直接序列化为线上字节（不做任何校验）
    ///
    /// 用于模拟设备构造应答帧，应答载荷与请求载荷长度不同。
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.push(self.address);
        bytes.push(self.function.into());
        bytes.extend_from_slice(&self.payload);
        bytes.push(self.checksum());
        bytes
    }

    /// 线上长度（含地址、功能码和校验和）
    pub fn wire_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 编码参数非法（地址越界、载荷长度不符）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 帧结构损坏（长度不足、地址非法）
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// 校验和不匹配
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// 未知功能码
    #[error("Unknown function code: 0x{0:02X}")]
    UnknownFunction(u8),

    /// 载荷长度与应答表不符
    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 字段取值非法
    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

impl ProtocolError {
    /// 是否属于线路噪声/损坏类错误（事务层按重试处理）
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedFrame(_)
                | ProtocolError::ChecksumMismatch { .. }
                | ProtocolError::UnknownFunction(_)
        )
    }
}

/// 字节序转换工具函数
///
/// 协议使用大端字节序。
///
/// 大端字节序转 i32
pub fn bytes_to_i32_be(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// i32 转大端字节序
pub fn i32_to_bytes_be(value: i32) -> [u8; 4] {
    value.to_be_bytes()
}

/// u16 转大端字节序
pub fn u16_to_bytes_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// 从载荷中按偏移读取大端 i32
///
/// 调用前须已校验载荷长度。
pub(crate) fn read_i32_be(payload: &[u8], offset: usize) -> i32 {
    bytes_to_i32_be([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}
