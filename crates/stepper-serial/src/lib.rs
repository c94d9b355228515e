//! # Stepper Serial Adapter Layer
//!
//! 串口硬件抽象层，提供统一的字节管道接口。
//!
//! 适配层不解析任何字节：写入原样发送，读取按调用方给出的字节数和截止时间返回。
//! 截止时间读取是整个系统中唯一与挂钟时间绑定的阻塞点。

use std::time::Instant;
use thiserror::Error;

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::SerialPortAdapter;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockReply, MockSerialAdapter, MockSerialHandle};

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    /// 操作系统无法打开/占用端口
    #[error("Port unavailable: {port}: {reason}")]
    PortUnavailable { port: String, reason: String },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read timeout")]
    Timeout,

    #[error("Port closed")]
    Closed,
}

impl SerialError {
    /// 是否为不可恢复错误（会话应随之关闭）
    ///
    /// 读超时属于正常的总线现象，由事务层按重试策略处理。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SerialError::Timeout)
    }
}

/// 校验位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl std::str::FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            other => Err(format!("unknown parity '{other}'")),
        }
    }
}

/// 串口打开参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// 端口标识（如 "/dev/ttyUSB0"、"COM3"）
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 校验位（数据位固定 8，停止位固定 1）
    pub parity: Parity,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, baud_rate: u32, parity: Parity) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            parity,
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            parity: Parity::None,
        }
    }
}

/// 串口字节管道
///
/// 半双工、单主机总线的传输接口。实现者只负责字节搬运，
/// 帧边界由调用方通过 `read_until` 的字节数给出。
pub trait SerialAdapter: Send {
    /// 写入全部字节并刷新，直到发送完成
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 阻塞读取恰好 `len` 字节，超过 `deadline` 返回 `SerialError::Timeout`
    ///
    /// 超时时已读到的不完整字节被丢弃。
    fn read_until(&mut self, len: usize, deadline: Instant) -> Result<Vec<u8>, SerialError>;

    /// 丢弃接收缓冲区中的残留字节（重发前调用）
    fn clear_input(&mut self) -> Result<(), SerialError> {
        Ok(())
    }

    /// 释放端口，可重复调用
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// 端口名称（用于日志）
    fn port_name(&self) -> &str {
        "unknown"
    }
}

impl<T: SerialAdapter + ?Sized> SerialAdapter for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }

    fn read_until(&mut self, len: usize, deadline: Instant) -> Result<Vec<u8>, SerialError> {
        (**self).read_until(len, deadline)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        (**self).clear_input()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn port_name(&self) -> &str {
        (**self).port_name()
    }
}
