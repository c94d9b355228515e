//! # Stepper Client
//!
//! 共享串口总线上多个步进轴的高层接口：
//!
//! - 轴模型（显式状态机、标定、最近状态）
//! - 命令集（用户单位 → 协议帧，发送前的软限位校验）
//! - 设备管理器（同步 `send(axis, command)`，总线访问 FIFO 串行化）
//! - 启动配置快照（TOML）
//!
//! 如果需要直接收发协议帧，可以使用 `stepper-driver`。

pub mod axis;
pub mod command;
pub mod config;
pub mod manager;
pub mod types;

// 重新导出常用类型
pub use axis::{Axis, AxisRegistry, AxisState, StatusSnapshot};
pub use command::Command;
pub use config::{AxisConfig, BusConfig, ConfigError, StepperConfig};
pub use manager::DeviceManager;
pub use types::*;
