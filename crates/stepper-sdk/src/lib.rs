//! Stepper SDK - 共享串口总线上的步进电机控制
//!
//! 多个步进驱动器挂在同一条半双工串口总线上，按地址区分。
//! SDK 负责把"请求 → 应答"串行化，处理超时、重试和损坏帧，
//! 并为每个轴维护显式的状态机与标定。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **串口层** (`serial`): 字节管道抽象，带截止时间的读取
//! - **协议层** (`protocol`): 帧编解码、功能码目录、载荷格式
//! - **驱动层** (`driver`): 总线令牌、事务、重试策略、指标
//! - **客户端层** (`client`): 轴模型、命令集、设备管理器、配置
//!
//! # 快速开始
//!
//! ```no_run
//! use stepper_sdk::prelude::*;
//!
//! stepper_sdk::init_logging();
//! let config = StepperConfig::load("stepper.toml")?;
//! let manager = DeviceManager::open(&config)?;
//! let status = manager.send(0x05, Command::MoveTo { target: 500.0, speed: 50.0 })?;
//! println!("{status}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod logging;
pub mod prelude;

pub use stepper_client as client;
pub use stepper_driver as driver;
pub use stepper_protocol as protocol;
pub use stepper_serial as serial;

// 客户端层（推荐入口）
pub use client::{
    AxisConfig, AxisState, BusConfig, Calibration, ClientError, Command, ConfigError,
    DeviceManager, Direction, StatusSnapshot, StepperConfig,
};

// 驱动层（直接收发帧时使用）
pub use driver::{BusBuilder, BusSession, DriverError, RetryPolicy};

// 串口层
pub use serial::{Parity, SerialAdapter, SerialError};

pub use protocol::ProtocolError;

pub use logging::{init_logging, init_logging_with};
