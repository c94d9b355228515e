//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use stepper_sdk::prelude::*;
//! ```

pub use crate::client::{
    AxisConfig, AxisState, BusConfig, Calibration, Command, DeviceManager, Direction,
    StatusSnapshot, StepperConfig,
};
pub use crate::protocol::{HomingMode, ParameterKey};
pub use crate::serial::SerialAdapter;

// 错误类型
pub use crate::client::ClientError;
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
pub use crate::serial::SerialError;
