//! 客户端公共类型
//!
//! - 错误类型（`ClientError`）
//! - 标定与单位换算（`Calibration`、`Direction`）

pub mod calibration;
pub mod error;

pub use calibration::{Calibration, Direction};
pub use error::ClientError;
