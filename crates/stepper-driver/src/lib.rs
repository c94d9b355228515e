//! 驱动层模块
//!
//! 本模块提供串口总线的事务管理功能，包括：
//! - 总线会话（唯一的串口连接 + 唯一的在途事务槽位）
//! - FIFO 总线令牌（任意时刻最多一个请求/应答交换）
//! - 事务状态机（尝试次数、截止时间、结果）
//! - 重试与线性退避
//! - 轻量计数器（可观测性）
//!
//! # 使用场景
//!
//! 适用于需要直接收发协议帧的场景。
//! 大多数用户应该使用 `stepper-client` 提供的设备管理接口。

mod builder;
mod error;
pub mod metrics;
pub mod retry;
mod session;
mod token;
pub mod transaction;

pub use builder::BusBuilder;
pub use error::{DriverError, FailureReason};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use retry::RetryPolicy;
pub use session::{BusGuard, BusSession, SessionConfig};
pub use transaction::{NextStep, Transaction, TransactionOutcome};
