//! Builder 模式实现
//!
//! 提供链式构造 `BusSession` 实例的便捷方式。

use crate::error::DriverError;
use crate::retry::RetryPolicy;
use crate::session::{BusSession, SessionConfig};
use std::time::Duration;
use stepper_serial::{Parity, SerialAdapter, SerialSettings};

/// BusSession Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use stepper_driver::BusBuilder;
/// use std::time::Duration;
///
/// let session = BusBuilder::new()
///     .port("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .timeout(Duration::from_millis(50))
///     .max_attempts(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct BusBuilder {
    /// 串口参数
    settings: SerialSettings,
    /// 会话配置（重试、超时）
    config: SessionConfig,
}

impl BusBuilder {
    /// 创建新的 Builder
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置串口（必填，"/dev/ttyUSB0"、"COM3" 等）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.settings.port = port.into();
        self
    }

    /// 设置波特率（可选，默认 115200）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// 设置校验位（可选，默认无校验）
    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    /// 设置单次尝试的应答超时（可选，默认 100ms）
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// 设置完整的重试策略
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// 设置最大尝试次数（可选，默认 3）
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.retry = RetryPolicy::new(max_attempts, self.config.retry.base_delay);
        self
    }

    /// 设置退避基准（可选，默认 20ms）
    pub fn backoff(mut self, base_delay: Duration) -> Self {
        self.config.retry.base_delay = base_delay;
        self
    }

    /// 当前串口参数
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// 当前会话配置
    pub fn session_config(&self) -> SessionConfig {
        self.config
    }

    /// 打开串口并构建会话
    ///
    /// # Errors
    /// - `DriverError::InvalidInput`: 未设置串口
    /// - `DriverError::Serial`: 端口无法打开
    #[cfg(feature = "native")]
    pub fn build(self) -> Result<BusSession, DriverError> {
        if self.settings.port.is_empty() {
            return Err(DriverError::InvalidInput("serial port not set".to_string()));
        }
        let adapter = stepper_serial::SerialPortAdapter::open(&self.settings)?;
        Ok(BusSession::new(adapter, self.config))
    }

    /// 在给定适配器上构建会话（测试、自定义传输）
    ///
    /// 串口参数被忽略。
    pub fn build_with_adapter(self, adapter: impl SerialAdapter + 'static) -> BusSession {
        BusSession::new(adapter, self.config)
    }
}
