//! 启动配置快照
//!
//! 总线参数与轴定义在启动时一次性加载，之后只读（不支持热加载）。
//!
//! ```toml
//! [bus]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! parity = "none"
//! timeout_ms = 100
//!
//! [[axes]]
//! address = 5
//! name = "x"
//! steps_per_unit = 100.0
//! soft_limit_min = 0.0
//! soft_limit_max = 1000.0
//! ```

use crate::types::{Calibration, Direction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepper_driver::{BusBuilder, RetryPolicy, SessionConfig};
use stepper_protocol::{HomingMode, is_device_address};
use stepper_serial::Parity;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件无法读取
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// 内容不合法
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_timeout_ms() -> u64 {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    20
}

/// 总线参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// 串口标识
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub parity: Parity,
    /// 单次尝试的应答超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 最大尝试次数（含首次发送）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 线性退避基准（毫秒）
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl BusConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            parity: Parity::None,
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            retry: self.retry_policy(),
            default_timeout: self.timeout(),
        }
    }

    /// 按本配置预设的总线 Builder
    pub fn builder(&self) -> BusBuilder {
        BusBuilder::new()
            .port(self.port.clone())
            .baud_rate(self.baud_rate)
            .parity(self.parity)
            .timeout(self.timeout())
            .retry_policy(self.retry_policy())
    }
}

/// 单轴定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// 总线地址（1..=254）
    pub address: u8,
    /// 可选名称（命令行中可代替地址）
    #[serde(default)]
    pub name: Option<String>,
    /// 每用户单位的步数
    pub steps_per_unit: f64,
    #[serde(default)]
    pub direction: Direction,
    pub soft_limit_min: f64,
    pub soft_limit_max: f64,
    /// 加速度档位（0 = 固件默认）
    #[serde(default)]
    pub acceleration: u8,
    #[serde(default)]
    pub homing: HomingMode,
}

impl AxisConfig {
    pub fn new(address: u8, calibration: Calibration) -> Self {
        Self {
            address,
            name: None,
            steps_per_unit: calibration.steps_per_unit,
            direction: calibration.direction,
            soft_limit_min: calibration.soft_min,
            soft_limit_max: calibration.soft_max,
            acceleration: 0,
            homing: HomingMode::Nearest,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn calibration(&self) -> Calibration {
        Calibration::new(
            self.steps_per_unit,
            self.direction,
            self.soft_limit_min,
            self.soft_limit_max,
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_device_address(self.address) {
            return Err(ConfigError::Invalid(format!(
                "axis address {} outside 1..=254",
                self.address
            )));
        }
        if !(self.steps_per_unit.is_finite() && self.steps_per_unit > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "axis 0x{:02X}: steps_per_unit must be positive",
                self.address
            )));
        }
        if self.soft_limit_min.is_nan()
            || self.soft_limit_max.is_nan()
            || self.soft_limit_min > self.soft_limit_max
        {
            return Err(ConfigError::Invalid(format!(
                "axis 0x{:02X}: soft limits [{}, {}] are inverted",
                self.address, self.soft_limit_min, self.soft_limit_max
            )));
        }
        Ok(())
    }
}

/// 完整配置快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepperConfig {
    pub bus: BusConfig,
    #[serde(default)]
    pub axes: Vec<AxisConfig>,
}

impl StepperConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: StepperConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// 校验配置
    ///
    /// 拒绝：重复或越界的地址、重复的名称、非正的 steps_per_unit、
    /// 颠倒的软限位、`max_attempts == 0`、空端口名。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.port.trim().is_empty() {
            return Err(ConfigError::Invalid("bus.port is empty".to_string()));
        }
        if self.bus.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "bus.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut addresses = BTreeSet::new();
        let mut names = BTreeSet::new();
        for axis in &self.axes {
            axis.validate()?;
            if !addresses.insert(axis.address) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate axis address 0x{:02X}",
                    axis.address
                )));
            }
            if let Some(name) = &axis.name {
                if !names.insert(name.as_str()) {
                    return Err(ConfigError::Invalid(format!("duplicate axis name '{name}'")));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[bus]
port = "/dev/ttyUSB0"
parity = "even"
timeout_ms = 50

[[axes]]
address = 5
name = "x"
steps_per_unit = 100.0
soft_limit_min = 0.0
soft_limit_max = 1000.0

[[axes]]
address = 6
steps_per_unit = 88.9
direction = "reversed"
soft_limit_min = -180.0
soft_limit_max = 180.0
acceleration = 10
homing = "limit-switch"
"#;

    #[test]
    fn test_parse_sample() {
        let config = StepperConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.bus.port, "/dev/ttyUSB0");
        assert_eq!(config.bus.baud_rate, 115_200);
        assert_eq!(config.bus.parity, Parity::Even);
        assert_eq!(config.bus.timeout(), Duration::from_millis(50));
        assert_eq!(
            config.bus.retry_policy(),
            RetryPolicy::new(3, Duration::from_millis(20))
        );

        assert_eq!(config.axes.len(), 2);
        let x = &config.axes[0];
        assert_eq!(x.name.as_deref(), Some("x"));
        assert_eq!(x.direction, Direction::Normal);
        assert_eq!(x.homing, HomingMode::Nearest);
        assert_eq!(x.calibration().soft_max, 1000.0);

        let b = &config.axes[1];
        assert_eq!(b.direction, Direction::Reversed);
        assert_eq!(b.acceleration, 10);
        assert_eq!(b.homing, HomingMode::LimitSwitch);
    }

    #[test]
    fn test_rejects_duplicate_address() {
        let mut config = StepperConfig::from_toml(SAMPLE).unwrap();
        config.axes[1].address = 5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate axis address 0x05"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = StepperConfig::from_toml(SAMPLE).unwrap();

        let mut config = base.clone();
        config.axes[0].address = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.axes[0].steps_per_unit = 0.0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.axes[0].soft_limit_min = 2000.0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.bus.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = base;
        config.axes[1].name = Some("x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = StepperConfig::from_toml("[bus]\nbaud_rate = 9600\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StepperConfig::load("/nonexistent/stepper.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_builder_from_bus_config() {
        let bus = BusConfig::new("COM3");
        let builder = bus.builder();
        assert_eq!(builder.settings().port, "COM3");
        assert_eq!(builder.session_config(), bus.session_config());
    }
}
