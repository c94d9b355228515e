//! 命令定义和实现

pub mod axis;
pub mod config;
pub mod motion;
pub mod status;

pub use axis::{AxisArgs, SetParamArgs, TargetArgs};
pub use config::ConfigCommand;
pub use motion::{MoveArgs, MoveByArgs};
pub use status::StatusArgs;

use crate::utils;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use stepper_sdk::{DeviceManager, StepperConfig};

/// 总线连接参数（覆盖配置文件）
#[derive(Args, Debug, Default)]
pub struct ConnectArgs {
    /// 配置文件路径（默认 <config_dir>/stepper/config.toml）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 串口（覆盖配置）
    #[arg(short, long, global = true)]
    pub port: Option<String>,
}

impl ConnectArgs {
    pub fn load(&self) -> Result<StepperConfig> {
        utils::load_config(self.config.as_ref(), self.port.as_deref())
    }

    pub fn open(&self) -> Result<DeviceManager> {
        let config = self.load()?;
        utils::open_manager(&config)
    }
}
