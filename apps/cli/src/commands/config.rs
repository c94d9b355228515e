//! 配置管理命令
//!
//! 配置文件是启动时读取的只读快照；这里只负责定位、展示和生成模板。

use super::ConnectArgs;
use crate::utils;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;
use stepper_sdk::{AxisConfig, BusConfig, Calibration, Direction, StepperConfig};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示配置文件路径
    Path,

    /// 显示解析后的配置
    Show,

    /// 生成配置模板
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let path = match &connect.config {
            Some(path) => path.clone(),
            None => utils::default_config_path()?,
        };

        match self {
            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
            ConfigCommand::Show => {
                let config = connect.load()?;
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            },
            ConfigCommand::Init { force } => {
                let port = connect.port.as_deref().unwrap_or(default_port());
                write_template(&path, port, *force)?;
                println!("✅ 配置模板已写入 {}", path.display());
                Ok(())
            },
        }
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) { "COM3" } else { "/dev/ttyUSB0" }
}

/// 单轴示例配置
fn template(port: &str) -> StepperConfig {
    StepperConfig {
        bus: BusConfig::new(port),
        axes: vec![
            AxisConfig::new(1, Calibration::new(100.0, Direction::Normal, 0.0, 1000.0))
                .with_name("x"),
        ],
    }
}

fn write_template(path: &Path, port: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} 已存在，使用 --force 覆盖", path.display());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("创建配置目录失败")?;
    }
    let text = toml::to_string_pretty(&template(port))?;
    fs::write(path, text).context("写入配置文件失败")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepper").join("config.toml");

        write_template(&path, "/dev/ttyACM0", false).unwrap();
        let config = StepperConfig::load(&path).unwrap();
        assert_eq!(config, template("/dev/ttyACM0"));
        assert_eq!(config.axes[0].name.as_deref(), Some("x"));

        // 已存在且未指定 --force
        assert!(write_template(&path, "/dev/ttyACM0", false).is_err());
        write_template(&path, "COM7", true).unwrap();
        assert_eq!(StepperConfig::load(&path).unwrap().bus.port, "COM7");
    }
}
