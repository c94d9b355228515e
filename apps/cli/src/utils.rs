//! 配置定位与结果输出

use anyhow::{Context, Result};
use std::path::PathBuf;
use stepper_sdk::{ClientError, DeviceManager, StatusSnapshot, StepperConfig};

/// 默认配置文件路径：`<config_dir>/stepper/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("stepper");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置，命令行参数覆盖文件中的总线设置
pub fn load_config(path: Option<&PathBuf>, port: Option<&str>) -> Result<StepperConfig> {
    let path = match path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = StepperConfig::load(&path)
        .with_context(|| format!("加载配置失败: {}", path.display()))?;

    if let Some(port) = port {
        config.bus.port = port.to_string();
    }
    config.validate().context("配置无效")?;
    Ok(config)
}

/// 打开总线并创建设备管理器
pub fn open_manager(config: &StepperConfig) -> Result<DeviceManager> {
    tracing::info!(port = %config.bus.port, axes = config.axes.len(), "Opening bus");
    DeviceManager::open(config).with_context(|| format!("打开总线失败: {}", config.bus.port))
}

pub fn print_snapshot(snapshot: &StatusSnapshot) {
    println!("{snapshot}");
}

/// 打印批量结果，任一轴失败时返回错误
pub fn report_all(results: Vec<(u8, Result<StatusSnapshot, ClientError>)>) -> Result<()> {
    let mut failed = 0;
    for (address, result) in results {
        match result {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(e) => {
                failed += 1;
                println!("axis 0x{address:02X} error: {e}");
            },
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} 个轴执行失败");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("stepper/config.toml"));
        }
    }

    #[test]
    fn test_load_config_with_port_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bus]\nport = \"/dev/ttyUSB0\"\n\n[[axes]]\naddress = 1\nsteps_per_unit = 10.0\nsoft_limit_min = 0.0\nsoft_limit_max = 100.0"
        )
        .unwrap();
        let path = file.path().to_path_buf();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.bus.port, "/dev/ttyUSB0");

        let config = load_config(Some(&path), Some("COM4")).unwrap();
        assert_eq!(config.bus.port, "COM4");
        assert_eq!(config.axes.len(), 1);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = load_config(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
