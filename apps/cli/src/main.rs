//! # Stepper CLI
//!
//! 共享串口总线上步进轴的命令行工具。每次调用：加载配置 → 打开总线 →
//! 执行一个命令 → 打印结果 → 关闭总线。
//!
//! ```bash
//! # 生成配置模板
//! stepper-cli config init --port /dev/ttyUSB0
//!
//! # 查询全部轴
//! stepper-cli status
//!
//! # 轴 5 移动到 500 单位，速度 50 单位/秒
//! stepper-cli move 5 500 --speed 50
//!
//! # 按名称访问
//! stepper-cli move-by x -- -10 --speed 20
//! stepper-cli stop --all
//! ```
//!
//! 日志级别由 `RUST_LOG` 或 `-v` 控制。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

use commands::{
    AxisArgs, ConfigCommand, ConnectArgs, MoveArgs, MoveByArgs, SetParamArgs, StatusArgs,
    TargetArgs,
};

/// Stepper CLI - 步进轴命令行工具
#[derive(Parser, Debug)]
#[command(name = "stepper-cli")]
#[command(about = "Command-line interface for stepper axes on a shared serial bus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    /// 输出调试日志（可重复：-vv 包含协议帧）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 读取轴状态（默认全部轴）
    Status(StatusArgs),

    /// 读取固件版本
    Identify(AxisArgs),

    /// 绝对运动
    Move(MoveArgs),

    /// 相对运动
    MoveBy(MoveByArgs),

    /// 按配置的回零模式回零
    Home(TargetArgs),

    /// 停止运动
    Stop(TargetArgs),

    /// 使能
    Enable(AxisArgs),

    /// 失能
    Disable(TargetArgs),

    /// 清除故障
    ClearFault(AxisArgs),

    /// 写驱动参数
    SetParam(SetParamArgs),
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,stepper_cli=info",
        1 => "info,stepper_client=debug",
        _ => "debug",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stepper_sdk::init_logging_with(log_filter(cli.verbose));

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&cli.connect),
        Commands::Status(args) => args.execute(&cli.connect),
        Commands::Identify(args) => args.identify(&cli.connect),
        Commands::Move(args) => args.execute(&cli.connect),
        Commands::MoveBy(args) => args.execute(&cli.connect),
        Commands::Home(args) => args.home(&cli.connect),
        Commands::Stop(args) => args.stop(&cli.connect),
        Commands::Enable(args) => args.enable(&cli.connect),
        Commands::Disable(args) => args.disable(&cli.connect),
        Commands::ClearFault(args) => args.clear_fault(&cli.connect),
        Commands::SetParam(args) => args.execute(&cli.connect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move() {
        let cli = Cli::try_parse_from([
            "stepper-cli",
            "--port",
            "/dev/ttyUSB1",
            "move",
            "0x05",
            "500",
            "--speed",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.connect.port.as_deref(), Some("/dev/ttyUSB1"));
        match cli.command {
            Commands::Move(args) => {
                assert_eq!(args.axis, "0x05");
                assert_eq!(args.target, 500.0);
                assert_eq!(args.speed, 50.0);
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_negative_move_by() {
        let cli = Cli::try_parse_from(["stepper-cli", "move-by", "x", "--speed", "5", "--", "-10"])
            .unwrap();
        match cli.command {
            Commands::MoveBy(args) => {
                assert_eq!(args.axis, "x");
                assert_eq!(args.delta, -10.0);
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_stop_all() {
        let cli = Cli::try_parse_from(["stepper-cli", "stop", "--all"]).unwrap();
        match cli.command {
            Commands::Stop(args) => {
                assert!(args.all);
                assert!(args.axis.is_none());
            },
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["stepper-cli", "stop", "5", "--all"]).is_err());
        assert!(Cli::try_parse_from(["stepper-cli", "stop"]).is_err());
    }

    #[test]
    fn test_parse_home() {
        let cli = Cli::try_parse_from(["stepper-cli", "home", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Home(ref args) if args.all));

        let cli = Cli::try_parse_from(["stepper-cli", "home", "x"]).unwrap();
        match cli.command {
            Commands::Home(args) => {
                assert_eq!(args.axis.as_deref(), Some("x"));
                assert!(!args.all);
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_set_param() {
        let cli =
            Cli::try_parse_from(["stepper-cli", "set-param", "5", "run-current", "1200"]).unwrap();
        match cli.command {
            Commands::SetParam(args) => {
                assert_eq!(args.key, stepper_sdk::protocol::ParameterKey::RunCurrent);
                assert_eq!(args.value, 1200);
            },
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["stepper-cli", "set-param", "5", "bogus", "1"]).is_err());
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0), "warn,stepper_cli=info");
        assert_eq!(log_filter(5), "debug");
    }
}
