//! 设备命令：识别、回零、使能、停止、清除故障、参数

use super::ConnectArgs;
use crate::utils;
use anyhow::Result;
use clap::Args;
use stepper_sdk::Command;
use stepper_sdk::protocol::ParameterKey;

/// 单轴参数
#[derive(Args, Debug)]
pub struct AxisArgs {
    /// 轴（地址或名称）
    pub axis: String,
}

impl AxisArgs {
    fn send(&self, connect: &ConnectArgs, command: Command) -> Result<()> {
        let manager = connect.open()?;
        let address = manager.resolve_axis(&self.axis)?;
        let snapshot = manager.send(address, command)?;
        utils::print_snapshot(&snapshot);
        Ok(())
    }

    pub fn identify(&self, connect: &ConnectArgs) -> Result<()> {
        let manager = connect.open()?;
        let address = manager.resolve_axis(&self.axis)?;
        manager.send(address, Command::Identify)?;
        match manager.identity(address)? {
            Some(identity) => println!("axis 0x{address:02X} {identity}"),
            None => println!("axis 0x{address:02X} identity unknown"),
        }
        Ok(())
    }

    pub fn enable(&self, connect: &ConnectArgs) -> Result<()> {
        self.send(connect, Command::Enable(true))
    }

    pub fn clear_fault(&self, connect: &ConnectArgs) -> Result<()> {
        self.send(connect, Command::ClearFault)
    }
}

/// 单轴或全部轴
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// 轴（地址或名称）
    pub axis: Option<String>,

    /// 作用于全部已配置的轴
    #[arg(long)]
    pub all: bool,
}

impl TargetArgs {
    fn run(&self, connect: &ConnectArgs, command: Command) -> Result<()> {
        let manager = connect.open()?;
        match &self.axis {
            Some(id) => {
                let address = manager.resolve_axis(id)?;
                utils::print_snapshot(&manager.send(address, command)?);
                Ok(())
            },
            None => {
                let results = match command {
                    Command::Stop => manager.stop_all(),
                    Command::Home => manager.home_all(),
                    _ => manager.disable_all(),
                };
                utils::report_all(results)
            },
        }
    }

    pub fn home(&self, connect: &ConnectArgs) -> Result<()> {
        self.run(connect, Command::Home)
    }

    pub fn stop(&self, connect: &ConnectArgs) -> Result<()> {
        self.run(connect, Command::Stop)
    }

    pub fn disable(&self, connect: &ConnectArgs) -> Result<()> {
        self.run(connect, Command::Enable(false))
    }
}

/// 参数写入
#[derive(Args, Debug)]
pub struct SetParamArgs {
    /// 轴（地址或名称）
    pub axis: String,

    /// 参数名（max-speed / acceleration / run-current / hold-current / microstep）
    pub key: ParameterKey,

    /// 原始值
    #[arg(allow_negative_numbers = true)]
    pub value: i32,
}

impl SetParamArgs {
    pub fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let manager = connect.open()?;
        let address = manager.resolve_axis(&self.axis)?;
        let snapshot = manager.send(
            address,
            Command::SetParameter {
                key: self.key,
                value: self.value,
            },
        )?;
        utils::print_snapshot(&snapshot);
        Ok(())
    }
}
