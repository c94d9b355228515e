//! 运动命令

use super::ConnectArgs;
use crate::utils;
use anyhow::Result;
use clap::Args;
use stepper_sdk::Command;

/// 绝对运动参数
#[derive(Args, Debug)]
pub struct MoveArgs {
    /// 轴（地址或名称）
    pub axis: String,

    /// 目标位置（用户单位）
    #[arg(allow_negative_numbers = true)]
    pub target: f64,

    /// 速度（用户单位/秒）
    #[arg(short, long)]
    pub speed: f64,
}

impl MoveArgs {
    pub fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let manager = connect.open()?;
        let address = manager.resolve_axis(&self.axis)?;
        let snapshot = manager.send(
            address,
            Command::MoveTo {
                target: self.target,
                speed: self.speed,
            },
        )?;
        utils::print_snapshot(&snapshot);
        Ok(())
    }
}

/// 相对运动参数
#[derive(Args, Debug)]
pub struct MoveByArgs {
    /// 轴（地址或名称）
    pub axis: String,

    /// 位移（用户单位，可为负）
    #[arg(allow_negative_numbers = true)]
    pub delta: f64,

    /// 速度（用户单位/秒）
    #[arg(short, long)]
    pub speed: f64,
}

impl MoveByArgs {
    pub fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let manager = connect.open()?;
        let address = manager.resolve_axis(&self.axis)?;
        let snapshot = manager.send(
            address,
            Command::MoveBy {
                delta: self.delta,
                speed: self.speed,
            },
        )?;
        utils::print_snapshot(&snapshot);
        Ok(())
    }
}
