//! 状态查询命令

use super::ConnectArgs;
use crate::utils;
use anyhow::Result;
use clap::Args;

/// 状态查询参数
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// 轴（地址或名称），省略时查询全部
    pub axes: Vec<String>,
}

impl StatusArgs {
    pub fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let manager = connect.open()?;

        if self.axes.is_empty() {
            return utils::report_all(manager.refresh_all());
        }

        let results = self
            .axes
            .iter()
            .map(|id| -> Result<_> {
                let address = manager.resolve_axis(id)?;
                Ok((address, manager.send(address, stepper_sdk::Command::ReadStatus)))
            })
            .collect::<Result<Vec<_>>>()?;
        utils::report_all(results)
    }
}
