//! 轴模型
//!
//! 每个轴一个显式状态机：
//!
//! ```text
//!              任一成功事务                 moving = true
//! Unverified ───────────────► Idle ◄──────────────────► Moving
//!                              │        moving = false    │
//!                              │                          │
//!                              └──── 任一故障位 ──► Faulted ◄┘
//!                                                   │
//!                      ClearFault 成功且无故障 ──► Idle
//! ```
//!
//! 轴状态只由持有总线令牌的线程在应用应答时写入。

use crate::command::Command;
use crate::config::AxisConfig;
use crate::types::{Calibration, ClientError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use stepper_protocol::{
    FaultFlags, Feedback, Frame, FunctionCode, HomingMode, IdentityFeedback, StatusFeedback,
};
use tracing::{debug, warn};

/// 轴状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisState {
    /// 启动以来尚无成功事务
    #[default]
    Unverified,
    /// 空闲
    Idle,
    /// 运动中（含回零）
    Moving,
    /// 设备上报故障
    Faulted,
}

impl fmt::Display for AxisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisState::Unverified => "Unverified",
            AxisState::Idle => "Idle",
            AxisState::Moving => "Moving",
            AxisState::Faulted => "Faulted",
        };
        f.pad(name)
    }
}

impl AxisState {
    /// 收到状态应答后的迁移
    ///
    /// `function` 为产生该应答的请求功能码。
    pub fn on_status(self, function: FunctionCode, status: &StatusFeedback) -> AxisState {
        if status.faults.any() {
            return AxisState::Faulted;
        }
        let settled = if status.state.moving() || status.state.homing() {
            AxisState::Moving
        } else {
            AxisState::Idle
        };
        match (self, function) {
            // 只有显式清除故障才能离开 Faulted
            (AxisState::Faulted, FunctionCode::ClearFault) => settled,
            (AxisState::Faulted, _) => AxisState::Faulted,
            _ => settled,
        }
    }

    /// 收到版本或确认应答后的迁移（地址已验证）
    pub fn on_verified(self) -> AxisState {
        match self {
            AxisState::Unverified => AxisState::Idle,
            other => other,
        }
    }
}

/// 轴状态快照（返回给调用者）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    pub address: u8,
    pub state: AxisState,
    /// 位置（用户单位）
    pub position: f64,
    /// 速度（用户单位/秒）
    pub velocity: f64,
    /// 位置（步）
    pub position_steps: i32,
    pub enabled: bool,
    pub homing: bool,
    pub faults: FaultFlags,
    /// 最近一次成功读取状态的时间
    pub updated_at: Option<Instant>,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "axis 0x{:02X} {:<10} pos {:>12.3} vel {:>10.3} {}",
            self.address,
            self.state,
            self.position,
            self.velocity,
            if self.enabled { "enabled" } else { "disabled" }
        )?;
        if self.faults.any() {
            write!(f, " faults [{}]", self.faults.names().join(", "))?;
        }
        Ok(())
    }
}

/// 单个轴
#[derive(Debug, Clone)]
pub struct Axis {
    address: u8,
    name: Option<String>,
    calibration: Calibration,
    acceleration: u8,
    homing: HomingMode,
    state: AxisState,
    identity: Option<IdentityFeedback>,
    status: Option<StatusFeedback>,
    updated_at: Option<Instant>,
}

impl Axis {
    pub fn new(address: u8, calibration: Calibration) -> Self {
        Self {
            address,
            name: None,
            calibration,
            acceleration: 0,
            homing: HomingMode::Nearest,
            state: AxisState::Unverified,
            identity: None,
            status: None,
            updated_at: None,
        }
    }

    pub fn from_config(config: &AxisConfig) -> Self {
        Self {
            name: config.name.clone(),
            acceleration: config.acceleration,
            homing: config.homing,
            ..Self::new(config.address, config.calibration())
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// 每次运动指令携带的加速度档位
    pub fn acceleration(&self) -> u8 {
        self.acceleration
    }

    pub fn homing_mode(&self) -> HomingMode {
        self.homing
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    pub fn identity(&self) -> Option<IdentityFeedback> {
        self.identity
    }

    /// 最近已知位置（用户单位），尚未读到状态时为 `None`
    pub fn position(&self) -> Option<f64> {
        self.status
            .map(|status| self.calibration.steps_to_units(status.position_steps))
    }

    /// 检查当前状态是否允许该命令
    ///
    /// - Unverified 只允许 Identify 和 ClearFault
    /// - Faulted 拒绝运动类命令（MoveTo / MoveBy / Home）
    pub fn check_permitted(&self, command: &Command) -> Result<(), ClientError> {
        let permitted = match self.state {
            AxisState::Unverified => command.is_verification(),
            AxisState::Faulted => !command.requires_motion(),
            AxisState::Idle | AxisState::Moving => true,
        };
        if permitted {
            Ok(())
        } else {
            Err(ClientError::InvalidState {
                address: self.address,
                state: self.state,
                command: command.name(),
            })
        }
    }

    /// 应用一条已解析的应答
    pub fn apply(&mut self, function: FunctionCode, feedback: &Feedback, now: Instant) {
        let previous = self.state;
        match feedback {
            Feedback::Status(status) => {
                self.state = self.state.on_status(function, status);
                self.status = Some(*status);
                // 时间戳只向前
                self.updated_at = Some(match self.updated_at {
                    Some(last) if last > now => last,
                    _ => now,
                });
                if status.faults.any() && previous != AxisState::Faulted {
                    warn!(
                        address = self.address,
                        faults = ?status.faults.names(),
                        "Axis reported fault"
                    );
                }
            },
            Feedback::Identity(identity) => {
                self.state = self.state.on_verified();
                self.identity = Some(*identity);
            },
            Feedback::Ack(_) => {
                self.state = self.state.on_verified();
            },
        }
        if previous != self.state {
            debug!(
                address = self.address,
                from = %previous,
                to = %self.state,
                "Axis state transition"
            );
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> StatusSnapshot {
        let status = self.status.unwrap_or_default();
        StatusSnapshot {
            address: self.address,
            state: self.state,
            position: self.calibration.steps_to_units(status.position_steps),
            velocity: self.calibration.steps_to_units(status.velocity_steps),
            position_steps: status.position_steps,
            enabled: status.state.enabled(),
            homing: status.state.homing(),
            faults: status.faults,
            updated_at: self.updated_at,
        }
    }
}

/// 轴注册表
///
/// 地址 → 轴。配置加载时创建，之后只有轴内容变化，集合本身不变。
#[derive(Debug, Default)]
pub struct AxisRegistry {
    axes: RwLock<BTreeMap<u8, Axis>>,
}

impl AxisRegistry {
    pub fn new(axes: impl IntoIterator<Item = Axis>) -> Self {
        let axes = axes.into_iter().map(|axis| (axis.address, axis)).collect();
        Self {
            axes: RwLock::new(axes),
        }
    }

    pub fn len(&self) -> usize {
        self.axes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.read().is_empty()
    }

    pub fn contains(&self, address: u8) -> bool {
        self.axes.read().contains_key(&address)
    }

    /// 全部地址（升序）
    pub fn addresses(&self) -> Vec<u8> {
        self.axes.read().keys().copied().collect()
    }

    /// 按名称查找地址
    pub fn address_of(&self, name: &str) -> Option<u8> {
        self.axes
            .read()
            .values()
            .find(|axis| axis.name() == Some(name))
            .map(Axis::address)
    }

    /// 轴标定
    pub fn calibration_for(&self, address: u8) -> Result<Calibration, ClientError> {
        self.with_axis(address, |axis| *axis.calibration())
    }

    pub fn snapshot(&self, address: u8) -> Result<StatusSnapshot, ClientError> {
        self.with_axis(address, Axis::snapshot)
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.axes.read().values().map(Axis::snapshot).collect()
    }

    /// 只读访问某个轴
    pub fn with_axis<R>(&self, address: u8, f: impl FnOnce(&Axis) -> R) -> Result<R, ClientError> {
        self.axes
            .read()
            .get(&address)
            .map(f)
            .ok_or(ClientError::NotConfigured(address))
    }

    /// 应用已解析的应答
    ///
    /// 返回 `false` 表示地址没有配置（应答被忽略）。
    pub fn apply(&self, address: u8, function: FunctionCode, feedback: &Feedback) -> bool {
        match self.axes.write().get_mut(&address) {
            Some(axis) => {
                axis.apply(function, feedback, Instant::now());
                true
            },
            None => false,
        }
    }

    /// 应用一帧应答
    ///
    /// 未配置地址的帧被忽略（共享总线上可能有本进程不管理的设备）；
    /// 无法解析的帧只记录日志。
    pub fn apply_response(&self, frame: &Frame) {
        if !self.contains(frame.address) {
            debug!(
                address = frame.address,
                function = ?frame.function,
                "Ignoring response from unconfigured address"
            );
            return;
        }
        match Feedback::try_from(frame) {
            Ok(feedback) => {
                self.apply(frame.address, frame.function, &feedback);
            },
            Err(e) => {
                warn!(address = frame.address, error = %e, "Unparseable response ignored");
            },
        }
    }
}
