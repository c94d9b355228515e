//! 设备管理器
//!
//! 对外的同步请求/应答接口：
//!
//! ```text
//! send(axis, command)
//!   ├─ 发送前校验（软限位、速度）            ← 不占用总线
//!   ├─ 排队获取总线令牌（可设截止时间）
//!   ├─ 未验证的轴先透明地 Identify
//!   ├─ 相对运动且位置未知时先 ReadStatus
//!   ├─ 状态门控（Unverified / Faulted）
//!   ├─ 构帧 → 事务 → 解析 → 应用到轴模型
//!   └─ 返回状态快照
//! ```
//!
//! 整条序列在一次总线持有内完成，期间不会插入其他调用者的事务。

use crate::axis::{Axis, AxisRegistry, AxisState, StatusSnapshot};
use crate::command::Command;
use crate::config::StepperConfig;
use crate::types::{Calibration, ClientError};
use std::time::{Duration, Instant};
use stepper_driver::{BusGuard, BusSession, MetricsSnapshot};
use stepper_protocol::{Feedback, Frame, IdentityFeedback};
use stepper_serial::SerialAdapter;
use tracing::{debug, info, warn};

/// 设备管理器
///
/// 可在多个线程间共享（`Arc<DeviceManager>`），总线访问按 FIFO 串行化。
///
/// # Example
///
/// ```no_run
/// use stepper_client::{Command, DeviceManager, StepperConfig};
///
/// let config = StepperConfig::load("stepper.toml")?;
/// let manager = DeviceManager::open(&config)?;
/// let status = manager.send(0x05, Command::MoveTo { target: 500.0, speed: 50.0 })?;
/// println!("{status}");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DeviceManager {
    session: BusSession,
    registry: AxisRegistry,
}

impl DeviceManager {
    /// 在已建立的总线会话上创建
    pub fn new(session: BusSession, axes: impl IntoIterator<Item = Axis>) -> Self {
        let registry = AxisRegistry::new(axes);
        info!(
            port = session.port(),
            axes = ?registry.addresses(),
            "Device manager ready"
        );
        Self { session, registry }
    }

    /// 按配置打开串口并创建
    #[cfg(feature = "native")]
    pub fn open(config: &StepperConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let session = config.bus.builder().build()?;
        Ok(Self::new(session, config.axes.iter().map(Axis::from_config)))
    }

    /// 按配置在给定适配器上创建（测试、自定义传输）
    pub fn with_adapter(
        config: &StepperConfig,
        adapter: impl SerialAdapter + 'static,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let session = config.bus.builder().build_with_adapter(adapter);
        Ok(Self::new(session, config.axes.iter().map(Axis::from_config)))
    }

    pub fn session(&self) -> &BusSession {
        &self.session
    }

    pub fn registry(&self) -> &AxisRegistry {
        &self.registry
    }

    /// 发送命令并等待结果
    ///
    /// 无限等待总线令牌。
    pub fn send(&self, address: u8, command: Command) -> Result<StatusSnapshot, ClientError> {
        self.dispatch(address, command, None)
    }

    /// 发送命令，排队等待总线不超过 `deadline`
    ///
    /// 截止时间只约束排队阶段；事务一旦开始就会完成或耗尽重试。
    pub fn send_until(
        &self,
        address: u8,
        command: Command,
        deadline: Instant,
    ) -> Result<StatusSnapshot, ClientError> {
        self.dispatch(address, command, Some(deadline))
    }

    /// 发送命令，排队等待总线不超过 `wait`
    pub fn send_within(
        &self,
        address: u8,
        command: Command,
        wait: Duration,
    ) -> Result<StatusSnapshot, ClientError> {
        self.send_until(address, command, Instant::now() + wait)
    }

    fn dispatch(
        &self,
        address: u8,
        command: Command,
        deadline: Option<Instant>,
    ) -> Result<StatusSnapshot, ClientError> {
        self.registry
            .with_axis(address, |axis| command.validate(axis))??;

        let mut bus = self.session.acquire(deadline)?;
        let timeout = bus.default_timeout();
        debug!(address, %command, "Sending command");

        let state = self.registry.with_axis(address, Axis::state)?;
        if state == AxisState::Unverified && !matches!(command, Command::Identify) {
            debug!(address, "Verifying axis before first command");
            self.transact(&mut bus, address, Command::Identify, timeout)?;
        }

        if matches!(command, Command::MoveBy { .. })
            && self.registry.with_axis(address, Axis::position)?.is_none()
        {
            self.transact(&mut bus, address, Command::ReadStatus, timeout)?;
        }

        self.registry
            .with_axis(address, |axis| axis.check_permitted(&command))??;
        self.transact(&mut bus, address, command, timeout)?;

        let snapshot = self.registry.snapshot(address)?;
        drop(bus);
        Ok(snapshot)
    }

    /// 在已持有的总线上执行一个命令并应用应答
    fn transact(
        &self,
        bus: &mut BusGuard<'_>,
        address: u8,
        command: Command,
        timeout: Duration,
    ) -> Result<Feedback, ClientError> {
        let request = self
            .registry
            .with_axis(address, |axis| command.to_frame(axis))??;
        let response = bus.execute(&request, timeout)?;
        let feedback = command.parse_response(&response)?;
        self.registry.apply(address, response.function, &feedback);

        if let Feedback::Ack(ack) = feedback {
            if !ack.is_accepted() {
                warn!(address, %command, code = ?ack.code, "Command rejected by device");
                return Err(ClientError::Rejected {
                    address,
                    function: ack.function,
                    code: ack.code,
                });
            }
        }
        Ok(feedback)
    }

    /// 按顺序停止所有轴
    ///
    /// 单轴失败不影响其他轴，返回每个轴的结果。
    pub fn stop_all(&self) -> Vec<(u8, Result<StatusSnapshot, ClientError>)> {
        self.for_each_axis(Command::Stop)
    }

    /// 按顺序失能所有轴
    pub fn disable_all(&self) -> Vec<(u8, Result<StatusSnapshot, ClientError>)> {
        self.for_each_axis(Command::Enable(false))
    }

    /// 按顺序让所有轴回零
    ///
    /// 每个轴使用各自配置的回零模式；故障或未响应的轴不影响其他轴。
    pub fn home_all(&self) -> Vec<(u8, Result<StatusSnapshot, ClientError>)> {
        self.for_each_axis(Command::Home)
    }

    /// 读取所有轴的状态
    pub fn refresh_all(&self) -> Vec<(u8, Result<StatusSnapshot, ClientError>)> {
        self.for_each_axis(Command::ReadStatus)
    }

    fn for_each_axis(&self, command: Command) -> Vec<(u8, Result<StatusSnapshot, ClientError>)> {
        self.registry
            .addresses()
            .into_iter()
            .map(|address| {
                let result = self.send(address, command);
                if let Err(e) = &result {
                    warn!(address, %command, error = %e, "Command failed");
                }
                (address, result)
            })
            .collect()
    }

    /// 按地址（十进制或 0x 十六进制）或配置名称解析轴
    pub fn resolve_axis(&self, id: &str) -> Result<u8, ClientError> {
        let id = id.trim();
        let parsed = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => id.parse::<u8>().ok(),
        };
        match parsed {
            Some(address) if self.registry.contains(address) => Ok(address),
            Some(address) => Err(ClientError::NotConfigured(address)),
            None => self
                .registry
                .address_of(id)
                .ok_or_else(|| ClientError::UnknownAxis(id.to_string())),
        }
    }

    /// Identify 返回的版本信息（尚未验证时为 `None`）
    pub fn identity(&self, address: u8) -> Result<Option<IdentityFeedback>, ClientError> {
        self.registry.with_axis(address, Axis::identity)
    }

    /// 最近已知状态（不访问总线）
    pub fn snapshot(&self, address: u8) -> Result<StatusSnapshot, ClientError> {
        self.registry.snapshot(address)
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.registry.snapshots()
    }

    pub fn calibration_for(&self, address: u8) -> Result<Calibration, ClientError> {
        self.registry.calibration_for(address)
    }

    /// 应用总线上观察到的应答帧（未配置地址被忽略）
    pub fn apply_response(&self, frame: &Frame) {
        self.registry.apply_response(frame);
    }

    /// 总线指标
    pub fn metrics(&self) -> MetricsSnapshot {
        self.session.metrics()
    }

    /// 关闭总线会话
    pub fn close(&self) {
        self.session.close();
    }
}
