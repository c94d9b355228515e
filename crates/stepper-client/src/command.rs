//! 命令集
//!
//! 面向用户单位的命令目录。每个命令知道自己的功能码、请求载荷和应答形态；
//! 单位换算只在这里发生，协议层保持与单位无关。
//!
//! 运动命令的软限位和速度范围在构建帧之前校验，越界的请求不会占用总线。

use crate::axis::Axis;
use crate::types::ClientError;
use std::fmt;
use stepper_protocol::{
    EnableCommand, Feedback, Frame, FunctionCode, HomeCommand, MoveCommand, ParameterKey,
    ResponseShape, SetParameterCommand, bare_request,
};

/// 单轴命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// 读取版本（验证地址）
    Identify,
    /// 按轴配置的回零模式回零
    Home,
    /// 绝对运动（位置、速度均为用户单位）
    MoveTo { target: f64, speed: f64 },
    /// 相对运动（相对最近已知位置）
    MoveBy { delta: f64, speed: f64 },
    /// 立即停止
    Stop,
    /// 写驱动参数（原始值，不做单位换算）
    SetParameter { key: ParameterKey, value: i32 },
    /// 读取状态
    ReadStatus,
    /// 使能 / 失能
    Enable(bool),
    /// 清除故障
    ClearFault,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Identify => "Identify",
            Command::Home => "Home",
            Command::MoveTo { .. } => "MoveTo",
            Command::MoveBy { .. } => "MoveBy",
            Command::Stop => "Stop",
            Command::SetParameter { .. } => "SetParameter",
            Command::ReadStatus => "ReadStatus",
            Command::Enable(true) => "Enable",
            Command::Enable(false) => "Disable",
            Command::ClearFault => "ClearFault",
        }
    }

    /// 对应的功能码
    pub fn function(&self) -> FunctionCode {
        match self {
            Command::Identify => FunctionCode::Identify,
            Command::Home => FunctionCode::Home,
            Command::MoveTo { .. } | Command::MoveBy { .. } => FunctionCode::Move,
            Command::Stop => FunctionCode::Stop,
            Command::SetParameter { .. } => FunctionCode::SetParameter,
            Command::ReadStatus => FunctionCode::ReadStatus,
            Command::Enable(_) => FunctionCode::Enable,
            Command::ClearFault => FunctionCode::ClearFault,
        }
    }

    /// 期望的应答形态
    pub fn response_shape(&self) -> ResponseShape {
        self.function().response_shape()
    }

    /// 是否为运动类命令（Faulted / Unverified 时拒绝）
    pub fn requires_motion(&self) -> bool {
        matches!(
            self,
            Command::MoveTo { .. } | Command::MoveBy { .. } | Command::Home
        )
    }

    /// 未验证的轴是否允许该命令
    pub fn is_verification(&self) -> bool {
        matches!(self, Command::Identify | Command::ClearFault)
    }

    /// 发送前校验（不依赖总线）
    ///
    /// - `MoveTo`: 目标必须在软限位内，速度必须可换算
    /// - `MoveBy`: 速度必须可换算；已知位置时目标（位置 + 增量）必须在软限位内
    pub fn validate(&self, axis: &Axis) -> Result<(), ClientError> {
        match *self {
            Command::MoveTo { target, speed } => {
                check_target(axis, target)?;
                move_steps(axis, target)?;
                move_speed(axis, speed)?;
            },
            Command::MoveBy { delta, speed } => {
                move_speed(axis, speed)?;
                move_steps(axis, delta)?;
                if let Some(position) = axis.position() {
                    check_target(axis, position + delta)?;
                }
            },
            _ => {},
        }
        Ok(())
    }

    /// 构建请求帧（含单位换算）
    ///
    /// # 错误
    /// - `ClientError::OutOfRange`: 运动目标超出软限位
    /// - `ClientError::InvalidArgument`: 速度/步数无法换算，或相对运动时位置未知
    pub fn to_frame(&self, axis: &Axis) -> Result<Frame, ClientError> {
        self.validate(axis)?;
        let address = axis.address();

        let frame = match *self {
            Command::MoveTo { target, speed } => MoveCommand::absolute(
                move_steps(axis, target)?,
                move_speed(axis, speed)?,
                axis.acceleration(),
            )
            .to_frame(address),
            Command::MoveBy { delta, speed } => {
                if axis.position().is_none() {
                    return Err(ClientError::InvalidArgument {
                        address,
                        reason: "position unknown, read status before a relative move".to_string(),
                    });
                }
                MoveCommand::relative(
                    move_steps(axis, delta)?,
                    move_speed(axis, speed)?,
                    axis.acceleration(),
                )
                .to_frame(address)
            },
            Command::Home => HomeCommand::new(axis.homing_mode()).to_frame(address),
            Command::Enable(enable) => EnableCommand::new(enable).to_frame(address),
            Command::SetParameter { key, value } => {
                SetParameterCommand::new(key, value).to_frame(address)
            },
            Command::Identify | Command::ReadStatus | Command::Stop | Command::ClearFault => {
                bare_request(address, self.function())?
            },
        };
        Ok(frame)
    }

    /// 解析应答
    pub fn parse_response(&self, frame: &Frame) -> Result<Feedback, ClientError> {
        Ok(Feedback::try_from(frame)?)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::MoveTo { target, speed } => write!(f, "MoveTo({target}, {speed})"),
            Command::MoveBy { delta, speed } => write!(f, "MoveBy({delta}, {speed})"),
            Command::SetParameter { key, value } => write!(f, "SetParameter({key:?}, {value})"),
            other => f.write_str(other.name()),
        }
    }
}

fn check_target(axis: &Axis, target: f64) -> Result<(), ClientError> {
    let calibration = axis.calibration();
    if calibration.contains(target) {
        Ok(())
    } else {
        Err(ClientError::OutOfRange {
            address: axis.address(),
            target,
            min: calibration.soft_min,
            max: calibration.soft_max,
        })
    }
}

fn move_steps(axis: &Axis, units: f64) -> Result<i32, ClientError> {
    axis.calibration()
        .units_to_steps(units)
        .ok_or_else(|| ClientError::InvalidArgument {
            address: axis.address(),
            reason: format!("{units} cannot be expressed in steps"),
        })
}

fn move_speed(axis: &Axis, speed: f64) -> Result<u16, ClientError> {
    axis.calibration()
        .speed_to_steps(speed)
        .ok_or_else(|| ClientError::InvalidArgument {
            address: axis.address(),
            reason: format!("speed {speed} outside 1..=65535 steps/s"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AxisConfig;
    use crate::types::{Calibration, Direction};
    use std::time::Instant;
    use stepper_protocol::{HomingMode, MoveMode, StatusFeedback};

    fn axis() -> Axis {
        let mut config = AxisConfig::new(
            0x05,
            Calibration::new(100.0, Direction::Normal, 0.0, 1000.0),
        );
        config.acceleration = 8;
        config.homing = HomingMode::LimitSwitch;
        Axis::from_config(&config)
    }

    #[test]
    fn test_move_to_scales_by_calibration() {
        let frame = Command::MoveTo {
            target: 500.0,
            speed: 50.0,
        }
        .to_frame(&axis())
        .unwrap();

        let command = MoveCommand::try_from(&frame).unwrap();
        assert_eq!(frame.address, 0x05);
        assert_eq!(command.steps, 50_000);
        assert_eq!(command.speed, 5_000);
        assert_eq!(command.acceleration, 8);
        assert_eq!(command.mode, MoveMode::Absolute);
    }

    #[test]
    fn test_move_to_out_of_range() {
        let axis = axis();
        for target in [-0.5, 1000.01, f64::INFINITY] {
            let result = Command::MoveTo { target, speed: 1.0 }.to_frame(&axis);
            assert!(
                matches!(result, Err(ClientError::OutOfRange { address: 0x05, .. })),
                "target {target}"
            );
        }
    }

    #[test]
    fn test_invalid_speed() {
        let result = Command::MoveTo {
            target: 10.0,
            speed: 0.0,
        }
        .validate(&axis());
        assert!(matches!(result, Err(ClientError::InvalidArgument { .. })));

        let result = Command::MoveTo {
            target: 10.0,
            speed: 1000.0,
        }
        .validate(&axis());
        assert!(matches!(result, Err(ClientError::InvalidArgument { .. })));
    }

    #[test]
    fn test_move_by_needs_known_position() {
        let mut axis = axis();
        let command = Command::MoveBy {
            delta: 10.0,
            speed: 5.0,
        };
        // 位置未知时预校验放行，构帧拒绝
        assert!(command.validate(&axis).is_ok());
        assert!(matches!(
            command.to_frame(&axis),
            Err(ClientError::InvalidArgument { .. })
        ));

        let status = StatusFeedback {
            position_steps: 99_500,
            ..Default::default()
        };
        axis.apply(
            FunctionCode::ReadStatus,
            &Feedback::Status(status),
            Instant::now(),
        );
        // 995 + 10 超出上限
        assert!(matches!(
            command.to_frame(&axis),
            Err(ClientError::OutOfRange { .. })
        ));

        let frame = Command::MoveBy {
            delta: -10.0,
            speed: 5.0,
        }
        .to_frame(&axis)
        .unwrap();
        let decoded = MoveCommand::try_from(&frame).unwrap();
        assert_eq!(decoded.steps, -1_000);
        assert_eq!(decoded.mode, MoveMode::Relative);
    }

    #[test]
    fn test_home_uses_axis_homing_mode() {
        let frame = Command::Home.to_frame(&axis()).unwrap();
        assert_eq!(
            HomeCommand::try_from(&frame).unwrap().mode,
            HomingMode::LimitSwitch
        );
    }

    #[test]
    fn test_bare_and_simple_frames() {
        let axis = axis();
        assert_eq!(
            Command::ReadStatus.to_frame(&axis).unwrap().encode().unwrap(),
            vec![0x05, 0x43, 0x48]
        );
        assert_eq!(
            Command::Enable(true).to_frame(&axis).unwrap().payload(),
            &[0x01]
        );
        let frame = Command::SetParameter {
            key: ParameterKey::RunCurrent,
            value: 1200,
        }
        .to_frame(&axis)
        .unwrap();
        assert_eq!(frame.payload(), &[0x03, 0x00, 0x00, 0x04, 0xB0]);
    }

    #[test]
    fn test_command_catalog() {
        assert_eq!(Command::Stop.function(), FunctionCode::Stop);
        assert_eq!(Command::Enable(false).name(), "Disable");
        assert_eq!(
            Command::SetParameter {
                key: ParameterKey::MaxSpeed,
                value: 1
            }
            .response_shape(),
            ResponseShape::Ack
        );
        assert!(Command::Home.requires_motion());
        assert!(!Command::Stop.requires_motion());
        assert!(Command::ClearFault.is_verification());
        assert_eq!(
            Command::MoveTo {
                target: 1.5,
                speed: 2.0
            }
            .to_string(),
            "MoveTo(1.5, 2)"
        );
    }
}
