//! 模拟设备
//!
//! 挂在 `MockSerialAdapter` 的应答回调上，按地址模拟一组步进驱动器。
//! 运动瞬间完成；故障、沉默和参数拒绝可由测试注入。

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use stepper_protocol::{
    AckCode, AckFeedback, FaultFlags, Frame, FunctionCode, IdentityFeedback, MoveCommand,
    MoveMode, StateFlags, StatusFeedback, decode,
};
use stepper_serial::{MockReply, MockSerialAdapter, MockSerialHandle};

/// 模拟轴的硬件状态
#[derive(Debug, Clone, Default)]
pub struct SimAxis {
    pub position: i32,
    pub enabled: bool,
    /// 运动指令后是否报告 moving
    pub report_moving: bool,
    pub faults: u8,
    /// 不回应任何请求
    pub silent: bool,
    /// SetParameter 回应的确认码
    pub parameter_ack: Option<AckCode>,
}

impl SimAxis {
    fn status(&self, moving: bool) -> StatusFeedback {
        let mut state = StateFlags::from_raw(0);
        state.set_enabled(self.enabled);
        state.set_moving(moving);
        StatusFeedback {
            position_steps: self.position,
            velocity_steps: if moving { 100 } else { 0 },
            state,
            faults: FaultFlags::from_raw(self.faults),
        }
    }
}

/// 一组模拟设备
#[derive(Clone, Default)]
pub struct Simulator {
    axes: Arc<Mutex<BTreeMap<u8, SimAxis>>>,
    requests: Arc<Mutex<Vec<Frame>>>,
}

impl Simulator {
    pub fn new(addresses: &[u8]) -> Self {
        let sim = Self::default();
        for &address in addresses {
            sim.axes.lock().insert(address, SimAxis::default());
        }
        sim
    }

    /// 创建挂好本模拟器的 Mock 适配器
    pub fn adapter(&self) -> (MockSerialAdapter, MockSerialHandle) {
        let adapter = MockSerialAdapter::new();
        let handle = adapter.handle();
        let sim = self.clone();
        handle.set_responder(move |bytes| sim.respond(bytes));
        (adapter, handle)
    }

    /// 修改某个模拟轴
    pub fn update(&self, address: u8, f: impl FnOnce(&mut SimAxis)) {
        if let Some(axis) = self.axes.lock().get_mut(&address) {
            f(axis);
        }
    }

    pub fn axis(&self, address: u8) -> Option<SimAxis> {
        self.axes.lock().get(&address).cloned()
    }

    /// 收到的全部请求帧
    pub fn requests(&self) -> Vec<Frame> {
        self.requests.lock().clone()
    }

    /// 收到的请求功能码序列
    pub fn functions(&self) -> Vec<FunctionCode> {
        self.requests().iter().map(|frame| frame.function).collect()
    }

    fn respond(&self, bytes: &[u8]) -> MockReply {
        let Ok(request) = decode(bytes) else {
            return MockReply::Silent;
        };
        self.requests.lock().push(request.clone());

        let mut axes = self.axes.lock();
        let Some(axis) = axes.get_mut(&request.address) else {
            return MockReply::Silent;
        };
        if axis.silent {
            return MockReply::Silent;
        }

        let address = request.address;
        let function = request.function;
        let reply = match function {
            FunctionCode::Identify => IdentityFeedback {
                firmware_major: 1,
                firmware_minor: 2,
                hardware_revision: 3,
            }
            .to_frame(address),
            FunctionCode::SetParameter => AckFeedback {
                function,
                code: axis.parameter_ack.unwrap_or(AckCode::Accepted),
            }
            .to_frame(address),
            FunctionCode::Move => {
                let Ok(command) = MoveCommand::try_from(&request) else {
                    return MockReply::Silent;
                };
                match command.mode {
                    MoveMode::Absolute => axis.position = command.steps,
                    MoveMode::Relative => axis.position += command.steps,
                }
                axis.status(axis.report_moving).to_frame(address, function)
            },
            FunctionCode::Home => {
                axis.position = 0;
                axis.status(false).to_frame(address, function)
            },
            FunctionCode::Enable => {
                axis.enabled = request.payload()[0] == 0x01;
                axis.status(false).to_frame(address, function)
            },
            FunctionCode::ClearFault => {
                axis.faults = 0;
                axis.status(false).to_frame(address, function)
            },
            FunctionCode::ReadStatus | FunctionCode::Stop => {
                axis.status(false).to_frame(address, function)
            },
        };
        MockReply::frame(reply.to_bytes())
    }
}
