//! Mock 串口适配器
//!
//! 用于在无硬件条件下测试事务层和设备管理层。
//!
//! 每次写入后，按以下优先级决定设备的"回应"：
//! 1. 预置的应答脚本（`push_reply`，先进先出）
//! 2. 应答回调（`set_responder`，模拟设备逻辑）
//! 3. 都没有时保持沉默（读取会一直等到截止时间后超时）
//!
//! 读取超时会真实地睡眠到截止时间，因此测试可以测量退避时序。

use crate::{SerialAdapter, SerialError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// 设备对一次写入的回应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// 依次放入接收缓冲区的字节块（可包含其他地址的噪声帧）
    Frames(Vec<Vec<u8>>),
    /// 不回应
    Silent,
}

impl MockReply {
    /// 单帧回应
    pub fn frame(bytes: impl Into<Vec<u8>>) -> Self {
        MockReply::Frames(vec![bytes.into()])
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> MockReply + Send>;

struct MockState {
    rx: VecDeque<u8>,
    script: VecDeque<MockReply>,
    responder: Option<Responder>,
    written: Vec<Vec<u8>>,
    open: bool,
    fail_writes: bool,
}

impl MockState {
    fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            script: VecDeque::new(),
            responder: None,
            written: Vec::new(),
            open: true,
            fail_writes: false,
        }
    }
}

/// Mock 串口适配器
///
/// 适配器本身会被移动进总线会话，测试通过 [`MockSerialHandle`] 继续观察和控制它。
pub struct MockSerialAdapter {
    state: Arc<Mutex<MockState>>,
}

/// Mock 适配器的共享控制句柄
#[derive(Clone)]
pub struct MockSerialHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialAdapter {
    /// 创建处于打开状态的 Mock 适配器
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// 获取控制句柄
    pub fn handle(&self) -> MockSerialHandle {
        MockSerialHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for MockSerialAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSerialHandle {
    /// 预置下一次写入的回应
    pub fn push_reply(&self, reply: MockReply) {
        self.state.lock().script.push_back(reply);
    }

    /// 设置应答回调（脚本耗尽后使用）
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> MockReply + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// 直接向接收缓冲区注入字节（模拟总线上的主动帧）
    pub fn inject(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes.iter().copied());
    }

    /// 写入调用次数
    pub fn write_count(&self) -> usize {
        self.state.lock().written.len()
    }

    /// 所有写入的字节（每次写入一项）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// 令后续写入返回 IO 错误（模拟拔线）
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(SerialError::Closed);
        }
        if state.fail_writes {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }

        state.written.push(bytes.to_vec());

        let reply = match state.script.pop_front() {
            Some(reply) => reply,
            None => match state.responder.as_mut() {
                Some(responder) => responder(bytes),
                None => MockReply::Silent,
            },
        };

        if let MockReply::Frames(frames) = reply {
            for frame in frames {
                state.rx.extend(frame);
            }
        }
        Ok(())
    }

    fn read_until(&mut self, len: usize, deadline: Instant) -> Result<Vec<u8>, SerialError> {
        {
            let mut state = self.state.lock();
            if !state.open {
                return Err(SerialError::Closed);
            }
            if state.rx.len() >= len {
                return Ok(state.rx.drain(..len).collect());
            }
        }

        // 不足一帧：像真实端口一样等到截止时间
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));

        let mut state = self.state.lock();
        if state.rx.len() >= len {
            return Ok(state.rx.drain(..len).collect());
        }
        state.rx.clear();
        Err(SerialError::Timeout)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.state.lock().rx.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn port_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_scripted_reply_is_read_back() {
        let mut adapter = MockSerialAdapter::new();
        let handle = adapter.handle();
        handle.push_reply(MockReply::frame(vec![0x05, 0x1F, 0x01, 0x00, 0x01, 0x26]));

        adapter.write_all(&[0x05, 0x1F, 0x24]).unwrap();
        let deadline = Instant::now() + Duration::from_millis(50);
        let bytes = adapter.read_until(6, deadline).unwrap();
        assert_eq!(bytes, vec![0x05, 0x1F, 0x01, 0x00, 0x01, 0x26]);
        assert_eq!(handle.written(), vec![vec![0x05, 0x1F, 0x24]]);
    }

    #[test]
    fn test_silent_read_times_out_at_deadline() {
        let mut adapter = MockSerialAdapter::new();
        adapter.write_all(&[0x01]).unwrap();

        let start = Instant::now();
        let result = adapter.read_until(3, start + Duration::from_millis(20));
        assert!(matches!(result, Err(SerialError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_responder_used_after_script() {
        let mut adapter = MockSerialAdapter::new();
        let handle = adapter.handle();
        handle.push_reply(MockReply::Silent);
        handle.set_responder(|bytes| MockReply::frame(bytes.to_vec()));

        adapter.write_all(&[0xAA]).unwrap();
        adapter.write_all(&[0xBB]).unwrap();
        let deadline = Instant::now() + Duration::from_millis(10);
        assert_eq!(adapter.read_until(1, deadline).unwrap(), vec![0xBB]);
        assert_eq!(handle.write_count(), 2);
    }

    #[test]
    fn test_clear_input_drops_stale_bytes() {
        let mut adapter = MockSerialAdapter::new();
        let handle = adapter.handle();
        handle.inject(&[0x01, 0x02, 0x03]);
        adapter.clear_input().unwrap();

        let deadline = Instant::now() + Duration::from_millis(5);
        assert!(matches!(adapter.read_until(3, deadline), Err(SerialError::Timeout)));
    }

    #[test]
    fn test_failed_write_and_close() {
        let mut adapter = MockSerialAdapter::new();
        let handle = adapter.handle();
        handle.set_fail_writes(true);
        assert!(matches!(adapter.write_all(&[0x01]), Err(SerialError::Io(_))));
        assert_eq!(handle.write_count(), 0);

        adapter.close();
        adapter.close();
        assert!(!handle.is_open());
        assert!(matches!(adapter.write_all(&[0x01]), Err(SerialError::Closed)));
    }
}
