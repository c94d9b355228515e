//! 原生串口后端
//!
//! 基于 `serialport` crate，8 数据位、1 停止位、无流控。

use crate::{SerialAdapter, SerialError, SerialSettings};
use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// 打开端口时的初始读超时（每次读取前按截止时间重设）
const INITIAL_TIMEOUT: Duration = Duration::from_millis(10);

impl From<crate::Parity> for serialport::Parity {
    fn from(parity: crate::Parity) -> Self {
        match parity {
            crate::Parity::None => serialport::Parity::None,
            crate::Parity::Odd => serialport::Parity::Odd,
            crate::Parity::Even => serialport::Parity::Even,
        }
    }
}

/// 原生串口适配器
pub struct SerialPortAdapter {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl SerialPortAdapter {
    /// 打开并占用串口
    ///
    /// # 错误
    /// - `SerialError::PortUnavailable`: 端口不存在、被占用或无权限
    pub fn open(settings: &SerialSettings) -> Result<Self, SerialError> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(settings.parity.into())
            .flow_control(FlowControl::None)
            .timeout(INITIAL_TIMEOUT)
            .open()
            .map_err(|e| SerialError::PortUnavailable {
                port: settings.port.clone(),
                reason: e.to_string(),
            })?;

        info!(
            port = %settings.port,
            baud_rate = settings.baud_rate,
            parity = ?settings.parity,
            "Serial port opened"
        );

        Ok(Self {
            port: Some(port),
            name: settings.port.clone(),
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::Closed)
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        trace!(bytes = ?bytes, "TX");
        Ok(())
    }

    fn read_until(&mut self, len: usize, deadline: Instant) -> Result<Vec<u8>, SerialError> {
        let port = self.port_mut()?;
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            let now = Instant::now();
            if now >= deadline {
                if filled > 0 {
                    debug!(partial = ?&buf[..filled], "Read deadline reached with partial frame");
                }
                return Err(SerialError::Timeout);
            }

            port.set_timeout(deadline - now).map_err(std::io::Error::from)?;

            match port.read(&mut buf[filled..]) {
                Ok(0) => continue,
                Ok(n) => filled += n,
                // 超时由循环顶部的截止时间检查统一处理
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!(bytes = ?buf, "RX");
        Ok(buf)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        self.port_mut()?
            .clear(ClearBuffer::Input)
            .map_err(std::io::Error::from)?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!(port = %self.name, "Serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialPortAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
