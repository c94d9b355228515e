//! 帧编解码
//!
//! 纯函数，无副作用。

use crate::constants::{MIN_FRAME_LEN, is_device_address};
use crate::function::FunctionCode;
use crate::{Frame, ProtocolError};

/// 累加校验和（模 256，不向高位进位）
///
/// 与驱动器固件的 8 位整数运算保持一致。
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte))
}

/// 编码请求帧
///
/// # 错误
/// - `ProtocolError::InvalidArgument`: 地址不在 1..=254，或载荷长度与功能码的请求载荷表不符
pub fn encode(
    address: u8,
    function: FunctionCode,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    if !is_device_address(address) {
        return Err(ProtocolError::InvalidArgument(format!(
            "address 0x{address:02X} out of range 0x01..=0xFE"
        )));
    }

    let expected = function.request_len();
    if payload.len() != expected {
        return Err(ProtocolError::InvalidArgument(format!(
            "{function:?} payload must be {expected} bytes, got {}",
            payload.len()
        )));
    }

    let mut bytes = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    bytes.push(address);
    bytes.push(function.into());
    bytes.extend_from_slice(payload);
    bytes.push(checksum(&bytes));
    Ok(bytes)
}

/// 解码并校验一帧
///
/// 校验顺序：长度 → 校验和 → 地址 → 功能码。校验和先于其余字段检查，
/// 因此任何校验和被破坏的帧都只会报告 `ChecksumMismatch`。
///
/// # 错误
/// - `ProtocolError::MalformedFrame`: 长度不足最小帧长，或地址为广播/非法地址
/// - `ProtocolError::ChecksumMismatch`: 末尾校验字节与计算值不符
/// - `ProtocolError::UnknownFunction`: 功能码不在目录中
pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::MalformedFrame(format!(
            "frame length {} below minimum {MIN_FRAME_LEN}",
            bytes.len()
        )));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - 1);
    let expected = checksum(body);
    let actual = trailer[0];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch { expected, actual });
    }

    let address = body[0];
    if !is_device_address(address) {
        return Err(ProtocolError::MalformedFrame(format!(
            "address 0x{address:02X} is not a device address"
        )));
    }

    let function =
        FunctionCode::try_from(body[1]).map_err(|_| ProtocolError::UnknownFunction(body[1]))?;

    Ok(Frame::new(address, function, &body[2..]))
}
