//! 协议常量定义

/// 广播地址（保留，驱动器不应答广播帧）
pub const BROADCAST_ADDRESS: u8 = 0x00;

/// 最小有效设备地址
pub const MIN_ADDRESS: u8 = 0x01;

/// 最大有效设备地址
pub const MAX_ADDRESS: u8 = 0xFE;

/// 帧固定开销：地址 + 功能码 + 校验和
pub const FRAME_OVERHEAD: usize = 3;

/// 最小帧长度（空载荷）
pub const MIN_FRAME_LEN: usize = FRAME_OVERHEAD;

/// 检查地址是否为可寻址的单个设备
pub const fn is_device_address(address: u8) -> bool {
    address >= MIN_ADDRESS && address <= MAX_ADDRESS
}
