//! # Hand IMU Bus Layer
//!
//! I2C 总线抽象层：一条物理总线 + TCA9548A 复用器，对上提供 6 条互不干扰的逻辑子总线。
//!
//! 子总线 [`MuxChannel`] 实现 `embedded_hal::i2c::I2c`，驱动层无需感知复用器的存在。

use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

pub mod mux;

#[cfg(all(target_os = "linux", feature = "linux"))]
pub mod linux;

#[cfg(all(target_os = "linux", feature = "linux"))]
pub use linux::{DEFAULT_BUS_PATH, LinuxI2cBus, open_bus};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use mux::{MuxChannel, Tca9548a};

// 上层 crate 通过本 crate 使用 embedded-hal 的 I2C 抽象
pub use embedded_hal::i2c::{ErrorKind as I2cErrorKind, I2c};

/// 总线层统一错误类型
///
/// 这些错误都发生在启动阶段；除 [`BusError::ChannelInUse`] 外均视为致命错误，
/// 进程不应在总线层初始化不完整的情况下继续运行。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// 无法打开 I2C 总线设备
    #[error("Failed to open I2C bus {path}: {message}")]
    Open { path: String, message: String },

    /// 复用器无应答
    #[error("TCA9548A multiplexer unreachable at 0x{address:02X}: {kind}")]
    MuxUnreachable { address: u8, kind: ErrorKind },

    /// 通道号越界
    #[error("Invalid multiplexer channel {channel} (valid: 0..{})", mux::CHANNEL_COUNT)]
    InvalidChannel { channel: u8 },

    /// 通道已被分配（每个通道只分配一次）
    #[error("Multiplexer channel {channel} already handed out")]
    ChannelInUse { channel: u8 },
}

impl BusError {
    /// 是否为致命错误（进程无法继续）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BusError::Open { .. } | BusError::MuxUnreachable { .. } | BusError::InvalidChannel { .. }
        )
    }
}
