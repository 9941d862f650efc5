//! 驱动层模块
//!
//! 本模块提供 BNO08x 姿态传感器的驱动功能，包括：
//! - SHTP over I2C 传输（分包、序列号、两段式读取）
//! - SH-2 报告编解码（Set Feature、Product ID、旋转向量）
//! - 传感器初始化与四元数读取
//! - 六个传感器的句柄集合（缺失传感器永久跳过）
//!
//! 驱动只依赖 `embedded_hal::i2c::I2c`，既可以直接使用 Linux 总线，
//! 也可以使用复用器上的子总线 [`hand_imu_bus::MuxChannel`]。

mod bno08x;
mod error;
pub mod reports;
mod sensor;
pub mod shtp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bno08x::{Bno08x, Bno08xConfig, DEFAULT_ADDRESS};
pub use error::DriverError;
pub use reports::ProductId;
pub use sensor::{OrientationSensor, SensorSet, SensorSlot};
pub use shtp::ShtpError;
