//! 硬件接线
//!
//! 打开总线 → 探测复用器 → 按通道初始化六个 BNO08x。
//! 总线或复用器失败是致命错误；单个传感器失败只会让该位置记为缺失。

use crate::config::NodeConfig;
use crate::error::NodeError;
use hand_imu_bus::{I2c, MuxChannel, Tca9548a};
use hand_imu_driver::{Bno08x, Bno08xConfig, SensorSet};
use tracing::info;

/// 在给定总线上建立复用器并初始化所有传感器
///
/// 报告间隔取自 `config.report_interval_us`，其余驱动参数取自 `driver`。
///
/// # Errors
/// - `NodeError::Bus`: 复用器无应答（致命）
pub fn open_sensors<B: I2c>(
    bus: B,
    config: &NodeConfig,
    driver: Bno08xConfig,
) -> Result<SensorSet<Bno08x<MuxChannel<B>>>, NodeError> {
    let mut mux = Tca9548a::open(bus, config.mux_address)?;
    info!("TCA9548A multiplexer ready at 0x{:02X}", mux.address());

    let driver = driver.with_report_interval_us(config.report_interval_us);
    let sensors = SensorSet::initialize(|descriptor| -> Result<_, NodeError> {
        let channel = mux.channel(descriptor.channel)?;
        Ok(Bno08x::start(channel, config.imu_address, driver.clone())?)
    });

    info!("{}/{} IMUs online", sensors.live_count(), hand_imu_protocol::SENSOR_COUNT);
    Ok(sensors)
}

#[cfg(all(target_os = "linux", feature = "linux"))]
pub use linux::{HardwareSensor, open_hardware};

#[cfg(all(target_os = "linux", feature = "linux"))]
mod linux {
    use super::*;
    use hand_imu_bus::LinuxI2cBus;

    /// 真实硬件上的传感器类型
    pub type HardwareSensor = Bno08x<MuxChannel<LinuxI2cBus>>;

    /// 打开 `config.i2c_bus` 并初始化所有传感器
    ///
    /// # Errors
    /// - `NodeError::Bus`: 总线无法打开或复用器无应答（致命）
    pub fn open_hardware(config: &NodeConfig) -> Result<SensorSet<HardwareSensor>, NodeError> {
        let bus = hand_imu_bus::open_bus(&config.i2c_bus)?;
        open_sensors(bus, config, Bno08xConfig::default())
    }
}
