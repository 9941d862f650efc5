//! Linux i2c-dev 后端
//!
//! 基于 `linux-embedded-hal` 的 `I2cdev`。读写超时由内核 i2c 适配器驱动保证，
//! 本层不额外加超时。

use crate::BusError;
use linux_embedded_hal::I2cdev;
use std::path::Path;
use tracing::info;

/// Linux I2C 总线类型
pub type LinuxI2cBus = I2cdev;

/// 默认总线路径（树莓派 SDA/SCL 引脚）
pub const DEFAULT_BUS_PATH: &str = "/dev/i2c-1";

/// 打开 I2C 总线
///
/// # Errors
/// - `BusError::Open`: 设备节点不存在或无权限（致命）
pub fn open_bus(path: impl AsRef<Path>) -> Result<LinuxI2cBus, BusError> {
    let path = path.as_ref();
    let bus = I2cdev::new(path).map_err(|e| BusError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    info!("Opened I2C bus {}", path.display());
    Ok(bus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_bus_fails() {
        match open_bus("/dev/this-i2c-bus-does-not-exist") {
            Err(BusError::Open { path, .. }) => {
                assert_eq!(path, "/dev/this-i2c-bus-does-not-exist")
            },
            Err(other) => panic!("Expected Open error, got {:?}", other),
            Ok(_) => panic!("Opening a missing bus should fail"),
        }
    }

    /// 需要真实硬件：`cargo test -p hand-imu-bus -- --ignored`
    #[test]
    #[ignore]
    fn test_open_default_bus() {
        open_bus(DEFAULT_BUS_PATH).expect("Failed to open default I2C bus");
    }
}
