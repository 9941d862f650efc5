//! 驱动层错误类型定义

use crate::shtp::ShtpError;
use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// I2C 传输错误
    #[error("I2C error: {0}")]
    I2c(ErrorKind),

    /// SHTP 协议错误
    #[error("SHTP error: {0}")]
    Shtp(#[from] ShtpError),

    /// 复位后未收到 Product ID 响应（设备不存在或不是 BNO08x）
    #[error("No product ID response from sensor")]
    ProductIdMissing,

    /// Set Feature 命令未得到确认
    #[error("Sensor did not confirm report 0x{report_id:02X}")]
    FeatureNotEnabled { report_id: u8 },

    /// 读取尚未启用的报告
    #[error("Report 0x{report_id:02X} is not enabled")]
    ReportNotEnabled { report_id: u8 },

    /// 报告已启用，但还没有收到任何数据
    #[error("No report received yet")]
    NoReport,
}

impl DriverError {
    /// 将任意 embedded-hal I2C 错误转换为驱动错误
    pub fn from_i2c<E: embedded_hal::i2c::Error>(error: E) -> Self {
        DriverError::I2c(error.kind())
    }

    /// 是否为读取时的瞬态错误（下一个周期重试即可）
    ///
    /// `ReportNotEnabled` 只会在未完成初始化的句柄上出现，属于编程错误，不视为瞬态。
    pub fn is_transient(&self) -> bool {
        !matches!(self, DriverError::ReportNotEnabled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::NoAcknowledgeSource;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        let msg = format!("{}", err);
        assert!(msg.contains("I2C error"), "message: {}", msg);

        let err = DriverError::FeatureNotEnabled { report_id: 0x05 };
        assert_eq!(format!("{}", err), "Sensor did not confirm report 0x05");

        let err = DriverError::Shtp(ShtpError::InvalidHeader { length: 2 });
        assert!(format!("{}", err).contains("SHTP"));
    }

    #[test]
    fn test_from_i2c() {
        let err = DriverError::from_i2c(ErrorKind::ArbitrationLoss);
        assert_eq!(err, DriverError::I2c(ErrorKind::ArbitrationLoss));
    }

    #[test]
    fn test_transient_classification() {
        assert!(DriverError::I2c(ErrorKind::Bus).is_transient());
        assert!(DriverError::NoReport.is_transient());
        assert!(!DriverError::ReportNotEnabled { report_id: 0x05 }.is_transient());
    }
}
