//! 节点层错误类型定义

use hand_imu_bus::BusError;
use hand_imu_driver::DriverError;
use thiserror::Error;

/// 配置错误（启动期致命）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 配置文件无法读取
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    /// TOML 语法或字段类型错误
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// 字段取值非法
    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// 发布错误
#[derive(Error, Debug)]
pub enum PublishError {
    /// 同一主题只允许一个发布者
    #[error("Topic {0} already has a publisher")]
    DuplicateTopic(String),

    /// 消息序列化失败
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 传输层 IO 错误
    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 节点层统一错误类型
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Publisher error: {0}")]
    Publish(#[from] PublishError),
}

impl NodeError {
    /// 是否为启动期致命错误
    ///
    /// 单个传感器的驱动错误不致命（该传感器记为缺失）。
    pub fn is_fatal(&self) -> bool {
        match self {
            NodeError::Config(_) | NodeError::Publish(_) => true,
            NodeError::Bus(e) => e.is_fatal(),
            NodeError::Driver(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_imu_bus::I2cErrorKind;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            field: "rate_hz",
            message: "must be > 0".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid rate_hz: must be > 0");
    }

    #[test]
    fn test_node_error_fatal_classification() {
        let err: NodeError = BusError::MuxUnreachable {
            address: 0x70,
            kind: I2cErrorKind::Bus,
        }
        .into();
        assert!(err.is_fatal());
        assert!(format!("{}", err).contains("0x70"));

        let err: NodeError = DriverError::ProductIdMissing.into();
        assert!(!err.is_fatal());

        let err: NodeError = PublishError::DuplicateTopic("/hand/imu/thumb".into()).into();
        assert!(err.is_fatal());
    }
}
