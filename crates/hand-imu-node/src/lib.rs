//! # Hand IMU Node
//!
//! 以固定频率轮询六个 IMU 并按传感器发布姿态。
//!
//! ## 模块
//!
//! - `config`: 启动配置（TOML + 默认值 + 校验）
//! - `hardware`: 总线 → 复用器 → 传感器集合的接线
//! - `publisher`: 每传感器输出通道（内存 / UDP / stdout）
//! - `node`: 轮询发布循环
//! - `timer`: 固定频率定时器（`spin_sleep`）
//! - `metrics`: 原子计数器
//! - `logging`: tracing subscriber 初始化
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use hand_imu_node::{ImuNode, NodeConfig, StdoutTransport, open_hardware};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = NodeConfig::default();
//! let sensors = open_hardware(&config)?;
//! let mut node = ImuNode::new(sensors, &StdoutTransport::new(), &config)?;
//! node.run(&AtomicBool::new(false));
//! ```

pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod publisher;
pub mod timer;

pub use config::{NodeConfig, OutputConfig, parse_address};
pub use error::{ConfigError, NodeError, PublishError};
pub use hardware::open_sensors;
#[cfg(all(target_os = "linux", feature = "linux"))]
pub use hardware::{HardwareSensor, open_hardware};
pub use logging::init_logging;
pub use metrics::{MetricsSnapshot, NodeMetrics, SensorSnapshot};
pub use node::{ImuNode, TickSummary};
pub use publisher::{MemoryTransport, Publisher, StdoutTransport, Transport, UdpTransport};
pub use timer::{FixedRateTimer, TickTiming};

// 上层只依赖本 crate 即可使用这些类型
pub use hand_imu_driver::{Bno08xConfig, OrientationSensor, SensorSet};
pub use hand_imu_protocol::{Imu, Quaternion, SensorId, Time};
