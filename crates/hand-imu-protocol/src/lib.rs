//! # Hand IMU Protocol
//!
//! 手部 IMU 阵列的数据定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `sensor`: 传感器身份、复用器通道分配、命名约定
//! - `message`: 对外发布的 `Imu` 消息结构（与 `sensor_msgs/Imu` 同形）
//!
//! ## 在架构中的位置
//!
//! ```text
//! Protocol Layer (hand-imu-protocol)   ← 此 crate
//!     ↓ SensorId / Imu
//! Bus Layer (hand-imu-bus)             TCA9548A 复用器 + Linux I2C
//!     ↓ MuxChannel
//! Driver Layer (hand-imu-driver)       SHTP + BNO08x + SensorSet
//!     ↓ OrientationSensor
//! Node Layer (hand-imu-node)           定时轮询 + 发布
//! ```

pub mod message;
pub mod sensor;

pub use message::*;
pub use sensor::*;
