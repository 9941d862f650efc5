//! 发布消息定义
//!
//! 字段布局与 `sensor_msgs/Imu` 保持一致，便于下游直接桥接到 ROS 2。
//! 当前版本只填充姿态（四元数），角速度与线加速度保持为零。

use crate::sensor::SensorId;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 时间戳（秒 + 纳秒，对应 `builtin_interfaces/Time`）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    /// 当前墙钟时间
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// 从 `SystemTime` 转换
    ///
    /// 早于 UNIX 纪元的时间按 0 处理；超出 `i32` 秒数（2038 年之后）饱和到最大值。
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        match i32::try_from(since_epoch.as_secs()) {
            Ok(sec) => Self {
                sec,
                nanosec: since_epoch.subsec_nanos(),
            },
            Err(_) => Self::MAX,
        }
    }

    /// 可表示的最大时间戳
    pub const MAX: Time = Time {
        sec: i32::MAX,
        nanosec: 999_999_999,
    };

    /// 转换为自纪元起的 `Duration`
    pub fn as_duration(&self) -> Duration {
        Duration::new(self.sec.max(0) as u64, self.nanosec)
    }
}

/// 消息头
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

/// 四元数
///
/// 字段顺序沿用 `geometry_msgs/Quaternion`（x, y, z, w）。
/// 不做任何归一化或符号修正，传感器读到什么就是什么。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// 按 (w, x, y, z) 顺序构造
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, w }
    }

    /// 单位四元数
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// 模长
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// 三维向量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// IMU 消息
///
/// 协方差全部为 0，表示“未知”。
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Imu {
    pub header: Header,
    pub orientation: Quaternion,
    pub orientation_covariance: [f64; 9],
    pub angular_velocity: Vector3,
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration: Vector3,
    pub linear_acceleration_covariance: [f64; 9],
}

impl Imu {
    /// 构造一条仅含姿态的消息
    ///
    /// - `stamp`: 本次 tick 开始的时间（同一 tick 内六个传感器共用）
    /// - `sensor`: 决定 `frame_id`（`imu_<name>`）
    /// - `orientation`: 原样拷贝
    pub fn orientation_sample(stamp: Time, sensor: SensorId, orientation: Quaternion) -> Self {
        Self {
            header: Header {
                stamp,
                frame_id: sensor.frame_id(),
            },
            orientation,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_from_system_time() {
        let t = Time::from_system_time(UNIX_EPOCH + Duration::new(1_700_000_000, 42));
        assert_eq!(
            t,
            Time {
                sec: 1_700_000_000,
                nanosec: 42
            }
        );
        assert_eq!(
            Time::from_system_time(UNIX_EPOCH - Duration::from_secs(5)),
            Time::default()
        );
    }

    #[test]
    fn test_time_saturates_after_2038() {
        let last = UNIX_EPOCH + Duration::new(i32::MAX as u64, 7);
        assert_eq!(Time::from_system_time(last).sec, i32::MAX);
        assert_eq!(Time::from_system_time(last).nanosec, 7);

        let overflow = UNIX_EPOCH + Duration::from_secs(1u64 << 31);
        assert_eq!(Time::from_system_time(overflow), Time::MAX);
        assert!(Time::from_system_time(overflow + Duration::from_secs(3600)).sec > 0);
    }

    #[test]
    fn test_orientation_sample_fields() {
        let stamp = Time {
            sec: 12,
            nanosec: 345,
        };
        let q = Quaternion::new(0.5, -0.5, 0.25, -0.25);
        let msg = Imu::orientation_sample(stamp, SensorId::Index, q);

        assert_eq!(msg.header.stamp, stamp);
        assert_eq!(msg.header.frame_id, "imu_index");
        assert_eq!(msg.orientation.w, 0.5);
        assert_eq!(msg.orientation.x, -0.5);
        assert_eq!(msg.orientation.y, 0.25);
        assert_eq!(msg.orientation.z, -0.25);
        assert_eq!(msg.angular_velocity, Vector3::default());
        assert_eq!(msg.linear_acceleration, Vector3::default());
    }

    #[test]
    fn test_non_unit_quaternion_is_kept() {
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        let msg = Imu::orientation_sample(Time::default(), SensorId::Back, q);
        assert_eq!(msg.orientation.norm(), 2.0);
    }

    #[test]
    fn test_time_from_system_time_as_duration() {
        let t = UNIX_EPOCH + Duration::new(100, 250);
        let time = Time::from_system_time(t);
        assert_eq!(time.sec, 100);
        assert_eq!(time.nanosec, 250);
        assert_eq!(time.as_duration(), Duration::new(100, 250));
    }

    #[test]
    fn test_time_before_epoch_clamps() {
        let t = UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(Time::from_system_time(t), Time::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_imu_json_shape() {
        let msg = Imu::orientation_sample(
            Time { sec: 1, nanosec: 2 },
            SensorId::Thumb,
            Quaternion::identity(),
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["header"]["frame_id"], "imu_thumb");
        assert_eq!(value["header"]["stamp"]["sec"], 1);
        assert_eq!(value["orientation"]["w"], 1.0);
        assert_eq!(value["angular_velocity"]["x"], 0.0);
    }
}
