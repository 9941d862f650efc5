//! 传感器身份与命名约定
//!
//! 六个传感器的身份和复用器通道分配在编译期固定，进程生命周期内不变。

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 传感器数量（固定）
pub const SENSOR_COUNT: usize = 6;

/// 默认话题前缀
pub const DEFAULT_TOPIC_PREFIX: &str = "/hand/imu";

/// 坐标系 ID 前缀
pub const FRAME_ID_PREFIX: &str = "imu_";

/// 传感器身份
///
/// 声明顺序即轮询顺序，也是输出通道表、句柄表的下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum SensorId {
    Thumb = 0,
    Index = 1,
    Middle = 2,
    Ring = 3,
    Little = 4,
    Back = 5,
}

impl SensorId {
    /// 全部身份（固定轮询顺序）
    pub const ALL: [SensorId; SENSOR_COUNT] = [
        SensorId::Thumb,
        SensorId::Index,
        SensorId::Middle,
        SensorId::Ring,
        SensorId::Little,
        SensorId::Back,
    ];

    /// 小写名称（用于话题、坐标系、日志）
    pub const fn name(self) -> &'static str {
        match self {
            SensorId::Thumb => "thumb",
            SensorId::Index => "index",
            SensorId::Middle => "middle",
            SensorId::Ring => "ring",
            SensorId::Little => "little",
            SensorId::Back => "back",
        }
    }

    /// 表下标（0..6）
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 复用器通道号
    ///
    /// 当前布线下通道号与下标一致：thumb → 0 ... back → 5。
    pub const fn mux_channel(self) -> u8 {
        self as u8
    }

    /// 坐标系 ID：`imu_<name>`
    pub fn frame_id(self) -> String {
        format!("{}{}", FRAME_ID_PREFIX, self.name())
    }

    /// 话题名：`<prefix>/<name>`
    ///
    /// 前缀末尾多余的 `/` 会被去掉，保证 `"/hand/imu/"` 和 `"/hand/imu"` 得到相同结果。
    pub fn topic(self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.name())
    }

    /// 从下标构造
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 对应的静态描述符
    pub const fn descriptor(self) -> SensorDescriptor {
        SensorDescriptor {
            id: self,
            channel: self.mux_channel(),
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 未知传感器名称
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown sensor name: {0}")]
pub struct UnknownSensor(pub String);

impl FromStr for SensorId {
    type Err = UnknownSensor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| UnknownSensor(s.to_string()))
    }
}

/// 传感器描述符：身份 + 复用器通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub id: SensorId,
    pub channel: u8,
}

/// 静态描述符表（进程启动时即确定，永不修改）
pub const SENSORS: [SensorDescriptor; SENSOR_COUNT] = [
    SensorId::Thumb.descriptor(),
    SensorId::Index.descriptor(),
    SensorId::Middle.descriptor(),
    SensorId::Ring.descriptor(),
    SensorId::Little.descriptor(),
    SensorId::Back.descriptor(),
];
