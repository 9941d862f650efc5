//! 传感器句柄集合
//!
//! 启动时按 `thumb, index, middle, ring, little, back` 的顺序逐个初始化六个传感器。
//! 单个传感器失败不影响其他传感器，失败的位置记为 [`SensorSlot::Absent`]，
//! 之后整个进程生命周期内都不再尝试。

use crate::error::DriverError;
use hand_imu_protocol::{Quaternion, SENSORS, SENSOR_COUNT, SensorDescriptor, SensorId};
use std::fmt;
use tracing::{error, info};

/// 姿态传感器抽象
///
/// 真实设备为 [`crate::Bno08x`]；测试中可以用任意实现替代。
pub trait OrientationSensor {
    /// 读取当前姿态四元数
    fn read_quaternion(&mut self) -> Result<Quaternion, DriverError>;
}

impl<T: OrientationSensor + ?Sized> OrientationSensor for Box<T> {
    fn read_quaternion(&mut self) -> Result<Quaternion, DriverError> {
        (**self).read_quaternion()
    }
}

/// 单个传感器位置的状态
#[derive(Debug)]
pub enum SensorSlot<S> {
    /// 初始化成功
    Live(S),
    /// 初始化失败（永久缺失）
    Absent { reason: String },
}

impl<S> SensorSlot<S> {
    pub fn is_live(&self) -> bool {
        matches!(self, SensorSlot::Live(_))
    }
}

/// 六个传感器的句柄集合
pub struct SensorSet<S> {
    slots: [(SensorDescriptor, SensorSlot<S>); SENSOR_COUNT],
}

impl<S> SensorSet<S> {
    /// 按固定顺序初始化所有传感器
    ///
    /// `opener` 对每个传感器恰好调用一次，顺序与 [`SENSORS`] 一致。
    /// 成功记 `info`，失败记 `error` 并继续下一个。
    pub fn initialize<E, F>(mut opener: F) -> Self
    where
        E: fmt::Display,
        F: FnMut(&SensorDescriptor) -> Result<S, E>,
    {
        let slots = SENSORS.map(|descriptor| {
            let slot = match opener(&descriptor) {
                Ok(sensor) => {
                    info!(
                        "IMU '{}' initialized on channel {}",
                        descriptor.id, descriptor.channel
                    );
                    SensorSlot::Live(sensor)
                },
                Err(e) => {
                    error!(
                        "Failed to initialize IMU '{}' on channel {}: {}",
                        descriptor.id, descriptor.channel, e
                    );
                    SensorSlot::Absent {
                        reason: e.to_string(),
                    }
                },
            };
            (descriptor, slot)
        });
        Self { slots }
    }

    /// 初始化成功的传感器数量
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|(_, slot)| slot.is_live()).count()
    }

    pub fn slot(&self, id: SensorId) -> &SensorSlot<S> {
        &self.slots[id.index()].1
    }

    pub fn is_live(&self, id: SensorId) -> bool {
        self.slot(id).is_live()
    }

    pub fn get_mut(&mut self, id: SensorId) -> Option<&mut S> {
        match &mut self.slots[id.index()].1 {
            SensorSlot::Live(sensor) => Some(sensor),
            SensorSlot::Absent { .. } => None,
        }
    }

    /// 按固定顺序遍历在线传感器
    pub fn live_mut(&mut self) -> impl Iterator<Item = (SensorId, &mut S)> {
        self.slots
            .iter_mut()
            .filter_map(|(descriptor, slot)| match slot {
                SensorSlot::Live(sensor) => Some((descriptor.id, sensor)),
                SensorSlot::Absent { .. } => None,
            })
    }

    /// 缺失的传感器及原因
    pub fn absent(&self) -> impl Iterator<Item = (SensorId, &str)> {
        self.slots
            .iter()
            .filter_map(|(descriptor, slot)| match slot {
                SensorSlot::Absent { reason } => Some((descriptor.id, reason.as_str())),
                SensorSlot::Live(_) => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Quaternion);

    impl OrientationSensor for Fixed {
        fn read_quaternion(&mut self) -> Result<Quaternion, DriverError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_initialize_in_order() {
        let mut order = Vec::new();
        let set = SensorSet::initialize(|d| {
            order.push((d.id, d.channel));
            Ok::<_, DriverError>(Fixed(Quaternion::identity()))
        });

        assert_eq!(
            order,
            vec![
                (SensorId::Thumb, 0),
                (SensorId::Index, 1),
                (SensorId::Middle, 2),
                (SensorId::Ring, 3),
                (SensorId::Little, 4),
                (SensorId::Back, 5),
            ]
        );
        assert_eq!(set.live_count(), 6);
    }

    #[test]
    fn test_failed_sensor_is_absent_and_others_continue() {
        let mut set = SensorSet::initialize(|d| {
            if d.id == SensorId::Ring {
                Err(DriverError::ProductIdMissing)
            } else {
                Ok(Fixed(Quaternion::identity()))
            }
        });

        assert_eq!(set.live_count(), 5);
        assert!(!set.is_live(SensorId::Ring));
        assert!(set.get_mut(SensorId::Ring).is_none());

        let live: Vec<_> = set.live_mut().map(|(id, _)| id).collect();
        assert_eq!(
            live,
            vec![
                SensorId::Thumb,
                SensorId::Index,
                SensorId::Middle,
                SensorId::Little,
                SensorId::Back,
            ]
        );

        let absent: Vec<_> = set.absent().collect();
        assert_eq!(absent.len(), 1);
        assert_eq!(absent[0].0, SensorId::Ring);
        assert!(absent[0].1.contains("product ID"));
    }

    #[test]
    fn test_boxed_sensor() {
        let mut sensor: Box<dyn OrientationSensor> = Box::new(Fixed(Quaternion::new(0.0, 1.0, 0.0, 0.0)));
        assert_eq!(sensor.read_quaternion().unwrap().x, 1.0);
    }
}
