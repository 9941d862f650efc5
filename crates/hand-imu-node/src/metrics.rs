//! 节点运行指标
//!
//! 全部为原子计数器，可在任意线程读取快照，不会与轮询循环竞争锁。

use hand_imu_protocol::{SENSOR_COUNT, SensorId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 单个传感器的计数器
#[derive(Debug, Default)]
pub struct SensorCounters {
    /// 成功发布的消息数
    pub published: AtomicU64,
    /// 读取失败次数
    pub read_failures: AtomicU64,
    /// 发布失败次数
    pub publish_failures: AtomicU64,
}

/// 节点指标
#[derive(Debug, Default)]
pub struct NodeMetrics {
    /// 已执行的 tick 数
    pub ticks: AtomicU64,
    /// 超时（落后至少一个周期）次数
    pub overruns: AtomicU64,
    /// 因超时被跳过的 tick 数
    pub missed_ticks: AtomicU64,
    sensors: [SensorCounters; SENSOR_COUNT],
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sensor(&self, id: SensorId) -> &SensorCounters {
        &self.sensors[id.index()]
    }

    /// 读取快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            missed_ticks: self.missed_ticks.load(Ordering::Relaxed),
            sensors: std::array::from_fn(|i| {
                let c = &self.sensors[i];
                SensorSnapshot {
                    published: c.published.load(Ordering::Relaxed),
                    read_failures: c.read_failures.load(Ordering::Relaxed),
                    publish_failures: c.publish_failures.load(Ordering::Relaxed),
                }
            }),
        }
    }
}

/// 单个传感器的计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub published: u64,
    pub read_failures: u64,
    pub publish_failures: u64,
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub overruns: u64,
    pub missed_ticks: u64,
    pub sensors: [SensorSnapshot; SENSOR_COUNT],
}

impl MetricsSnapshot {
    pub fn sensor(&self, id: SensorId) -> SensorSnapshot {
        self.sensors[id.index()]
    }

    /// 所有传感器发布总数
    pub fn total_published(&self) -> u64 {
        self.sensors.iter().map(|s| s.published).sum()
    }

    /// 读取成功率（百分比）
    ///
    /// 没有任何读取时返回 0.0。
    pub fn read_success_rate(&self) -> f64 {
        let reads: u64 = self
            .sensors
            .iter()
            .map(|s| s.published + s.publish_failures + s.read_failures)
            .sum();
        if reads == 0 {
            return 0.0;
        }
        let failures: u64 = self.sensors.iter().map(|s| s.read_failures).sum();
        (reads - failures) as f64 / reads as f64 * 100.0
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} overruns={} missed={} read_ok={:.1}%",
            self.ticks,
            self.overruns,
            self.missed_ticks,
            self.read_success_rate()
        )?;
        for id in SensorId::ALL {
            let s = self.sensor(id);
            write!(f, " {}={}", id, s.published)?;
            if s.read_failures > 0 || s.publish_failures > 0 {
                write!(f, "(read_err={} pub_err={})", s.read_failures, s.publish_failures)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = NodeMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.read_success_rate(), 0.0);
    }

    #[test]
    fn test_metrics_per_sensor() {
        let metrics = NodeMetrics::new();
        metrics.ticks.fetch_add(10, Ordering::Relaxed);
        metrics
            .sensor(SensorId::Ring)
            .read_failures
            .fetch_add(2, Ordering::Relaxed);
        metrics
            .sensor(SensorId::Ring)
            .published
            .fetch_add(8, Ordering::Relaxed);
        metrics
            .sensor(SensorId::Back)
            .published
            .fetch_add(10, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks, 10);
        assert_eq!(snapshot.sensor(SensorId::Ring).read_failures, 2);
        assert_eq!(snapshot.sensor(SensorId::Thumb), SensorSnapshot::default());
        assert_eq!(snapshot.total_published(), 18);
        assert_eq!(snapshot.read_success_rate(), 90.0);
    }

    #[test]
    fn test_metrics_concurrent_reads() {
        let metrics = Arc::new(NodeMetrics::new());
        let writer = {
            let metrics = Arc::clone(&metrics);
            thread::spawn(move || {
                for _ in 0..1000 {
                    metrics.ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        for _ in 0..100 {
            let _ = metrics.snapshot();
        }
        writer.join().unwrap();
        assert_eq!(metrics.snapshot().ticks, 1000);
    }

    #[test]
    fn test_snapshot_display() {
        let metrics = NodeMetrics::new();
        metrics.ticks.fetch_add(5, Ordering::Relaxed);
        metrics
            .sensor(SensorId::Middle)
            .read_failures
            .fetch_add(1, Ordering::Relaxed);
        metrics
            .sensor(SensorId::Thumb)
            .published
            .fetch_add(3, Ordering::Relaxed);
        let text = metrics.snapshot().to_string();
        assert!(
            text.starts_with("ticks=5 overruns=0 missed=0 read_ok=75.0%"),
            "{}",
            text
        );
        assert!(text.contains("middle=0(read_err=1 pub_err=0)"), "{}", text);
        assert!(text.contains("thumb=3 "), "{}", text);
    }
}
