//! 轮询发布循环
//!
//! 每个 tick 按固定顺序遍历六个传感器：
//!
//! 1. 缺失的传感器直接跳过
//! 2. 在线的传感器读取一次四元数；失败则本 tick 跳过该传感器（句柄保留，下个 tick 照常读取）
//! 3. 成功则以 tick 开始时间为时间戳构造消息，四元数原样拷贝
//! 4. 发布到该传感器的主题；发布失败只记录，不影响循环
//!
//! 同一 tick 内六条消息共用一个时间戳。

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::{MetricsSnapshot, NodeMetrics};
use crate::publisher::{Publisher, Transport};
use crate::timer::{FixedRateTimer, TickTiming};
use hand_imu_driver::{DriverError, OrientationSensor, SensorSet};
use hand_imu_protocol::{Imu, SENSOR_COUNT, SensorId, Time};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{Level, debug, error, info, warn};

/// 一个 tick 的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub published: usize,
    pub read_failures: usize,
    pub publish_failures: usize,
}

/// 连续失败是否需要以 `warn` 级别记录
///
/// 第 1 次和之后每第 `every` 次记录 `warn`，其余为 `debug`。
pub fn should_warn(consecutive: u64, every: u64) -> bool {
    consecutive == 1 || (every > 0 && consecutive % every == 0)
}

/// 读取失败的日志级别
///
/// 按 [`should_warn`] 节流；非瞬态错误（句柄状态异常，重试无法恢复）在同样的节点上升级为 `ERROR`。
pub fn failure_log_level(consecutive: u64, every: u64, error: &DriverError) -> Level {
    match (should_warn(consecutive, every), error.is_transient()) {
        (false, _) => Level::DEBUG,
        (true, true) => Level::WARN,
        (true, false) => Level::ERROR,
    }
}

/// 每个传感器的连续读取失败计数
struct FailureStreaks {
    counts: [u64; SENSOR_COUNT],
    log_every: u64,
}

impl FailureStreaks {
    fn new(log_every: u64) -> Self {
        Self {
            counts: [0; SENSOR_COUNT],
            log_every,
        }
    }

    fn on_failure(&mut self, id: SensorId, error: &DriverError) {
        let count = &mut self.counts[id.index()];
        *count += 1;
        match failure_log_level(*count, self.log_every, error) {
            Level::ERROR => error!(
                "Failed to read IMU '{}': {} ({} consecutive)",
                id, error, count
            ),
            Level::WARN => warn!(
                "Failed to read IMU '{}': {} ({} consecutive)",
                id, error, count
            ),
            _ => debug!("Failed to read IMU '{}': {} ({} consecutive)", id, error, count),
        }
    }

    fn on_success(&mut self, id: SensorId) {
        let count = &mut self.counts[id.index()];
        if *count > 0 {
            info!("IMU '{}' recovered after {} failed reads", id, count);
            *count = 0;
        }
    }
}

/// IMU 节点
pub struct ImuNode<S> {
    sensors: SensorSet<S>,
    /// 按 `SensorId::index()` 排列，启动后不再变化
    publishers: Vec<Box<dyn Publisher>>,
    streaks: FailureStreaks,
    timer: FixedRateTimer,
    stats_interval: Option<Duration>,
    last_stats: Instant,
    metrics: Arc<NodeMetrics>,
}

impl<S: OrientationSensor> ImuNode<S> {
    /// 创建节点并为六个传感器各创建一个发布者
    ///
    /// # Errors
    /// - `NodeError::Config`: 配置非法
    /// - `NodeError::Publish`: 发布者创建失败（致命）
    pub fn new(
        sensors: SensorSet<S>,
        transport: &dyn Transport,
        config: &NodeConfig,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let period = config.period()?;

        let mut publishers = Vec::with_capacity(SENSOR_COUNT);
        for id in SensorId::ALL {
            let topic = id.topic(&config.topic_prefix);
            let publisher = transport.create_publisher(&topic, config.queue_depth)?;
            debug!("Publisher for IMU '{}' on {}", id, publisher.topic());
            publishers.push(publisher);
        }

        if sensors.live_count() == 0 {
            warn!("No IMU initialized, the node will not publish anything");
        }

        Ok(Self {
            sensors,
            publishers,
            streaks: FailureStreaks::new(config.failure_log_every),
            timer: FixedRateTimer::new(period),
            stats_interval: config.stats_interval(),
            last_stats: Instant::now(),
            metrics: Arc::new(NodeMetrics::new()),
        })
    }

    pub fn period(&self) -> Duration {
        self.timer.period()
    }

    pub fn sensors(&self) -> &SensorSet<S> {
        &self.sensors
    }

    /// 共享指标句柄（可在其他线程读取）
    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// 所有主题，顺序与 `SensorId::ALL` 一致
    pub fn topics(&self) -> Vec<&str> {
        self.publishers.iter().map(|p| p.topic()).collect()
    }

    /// 连续读取失败次数
    pub fn consecutive_failures(&self, id: SensorId) -> u64 {
        self.streaks.counts[id.index()]
    }

    /// 执行一个 tick（不等待定时器）
    pub fn tick(&mut self, stamp: Time) -> TickSummary {
        let mut summary = TickSummary::default();

        for (id, sensor) in self.sensors.live_mut() {
            let counters = self.metrics.sensor(id);
            let orientation = match sensor.read_quaternion() {
                Ok(q) => {
                    self.streaks.on_success(id);
                    q
                },
                Err(e) => {
                    self.streaks.on_failure(id, &e);
                    counters.read_failures.fetch_add(1, Ordering::Relaxed);
                    summary.read_failures += 1;
                    continue;
                },
            };

            let msg = Imu::orientation_sample(stamp, id, orientation);
            let publisher = &mut self.publishers[id.index()];
            match publisher.publish(&msg) {
                Ok(()) => {
                    counters.published.fetch_add(1, Ordering::Relaxed);
                    summary.published += 1;
                },
                Err(e) => {
                    warn!("Failed to publish on {}: {}", publisher.topic(), e);
                    counters.publish_failures.fetch_add(1, Ordering::Relaxed);
                    summary.publish_failures += 1;
                },
            }
        }

        self.metrics.ticks.fetch_add(1, Ordering::Relaxed);
        summary
    }

    /// 等待下一个周期并执行一个 tick
    pub fn step(&mut self) -> TickSummary {
        if let TickTiming::Overrun { missed } = self.timer.wait() {
            self.metrics.overruns.fetch_add(1, Ordering::Relaxed);
            self.metrics.missed_ticks.fetch_add(missed, Ordering::Relaxed);
            debug!("Tick overrun, {} tick(s) skipped", missed);
        }

        let summary = self.tick(Time::now());
        self.maybe_log_stats();
        summary
    }

    /// 运行直到 `stop` 被置位
    pub fn run(&mut self, stop: &AtomicBool) -> MetricsSnapshot {
        info!(
            "Publishing {} IMU(s) at {:.1} Hz",
            self.sensors.live_count(),
            1.0 / self.period().as_secs_f64()
        );
        while !stop.load(Ordering::Relaxed) {
            self.step();
        }
        let snapshot = self.metrics.snapshot();
        info!("IMU node stopped: {}", snapshot);
        snapshot
    }

    /// 运行固定数量的 tick
    pub fn run_for(&mut self, ticks: u64) -> MetricsSnapshot {
        for _ in 0..ticks {
            self.step();
        }
        self.metrics.snapshot()
    }

    fn maybe_log_stats(&mut self) {
        if let Some(interval) = self.stats_interval
            && self.last_stats.elapsed() >= interval
        {
            info!("IMU node stats: {}", self.metrics.snapshot());
            self.last_stats = Instant::now();
        }
    }
}
