//! 固定频率定时器
//!
//! 使用绝对截止时间（`start + n * period`）而不是“每次睡 period”，
//! 读取耗时不会累积成漂移。若某次 tick 落后达到一个完整周期，
//! 直接以当前时间重新对齐，错过的 tick 丢弃而不补发。

use spin_sleep::SpinSleeper;
use std::time::{Duration, Instant};

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTiming {
    /// 按计划执行
    OnTime,
    /// 落后至少一个周期，已重新对齐；`missed` 为跳过的 tick 数
    Overrun { missed: u64 },
}

/// 固定频率定时器
pub struct FixedRateTimer {
    period: Duration,
    next_deadline: Option<Instant>,
    sleeper: SpinSleeper,
}

impl FixedRateTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_deadline: None,
            sleeper: SpinSleeper::default(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 等待下一个 tick
    ///
    /// 第一次调用立即返回。
    pub fn wait(&mut self) -> TickTiming {
        let now = Instant::now();
        let Some(deadline) = self.next_deadline else {
            self.next_deadline = Some(now + self.period);
            return TickTiming::OnTime;
        };

        if now < deadline {
            self.sleeper.sleep(deadline - now);
            self.next_deadline = Some(deadline + self.period);
            return TickTiming::OnTime;
        }

        let late = now - deadline;
        let missed = if self.period.is_zero() {
            0
        } else {
            (late.as_nanos() / self.period.as_nanos()) as u64
        };
        if missed == 0 {
            self.next_deadline = Some(deadline + self.period);
            TickTiming::OnTime
        } else {
            self.next_deadline = Some(now + self.period);
            TickTiming::Overrun { missed }
        }
    }
}
