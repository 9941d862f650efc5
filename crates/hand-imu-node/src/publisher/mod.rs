//! 每传感器输出通道
//!
//! [`Transport`] 负责按主题名创建发布者，[`Publisher`] 负责发布单条 [`Imu`] 消息。
//! 节点启动时为六个传感器各创建一个发布者，之后不再增删。
//!
//! 内置三种传输：
//!
//! - [`MemoryTransport`]: 进程内主题（测试、嵌入式使用）
//! - [`UdpTransport`]: 每条消息一个 JSON 数据报
//! - [`StdoutTransport`]: 每条消息一行 JSON

mod memory;
mod stdout;
mod udp;

pub use memory::{MemoryPublisher, MemoryTransport};
pub use stdout::{StdoutPublisher, StdoutTransport};
pub use udp::{UdpPublisher, UdpTransport};

use crate::error::PublishError;
use hand_imu_protocol::Imu;
use serde::Serialize;

/// 单个主题的发布者
pub trait Publisher: Send {
    /// 主题名
    fn topic(&self) -> &str;

    /// 发布一条消息
    fn publish(&mut self, msg: &Imu) -> Result<(), PublishError>;
}

/// 发布者工厂
pub trait Transport {
    /// 为主题创建发布者
    ///
    /// `depth` 为队列深度，只对带队列的传输有意义。
    fn create_publisher(&self, topic: &str, depth: usize)
    -> Result<Box<dyn Publisher>, PublishError>;
}

/// 序列化传输使用的消息封装：`{"topic": ..., "msg": ...}`
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<'a> {
    pub topic: &'a str,
    pub msg: &'a Imu,
}

impl<'a> Envelope<'a> {
    pub(crate) fn new(topic: &'a str, msg: &'a Imu) -> Self {
        Self { topic, msg }
    }
}
