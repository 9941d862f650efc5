//! 进程内传输
//!
//! 每个主题一个 `crossbeam_channel::bounded` 队列，保留最新的 `depth` 条消息：
//! 队列满时丢弃最旧的一条再写入（keep-last）。

use super::{Publisher, Transport};
use crate::error::PublishError;
use crossbeam_channel::{Receiver, Sender, bounded};
use hand_imu_protocol::Imu;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct Topic {
    rx: Receiver<Imu>,
    dropped: Arc<AtomicU64>,
}

/// 进程内传输
///
/// 可 `clone()`，克隆共享同一组主题。
#[derive(Clone, Default)]
pub struct MemoryTransport {
    topics: Arc<Mutex<BTreeMap<String, Topic>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅主题；主题不存在时返回 `None`
    pub fn subscribe(&self, topic: &str) -> Option<Receiver<Imu>> {
        self.topics.lock().get(topic).map(|t| t.rx.clone())
    }

    /// 已创建的主题（按名称排序）
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().keys().cloned().collect()
    }

    /// 因队列满被丢弃的消息数
    pub fn dropped(&self, topic: &str) -> u64 {
        self.topics
            .lock()
            .get(topic)
            .map(|t| t.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

impl Transport for MemoryTransport {
    fn create_publisher(
        &self,
        topic: &str,
        depth: usize,
    ) -> Result<Box<dyn Publisher>, PublishError> {
        let mut topics = self.topics.lock();
        if topics.contains_key(topic) {
            return Err(PublishError::DuplicateTopic(topic.to_string()));
        }

        let (tx, rx) = bounded(depth.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        topics.insert(
            topic.to_string(),
            Topic {
                rx: rx.clone(),
                dropped: Arc::clone(&dropped),
            },
        );

        Ok(Box::new(MemoryPublisher {
            topic: topic.to_string(),
            tx,
            rx,
            dropped,
        }))
    }
}

/// 进程内发布者
pub struct MemoryPublisher {
    topic: String,
    tx: Sender<Imu>,
    /// 用于在队列满时弹出最旧的消息
    rx: Receiver<Imu>,
    dropped: Arc<AtomicU64>,
}

impl Publisher for MemoryPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&mut self, msg: &Imu) -> Result<(), PublishError> {
        // 发布者自己持有接收端，通道不会断开；发送失败只可能是队列已满
        let mut msg = msg.clone();
        while let Err(full) = self.tx.try_send(msg) {
            if self.rx.try_recv().is_ok() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            msg = full.into_inner();
        }
        Ok(())
    }
}
