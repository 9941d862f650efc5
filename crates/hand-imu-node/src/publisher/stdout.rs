//! 标准输出传输
//!
//! 每条消息一行 JSON（与 UDP 相同的封装）。日志走 stderr，stdout 只有数据，
//! 可以直接用管道接到下游程序。

use super::{Envelope, Publisher, Transport};
use crate::error::PublishError;
use hand_imu_protocol::Imu;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// 标准输出传输
///
/// 所有发布者共享同一个输出流，每行在锁内完整写出，不会交错。
#[derive(Clone)]
pub struct StdoutTransport {
    writer: SharedWriter,
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    /// 写到任意输出流
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }
}

impl Transport for StdoutTransport {
    fn create_publisher(
        &self,
        topic: &str,
        _depth: usize,
    ) -> Result<Box<dyn Publisher>, PublishError> {
        Ok(Box::new(StdoutPublisher {
            topic: topic.to_string(),
            writer: Arc::clone(&self.writer),
            line: Vec::with_capacity(512),
        }))
    }
}

/// 标准输出发布者
pub struct StdoutPublisher {
    topic: String,
    writer: SharedWriter,
    line: Vec<u8>,
}

impl Publisher for StdoutPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&mut self, msg: &Imu) -> Result<(), PublishError> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, &Envelope::new(&self.topic, msg))?;
        self.line.push(b'\n');

        let mut writer = self.writer.lock();
        writer.write_all(&self.line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_imu_protocol::{Quaternion, SensorId, Time};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines() {
        let buf = SharedBuf::default();
        let transport = StdoutTransport::with_writer(buf.clone());
        let mut thumb = transport.create_publisher("/hand/imu/thumb", 10).unwrap();
        let mut ring = transport.create_publisher("/hand/imu/ring", 10).unwrap();

        let stamp = Time { sec: 1, nanosec: 2 };
        thumb
            .publish(&Imu::orientation_sample(stamp, SensorId::Thumb, Quaternion::identity()))
            .unwrap();
        ring.publish(&Imu::orientation_sample(stamp, SensorId::Ring, Quaternion::identity()))
            .unwrap();

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["topic"], "/hand/imu/thumb");
        assert_eq!(first["msg"]["header"]["frame_id"], "imu_thumb");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["topic"], "/hand/imu/ring");
    }

    #[test]
    fn test_write_error_is_reported() {
        let transport = StdoutTransport::with_writer(BrokenPipe);
        let mut publisher = transport.create_publisher("/t", 1).unwrap();
        let msg = Imu::default();
        assert!(matches!(publisher.publish(&msg), Err(PublishError::Io(_))));
    }
}
