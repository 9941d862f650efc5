//! UDP 传输
//!
//! 每条消息编码为一个 JSON 数据报 `{"topic": "/hand/imu/thumb", "msg": {...}}`，
//! 发往固定目标地址。发送是非阻塞语义的“尽力而为”，没有重传。

use super::{Envelope, Publisher, Transport};
use crate::error::PublishError;
use hand_imu_protocol::Imu;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use tracing::info;

/// UDP 传输
///
/// 所有发布者共享一个套接字。
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl UdpTransport {
    /// 绑定本地临时端口并连接到目标地址
    pub fn connect(target: impl ToSocketAddrs) -> Result<Self, PublishError> {
        let target = target.to_socket_addrs()?.next().ok_or_else(|| {
            PublishError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "UDP target resolved to no address",
            ))
        })?;
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;
        info!("UDP output → {}", target);
        Ok(Self {
            socket: Arc::new(socket),
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for UdpTransport {
    fn create_publisher(
        &self,
        topic: &str,
        _depth: usize,
    ) -> Result<Box<dyn Publisher>, PublishError> {
        Ok(Box::new(UdpPublisher {
            topic: topic.to_string(),
            socket: Arc::clone(&self.socket),
            buf: Vec::with_capacity(512),
        }))
    }
}

/// UDP 发布者
pub struct UdpPublisher {
    topic: String,
    socket: Arc<UdpSocket>,
    buf: Vec<u8>,
}

impl Publisher for UdpPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&mut self, msg: &Imu) -> Result<(), PublishError> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, &Envelope::new(&self.topic, msg))?;
        self.socket.send(&self.buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hand_imu_protocol::{Quaternion, SensorId, Time};
    use std::time::Duration;

    #[test]
    fn test_udp_datagram_shape() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = receiver.local_addr().unwrap();

        let transport = UdpTransport::connect(addr).unwrap();
        assert_eq!(transport.target(), addr);
        let mut publisher = transport.create_publisher("/hand/imu/back", 10).unwrap();

        let msg = Imu::orientation_sample(
            Time { sec: 3, nanosec: 7 },
            SensorId::Back,
            Quaternion::new(0.5, 0.5, 0.5, 0.5),
        );
        publisher.publish(&msg).unwrap();

        let mut buf = [0u8; 2048];
        let n = receiver.recv(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();

        assert_eq!(value["topic"], "/hand/imu/back");
        assert_eq!(value["msg"]["header"]["frame_id"], "imu_back");
        assert_eq!(value["msg"]["header"]["stamp"]["sec"], 3);
        assert_eq!(value["msg"]["orientation"]["w"], 0.5);

        let decoded: Imu = serde_json::from_value(value["msg"].clone()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_unresolvable_target() {
        assert!(UdpTransport::connect("definitely-not-a-host.invalid:9870").is_err());
    }
}
