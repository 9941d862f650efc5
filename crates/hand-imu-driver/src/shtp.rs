//! SHTP (Sensor Hub Transport Protocol) over I2C
//!
//! BNO08x 系列使用的分包协议。每个包以 4 字节头开始：
//!
//! ```text
//! Byte 0-1: 总长度（含头，小端）；bit 15 = 续包标志
//! Byte 2:   通道号（0-5）
//! Byte 3:   序列号（每个通道独立递增）
//! ```
//!
//! # I2C 读取
//!
//! 设备没有寄存器地址，每次读取都从输出缓冲区的包头开始。
//! 因此读取分两步：先读 4 字节头得到长度，再按长度重新读取整个包（包头会被再次发送）。
//! 长度为 0 表示当前没有数据。

use crate::error::DriverError;
use embedded_hal::i2c::I2c;
use thiserror::Error;
use tracing::trace;

/// SHTP 头长度
pub const HEADER_SIZE: usize = 4;

/// 单次读取的最大包长度
///
/// 复位后的广播包约 280 字节，常规报告远小于此值。超出部分按续包丢弃。
pub const MAX_PACKET_SIZE: usize = 512;

/// 续包标志位
const CONTINUATION_BIT: u16 = 0x8000;

/// 通道数
const CHANNEL_COUNT: usize = 6;

/// SHTP 通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShtpChannel {
    /// 命令通道（SHTP 自身）
    Command = 0,
    /// 可执行通道（复位等）
    Executable = 1,
    /// 传感器集线器控制通道（Set Feature、Product ID 等）
    Control = 2,
    /// 普通输入报告
    InputReport = 3,
    /// 唤醒输入报告
    WakeInputReport = 4,
    /// 高速陀螺仪
    Gyro = 5,
}

impl ShtpChannel {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Command),
            1 => Some(Self::Executable),
            2 => Some(Self::Control),
            3 => Some(Self::InputReport),
            4 => Some(Self::WakeInputReport),
            5 => Some(Self::Gyro),
            _ => None,
        }
    }
}

/// SHTP 协议错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShtpError {
    /// 包头长度字段小于头本身
    #[error("Invalid SHTP header (length {length})")]
    InvalidHeader { length: u16 },

    /// 未知通道
    #[error("Invalid SHTP channel {0}")]
    InvalidChannel(u8),

    /// 写入的负载超出单包上限
    #[error("SHTP payload too large ({len} bytes)")]
    PayloadTooLarge { len: usize },
}

/// SHTP 包头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShtpHeader {
    /// 总长度（含头，已去掉续包位）
    pub length: u16,
    pub channel: u8,
    pub sequence: u8,
    pub continuation: bool,
}

impl ShtpHeader {
    /// 解析 4 字节包头
    pub fn parse(bytes: [u8; HEADER_SIZE]) -> Self {
        let raw = u16::from_le_bytes([bytes[0], bytes[1]]);
        Self {
            length: raw & !CONTINUATION_BIT,
            channel: bytes[2],
            sequence: bytes[3],
            continuation: raw & CONTINUATION_BIT != 0,
        }
    }

    /// 编码为 4 字节包头
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut raw = self.length & !CONTINUATION_BIT;
        if self.continuation {
            raw |= CONTINUATION_BIT;
        }
        let [lo, hi] = raw.to_le_bytes();
        [lo, hi, self.channel, self.sequence]
    }

    /// 负载长度
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }
}

/// 接收到的 SHTP 包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShtpPacket {
    pub header: ShtpHeader,
    pub payload: Vec<u8>,
}

impl ShtpPacket {
    pub fn channel(&self) -> Option<ShtpChannel> {
        ShtpChannel::from_u8(self.header.channel)
    }
}

/// SHTP over I2C 传输层
pub struct ShtpI2c<I2C> {
    i2c: I2C,
    address: u8,
    /// 每个通道的发送序列号
    sequence: [u8; CHANNEL_COUNT],
}

impl<I2C> ShtpI2c<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            sequence: [0; CHANNEL_COUNT],
        }
    }

    /// 设备地址
    pub fn address(&self) -> u8 {
        self.address
    }

    /// 复位后序列号归零
    pub fn reset_sequence(&mut self) {
        self.sequence = [0; CHANNEL_COUNT];
    }

    /// 释放底层总线
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> ShtpI2c<I2C> {
    /// 发送一个包
    pub fn write_packet(&mut self, channel: ShtpChannel, payload: &[u8]) -> Result<(), DriverError> {
        let total = HEADER_SIZE + payload.len();
        if total > MAX_PACKET_SIZE {
            return Err(ShtpError::PayloadTooLarge { len: payload.len() }.into());
        }

        let seq = &mut self.sequence[channel as usize];
        let header = ShtpHeader {
            length: total as u16,
            channel: channel as u8,
            sequence: *seq,
            continuation: false,
        };
        *seq = seq.wrapping_add(1);

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&header.to_bytes());
        buf.extend_from_slice(payload);

        trace!(
            "SHTP TX addr=0x{:02X} ch={} len={}",
            self.address,
            channel as u8,
            total
        );
        self.i2c
            .write(self.address, &buf)
            .map_err(DriverError::from_i2c)
    }

    /// 读取一个包
    ///
    /// 返回 `Ok(None)` 表示设备当前没有待读数据。
    pub fn read_packet(&mut self) -> Result<Option<ShtpPacket>, DriverError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        self.i2c
            .read(self.address, &mut header_bytes)
            .map_err(DriverError::from_i2c)?;

        // 0xFFFF：设备尚未就绪，按无数据处理
        if header_bytes[0] == 0xFF && header_bytes[1] == 0xFF {
            return Ok(None);
        }

        let header = ShtpHeader::parse(header_bytes);
        if header.length == 0 {
            return Ok(None);
        }
        if (header.length as usize) < HEADER_SIZE {
            return Err(ShtpError::InvalidHeader {
                length: header.length,
            }
            .into());
        }
        if ShtpChannel::from_u8(header.channel).is_none() {
            return Err(ShtpError::InvalidChannel(header.channel).into());
        }

        let read_len = (header.length as usize).min(MAX_PACKET_SIZE);
        let mut buf = vec![0u8; read_len];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(DriverError::from_i2c)?;

        // 以第二次读取的包头为准
        let header = ShtpHeader::parse([buf[0], buf[1], buf[2], buf[3]]);
        let end = (header.length as usize).clamp(HEADER_SIZE, read_len);
        let payload = buf[HEADER_SIZE..end].to_vec();

        trace!(
            "SHTP RX addr=0x{:02X} ch={} seq={} len={}",
            self.address, header.channel, header.sequence, header.length
        );

        Ok(Some(ShtpPacket { header, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::collections::VecDeque;

    /// 脚本化总线：按顺序返回预设的读取内容，记录所有写入
    #[derive(Default)]
    struct ScriptedBus {
        reads: VecDeque<Vec<u8>>,
        writes: Vec<Vec<u8>>,
    }

    impl ErrorType for ScriptedBus {
        type Error = ErrorKind;
    }

    impl I2c for ScriptedBus {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => self.writes.push(bytes.to_vec()),
                    Operation::Read(buf) => {
                        let data = self.reads.pop_front().ok_or(ErrorKind::Bus)?;
                        buf.fill(0);
                        let n = buf.len().min(data.len());
                        buf[..n].copy_from_slice(&data[..n]);
                    },
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_header_roundtrip_with_continuation() {
        let header = ShtpHeader {
            length: 276,
            channel: 2,
            sequence: 9,
            continuation: true,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x14, 0x81, 2, 9]);
        assert_eq!(ShtpHeader::parse(bytes), header);
        assert_eq!(header.payload_len(), 272);
    }

    #[test]
    fn test_write_packet_increments_sequence_per_channel() {
        let mut shtp = ShtpI2c::new(ScriptedBus::default(), 0x4B);
        shtp.write_packet(ShtpChannel::Control, &[0xF9, 0x00]).unwrap();
        shtp.write_packet(ShtpChannel::Control, &[0xF9, 0x00]).unwrap();
        shtp.write_packet(ShtpChannel::Executable, &[0x01]).unwrap();

        let bus = shtp.release();
        assert_eq!(bus.writes[0], vec![6, 0, 2, 0, 0xF9, 0x00]);
        assert_eq!(bus.writes[1], vec![6, 0, 2, 1, 0xF9, 0x00]);
        assert_eq!(bus.writes[2], vec![5, 0, 1, 0, 0x01]);
    }

    #[test]
    fn test_write_packet_too_large() {
        let mut shtp = ShtpI2c::new(ScriptedBus::default(), 0x4B);
        let payload = vec![0u8; MAX_PACKET_SIZE];
        let err = shtp.write_packet(ShtpChannel::Control, &payload).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Shtp(ShtpError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_read_packet_two_phase() {
        let packet = vec![7, 0, 3, 4, 0xAA, 0xBB, 0xCC];
        let mut bus = ScriptedBus::default();
        bus.reads.push_back(packet[..4].to_vec());
        bus.reads.push_back(packet.clone());

        let mut shtp = ShtpI2c::new(bus, 0x4B);
        let pkt = shtp.read_packet().unwrap().unwrap();
        assert_eq!(pkt.channel(), Some(ShtpChannel::InputReport));
        assert_eq!(pkt.header.sequence, 4);
        assert_eq!(pkt.payload, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_read_packet_no_data() {
        let mut bus = ScriptedBus::default();
        bus.reads.push_back(vec![0, 0, 0, 0]);
        bus.reads.push_back(vec![0xFF, 0xFF, 0xFF, 0xFF]);
        let mut shtp = ShtpI2c::new(bus, 0x4B);
        assert_eq!(shtp.read_packet().unwrap(), None);
        assert_eq!(shtp.read_packet().unwrap(), None);
    }

    #[test]
    fn test_read_packet_invalid_header() {
        let mut bus = ScriptedBus::default();
        bus.reads.push_back(vec![2, 0, 3, 0]);
        let mut shtp = ShtpI2c::new(bus, 0x4B);
        assert_eq!(
            shtp.read_packet().unwrap_err(),
            DriverError::Shtp(ShtpError::InvalidHeader { length: 2 })
        );
    }

    #[test]
    fn test_read_packet_bus_error() {
        let mut shtp = ShtpI2c::new(ScriptedBus::default(), 0x4B);
        assert_eq!(
            shtp.read_packet().unwrap_err(),
            DriverError::I2c(ErrorKind::Bus)
        );
    }
}
