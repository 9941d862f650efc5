//! 模拟 BNO08x 设备
//!
//! 挂在 [`hand_imu_bus::mock::MockI2cBus`] 上，按 SHTP 协议应答主机：
//!
//! - 可执行通道 `0x01`：复位，排队一个复位完成通知
//! - 控制通道 `0xF9`：排队 Product ID 响应
//! - 控制通道 `0xFD`：记录报告间隔并排队 Get Feature 响应
//! - 旋转向量启用后，每个轮询周期产生一个输入报告包
//!
//! “轮询周期”以主机读到一次空包头为界：读到空包后，下一次读取会得到新样本。
//!
//! # 读取语义
//!
//! 与真实设备一致，每次读取都从待发包的包头开始；读取长度小于包长时不出队。

use crate::reports::{RotationVectorReport, report_id};
use crate::shtp::{HEADER_SIZE, ShtpChannel, ShtpHeader};
use embedded_hal::i2c::ErrorKind;
use hand_imu_bus::mock::MockDevice;
use hand_imu_protocol::Quaternion;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

const Q14_ONE: f64 = 16384.0;

struct SimState {
    outbox: VecDeque<Vec<u8>>,
    sequence: [u8; 6],
    sample: RotationVectorReport,
    rotation_interval_us: Option<u32>,
    sample_due: bool,
    timestamp: u32,
    silent: bool,
    reject_features: bool,
    foreign_feature_responses: bool,
    failing_reads: u32,
    resets: u32,
    samples_sent: u64,
}

impl SimState {
    fn queue(&mut self, channel: ShtpChannel, payload: &[u8]) {
        let seq = &mut self.sequence[channel as usize];
        let header = ShtpHeader {
            length: (HEADER_SIZE + payload.len()) as u16,
            channel: channel as u8,
            sequence: *seq,
            continuation: false,
        };
        *seq = seq.wrapping_add(1);

        let mut packet = header.to_bytes().to_vec();
        packet.extend_from_slice(payload);
        self.outbox.push_back(packet);
    }

    fn reset(&mut self) {
        self.outbox.clear();
        self.sequence = [0; 6];
        self.rotation_interval_us = None;
        self.sample_due = false;
        self.resets += 1;
        self.queue(ShtpChannel::Executable, &[0x01]);
    }

    fn handle_control(&mut self, payload: &[u8]) {
        match payload.first() {
            Some(&report_id::PRODUCT_ID_REQUEST) if !self.silent => {
                let mut resp = [0u8; 16];
                resp[0] = report_id::PRODUCT_ID_RESPONSE;
                resp[2] = 3;
                resp[3] = 2;
                resp[4..8].copy_from_slice(&10_004_563u32.to_le_bytes());
                resp[8..12].copy_from_slice(&7u32.to_le_bytes());
                resp[12..14].copy_from_slice(&13u16.to_le_bytes());
                self.queue(ShtpChannel::Control, &resp);
            },
            Some(&report_id::SET_FEATURE_COMMAND) if payload.len() >= 17 && !self.reject_features => {
                if self.foreign_feature_responses {
                    self.queue_foreign_feature_response();
                }
                let interval = u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]]);
                if payload[1] == report_id::ROTATION_VECTOR {
                    self.rotation_interval_us = Some(interval);
                    self.sample_due = true;
                }
                let mut resp = [0u8; 17];
                resp.copy_from_slice(&payload[..17]);
                resp[0] = report_id::GET_FEATURE_RESPONSE;
                self.queue(ShtpChannel::Control, &resp);
            },
            _ => {},
        }
    }

    /// 其他报告（加速度计 0x01）的 Get Feature 响应
    fn queue_foreign_feature_response(&mut self) {
        let mut resp = [0u8; 17];
        resp[0] = report_id::GET_FEATURE_RESPONSE;
        resp[1] = 0x01;
        resp[5..9].copy_from_slice(&10_000u32.to_le_bytes());
        self.queue(ShtpChannel::Control, &resp);
    }

    fn queue_sample(&mut self) {
        self.timestamp = self.timestamp.wrapping_add(1);
        self.sample.sequence = self.sample.sequence.wrapping_add(1);
        let mut payload = vec![report_id::BASE_TIMESTAMP];
        payload.extend_from_slice(&self.timestamp.to_le_bytes());
        payload.extend_from_slice(&self.sample.to_bytes());
        self.queue(ShtpChannel::InputReport, &payload);
        self.samples_sent += 1;
    }
}

/// 模拟 BNO08x
///
/// 可 `clone()`，克隆共享同一状态：一份挂到总线上，另一份留在测试里控制设备。
#[derive(Clone)]
pub struct SimulatedBno08x {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedBno08x {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBno08x {
    pub fn new() -> Self {
        let sample = RotationVectorReport {
            status: 0x03,
            q_real: Q14_ONE as i16,
            ..RotationVectorReport::default()
        };
        Self {
            state: Arc::new(Mutex::new(SimState {
                outbox: VecDeque::new(),
                sequence: [0; 6],
                sample,
                rotation_interval_us: None,
                sample_due: false,
                timestamp: 0,
                silent: false,
                reject_features: false,
                foreign_feature_responses: false,
                failing_reads: 0,
                resets: 0,
                samples_sent: 0,
            })),
        }
    }

    /// 设置之后报告的姿态（量化为 Q14）
    pub fn set_quaternion(&self, q: Quaternion) {
        let to_q14 = |v: f64| (v * Q14_ONE).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        let mut state = self.state.lock();
        state.sample.q_i = to_q14(q.x);
        state.sample.q_j = to_q14(q.y);
        state.sample.q_k = to_q14(q.z);
        state.sample.q_real = to_q14(q.w);
    }

    /// 应答总线但从不回复 Product ID
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// 不确认 Set Feature
    pub fn set_reject_features(&self, reject: bool) {
        self.state.lock().reject_features = reject;
    }

    /// 发送其他报告的 Get Feature 响应：每个 Set Feature 响应之前一个，
    /// 且发送队列为空时每次读取再补一个
    pub fn set_foreign_feature_responses(&self, enabled: bool) {
        self.state.lock().foreign_feature_responses = enabled;
    }

    /// 接下来 `count` 次读取返回总线错误
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// 模拟设备自行复位（掉电、看门狗等）
    pub fn power_cycle(&self) {
        self.state.lock().reset();
    }

    /// 当前旋转向量报告间隔；`None` 表示未启用
    pub fn rotation_interval_us(&self) -> Option<u32> {
        self.state.lock().rotation_interval_us
    }

    pub fn reset_count(&self) -> u32 {
        self.state.lock().resets
    }

    /// 已发送的旋转向量样本数
    pub fn samples_sent(&self) -> u64 {
        self.state.lock().samples_sent
    }
}

impl MockDevice for SimulatedBno08x {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        if bytes.len() < HEADER_SIZE {
            return Ok(());
        }
        let header = ShtpHeader::parse([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let end = (header.length as usize).clamp(HEADER_SIZE, bytes.len());
        let payload = &bytes[HEADER_SIZE..end];

        let mut state = self.state.lock();
        match ShtpChannel::from_u8(header.channel) {
            Some(ShtpChannel::Executable) if payload.first() == Some(&0x01) => state.reset(),
            Some(ShtpChannel::Control) => state.handle_control(payload),
            _ => {},
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        let mut state = self.state.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(ErrorKind::Bus);
        }

        if state.outbox.is_empty() && state.rotation_interval_us.is_some() && state.sample_due {
            state.sample_due = false;
            state.queue_sample();
        }
        if state.outbox.is_empty() && state.foreign_feature_responses {
            state.queue_foreign_feature_response();
        }

        buf.fill(0);
        let consumed = match state.outbox.front() {
            Some(packet) => {
                let n = buf.len().min(packet.len());
                buf[..n].copy_from_slice(&packet[..n]);
                buf.len() >= packet.len()
            },
            None => {
                // 空包头，本轮结束
                state.sample_due = true;
                false
            },
        };
        if consumed {
            state.outbox.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(sim: &mut SimulatedBno08x, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        sim.read(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_reset_queues_notification() {
        let mut sim = SimulatedBno08x::new();
        sim.write(&[5, 0, 1, 0, 0x01]).unwrap();
        assert_eq!(sim.reset_count(), 1);

        let header = read(&mut sim, 4);
        assert_eq!(header, vec![5, 0, 1, 0]);
        // 只读包头不出队
        assert_eq!(read(&mut sim, 5), vec![5, 0, 1, 0, 0x01]);
        assert_eq!(read(&mut sim, 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_one_sample_per_poll_cycle() {
        let mut sim = SimulatedBno08x::new();
        let mut cmd = vec![21, 0, 2, 0];
        cmd.extend_from_slice(&crate::reports::build_set_feature_command(0x05, 20_000));
        sim.write(&cmd).unwrap();
        assert_eq!(sim.rotation_interval_us(), Some(20_000));

        // Get Feature 响应
        assert_eq!(read(&mut sim, 64)[4], report_id::GET_FEATURE_RESPONSE);
        // 第一个样本
        let packet = read(&mut sim, 64);
        assert_eq!(packet[2], ShtpChannel::InputReport as u8);
        assert_eq!(packet[4], report_id::BASE_TIMESTAMP);
        assert_eq!(packet[9], report_id::ROTATION_VECTOR);
        // 本轮结束
        assert_eq!(read(&mut sim, 4), vec![0, 0, 0, 0]);
        // 下一轮
        assert_eq!(read(&mut sim, 64)[9], report_id::ROTATION_VECTOR);
        assert_eq!(sim.samples_sent(), 2);
    }

    #[test]
    fn test_fail_reads() {
        let mut sim = SimulatedBno08x::new();
        sim.fail_reads(2);
        let mut buf = [0u8; 4];
        assert_eq!(sim.read(&mut buf), Err(ErrorKind::Bus));
        assert_eq!(sim.read(&mut buf), Err(ErrorKind::Bus));
        assert!(sim.read(&mut buf).is_ok());
    }
}
