//! BNO08x (SH-2) 报告编解码
//!
//! 只覆盖本系统实际用到的报告：
//!
//! | ID   | 方向 | 含义 |
//! |------|------|------|
//! | 0xF9 | →    | Product ID 请求 |
//! | 0xF8 | ←    | Product ID 响应 |
//! | 0xFD | →    | Set Feature 命令 |
//! | 0xFC | ←    | Get Feature 响应（Set Feature 的确认） |
//! | 0xFB | ←    | 输入报告批次的基准时间戳 |
//! | 0x05 | ←    | 旋转向量（四元数） |
//!
//! 其他输入报告只按长度跳过。
//!
//! # 定点格式
//!
//! 旋转向量四元数为 Q14（1/16384），精度估计为 Q12 弧度。

use hand_imu_protocol::Quaternion;

/// 报告 ID 常量
pub mod report_id {
    pub const ACCELEROMETER: u8 = 0x01;
    pub const GYROSCOPE: u8 = 0x02;
    pub const MAGNETOMETER: u8 = 0x03;
    pub const LINEAR_ACCELERATION: u8 = 0x04;
    pub const ROTATION_VECTOR: u8 = 0x05;
    pub const GRAVITY: u8 = 0x06;
    pub const GAME_ROTATION_VECTOR: u8 = 0x08;
    pub const GEOMAGNETIC_ROTATION_VECTOR: u8 = 0x09;
    pub const COMMAND_RESPONSE: u8 = 0xF1;
    pub const PRODUCT_ID_RESPONSE: u8 = 0xF8;
    pub const PRODUCT_ID_REQUEST: u8 = 0xF9;
    pub const TIMESTAMP_REBASE: u8 = 0xFA;
    pub const BASE_TIMESTAMP: u8 = 0xFB;
    pub const GET_FEATURE_RESPONSE: u8 = 0xFC;
    pub const SET_FEATURE_COMMAND: u8 = 0xFD;
}

/// Q14 定点缩放系数
const Q14_SCALE: f64 = 1.0 / 16384.0;

/// Q12 定点缩放系数
const Q12_SCALE: f64 = 1.0 / 4096.0;

/// 输入通道上各报告的长度（含报告 ID），未知报告返回 `None`
pub fn report_length(id: u8) -> Option<usize> {
    use report_id::*;
    match id {
        ACCELEROMETER | GYROSCOPE | MAGNETOMETER | LINEAR_ACCELERATION | GRAVITY => Some(10),
        ROTATION_VECTOR | GEOMAGNETIC_ROTATION_VECTOR => Some(14),
        GAME_ROTATION_VECTOR => Some(12),
        BASE_TIMESTAMP | TIMESTAMP_REBASE => Some(5),
        _ => None,
    }
}

/// Product ID 请求
pub fn build_product_id_request() -> [u8; 2] {
    [report_id::PRODUCT_ID_REQUEST, 0x00]
}

/// Set Feature 命令（17 字节）
///
/// ```text
/// 0      0xFD
/// 1      报告 ID
/// 2      Feature flags
/// 3-4    Change sensitivity
/// 5-8    报告间隔（µs，小端）
/// 9-12   Batch interval
/// 13-16  Sensor-specific config
/// ```
pub fn build_set_feature_command(report: u8, interval_us: u32) -> [u8; 17] {
    let mut cmd = [0u8; 17];
    cmd[0] = report_id::SET_FEATURE_COMMAND;
    cmd[1] = report;
    cmd[5..9].copy_from_slice(&interval_us.to_le_bytes());
    cmd
}

/// Product ID 响应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductId {
    pub reset_cause: u8,
    pub sw_major: u8,
    pub sw_minor: u8,
    pub part_number: u32,
    pub build_number: u32,
    pub patch: u16,
}

impl ProductId {
    pub const LEN: usize = 16;

    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < Self::LEN || payload[0] != report_id::PRODUCT_ID_RESPONSE {
            return None;
        }
        Some(Self {
            reset_cause: payload[1],
            sw_major: payload[2],
            sw_minor: payload[3],
            part_number: u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            build_number: u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]),
            patch: u16::from_le_bytes([payload[12], payload[13]]),
        })
    }
}

/// Get Feature 响应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureResponse {
    pub report_id: u8,
    pub interval_us: u32,
}

impl FeatureResponse {
    pub const LEN: usize = 17;

    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < Self::LEN || payload[0] != report_id::GET_FEATURE_RESPONSE {
            return None;
        }
        Some(Self {
            report_id: payload[1],
            interval_us: u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]]),
        })
    }
}

/// 旋转向量报告（0x05）
///
/// ```text
/// 0      报告 ID
/// 1      序列号
/// 2      状态（低 2 位为精度等级）
/// 3      延迟
/// 4-5    Q_i
/// 6-7    Q_j
/// 8-9    Q_k
/// 10-11  Q_real
/// 12-13  精度估计（Q12 弧度）
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationVectorReport {
    pub sequence: u8,
    pub status: u8,
    pub q_i: i16,
    pub q_j: i16,
    pub q_k: i16,
    pub q_real: i16,
    pub accuracy: i16,
}

impl RotationVectorReport {
    pub const LEN: usize = 14;

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LEN || bytes[0] != report_id::ROTATION_VECTOR {
            return None;
        }
        let read = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Some(Self {
            sequence: bytes[1],
            status: bytes[2],
            q_i: read(4),
            q_j: read(6),
            q_k: read(8),
            q_real: read(10),
            accuracy: read(12),
        })
    }

    /// 编码（用于模拟设备）
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = report_id::ROTATION_VECTOR;
        out[1] = self.sequence;
        out[2] = self.status;
        out[4..6].copy_from_slice(&self.q_i.to_le_bytes());
        out[6..8].copy_from_slice(&self.q_j.to_le_bytes());
        out[8..10].copy_from_slice(&self.q_k.to_le_bytes());
        out[10..12].copy_from_slice(&self.q_real.to_le_bytes());
        out[12..14].copy_from_slice(&self.accuracy.to_le_bytes());
        out
    }

    /// 转换为四元数
    ///
    /// 传感器按 (i, j, k, real) 输出，对应 (x, y, z, w)。只做定点缩放，不归一化。
    pub fn to_quaternion(&self) -> Quaternion {
        Quaternion::new(
            self.q_real as f64 * Q14_SCALE,
            self.q_i as f64 * Q14_SCALE,
            self.q_j as f64 * Q14_SCALE,
            self.q_k as f64 * Q14_SCALE,
        )
    }

    /// 精度估计（弧度）
    pub fn accuracy_radians(&self) -> f64 {
        self.accuracy as f64 * Q12_SCALE
    }

    /// 精度等级（0 = 不可靠 ... 3 = 高）
    pub fn accuracy_status(&self) -> u8 {
        self.status & 0x03
    }
}

/// 输入通道上解析出的单个报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputReport {
    RotationVector(RotationVectorReport),
    /// 长度已知但本系统不关心的报告
    Other { report_id: u8 },
}

/// 解析一个输入报告包（通道 3）
///
/// 一个包可能包含多个报告，通常以 0xFB 基准时间戳开头。
/// 遇到未知报告 ID 或长度不足时停止解析该包的剩余部分。
pub fn parse_input_reports(payload: &[u8]) -> Vec<InputReport> {
    let mut reports = Vec::new();
    let mut cursor = 0;

    while cursor < payload.len() {
        let id = payload[cursor];
        let Some(len) = report_length(id) else {
            break;
        };
        if cursor + len > payload.len() {
            break;
        }
        let bytes = &payload[cursor..cursor + len];
        cursor += len;

        match id {
            report_id::BASE_TIMESTAMP | report_id::TIMESTAMP_REBASE => {},
            report_id::ROTATION_VECTOR => {
                if let Some(rv) = RotationVectorReport::parse(bytes) {
                    reports.push(InputReport::RotationVector(rv));
                }
            },
            other => reports.push(InputReport::Other { report_id: other }),
        }
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rv(q_i: i16, q_j: i16, q_k: i16, q_real: i16) -> RotationVectorReport {
        RotationVectorReport {
            sequence: 1,
            status: 0x03,
            q_i,
            q_j,
            q_k,
            q_real,
            accuracy: 4096,
        }
    }

    #[test]
    fn test_set_feature_command_layout() {
        let cmd = build_set_feature_command(report_id::ROTATION_VECTOR, 50_000);
        assert_eq!(cmd.len(), 17);
        assert_eq!(cmd[0], 0xFD);
        assert_eq!(cmd[1], 0x05);
        // 50_000 = 0x0000C350
        assert_eq!(&cmd[5..9], &[0x50, 0xC3, 0x00, 0x00]);
        assert!(cmd[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_product_id_parse() {
        let mut payload = [0u8; 16];
        payload[0] = 0xF8;
        payload[2] = 3;
        payload[3] = 2;
        payload[4..8].copy_from_slice(&10_004_563u32.to_le_bytes());
        let pid = ProductId::parse(&payload).unwrap();
        assert_eq!(pid.sw_major, 3);
        assert_eq!(pid.sw_minor, 2);
        assert_eq!(pid.part_number, 10_004_563);

        assert!(ProductId::parse(&payload[..10]).is_none());
        payload[0] = 0xF1;
        assert!(ProductId::parse(&payload).is_none());
    }

    #[test]
    fn test_feature_response_parse() {
        let mut payload = build_set_feature_command(0x05, 10_000);
        payload[0] = 0xFC;
        let resp = FeatureResponse::parse(&payload).unwrap();
        assert_eq!(resp.report_id, 0x05);
        assert_eq!(resp.interval_us, 10_000);
    }

    #[test]
    fn test_rotation_vector_scaling() {
        let q = rv(0, 0, 0, 16384).to_quaternion();
        assert_eq!(q.w, 1.0);
        assert_eq!(q.x, 0.0);

        let q = rv(8192, -8192, 4096, -4096).to_quaternion();
        assert_eq!(q.x, 0.5);
        assert_eq!(q.y, -0.5);
        assert_eq!(q.z, 0.25);
        assert_eq!(q.w, -0.25);
        assert_eq!(rv(0, 0, 0, 0).accuracy_radians(), 1.0);
    }

    #[test]
    fn test_rotation_vector_not_renormalized() {
        // 模长约 1.41，原样保留
        let q = rv(16384, 0, 0, 16384).to_quaternion();
        assert!((q.norm() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_parse_input_reports_with_timestamp() {
        let mut payload = vec![0xFB, 1, 2, 3, 4];
        payload.extend_from_slice(&rv(1, 2, 3, 4).to_bytes());
        let reports = parse_input_reports(&payload);
        assert_eq!(reports, vec![InputReport::RotationVector(rv(1, 2, 3, 4))]);
    }

    #[test]
    fn test_parse_input_reports_skips_known_and_stops_on_unknown() {
        let mut payload = vec![0xFB, 0, 0, 0, 0];
        payload.extend_from_slice(&[0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0]); // 陀螺仪
        payload.extend_from_slice(&rv(0, 0, 0, 16384).to_bytes());
        payload.extend_from_slice(&[0x7E, 1, 2, 3]); // 未知报告
        payload.extend_from_slice(&rv(5, 5, 5, 5).to_bytes());

        let reports = parse_input_reports(&payload);
        assert_eq!(
            reports,
            vec![
                InputReport::Other { report_id: 0x02 },
                InputReport::RotationVector(rv(0, 0, 0, 16384)),
            ]
        );
    }

    #[test]
    fn test_parse_truncated_report() {
        let bytes = rv(1, 1, 1, 1).to_bytes();
        assert!(parse_input_reports(&bytes[..10]).is_empty());
    }
}
