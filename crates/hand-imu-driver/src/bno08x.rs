//! BNO08x 姿态传感器驱动
//!
//! 初始化流程：
//!
//! 1. 软复位（可执行通道写 `0x01`），等待设备重启
//! 2. 丢弃复位后的广播与复位完成通知
//! 3. 请求 Product ID，确认设备是 BNO08x
//! 4. 发送 Set Feature 启用旋转向量报告，等待 Get Feature 响应确认
//!
//! 之后每次 [`Bno08x::read_quaternion`] 处理有限个待读包并返回最近一次旋转向量。

use crate::error::DriverError;
use crate::reports::{
    self, FeatureResponse, InputReport, ProductId, RotationVectorReport, report_id,
};
use crate::sensor::OrientationSensor;
use crate::shtp::{ShtpChannel, ShtpI2c, ShtpPacket};
use embedded_hal::i2c::I2c;
use hand_imu_protocol::Quaternion;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 软复位命令（可执行通道）
const RESET_COMMAND: u8 = 0x01;

/// 复位完成通知（可执行通道）
const RESET_COMPLETE: u8 = 0x01;

/// 默认 I2C 地址（SA0 拉高）
pub const DEFAULT_ADDRESS: u8 = 0x4B;

/// 复位后最多丢弃的包数
const MAX_DRAIN_PACKETS: usize = 32;

/// 驱动配置
#[derive(Debug, Clone)]
pub struct Bno08xConfig {
    /// 软复位后等待设备重启的时间
    pub reset_delay: Duration,
    /// 等待控制通道响应的超时
    pub response_timeout: Duration,
    /// 等待响应期间没有数据时的轮询间隔
    pub poll_interval: Duration,
    /// 旋转向量报告间隔（µs）
    pub report_interval_us: u32,
    /// 单次 `read_quaternion()` 最多处理的包数
    pub max_packets_per_read: usize,
}

impl Default for Bno08xConfig {
    fn default() -> Self {
        Self {
            reset_delay: Duration::from_millis(500),
            response_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(5),
            report_interval_us: 50_000,
            max_packets_per_read: 8,
        }
    }
}

impl Bno08xConfig {
    /// 无等待的配置（模拟设备立即响应）
    pub fn immediate() -> Self {
        Self {
            reset_delay: Duration::ZERO,
            response_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_report_interval_us(mut self, interval_us: u32) -> Self {
        self.report_interval_us = interval_us;
        self
    }
}

/// BNO08x 驱动
pub struct Bno08x<I2C> {
    shtp: ShtpI2c<I2C>,
    config: Bno08xConfig,
    product_id: Option<ProductId>,
    rotation_enabled: bool,
    /// 设备在运行中自行复位，需要重新启用报告
    reset_detected: bool,
    latest: Option<RotationVectorReport>,
}

impl<I2C> Bno08x<I2C> {
    pub const DEFAULT_ADDRESS: u8 = DEFAULT_ADDRESS;

    pub fn new(i2c: I2C, address: u8) -> Self {
        Self::with_config(i2c, address, Bno08xConfig::default())
    }

    pub fn with_config(i2c: I2C, address: u8, config: Bno08xConfig) -> Self {
        Self {
            shtp: ShtpI2c::new(i2c, address),
            config,
            product_id: None,
            rotation_enabled: false,
            reset_detected: false,
            latest: None,
        }
    }

    pub fn address(&self) -> u8 {
        self.shtp.address()
    }

    pub fn config(&self) -> &Bno08xConfig {
        &self.config
    }

    /// 初始化成功后的 Product ID
    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn is_rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    /// 释放底层总线
    pub fn release(self) -> I2C {
        self.shtp.release()
    }
}

impl<I2C: I2c> Bno08x<I2C> {
    /// 创建并完成初始化 + 启用旋转向量
    pub fn start(i2c: I2C, address: u8, config: Bno08xConfig) -> Result<Self, DriverError> {
        let mut sensor = Self::with_config(i2c, address, config);
        sensor.init()?;
        sensor.enable_rotation_vector()?;
        Ok(sensor)
    }

    /// 软复位并确认 Product ID
    ///
    /// # Errors
    /// - `DriverError::I2c`: 设备无应答（通常是设备不存在）
    /// - `DriverError::ProductIdMissing`: 超时未收到 Product ID 响应
    pub fn init(&mut self) -> Result<ProductId, DriverError> {
        debug!("BNO08x 0x{:02X}: soft reset", self.address());
        self.shtp
            .write_packet(ShtpChannel::Executable, &[RESET_COMMAND])?;
        self.shtp.reset_sequence();
        self.rotation_enabled = false;
        self.reset_detected = false;
        self.latest = None;

        sleep_if_nonzero(self.config.reset_delay);

        let mut drained = 0;
        while drained < MAX_DRAIN_PACKETS && self.shtp.read_packet()?.is_some() {
            drained += 1;
        }
        trace!("BNO08x 0x{:02X}: drained {} packets", self.address(), drained);

        self.shtp
            .write_packet(ShtpChannel::Control, &reports::build_product_id_request())?;

        let deadline = Instant::now() + self.config.response_timeout;
        let payload = self
            .wait_for_control(report_id::PRODUCT_ID_RESPONSE, deadline)?
            .ok_or(DriverError::ProductIdMissing)?;
        let product_id = ProductId::parse(&payload).ok_or(DriverError::ProductIdMissing)?;

        debug!(
            "BNO08x 0x{:02X}: part {} sw {}.{}.{} build {}",
            self.address(),
            product_id.part_number,
            product_id.sw_major,
            product_id.sw_minor,
            product_id.patch,
            product_id.build_number
        );
        self.product_id = Some(product_id);
        Ok(product_id)
    }

    /// 启用旋转向量报告
    ///
    /// # Errors
    /// - `DriverError::FeatureNotEnabled`: 超时未收到确认
    pub fn enable_rotation_vector(&mut self) -> Result<(), DriverError> {
        let interval_us = self.config.report_interval_us;
        self.send_set_feature(report_id::ROTATION_VECTOR, interval_us)?;

        // 其他报告的响应不会延长等待时间
        let deadline = Instant::now() + self.config.response_timeout;
        let not_enabled = DriverError::FeatureNotEnabled {
            report_id: report_id::ROTATION_VECTOR,
        };
        loop {
            let payload = self
                .wait_for_control(report_id::GET_FEATURE_RESPONSE, deadline)?
                .ok_or_else(|| not_enabled.clone())?;
            match FeatureResponse::parse(&payload) {
                Some(resp) if resp.report_id == report_id::ROTATION_VECTOR => {
                    debug!(
                        "BNO08x 0x{:02X}: rotation vector enabled ({} µs)",
                        self.address(),
                        resp.interval_us
                    );
                    self.rotation_enabled = true;
                    return Ok(());
                },
                _ if Instant::now() >= deadline => return Err(not_enabled),
                _ => continue,
            }
        }
    }

    fn send_set_feature(&mut self, report: u8, interval_us: u32) -> Result<(), DriverError> {
        let cmd = reports::build_set_feature_command(report, interval_us);
        self.shtp.write_packet(ShtpChannel::Control, &cmd)
    }

    /// 等待控制通道上指定 ID 的响应
    ///
    /// 期间收到的输入报告照常处理。到达 `deadline` 返回 `Ok(None)`。
    fn wait_for_control(
        &mut self,
        id: u8,
        deadline: Instant,
    ) -> Result<Option<Vec<u8>>, DriverError> {
        loop {
            match self.shtp.read_packet()? {
                Some(packet)
                    if packet.channel() == Some(ShtpChannel::Control)
                        && packet.payload.first() == Some(&id) =>
                {
                    return Ok(Some(packet.payload));
                },
                Some(packet) => self.handle_packet(packet),
                None => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    sleep_if_nonzero(self.config.poll_interval);
                    continue;
                },
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn handle_packet(&mut self, packet: ShtpPacket) {
        match packet.channel() {
            Some(ShtpChannel::InputReport | ShtpChannel::WakeInputReport) => {
                for report in reports::parse_input_reports(&packet.payload) {
                    match report {
                        InputReport::RotationVector(rv) => self.latest = Some(rv),
                        InputReport::Other { report_id } => {
                            trace!("BNO08x: ignoring report 0x{:02X}", report_id)
                        },
                    }
                }
            },
            Some(ShtpChannel::Executable)
                if packet.payload.first() == Some(&RESET_COMPLETE) && self.rotation_enabled =>
            {
                warn!(
                    "BNO08x 0x{:02X}: unexpected reset, re-enabling rotation vector",
                    self.address()
                );
                self.reset_detected = true;
            },
            _ => trace!(
                "BNO08x: unhandled packet on channel {} ({} bytes)",
                packet.header.channel,
                packet.payload.len()
            ),
        }
    }

    /// 处理待读包，返回最近一次旋转向量
    ///
    /// 单次最多处理 `max_packets_per_read` 个包。没有新数据时返回上一次的值。
    ///
    /// # Errors
    /// - `DriverError::ReportNotEnabled`: 尚未启用旋转向量
    /// - `DriverError::NoReport`: 尚未收到任何旋转向量
    /// - `DriverError::I2c` / `DriverError::Shtp`: 本次读取失败
    pub fn read_quaternion(&mut self) -> Result<Quaternion, DriverError> {
        if !self.rotation_enabled {
            return Err(DriverError::ReportNotEnabled {
                report_id: report_id::ROTATION_VECTOR,
            });
        }

        for _ in 0..self.config.max_packets_per_read {
            match self.shtp.read_packet()? {
                Some(packet) => self.handle_packet(packet),
                None => break,
            }
        }

        if self.reset_detected {
            self.shtp.reset_sequence();
            self.send_set_feature(report_id::ROTATION_VECTOR, self.config.report_interval_us)?;
            self.reset_detected = false;
        }

        self.latest
            .map(|rv| rv.to_quaternion())
            .ok_or(DriverError::NoReport)
    }

    /// 最近一次旋转向量的原始报告
    pub fn latest_report(&self) -> Option<RotationVectorReport> {
        self.latest
    }
}

impl<I2C: I2c> OrientationSensor for Bno08x<I2C> {
    fn read_quaternion(&mut self) -> Result<Quaternion, DriverError> {
        Bno08x::read_quaternion(self)
    }
}

fn sleep_if_nonzero(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
