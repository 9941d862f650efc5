//! TCA9548A I2C 复用器
//!
//! 复用器本身只有一个控制寄存器：写入一个字节，bit N 置 1 即打开通道 N。
//! 物理总线同一时刻只能路由到一个通道，因此“选择通道 + 读写设备”必须是原子的。
//!
//! # 线程安全
//!
//! 物理总线由 `parking_lot::Mutex` 独占持有，每个 [`MuxChannel`] 在一次
//! `transaction()` 期间持锁完成选择与传输。即使将通道句柄移动到不同线程，
//! 选择与读写也不会交错。

use crate::BusError;
use embedded_hal::i2c::{self, ErrorType, I2c, Operation};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// TCA9548A 通道总数
pub const CHANNEL_COUNT: u8 = 8;

/// 关闭所有通道的控制字节
const ALL_CHANNELS_OFF: u8 = 0x00;

/// 持有物理总线的共享状态
struct MuxBus<I2C> {
    bus: I2C,
    address: u8,
    /// 当前已选择的通道缓存（`None` 表示未知或全部关闭）
    selected: Option<u8>,
    /// 通道选择次数（用于诊断）
    select_count: u64,
}

impl<I2C: I2c> MuxBus<I2C> {
    fn select(&mut self, channel: u8) -> Result<(), I2C::Error> {
        if self.selected == Some(channel) {
            return Ok(());
        }

        trace!("TCA9548A 0x{:02X}: select channel {}", self.address, channel);
        match self.bus.write(self.address, &[1 << channel]) {
            Ok(()) => {
                self.selected = Some(channel);
                self.select_count += 1;
                Ok(())
            },
            Err(e) => {
                // 选择失败后寄存器状态未知，下一次事务强制重新选择
                self.selected = None;
                Err(e)
            },
        }
    }
}

/// TCA9548A 复用器句柄
///
/// # Example
///
/// ```rust,ignore
/// use hand_imu_bus::{Tca9548a, open_bus};
///
/// let bus = open_bus("/dev/i2c-1")?;
/// let mut mux = Tca9548a::open(bus, Tca9548a::<()>::DEFAULT_ADDRESS)?;
/// let thumb_bus = mux.channel(0)?;
/// ```
pub struct Tca9548a<I2C> {
    shared: Arc<Mutex<MuxBus<I2C>>>,
    address: u8,
    handed_out: [bool; CHANNEL_COUNT as usize],
}

impl<I2C> Tca9548a<I2C> {
    /// 默认地址（A0~A2 接地）
    pub const DEFAULT_ADDRESS: u8 = 0x70;

    /// 复用器 I2C 地址
    pub fn address(&self) -> u8 {
        self.address
    }

    /// 通道选择次数（只统计真正写入控制寄存器的次数）
    pub fn select_count(&self) -> u64 {
        self.shared.lock().select_count
    }
}

impl<I2C: I2c> Tca9548a<I2C> {
    /// 打开复用器
    ///
    /// 通过写入“全部通道关闭”来探测复用器是否在线。
    ///
    /// # Errors
    /// - `BusError::MuxUnreachable`: 复用器无应答（致命）
    pub fn open(mut bus: I2C, address: u8) -> Result<Self, BusError> {
        bus.write(address, &[ALL_CHANNELS_OFF])
            .map_err(|e| BusError::MuxUnreachable {
                address,
                kind: i2c::Error::kind(&e),
            })?;

        debug!("TCA9548A found at 0x{:02X}", address);

        Ok(Self {
            shared: Arc::new(Mutex::new(MuxBus {
                bus,
                address,
                selected: None,
                select_count: 0,
            })),
            address,
            handed_out: [false; CHANNEL_COUNT as usize],
        })
    }

    /// 获取某个通道的逻辑子总线
    ///
    /// 每个通道只分配一次。
    ///
    /// # Errors
    /// - `BusError::InvalidChannel`: 通道号 >= 8
    /// - `BusError::ChannelInUse`: 通道已分配
    pub fn channel(&mut self, index: u8) -> Result<MuxChannel<I2C>, BusError> {
        if index >= CHANNEL_COUNT {
            return Err(BusError::InvalidChannel { channel: index });
        }
        let slot = &mut self.handed_out[index as usize];
        if *slot {
            return Err(BusError::ChannelInUse { channel: index });
        }
        *slot = true;

        Ok(MuxChannel {
            shared: Arc::clone(&self.shared),
            channel: index,
        })
    }
}

/// 复用器上一个通道的逻辑子总线
pub struct MuxChannel<I2C> {
    shared: Arc<Mutex<MuxBus<I2C>>>,
    channel: u8,
}

impl<I2C> MuxChannel<I2C> {
    /// 通道号
    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl<I2C: I2c> ErrorType for MuxChannel<I2C> {
    type Error = I2C::Error;
}

impl<I2C: I2c> I2c for MuxChannel<I2C> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        // 选择 + 传输在同一把锁内完成
        let mut shared = self.shared.lock();
        shared.select(self.channel)?;
        shared.bus.transaction(address, operations)
    }
}
