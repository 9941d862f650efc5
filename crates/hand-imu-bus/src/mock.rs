//! Mock I2C 总线
//!
//! 内存中模拟“一条物理总线 + 可选复用器 + 挂在各通道上的设备”，用于无硬件测试。
//!
//! - 写复用器地址：更新通道选择寄存器
//! - 读复用器地址：返回当前选择寄存器
//! - 访问其他地址：路由到当前唯一被选中通道上、该地址的设备；否则返回地址 NACK
//!
//! `MockI2cBus` 可 `clone()`，所有克隆共享同一状态，测试可以保留一个克隆用于观察。

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// 挂在 Mock 总线上的设备
pub trait MockDevice: Send {
    /// 主机写入
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind>;

    /// 主机读取
    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind>;
}

/// 不经过复用器、直接挂在总线上的设备使用的通道键
const DIRECT: Option<u8> = None;

#[derive(Default)]
struct MockBusState {
    mux_address: Option<u8>,
    /// 复用器控制寄存器
    mux_register: u8,
    /// 所有写入复用器的字节（按顺序）
    mux_writes: Vec<u8>,
    /// 接下来 N 次复用器写入失败
    failing_mux_writes: u32,
    devices: HashMap<(Option<u8>, u8), Box<dyn MockDevice>>,
    /// 设备事务计数
    device_transactions: u64,
}

impl MockBusState {
    fn nack() -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }

    /// 当前被路由到的通道；复用器存在时要求恰好选中一个通道
    fn routed_channel(&self) -> Option<u8> {
        if self.mux_address.is_none() || self.mux_register.count_ones() != 1 {
            return None;
        }
        Some(self.mux_register.trailing_zeros() as u8)
    }

    fn mux_operation(&mut self, operation: &mut Operation<'_>) -> Result<(), ErrorKind> {
        match operation {
            Operation::Write(bytes) => {
                if self.failing_mux_writes > 0 {
                    self.failing_mux_writes -= 1;
                    return Err(ErrorKind::Bus);
                }
                if let Some(&value) = bytes.last() {
                    self.mux_register = value;
                    self.mux_writes.push(value);
                }
                Ok(())
            },
            Operation::Read(buf) => {
                buf.fill(self.mux_register);
                Ok(())
            },
        }
    }

    fn device_operation(
        &mut self,
        address: u8,
        operation: &mut Operation<'_>,
    ) -> Result<(), ErrorKind> {
        let key = match self.routed_channel() {
            Some(channel) => (Some(channel), address),
            None => (DIRECT, address),
        };
        let device = self.devices.get_mut(&key).ok_or_else(Self::nack)?;
        self.device_transactions += 1;
        match operation {
            Operation::Write(bytes) => device.write(bytes),
            Operation::Read(buf) => device.read(buf),
        }
    }
}

/// Mock I2C 总线
#[derive(Clone, Default)]
pub struct MockI2cBus {
    state: Arc<Mutex<MockBusState>>,
}

impl MockI2cBus {
    /// 空总线（没有复用器也没有设备）
    pub fn new() -> Self {
        Self::default()
    }

    /// 带复用器的总线
    pub fn with_mux(address: u8) -> Self {
        let bus = Self::new();
        bus.state.lock().mux_address = Some(address);
        bus
    }

    /// 在复用器的某个通道上挂载设备
    pub fn attach(&self, channel: u8, address: u8, device: impl MockDevice + 'static) {
        self.state
            .lock()
            .devices
            .insert((Some(channel), address), Box::new(device));
    }

    /// 直接挂载在总线上的设备（不经复用器）
    pub fn attach_direct(&self, address: u8, device: impl MockDevice + 'static) {
        self.state
            .lock()
            .devices
            .insert((DIRECT, address), Box::new(device));
    }

    /// 写入复用器的历史
    pub fn mux_writes(&self) -> Vec<u8> {
        self.state.lock().mux_writes.clone()
    }

    /// 让接下来 `count` 次复用器写入失败
    pub fn fail_next_mux_writes(&self, count: u32) {
        self.state.lock().failing_mux_writes = count;
    }

    /// 设备事务总数
    pub fn device_transactions(&self) -> u64 {
        self.state.lock().device_transactions
    }
}

impl ErrorType for MockI2cBus {
    type Error = ErrorKind;
}

impl I2c for MockI2cBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        let is_mux = state.mux_address == Some(address);
        for operation in operations.iter_mut() {
            if is_mux {
                state.mux_operation(operation)?;
            } else {
                state.device_operation(address, operation)?;
            }
        }
        Ok(())
    }
}
