//! 节点配置
//!
//! 配置只在启动时读取一次，运行期间不会重新加载。
//!
//! # 文件格式（TOML）
//!
//! ```toml
//! rate_hz = 50.0
//! i2c_bus = "/dev/i2c-1"
//! mux_address = 0x70
//! imu_address = 0x4B
//! topic_prefix = "/hand/imu"
//!
//! [output]
//! kind = "udp"
//! target = "127.0.0.1:9870"
//! ```
//!
//! 所有字段都有默认值，文件中只需写需要覆盖的字段。

use crate::error::ConfigError;
use hand_imu_protocol::DEFAULT_TOPIC_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 超过此频率时给出警告
const HIGH_RATE_WARN_HZ: f64 = 10_000.0;

/// TCA9548A 可用地址范围（A0~A2 组合）
const MUX_ADDRESS_RANGE: std::ops::RangeInclusive<u8> = 0x70..=0x77;

/// 输出方式
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputConfig {
    /// 每条消息一行 JSON，写到标准输出
    #[default]
    Stdout,
    /// 每条消息一个 JSON 数据报
    Udp { target: String },
}

/// 节点配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// 发布频率（Hz）
    pub rate_hz: f64,
    /// Linux i2c-dev 设备路径
    pub i2c_bus: String,
    /// TCA9548A 地址
    pub mux_address: u8,
    /// 每个通道上 BNO08x 的地址
    pub imu_address: u8,
    /// 旋转向量报告间隔（µs）
    pub report_interval_us: u32,
    /// 主题前缀
    pub topic_prefix: String,
    /// 发布队列深度
    pub queue_depth: usize,
    /// 连续读取失败时每隔多少次输出一次警告
    pub failure_log_every: u64,
    /// 周期性统计日志间隔（秒），0 表示关闭
    pub stats_interval_secs: u64,
    pub output: OutputConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            i2c_bus: "/dev/i2c-1".to_string(),
            mux_address: 0x70,
            imu_address: 0x4B,
            report_interval_us: 50_000,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            queue_depth: 10,
            failure_log_every: 50,
            stats_interval_secs: 10,
            output: OutputConfig::default(),
        }
    }
}

impl NodeConfig {
    /// 从 TOML 文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML（用于 `--print-config` 之类的场景）
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 校验所有字段
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tick_period()?;
        if !MUX_ADDRESS_RANGE.contains(&self.mux_address) {
            return Err(ConfigError::Invalid {
                field: "mux_address",
                message: format!("0x{:02X} (valid: 0x70..=0x77)", self.mux_address),
            });
        }
        if self.imu_address > 0x7F {
            return Err(ConfigError::Invalid {
                field: "imu_address",
                message: format!("0x{:02X} is not a 7-bit address", self.imu_address),
            });
        }
        if self.report_interval_us == 0 {
            return Err(ConfigError::Invalid {
                field: "report_interval_us",
                message: "must be > 0".to_string(),
            });
        }
        if self.topic_prefix.trim_end_matches('/').is_empty() {
            return Err(ConfigError::Invalid {
                field: "topic_prefix",
                message: format!("{:?} is empty", self.topic_prefix),
            });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_depth",
                message: "must be >= 1".to_string(),
            });
        }
        if self.failure_log_every == 0 {
            return Err(ConfigError::Invalid {
                field: "failure_log_every",
                message: "must be >= 1".to_string(),
            });
        }
        if let OutputConfig::Udp { target } = &self.output
            && target.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "output.target",
                message: "UDP target is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Tick 周期
    ///
    /// 频率过高时只警告，不拒绝。
    pub fn period(&self) -> Result<Duration, ConfigError> {
        let period = self.tick_period()?;
        if self.rate_hz > HIGH_RATE_WARN_HZ {
            warn!(
                "Very high publish rate: {} Hz. Six sequential I2C reads per tick may not keep up.",
                self.rate_hz
            );
        }
        Ok(period)
    }

    /// `1 / rate_hz`，周期必须能用 `Duration` 表示
    fn tick_period(&self) -> Result<Duration, ConfigError> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "rate_hz",
                message: format!("{} (must be finite and > 0)", self.rate_hz),
            });
        }
        Duration::try_from_secs_f64(1.0 / self.rate_hz).map_err(|e| ConfigError::Invalid {
            field: "rate_hz",
            message: format!("{} (period out of range: {})", self.rate_hz, e),
        })
    }

    /// 统计日志间隔
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

/// 解析 I2C 地址：`0x4B`、`0X4b` 或十进制 `75`
pub fn parse_address(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    match parsed {
        Ok(addr) if addr <= 0x7F => Ok(addr),
        Ok(addr) => Err(format!("0x{:02X} is not a 7-bit I2C address", addr)),
        Err(e) => Err(format!("invalid I2C address {:?}: {}", s, e)),
    }
}
