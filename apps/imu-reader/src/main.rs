//! 手部 IMU 读取节点
//!
//! 启动顺序：
//! 1. 加载配置（文件 + 命令行覆盖）
//! 2. 打开 I2C 总线并探测 TCA9548A（失败即退出）
//! 3. 逐个初始化六个 BNO08x（单个失败只记录）
//! 4. 为每个传感器创建发布者（失败即退出）
//! 5. 固定频率轮询发布，直到 Ctrl+C

use anyhow::{Context, Result};
use clap::Parser;
use hand_imu_node::{
    ImuNode, NodeConfig, OutputConfig, StdoutTransport, Transport, UdpTransport, init_logging,
    parse_address,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

/// 手部 IMU 读取节点
///
/// 读取 TCA9548A 复用器后面的六个 BNO08x 姿态传感器，按传感器发布四元数
#[derive(Parser, Debug)]
#[command(name = "imu-reader")]
#[command(about = "Hand IMU reader - publishes orientation from six BNO08x IMUs", long_about = None)]
struct Args {
    /// TOML 配置文件（命令行参数优先）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 发布频率（Hz），默认 50
    #[arg(long)]
    rate_hz: Option<f64>,

    /// I2C 总线设备，默认 /dev/i2c-1
    #[arg(long)]
    bus: Option<String>,

    /// TCA9548A 地址（如 0x70）
    #[arg(long, value_parser = parse_address)]
    mux_address: Option<u8>,

    /// BNO08x 地址（如 0x4B）
    #[arg(long, value_parser = parse_address)]
    imu_address: Option<u8>,

    /// 主题前缀，默认 /hand/imu
    #[arg(long)]
    topic_prefix: Option<String>,

    /// 以 UDP JSON 数据报发送到该地址（IP:PORT）
    #[arg(long, conflicts_with = "stdout")]
    udp: Option<String>,

    /// 以 JSON 行写到标准输出
    #[arg(long)]
    stdout: bool,

    /// 打印最终生效的配置并退出
    #[arg(long)]
    print_config: bool,

    /// 日志详细程度（-v: debug，-vv: trace）；RUST_LOG 优先
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// 合并配置文件与命令行参数
    fn build_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load_from_file(path)?,
            None => NodeConfig::default(),
        };

        if let Some(rate_hz) = self.rate_hz {
            config.rate_hz = rate_hz;
        }
        if let Some(bus) = &self.bus {
            config.i2c_bus = bus.clone();
        }
        if let Some(addr) = self.mux_address {
            config.mux_address = addr;
        }
        if let Some(addr) = self.imu_address {
            config.imu_address = addr;
        }
        if let Some(prefix) = &self.topic_prefix {
            config.topic_prefix = prefix.clone();
        }
        if let Some(target) = &self.udp {
            config.output = OutputConfig::Udp {
                target: target.clone(),
            };
        } else if self.stdout {
            config.output = OutputConfig::Stdout;
        }

        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn create_transport(output: &OutputConfig) -> Result<Box<dyn Transport>> {
    Ok(match output {
        OutputConfig::Stdout => Box::new(StdoutTransport::new()),
        OutputConfig::Udp { target } => Box::new(
            UdpTransport::connect(target.as_str())
                .with_context(|| format!("Failed to open UDP output to {}", target))?,
        ),
    })
}

#[cfg(target_os = "linux")]
fn run(config: NodeConfig, stop: Arc<AtomicBool>) -> Result<()> {
    let transport = create_transport(&config.output)?;
    let sensors = hand_imu_node::open_hardware(&config).context("Failed to initialize I2C bus")?;
    let mut node = ImuNode::new(sensors, transport.as_ref(), &config)
        .context("Failed to create publishers")?;

    info!("Press Ctrl+C to stop.");
    node.run(&stop);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_config: NodeConfig, _stop: Arc<AtomicBool>) -> Result<()> {
    anyhow::bail!("imu-reader requires Linux i2c-dev")
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_level());

    let config = match args.build_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            process::exit(1);
        },
    };

    if args.print_config {
        match config.to_toml_string() {
            Ok(text) => print!("{}", text),
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            },
        }
        return;
    }

    info!(
        "Hand IMU reader starting: bus={} mux=0x{:02X} imu=0x{:02X} rate={} Hz prefix={}",
        config.i2c_bus, config.mux_address, config.imu_address, config.rate_hz, config.topic_prefix
    );

    // Ctrl+C 只置位停止标志，循环在下一个 tick 前退出并打印最终统计
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::Relaxed);
    }) {
        error!("Failed to set signal handler: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(config, stop) {
        error!("{:#}", e);
        process::exit(1);
    }
}
