//! 日志初始化
//!
//! 日志统一写到 stderr，stdout 留给数据输出。过滤规则来自 `RUST_LOG`，
//! 未设置时使用调用方给定的默认级别。

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// 初始化全局 tracing subscriber
///
/// 进程内只能初始化一次；重复调用返回 `false`。
pub fn init_logging(default_level: LevelFilter) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_only_once() {
        init_logging(LevelFilter::DEBUG);
        assert!(!init_logging(LevelFilter::INFO));
        tracing::info!("logging initialized");
    }
}
