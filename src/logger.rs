//! 日志初始化

use tracing_subscriber::{fmt, EnvFilter};

/// 安装全局日志订阅器
///
/// 级别优先取 `RUST_LOG`；未设置时默认 info，`VERBOSE_LOGGING=true` 时为 debug。
/// 可重复调用，第二次起不生效。
pub fn init() {
    let verbose = std::env::var("VERBOSE_LOGGING")
        .ok()
        .and_then(|v| v.trim().parse::<bool>().ok())
        .unwrap_or(false);
    let _ = try_init(verbose);
}

/// 按给定的默认级别安装订阅器，已安装时返回 false
pub fn try_init(verbose: bool) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
