//! 日志初始化
//!
//! 库内部只通过 `tracing` 宏输出，由应用决定是否安装订阅者。
//! 这里提供一个默认配置：`RUST_LOG` 优先，否则使用给定的过滤规则；
//! 依赖 `log` 的第三方库经 `LogTracer` 转发到同一个订阅者。

use tracing_subscriber::EnvFilter;

/// 默认过滤规则
pub const DEFAULT_FILTER: &str = "info";

/// 使用默认过滤规则初始化
///
/// 重复调用是安全的：已安装订阅者时直接返回。
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// 使用给定过滤规则初始化（`RUST_LOG` 存在时以其为准）
pub fn init_logging_with(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_target(false)
        .try_init();

    // 订阅者可能已自带 log 转发器，失败时忽略
    let _ = tracing_log::LogTracer::init();
}

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
