//! 总线性能指标模块
//!
//! 原子计数器，用于监控串口总线的健康状态。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线实时指标
///
/// # 使用示例
///
/// ```rust
/// use stepper_driver::BusMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BusMetrics::default();
/// metrics.tx_frames.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.tx_frames, 1);
/// ```
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 开始的事务数
    pub transactions_started: AtomicU64,

    /// 成功完成的事务数
    pub transactions_completed: AtomicU64,

    /// 失败的事务数（重试耗尽或串口错误）
    pub transactions_failed: AtomicU64,

    /// TX 发送的帧数（含重发）
    pub tx_frames: AtomicU64,

    /// RX 读到的完整字节块数
    pub rx_frames: AtomicU64,

    /// 重试次数
    pub retries: AtomicU64,

    /// 读超时次数
    pub read_timeouts: AtomicU64,

    /// 损坏的应答数（校验和错误等）
    pub corrupted_frames: AtomicU64,

    /// 地址或功能码不匹配而丢弃的帧数
    pub noise_frames: AtomicU64,

    /// 等待总线令牌超时的次数
    pub queue_timeouts: AtomicU64,
}

impl BusMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    ///
    /// 不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            transactions_completed: self.transactions_completed.load(Ordering::Relaxed),
            transactions_failed: self.transactions_failed.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            corrupted_frames: self.corrupted_frames.load(Ordering::Relaxed),
            noise_frames: self.noise_frames.load(Ordering::Relaxed),
            queue_timeouts: self.queue_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.transactions_started.store(0, Ordering::Relaxed);
        self.transactions_completed.store(0, Ordering::Relaxed);
        self.transactions_failed.store(0, Ordering::Relaxed);
        self.tx_frames.store(0, Ordering::Relaxed);
        self.rx_frames.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.read_timeouts.store(0, Ordering::Relaxed);
        self.corrupted_frames.store(0, Ordering::Relaxed);
        self.noise_frames.store(0, Ordering::Relaxed);
        self.queue_timeouts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub transactions_started: u64,
    pub transactions_completed: u64,
    pub transactions_failed: u64,
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub retries: u64,
    pub read_timeouts: u64,
    pub corrupted_frames: u64,
    pub noise_frames: u64,
    pub queue_timeouts: u64,
}

impl MetricsSnapshot {
    /// 事务成功率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果没有结束的事务，返回 0.0。
    pub fn success_rate(&self) -> f64 {
        let finished = self.transactions_completed + self.transactions_failed;
        if finished == 0 {
            return 0.0;
        }
        (self.transactions_completed as f64 / finished as f64) * 100.0
    }

    /// 平均每个事务的发送次数
    pub fn frames_per_transaction(&self) -> f64 {
        if self.transactions_started == 0 {
            return 0.0;
        }
        self.tx_frames as f64 / self.transactions_started as f64
    }
}
