//! 总线会话
//!
//! 一个会话独占一个串口，对外提供串行化的请求/应答交换：
//!
//! ```text
//! 调用者 A ─┐
//! 调用者 B ─┼─► BusToken (FIFO) ─► BusGuard::execute ─► SerialAdapter
//! 调用者 C ─┘
//! ```
//!
//! 持有 [`BusGuard`] 期间可以连续执行多个事务（例如先读状态再发运动指令），
//! 其间不会插入其他调用者的事务。

use crate::error::DriverError;
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::retry::RetryPolicy;
use crate::token::BusToken;
use crate::transaction::{NextStep, Transaction, TransactionOutcome};
use parking_lot::{Mutex, MutexGuard};
use stepper_protocol::{Frame, FunctionCode, decode};
use stepper_serial::{SerialAdapter, SerialError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 默认单次尝试的应答超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// 会话配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// 重试策略
    pub retry: RetryPolicy,
    /// 单次尝试的默认应答超时
    pub default_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// 串口总线会话
pub struct BusSession {
    adapter: Mutex<Box<dyn SerialAdapter>>,
    token: BusToken,
    config: SessionConfig,
    next_id: AtomicU64,
    closed: AtomicBool,
    metrics: BusMetrics,
    port: String,
}

impl BusSession {
    /// 在已打开的适配器上创建会话
    pub fn new(adapter: impl SerialAdapter + 'static, config: SessionConfig) -> Self {
        let port = adapter.port_name().to_string();
        debug!(port = %port, ?config, "Bus session created");
        Self {
            adapter: Mutex::new(Box::new(adapter)),
            token: BusToken::new(),
            config,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            metrics: BusMetrics::new(),
            port,
        }
    }

    /// 端口名称
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 单次尝试的默认应答超时
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    /// 排队获取总线
    ///
    /// 按到达顺序授予。`deadline` 为 `None` 时无限等待。
    ///
    /// # 错误
    /// - `DriverError::QueueTimeout`: 截止时间前未轮到（不消耗重试预算）
    /// - `DriverError::BusClosed`: 会话已关闭
    pub fn acquire(&self, deadline: Option<Instant>) -> Result<BusGuard<'_>, DriverError> {
        if self.is_closed() {
            return Err(DriverError::BusClosed);
        }

        let Some(ticket) = self.token.acquire(deadline) else {
            BusMetrics::inc(&self.metrics.queue_timeouts);
            debug!(port = %self.port, "Bus queue deadline expired");
            return Err(DriverError::QueueTimeout);
        };

        // 令牌归还由 BusGuard::drop 负责
        let guard = BusGuard {
            session: self,
            adapter: Some(self.adapter.lock()),
            ticket,
        };

        if self.is_closed() {
            return Err(DriverError::BusClosed);
        }
        Ok(guard)
    }

    /// 获取总线并执行单个事务
    pub fn execute(&self, request: &Frame, timeout: Duration) -> Result<Frame, DriverError> {
        self.acquire(None)?.execute(request, timeout)
    }

    /// 关闭会话并释放端口
    ///
    /// 正在进行的事务会先完成。可重复调用。
    /// 不能在持有本会话 [`BusGuard`] 的线程上调用。
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.adapter.lock().close();
        info!(port = %self.port, "Bus session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 当前排队（含持有者）的调用者数量
    pub fn queued(&self) -> usize {
        self.token.queued()
    }

    /// 获取指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 重置指标
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl Drop for BusSession {
    fn drop(&mut self) {
        self.adapter.get_mut().close();
    }
}

impl std::fmt::Debug for BusSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusSession")
            .field("port", &self.port)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// 总线占用凭证
///
/// 持有期间本调用者独占总线，drop 时交回令牌。
pub struct BusGuard<'a> {
    session: &'a BusSession,
    adapter: Option<MutexGuard<'a, Box<dyn SerialAdapter>>>,
    ticket: u64,
}

impl BusGuard<'_> {
    /// 会话默认超时
    pub fn default_timeout(&self) -> Duration {
        self.session.default_timeout()
    }

    /// 执行一个事务
    ///
    /// 每次尝试：清空接收缓冲 → 发送 → 按功能码读取应答帧长度直到截止时间。
    /// 读到的帧如果地址或功能码不符，视为总线噪声丢弃并在同一截止时间内继续读取。
    /// 读超时和应答损坏按重试策略线性退避后重发。
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 请求帧不符合载荷表（不发送任何字节）
    /// - `DriverError::TransactionFailed`: 重试耗尽
    /// - `DriverError::Serial`: 串口故障，会话随之关闭
    /// - `DriverError::BusClosed`: 会话已关闭
    pub fn execute(&mut self, request: &Frame, timeout: Duration) -> Result<Frame, DriverError> {
        let session = self.session;
        if session.is_closed() {
            return Err(DriverError::BusClosed);
        }
        let adapter = self.adapter.as_mut().ok_or(DriverError::BusClosed)?;

        let id = session.next_id.fetch_add(1, Ordering::Relaxed);
        let mut txn = Transaction::new(id, request.clone())?;
        BusMetrics::inc(&session.metrics.transactions_started);

        loop {
            txn.begin_attempt(Instant::now(), timeout);
            trace!(
                id,
                address = request.address,
                function = ?request.function,
                attempt = txn.attempts(),
                "Transaction attempt"
            );

            let outcome = match exchange(&mut **adapter, &txn, &session.metrics) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(id, port = %session.port, error = %e, "Serial failure, closing bus session");
                    BusMetrics::inc(&session.metrics.transactions_failed);
                    session.closed.store(true, Ordering::Release);
                    adapter.close();
                    return Err(e.into());
                },
            };
            txn.resolve(outcome);

            match txn.next_step(&session.config.retry) {
                NextStep::Completed(frame) => {
                    BusMetrics::inc(&session.metrics.transactions_completed);
                    debug!(
                        id,
                        address = frame.address,
                        function = ?frame.function,
                        attempts = txn.attempts(),
                        "Transaction completed"
                    );
                    return Ok(frame);
                },
                NextStep::Retry { attempt, delay } => {
                    BusMetrics::inc(&session.metrics.retries);
                    warn!(
                        id,
                        address = request.address,
                        function = ?request.function,
                        outcome = ?txn.outcome(),
                        attempt,
                        ?delay,
                        "Retrying transaction"
                    );
                    spin_sleep::sleep(delay);
                },
                NextStep::Exhausted(reason) => {
                    BusMetrics::inc(&session.metrics.transactions_failed);
                    warn!(
                        id,
                        address = request.address,
                        function = ?request.function,
                        attempts = txn.attempts(),
                        %reason,
                        "Transaction failed"
                    );
                    return Err(DriverError::TransactionFailed {
                        reason,
                        attempts: txn.attempts(),
                    });
                },
            }
        }
    }

    /// 使用会话默认超时执行事务
    pub fn execute_default(&mut self, request: &Frame) -> Result<Frame, DriverError> {
        let timeout = self.default_timeout();
        self.execute(request, timeout)
    }
}

impl Drop for BusGuard<'_> {
    fn drop(&mut self) {
        // 先释放端口锁，再交回令牌
        self.adapter.take();
        self.session.token.release(self.ticket);
    }
}

/// 应答帧头：`[address][function]`
const HEADER_LEN: usize = 2;

/// 一次尝试：发送请求并等待匹配的应答
///
/// 先读帧头，再按帧头里的功能码读出剩余字节，因此其他设备不同形态的应答
/// 也能完整地作为噪声丢弃。只有串口故障以 `Err` 返回，超时和损坏都是正常结果。
fn exchange<A: SerialAdapter + ?Sized>(
    adapter: &mut A,
    txn: &Transaction,
    metrics: &BusMetrics,
) -> Result<TransactionOutcome, SerialError> {
    adapter.clear_input()?;
    adapter.write_all(txn.wire_bytes())?;
    BusMetrics::inc(&metrics.tx_frames);

    loop {
        let Some(mut bytes) = read_part(adapter, HEADER_LEN, txn.deadline(), metrics)? else {
            return Ok(TransactionOutcome::TimedOut);
        };

        let Ok(function) = FunctionCode::try_from(bytes[1]) else {
            BusMetrics::inc(&metrics.corrupted_frames);
            debug!(id = txn.id(), header = ?bytes, "Unknown function code in response header");
            return Ok(TransactionOutcome::ChecksumError);
        };

        let rest = function.response_frame_len() - HEADER_LEN;
        let Some(tail) = read_part(adapter, rest, txn.deadline(), metrics)? else {
            return Ok(TransactionOutcome::TimedOut);
        };
        bytes.extend_from_slice(&tail);
        BusMetrics::inc(&metrics.rx_frames);

        match decode(&bytes) {
            Ok(frame) if txn.matches(&frame) => return Ok(TransactionOutcome::Completed(frame)),
            Ok(frame) => {
                BusMetrics::inc(&metrics.noise_frames);
                debug!(
                    id = txn.id(),
                    address = frame.address,
                    function = ?frame.function,
                    "Discarding unrelated frame"
                );
            },
            Err(e) => {
                BusMetrics::inc(&metrics.corrupted_frames);
                debug!(id = txn.id(), error = %e, bytes = ?bytes, "Corrupted response");
                return Ok(TransactionOutcome::ChecksumError);
            },
        }
    }
}

/// 在截止时间内读取 `len` 字节，超时返回 `None`
fn read_part<A: SerialAdapter + ?Sized>(
    adapter: &mut A,
    len: usize,
    deadline: Instant,
    metrics: &BusMetrics,
) -> Result<Option<Vec<u8>>, SerialError> {
    match adapter.read_until(len, deadline) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.is_fatal() => Err(e),
        Err(_) => {
            BusMetrics::inc(&metrics.read_timeouts);
            Ok(None)
        },
    }
}
