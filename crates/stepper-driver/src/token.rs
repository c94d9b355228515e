//! FIFO 总线令牌
//!
//! 半双工总线同一时刻只允许一个请求/应答交换。等待者按到达顺序排队，
//! 持有者释放后队首获得令牌。

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Default)]
struct TicketQueue {
    next_ticket: u64,
    waiting: VecDeque<u64>,
}

/// 按到达顺序授予的互斥令牌
#[derive(Debug, Default)]
pub(crate) struct BusToken {
    queue: Mutex<TicketQueue>,
    turn: Condvar,
}

impl BusToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 排队等待令牌
    ///
    /// 返回票号，释放时须交回。`deadline` 为 `None` 时无限等待。
    /// 超过截止时间返回 `None`，且自己的位置从队列中移除。
    pub(crate) fn acquire(&self, deadline: Option<Instant>) -> Option<u64> {
        let mut queue = self.queue.lock();
        let ticket = queue.next_ticket;
        queue.next_ticket = queue.next_ticket.wrapping_add(1);
        queue.waiting.push_back(ticket);

        while queue.waiting.front() != Some(&ticket) {
            match deadline {
                Some(deadline) => {
                    if self.turn.wait_until(&mut queue, deadline).timed_out()
                        && queue.waiting.front() != Some(&ticket)
                    {
                        queue.waiting.retain(|&t| t != ticket);
                        // 可能轮到后面的等待者
                        self.turn.notify_all();
                        return None;
                    }
                },
                None => self.turn.wait(&mut queue),
            }
        }

        Some(ticket)
    }

    /// 交回令牌
    pub(crate) fn release(&self, ticket: u64) {
        let mut queue = self.queue.lock();
        if queue.waiting.front() == Some(&ticket) {
            queue.waiting.pop_front();
        } else {
            queue.waiting.retain(|&t| t != ticket);
        }
        drop(queue);
        self.turn.notify_all();
    }

    /// 当前排队（含持有者）的数量
    pub(crate) fn queued(&self) -> usize {
        self.queue.lock().waiting.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_uncontended_acquire() {
        let token = BusToken::new();
        let ticket = token.acquire(None).unwrap();
        assert_eq!(token.queued(), 1);
        token.release(ticket);
        assert_eq!(token.queued(), 0);
    }

    #[test]
    fn test_deadline_expires_while_held() {
        let token = BusToken::new();
        let held = token.acquire(None).unwrap();

        let start = Instant::now();
        let result = token.acquire(Some(start + Duration::from_millis(20)));
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
        // 超时的等待者不留在队列中
        assert_eq!(token.queued(), 1);

        token.release(held);
        assert!(token.acquire(Some(Instant::now())).is_some());
    }

    #[test]
    fn test_fifo_order() {
        let token = Arc::new(BusToken::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let held = token.acquire(None).unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let worker_token = token.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                let ticket = worker_token.acquire(None).unwrap();
                order.lock().push(i);
                worker_token.release(ticket);
            }));
            // 等到该线程已入队再启动下一个
            while token.queued() < i + 2 {
                thread::yield_now();
            }
        }

        token.release(held);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }
}
