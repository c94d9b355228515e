//! 事务层集成测试
//!
//! 使用 Mock 串口验证重试、退避、噪声过滤与 FIFO 总线令牌。

use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stepper_driver::{BusBuilder, BusSession, DriverError, FailureReason, RetryPolicy};
use stepper_protocol::{AckFeedback, Frame, FunctionCode, IdentityFeedback, StatusFeedback};
use stepper_serial::{MockReply, MockSerialAdapter, MockSerialHandle};

const TIMEOUT: Duration = Duration::from_millis(20);
const BASE_DELAY: Duration = Duration::from_millis(10);

fn session() -> (BusSession, MockSerialHandle) {
    let adapter = MockSerialAdapter::new();
    let handle = adapter.handle();
    let session = BusBuilder::new()
        .retry_policy(RetryPolicy::new(3, BASE_DELAY))
        .timeout(TIMEOUT)
        .build_with_adapter(adapter);
    (session, handle)
}

fn status_bytes(address: u8, function: FunctionCode, position: i32) -> Vec<u8> {
    StatusFeedback {
        position_steps: position,
        ..Default::default()
    }
    .to_frame(address, function)
    .to_bytes()
}

fn read_status(address: u8) -> Frame {
    Frame::new(address, FunctionCode::ReadStatus, &[])
}

#[test]
fn test_two_timeouts_then_success() {
    let (session, handle) = session();
    handle.push_reply(MockReply::Silent);
    handle.push_reply(MockReply::Silent);
    handle.push_reply(MockReply::frame(status_bytes(0x05, FunctionCode::ReadStatus, 42)));

    let response = session.execute(&read_status(0x05), TIMEOUT).unwrap();
    let status = StatusFeedback::try_from(&response).unwrap();
    assert_eq!(status.position_steps, 42);

    // 恰好发送 3 次，且每次都是相同的字节
    let written = handle.written();
    assert_eq!(written.len(), 3);
    assert!(written.iter().all(|bytes| bytes == &[0x05, 0x43, 0x48]));

    let metrics = session.metrics();
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.read_timeouts, 2);
    assert_eq!(metrics.transactions_completed, 1);
}

#[test]
fn test_exhausted_retries_report_timeout_with_linear_backoff() {
    let (session, handle) = session();

    let start = Instant::now();
    let result = session.execute(&read_status(0x05), TIMEOUT);
    let elapsed = start.elapsed();

    match result {
        Err(DriverError::TransactionFailed { reason, attempts }) => {
            assert_eq!(reason, FailureReason::TimedOut);
            assert_eq!(attempts, 3);
        },
        other => panic!("Expected TransactionFailed, got {other:?}"),
    }
    assert_eq!(handle.write_count(), 3);
    // 3 次超时 + (1 + 2) × 退避基准
    assert!(elapsed >= TIMEOUT * 3 + BASE_DELAY * 3, "elapsed {elapsed:?}");
}

#[test]
fn test_corrupted_response_consumes_a_retry() {
    let (session, handle) = session();
    let mut corrupted = status_bytes(0x05, FunctionCode::ReadStatus, 1);
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    handle.push_reply(MockReply::frame(corrupted));
    handle.push_reply(MockReply::frame(status_bytes(0x05, FunctionCode::ReadStatus, 2)));

    let response = session.execute(&read_status(0x05), TIMEOUT).unwrap();
    assert_eq!(StatusFeedback::try_from(&response).unwrap().position_steps, 2);
    assert_eq!(handle.write_count(), 2);
    assert_eq!(session.metrics().corrupted_frames, 1);
}

#[test]
fn test_persistent_corruption_reports_checksum_error() {
    let (session, handle) = session();
    handle.set_responder(|_| MockReply::frame(vec![0x05, 0x43, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00]));

    match session.execute(&read_status(0x05), TIMEOUT) {
        Err(DriverError::TransactionFailed { reason, attempts }) => {
            assert_eq!(reason, FailureReason::ChecksumError);
            assert_eq!(attempts, 3);
        },
        other => panic!("Expected TransactionFailed, got {other:?}"),
    }
    assert_eq!(handle.write_count(), 3);
}

#[test]
fn test_foreign_frames_are_discarded_within_same_attempt() {
    let (session, handle) = session();
    handle.push_reply(MockReply::Frames(vec![
        // 其他地址
        status_bytes(0x09, FunctionCode::ReadStatus, 7),
        // 同地址但功能码不符
        status_bytes(0x05, FunctionCode::Stop, 8),
        status_bytes(0x05, FunctionCode::ReadStatus, 9),
    ]));

    let response = session.execute(&read_status(0x05), TIMEOUT).unwrap();
    assert_eq!(response.address, 0x05);
    assert_eq!(StatusFeedback::try_from(&response).unwrap().position_steps, 9);
    assert_eq!(handle.write_count(), 1);
    assert_eq!(session.metrics().noise_frames, 2);
}

#[test]
fn test_foreign_frames_of_other_shapes_are_discarded() {
    let (session, handle) = session();
    let foreign_ack = AckFeedback::accepted(FunctionCode::SetParameter)
        .to_frame(0x09)
        .to_bytes();
    let foreign_identity = IdentityFeedback {
        firmware_major: 1,
        firmware_minor: 0,
        hardware_revision: 2,
    }
    .to_frame(0x09)
    .to_bytes();
    assert_eq!(foreign_ack.len(), 4);
    assert_eq!(foreign_identity.len(), 6);

    for foreign in [foreign_ack, foreign_identity] {
        handle.push_reply(MockReply::Frames(vec![
            foreign,
            status_bytes(0x05, FunctionCode::ReadStatus, 11),
        ]));
    }

    for _ in 0..2 {
        let response = session.execute(&read_status(0x05), TIMEOUT).unwrap();
        assert_eq!(StatusFeedback::try_from(&response).unwrap().position_steps, 11);
    }

    // 每个事务一次发送，无重试、无损坏
    assert_eq!(handle.write_count(), 2);
    let metrics = session.metrics();
    assert_eq!(metrics.noise_frames, 2);
    assert_eq!(metrics.corrupted_frames, 0);
    assert_eq!(metrics.retries, 0);
}

#[test]
fn test_unknown_function_in_header_is_corruption() {
    let (session, handle) = session();
    handle.push_reply(MockReply::frame(vec![0x05, 0x77, 0x7C]));
    handle.push_reply(MockReply::frame(status_bytes(0x05, FunctionCode::ReadStatus, 3)));

    let response = session.execute(&read_status(0x05), TIMEOUT).unwrap();
    assert_eq!(StatusFeedback::try_from(&response).unwrap().position_steps, 3);
    assert_eq!(handle.write_count(), 2);
    assert_eq!(session.metrics().corrupted_frames, 1);
}

#[test]
fn test_stale_input_is_cleared_before_send() {
    let (session, handle) = session();
    handle.inject(&status_bytes(0x05, FunctionCode::ReadStatus, 100));
    handle.push_reply(MockReply::frame(status_bytes(0x05, FunctionCode::ReadStatus, 200)));

    let response = session.execute(&read_status(0x05), TIMEOUT).unwrap();
    assert_eq!(StatusFeedback::try_from(&response).unwrap().position_steps, 200);
}

#[test]
fn test_bus_is_granted_in_arrival_order() {
    let (session, handle) = session();
    handle.set_responder(|bytes| {
        MockReply::frame(
            StatusFeedback::default()
                .to_frame(bytes[0], FunctionCode::ReadStatus)
                .to_bytes(),
        )
    });
    let session = Arc::new(session);
    let (tx, rx) = unbounded();

    let held = session.acquire(None).unwrap();
    let mut workers = Vec::new();
    for i in 0..3u8 {
        let worker_session = session.clone();
        let tx = tx.clone();
        workers.push(thread::spawn(move || {
            let mut guard = worker_session.acquire(None).unwrap();
            tx.send(i).unwrap();
            guard.execute(&read_status(0x10 + i), TIMEOUT).unwrap();
        }));
        while session.queued() < usize::from(i) + 2 {
            thread::yield_now();
        }
    }
    drop(held);

    for worker in workers {
        worker.join().unwrap();
    }
    let order: Vec<u8> = rx.try_iter().collect();
    assert_eq!(order, vec![0, 1, 2]);

    let addresses: Vec<u8> = handle.written().iter().map(|bytes| bytes[0]).collect();
    assert_eq!(addresses, vec![0x10, 0x11, 0x12]);
}

#[test]
fn test_queue_timeout_sends_nothing() {
    let (session, handle) = session();
    let held = session.acquire(None).unwrap();

    let start = Instant::now();
    let result = session.acquire(Some(start + Duration::from_millis(15)));
    assert!(matches!(result, Err(DriverError::QueueTimeout)));
    assert!(start.elapsed() >= Duration::from_millis(15));
    drop(held);

    assert_eq!(handle.write_count(), 0);
    assert_eq!(session.metrics().queue_timeouts, 1);
    assert_eq!(session.queued(), 0);
}
