/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use bytes::Bytes;

use mux_stream::{
    BlockingPolicy, Bucket, ClientConnectionInfo, ConnectionPipeline, MasterConnection, ReadMode,
    StreamMultiplexer, StreamResetReason, StreamServerConfig, StreamTask, TransportSocket,
    VirtualConnection, new_stream_input_queue, new_stream_output_queue, register_task_filters,
};

#[derive(Default)]
struct TestMultiplexer {
    resets: Mutex<Vec<(u32, StreamResetReason)>>,
}

impl TestMultiplexer {
    fn resets(&self) -> Vec<(u32, StreamResetReason)> {
        self.resets.lock().unwrap().clone()
    }
}

impl StreamMultiplexer for TestMultiplexer {
    fn reset_stream(&self, stream_id: u32, reason: StreamResetReason) {
        self.resets.lock().unwrap().push((stream_id, reason));
    }
}

fn test_master(id: u64) -> MasterConnection {
    MasterConnection::new(
        id,
        ClientConnectionInfo::new(
            "192.0.2.10:41000".parse().unwrap(),
            "192.0.2.1:443".parse().unwrap(),
        ),
        Arc::new(StreamServerConfig::default()),
    )
}

/// Reads the request until end-of-stream, then echoes the body back.
struct EchoPipeline;

impl ConnectionPipeline for EchoPipeline {
    fn process_connection(
        &self,
        conn: &mut VirtualConnection,
        _socket: &TransportSocket,
    ) -> io::Result<()> {
        assert!(conn.is_taken_over());
        assert!(conn.stream_ctx().is_some());

        let mut body = Vec::new();
        loop {
            let bucket = conn.read_input(ReadMode::Bytes, BlockingPolicy::Blocking, 4096)?;
            body.extend_from_slice(bucket.bytes());
            if bucket.is_eos() {
                break;
            }
        }
        conn.write_output(Bucket::data(Bytes::from(body)))?;
        conn.write_output(Bucket::eos())?;
        Ok(())
    }
}

/// Returns without ever touching the output filter.
struct SilentPipeline;

impl ConnectionPipeline for SilentPipeline {
    fn process_connection(
        &self,
        _conn: &mut VirtualConnection,
        _socket: &TransportSocket,
    ) -> io::Result<()> {
        Ok(())
    }
}

/// Signals once it is about to read, then parks on a blocking read.
struct ParkingPipeline {
    started: mpsc::Sender<()>,
}

impl ConnectionPipeline for ParkingPipeline {
    fn process_connection(
        &self,
        conn: &mut VirtualConnection,
        _socket: &TransportSocket,
    ) -> io::Result<()> {
        self.started.send(()).unwrap();
        let _ = conn.read_input(ReadMode::Bytes, BlockingPolicy::Blocking, 4096)?;
        Ok(())
    }
}

#[test]
fn complete_stream_with_output() {
    register_task_filters();
    let mplx = Arc::new(TestMultiplexer::default());
    let master = test_master(1);
    let config = master.config().clone();

    let (feeder, source) = new_stream_input_queue(config.stream_recv_queue_size);
    let (sink, drain) = new_stream_output_queue(config.stream_send_queue_size);

    let mut task = StreamTask::create(
        1,
        3,
        &master,
        source,
        Some(Bytes::from_static(b"hello")),
        false,
        sink,
        mplx.clone(),
    )
    .unwrap();
    assert_eq!(task.session_id(), 1);
    assert_eq!(task.stream_id(), 3);

    let worker = std::thread::Builder::new()
        .name("stream-1-3".to_string())
        .spawn(move || {
            task.set_running(true);
            let r = task.run(&EchoPipeline);
            task.set_running(false);
            (task, r)
        })
        .unwrap();

    feeder
        .feed(Bucket::data_eos(Bytes::from_static(b" world")))
        .unwrap();

    let mut body = Vec::new();
    loop {
        let bucket = drain.collect().unwrap();
        body.extend_from_slice(bucket.bytes());
        if bucket.is_eos() {
            break;
        }
    }

    let (mut task, r) = worker.join().unwrap();
    r.unwrap();
    assert_eq!(body, b"hello world");
    assert!(!task.is_running());
    assert!(mplx.resets().is_empty());

    task.destroy();
    assert_eq!(Arc::strong_count(&mplx), 1);
}

#[test]
fn silent_stream_is_reset() {
    register_task_filters();
    let mplx = Arc::new(TestMultiplexer::default());
    let master = test_master(1);

    let (_feeder, source) = new_stream_input_queue(16);
    let (sink, drain) = new_stream_output_queue(16);

    let mut task = StreamTask::create(1, 4, &master, source, None, true, sink, mplx.clone()).unwrap();

    task.run(&SilentPipeline).unwrap();
    assert_eq!(
        mplx.resets(),
        vec![(4, StreamResetReason::SilentCompletion)]
    );
    assert!(drain.try_collect().unwrap().is_none());

    task.destroy();
    assert_eq!(mplx.resets().len(), 1);
}

#[test]
fn failed_connection_setup_is_reset_once() {
    register_task_filters();
    let mplx = Arc::new(TestMultiplexer::default());
    let master = MasterConnection::new(
        2,
        ClientConnectionInfo::new("0.0.0.0:0".parse().unwrap(), "192.0.2.1:443".parse().unwrap()),
        Arc::new(StreamServerConfig::default()),
    );

    let (_feeder, source) = new_stream_input_queue(16);
    let (sink, _drain) = new_stream_output_queue(16);

    let task = StreamTask::create(2, 1, &master, source, None, false, sink, mplx.clone());
    assert!(task.is_none());
    assert_eq!(
        mplx.resets(),
        vec![(1, StreamResetReason::ConnectionSetupFailed)]
    );
    assert_eq!(Arc::strong_count(&mplx), 1);
}

#[test]
fn abort_unparks_blocked_read() {
    register_task_filters();
    let mplx = Arc::new(TestMultiplexer::default());
    let master = test_master(3);

    let (feeder, source) = new_stream_input_queue(16);
    let (sink, _drain) = new_stream_output_queue(16);

    let mut task = StreamTask::create(3, 5, &master, source, None, false, sink, mplx.clone()).unwrap();
    let handle = task.handle();

    let (started_tx, started_rx) = mpsc::channel();
    let worker = std::thread::Builder::new()
        .name("stream-3-5".to_string())
        .spawn(move || {
            let r = task.run(&ParkingPipeline { started: started_tx });
            (task, r)
        })
        .unwrap();

    started_rx.recv().unwrap();
    // give the worker a moment to actually park in the read
    std::thread::sleep(Duration::from_millis(20));
    handle.abort();
    handle.abort(); // second call is a no-op

    let (mut task, r) = worker.join().unwrap();
    let e = r.unwrap_err();
    assert_eq!(e.kind(), io::ErrorKind::ConnectionAborted);
    assert!(task.is_aborted());

    // the queues are gone: the multiplexer side fails fast as well
    assert!(feeder.is_closed());
    assert!(feeder.feed(Bucket::eos()).is_err());

    assert_eq!(mplx.resets(), vec![(5, StreamResetReason::Aborted)]);

    task.destroy();
    assert_eq!(Arc::strong_count(&mplx), 1);
}

#[test]
fn destroy_is_idempotent() {
    register_task_filters();
    let mplx = Arc::new(TestMultiplexer::default());
    let master = test_master(4);

    let (_feeder, source) = new_stream_input_queue(16);
    let (sink, _drain) = new_stream_output_queue(16);

    let mut task = StreamTask::create(4, 2, &master, source, None, true, sink, mplx.clone()).unwrap();
    assert_eq!(Arc::strong_count(&mplx), 2);

    task.destroy();
    assert_eq!(Arc::strong_count(&mplx), 1);
    task.destroy();
    assert_eq!(Arc::strong_count(&mplx), 1);
    drop(task);
    assert_eq!(Arc::strong_count(&mplx), 1);
    assert!(mplx.resets().is_empty());
}

#[test]
fn running_flag_is_cross_thread_consistent() {
    register_task_filters();
    let mplx = Arc::new(TestMultiplexer::default());
    let master = test_master(5);

    let (_feeder, source) = new_stream_input_queue(16);
    let (sink, _drain) = new_stream_output_queue(16);

    let task = StreamTask::create(5, 6, &master, source, None, true, sink, mplx).unwrap();
    let handle = task.handle();

    let h = handle.clone();
    std::thread::spawn(move || h.set_running(true))
        .join()
        .unwrap();
    assert!(handle.is_running());
    assert!(task.is_running());

    let h = handle.clone();
    std::thread::spawn(move || h.set_running(false))
        .join()
        .unwrap();
    assert!(!handle.is_running());
    assert!(!task.is_running());
}
