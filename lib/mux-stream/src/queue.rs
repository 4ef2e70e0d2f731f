/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use kanal::{Receiver, Sender};
use thiserror::Error;

use crate::bucket::Bucket;

/// The stream's data channel was torn down from the other side.
///
/// Buckets still queued at teardown are discarded; graceful end of a stream
/// is always an explicit end-of-stream bucket, never a channel close.
#[derive(Debug, Error)]
#[error("stream queue closed")]
pub struct QueueClosedError;

/// Builds the input queue for one stream. The multiplexer keeps the feeder
/// and hands the source over to the stream task.
pub fn new_stream_input_queue(capacity: usize) -> (StreamInputFeeder, StreamInputSource) {
    let (sender, receiver) = kanal::bounded(capacity);
    (
        StreamInputFeeder { sender },
        StreamInputSource { receiver },
    )
}

/// Builds the output queue for one stream. The stream task owns the sink,
/// the multiplexer keeps the drain.
pub fn new_stream_output_queue(capacity: usize) -> (StreamOutputSink, StreamOutputDrain) {
    let (sender, receiver) = kanal::bounded(capacity);
    (
        StreamOutputSink { sender },
        StreamOutputDrain { receiver },
    )
}

/// Multiplexer-side producer of one stream's input data.
#[derive(Clone)]
pub struct StreamInputFeeder {
    sender: Sender<Bucket>,
}

impl StreamInputFeeder {
    /// Blocks while the stream's input queue is full.
    pub fn feed(&self, bucket: Bucket) -> Result<(), QueueClosedError> {
        self.sender.send(bucket).map_err(|_| QueueClosedError)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn close(&self) {
        let _ = self.sender.close();
    }
}

/// Task-side consumer end of one stream's input queue.
pub struct StreamInputSource {
    receiver: Receiver<Bucket>,
}

impl StreamInputSource {
    pub(crate) fn recv(&self) -> Result<Bucket, QueueClosedError> {
        self.receiver.recv().map_err(|_| QueueClosedError)
    }

    pub(crate) fn try_recv(&self) -> Result<Option<Bucket>, QueueClosedError> {
        self.receiver.try_recv().map_err(|_| QueueClosedError)
    }

    pub(crate) fn gate(&self) -> StreamQueueGate {
        StreamQueueGate {
            inner: GateInner::Input(self.receiver.clone()),
        }
    }
}

/// Task-side producer end of one stream's output queue.
pub struct StreamOutputSink {
    sender: Sender<Bucket>,
}

impl StreamOutputSink {
    /// Blocks while the stream's output queue is full.
    pub(crate) fn send(&self, bucket: Bucket) -> Result<(), QueueClosedError> {
        self.sender.send(bucket).map_err(|_| QueueClosedError)
    }

    pub(crate) fn gate(&self) -> StreamQueueGate {
        StreamQueueGate {
            inner: GateInner::Output(self.sender.clone()),
        }
    }
}

/// Multiplexer-side consumer of one stream's output data.
pub struct StreamOutputDrain {
    receiver: Receiver<Bucket>,
}

impl StreamOutputDrain {
    /// Blocks until the stream produces its next bucket.
    pub fn collect(&self) -> Result<Bucket, QueueClosedError> {
        self.receiver.recv().map_err(|_| QueueClosedError)
    }

    pub fn try_collect(&self) -> Result<Option<Bucket>, QueueClosedError> {
        self.receiver.try_recv().map_err(|_| QueueClosedError)
    }

    pub fn close(&self) {
        let _ = self.receiver.close();
    }
}

/// Cross-thread terminator for one stream queue.
///
/// Closing fails all pending and future operations on the channel, which is
/// how an abort unparks a worker blocked in a bridge call.
#[derive(Clone)]
pub(crate) struct StreamQueueGate {
    inner: GateInner,
}

#[derive(Clone)]
enum GateInner {
    Input(Receiver<Bucket>),
    Output(Sender<Bucket>),
}

impl StreamQueueGate {
    pub(crate) fn close(&self) {
        match &self.inner {
            GateInner::Input(r) => {
                let _ = r.close();
            }
            GateInner::Output(s) => {
                let _ = s.close();
            }
        }
    }
}
