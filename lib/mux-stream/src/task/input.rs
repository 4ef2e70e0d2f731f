/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use bytes::Bytes;

use crate::bucket::Bucket;
use crate::error::BridgeError;
use crate::filter::{BlockingPolicy, ReadMode, StreamInputFilter};
use crate::queue::StreamInputSource;

use super::state::StreamTaskState;

/// Input bridge: presents bytes pulled from the multiplexer's per-stream
/// queue as though they were read from a network socket.
///
/// Data already available at task creation (and a possibly already known
/// end-of-stream) is served before anything is pulled from the queue.
pub struct TaskInput {
    state: Arc<StreamTaskState>,
    source: StreamInputSource,
    pending: Bytes,
    eos: bool,
}

impl TaskInput {
    pub(crate) fn new(
        state: Arc<StreamTaskState>,
        source: StreamInputSource,
        initial: Option<Bytes>,
        eos: bool,
    ) -> Self {
        TaskInput {
            state,
            source,
            pending: initial.unwrap_or_default(),
            eos,
        }
    }

    fn fetch(&mut self, blocking: BlockingPolicy) -> Result<(), BridgeError> {
        let bucket = match blocking {
            BlockingPolicy::Blocking => match self.source.recv() {
                Ok(bucket) => bucket,
                Err(_) => return Err(BridgeError::ConnectionAborted),
            },
            BlockingPolicy::NonBlocking => match self.source.try_recv() {
                Ok(Some(bucket)) => bucket,
                Ok(None) => return Err(BridgeError::WouldBlock),
                Err(_) => return Err(BridgeError::ConnectionAborted),
            },
        };
        if bucket.is_eos() {
            self.eos = true;
        }
        if !bucket.is_empty() {
            // reads are strictly sequential, so one chunk in flight is enough
            debug_assert!(self.pending.is_empty());
            self.pending = bucket.into_data();
        }
        Ok(())
    }
}

impl StreamInputFilter for TaskInput {
    fn read(
        &mut self,
        mode: ReadMode,
        blocking: BlockingPolicy,
        max_bytes: usize,
    ) -> Result<Bucket, BridgeError> {
        if self.state.is_aborted() {
            return Err(BridgeError::ConnectionAborted);
        }

        while self.pending.is_empty() && !self.eos {
            self.fetch(blocking)?;
        }
        if self.pending.is_empty() {
            return Ok(Bucket::eos());
        }

        let len = max_bytes.min(self.pending.len());
        match mode {
            ReadMode::Bytes => {
                let data = self.pending.split_to(len);
                if self.eos && self.pending.is_empty() {
                    Ok(Bucket::data_eos(data))
                } else {
                    Ok(Bucket::data(data))
                }
            }
            ReadMode::Speculative => {
                let data = self.pending.slice(..len);
                if self.eos && len == self.pending.len() {
                    Ok(Bucket::data_eos(data))
                } else {
                    Ok(Bucket::data(data))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::new_stream_input_queue;

    fn new_input(initial: Option<Bytes>, eos: bool) -> (crate::queue::StreamInputFeeder, TaskInput) {
        let (feeder, source) = new_stream_input_queue(4);
        let state = Arc::new(StreamTaskState::new(1, 1));
        (feeder, TaskInput::new(state, source, initial, eos))
    }

    #[test]
    fn initial_data_served_first() {
        let (_feeder, mut input) = new_input(Some(Bytes::from_static(b"head")), true);
        let b = input
            .read(ReadMode::Bytes, BlockingPolicy::NonBlocking, 64)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"head");
        assert!(b.is_eos());
    }

    #[test]
    fn max_bytes_splits_chunks() {
        let (_feeder, mut input) = new_input(Some(Bytes::from_static(b"abcdef")), true);
        let b = input
            .read(ReadMode::Bytes, BlockingPolicy::NonBlocking, 4)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"abcd");
        assert!(!b.is_eos());
        let b = input
            .read(ReadMode::Bytes, BlockingPolicy::NonBlocking, 4)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"ef");
        assert!(b.is_eos());
    }

    #[test]
    fn speculative_read_does_not_consume() {
        let (_feeder, mut input) = new_input(Some(Bytes::from_static(b"peek")), false);
        let b = input
            .read(ReadMode::Speculative, BlockingPolicy::NonBlocking, 64)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"peek");
        let b = input
            .read(ReadMode::Bytes, BlockingPolicy::NonBlocking, 64)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"peek");
    }

    #[test]
    fn non_blocking_read_on_empty_queue() {
        let (_feeder, mut input) = new_input(None, false);
        assert!(matches!(
            input.read(ReadMode::Bytes, BlockingPolicy::NonBlocking, 64),
            Err(BridgeError::WouldBlock)
        ));
    }

    #[test]
    fn eos_reads_are_repeatable() {
        let (_feeder, mut input) = new_input(None, true);
        for _ in 0..2 {
            let b = input
                .read(ReadMode::Bytes, BlockingPolicy::Blocking, 64)
                .unwrap();
            assert!(b.is_empty());
            assert!(b.is_eos());
        }
    }

    #[test]
    fn queued_data_after_initial() {
        let (feeder, mut input) = new_input(None, false);
        feeder.feed(Bucket::data(Bytes::from_static(b"one"))).unwrap();
        feeder.feed(Bucket::data_eos(Bytes::from_static(b"two"))).unwrap();
        let b = input
            .read(ReadMode::Bytes, BlockingPolicy::Blocking, 64)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"one");
        assert!(!b.is_eos());
        let b = input
            .read(ReadMode::Bytes, BlockingPolicy::Blocking, 64)
            .unwrap();
        assert_eq!(b.bytes().as_ref(), b"two");
        assert!(b.is_eos());
    }

    #[test]
    fn closed_queue_maps_to_aborted() {
        let (feeder, mut input) = new_input(None, false);
        feeder.close();
        assert!(matches!(
            input.read(ReadMode::Bytes, BlockingPolicy::Blocking, 64),
            Err(BridgeError::ConnectionAborted)
        ));
    }

    #[test]
    fn aborted_state_fails_fast() {
        let (feeder, mut input) = new_input(Some(Bytes::from_static(b"data")), false);
        input.state.set_aborted();
        assert!(matches!(
            input.read(ReadMode::Bytes, BlockingPolicy::Blocking, 64),
            Err(BridgeError::ConnectionAborted)
        ));
        drop(feeder);
    }
}
