/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::debug;

use crate::queue::StreamQueueGate;

const RUN_STATE_NOT_STARTED: u8 = 0;
const RUN_STATE_RUNNING: u8 = 1;
const RUN_STATE_FINISHED: u8 = 2;

/// Cross-thread visible state of one stream task.
///
/// Everything else in the task is owned by its worker; only these flags may
/// be touched from other threads.
pub struct StreamTaskState {
    session_id: u64,
    stream_id: u32,
    aborted: AtomicBool,
    running: AtomicU8,
    output_started: AtomicBool,
}

impl StreamTaskState {
    pub(crate) fn new(session_id: u64, stream_id: u32) -> Self {
        StreamTaskState {
            session_id,
            stream_id,
            aborted: AtomicBool::new(false),
            running: AtomicU8::new(RUN_STATE_NOT_STARTED),
            output_started: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually set the flag.
    pub(crate) fn set_aborted(&self) -> bool {
        !self.aborted.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) == RUN_STATE_RUNNING
    }

    #[inline]
    pub fn has_finished(&self) -> bool {
        self.running.load(Ordering::Acquire) == RUN_STATE_FINISHED
    }

    /// Bookkeeping flag maintained by the session layer around the run.
    ///
    /// `true` moves a not yet started task to running, `false` moves a
    /// running task to finished; any other transition is ignored.
    pub fn set_running(&self, running: bool) {
        if running {
            let _ = self.running.compare_exchange(
                RUN_STATE_NOT_STARTED,
                RUN_STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        } else {
            let _ = self.running.compare_exchange(
                RUN_STATE_RUNNING,
                RUN_STATE_FINISHED,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    #[inline]
    pub(crate) fn output_started(&self) -> bool {
        self.output_started.load(Ordering::Acquire)
    }

    pub(crate) fn set_output_started(&self) {
        self.output_started.store(true, Ordering::Release);
    }
}

/// Cloneable cross-thread handle to a stream task, kept by the session layer
/// for abort and bookkeeping.
#[derive(Clone)]
pub struct StreamTaskHandle {
    state: Arc<StreamTaskState>,
    input_gate: StreamQueueGate,
    output_gate: StreamQueueGate,
}

impl StreamTaskHandle {
    pub(crate) fn new(
        state: Arc<StreamTaskState>,
        input_gate: StreamQueueGate,
        output_gate: StreamQueueGate,
    ) -> Self {
        StreamTaskHandle {
            state,
            input_gate,
            output_gate,
        }
    }

    #[inline]
    pub fn session_id(&self) -> u64 {
        self.state.session_id()
    }

    #[inline]
    pub fn stream_id(&self) -> u32 {
        self.state.stream_id()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    #[inline]
    pub fn set_running(&self, running: bool) {
        self.state.set_running(running)
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    /// Aborts the task from any thread, at any point of its life.
    ///
    /// The first call wins; repeated calls are no-ops. Both stream queues are
    /// torn down so that a bridge call in progress, or any issued later,
    /// fails with a connection-aborted error instead of parking.
    pub fn abort(&self) {
        if !self.state.set_aborted() {
            return;
        }
        debug!(
            "stream({}-{}): aborting task",
            self.state.session_id(),
            self.state.stream_id()
        );
        self.close_gates();
    }

    pub(crate) fn close_gates(&self) {
        self.input_gate.close();
        self.output_gate.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_transitions() {
        let state = StreamTaskState::new(1, 1);
        assert!(!state.is_running());
        assert!(!state.has_finished());

        // finishing before starting is not a legal transition
        state.set_running(false);
        assert!(!state.has_finished());

        state.set_running(true);
        assert!(state.is_running());
        state.set_running(true);
        assert!(state.is_running());

        state.set_running(false);
        assert!(!state.is_running());
        assert!(state.has_finished());

        // a finished task can not be restarted
        state.set_running(true);
        assert!(!state.is_running());
        assert!(state.has_finished());
    }

    #[test]
    fn abort_first_call_wins() {
        let state = StreamTaskState::new(1, 2);
        assert!(!state.is_aborted());
        assert!(state.set_aborted());
        assert!(!state.set_aborted());
        assert!(state.is_aborted());
    }
}
