/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, trace};

use crate::conn::{MasterConnection, TransportSocket, VirtualConnection};
use crate::filter;
use crate::mplx::{ArcStreamMultiplexer, StreamResetReason};
use crate::pipeline::ConnectionPipeline;
use crate::queue::{StreamInputSource, StreamOutputSink};

mod state;
pub use state::{StreamTaskHandle, StreamTaskState};

mod input;
pub use input::TaskInput;

mod output;
pub use output::TaskOutput;

/// Resource scope of one stream task.
///
/// The virtual connection owns the installed bridges through its filter
/// chain, so dropping the arena releases the connection, both bridges and
/// the placeholder socket together.
struct TaskArena {
    conn: VirtualConnection,
    socket: Option<TransportSocket>,
}

/// Executes one stream of a multiplexed session as an independent
/// synchronous connection.
///
/// Created by the multiplexer when a stream is ready, driven once through
/// the processing pipeline by a dedicated worker, and destroyed by the
/// multiplexer after it observed the terminal outcome.
pub struct StreamTask {
    state: Arc<StreamTaskState>,
    handle: StreamTaskHandle,
    mplx: Option<ArcStreamMultiplexer>,
    arena: Option<TaskArena>,
}

impl StreamTask {
    /// Sets up the execution context for one stream.
    ///
    /// Any construction failure is fully resolved here: the stream is reset
    /// with the specific reason exactly once, the cause is logged, and no
    /// task is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        session_id: u64,
        stream_id: u32,
        master: &MasterConnection,
        input: StreamInputSource,
        input_data: Option<Bytes>,
        input_eos: bool,
        output: StreamOutputSink,
        mplx: ArcStreamMultiplexer,
    ) -> Option<StreamTask> {
        let Some(handles) = filter::task_filter_handles() else {
            error!("stream({session_id}-{stream_id}): task filters not registered");
            mplx.reset_stream(stream_id, StreamResetReason::TaskSetupFailed);
            return None;
        };

        let conn_id = (session_id << 32) | u64::from(stream_id);
        let mut conn = match VirtualConnection::new_for_stream(master, conn_id) {
            Ok(conn) => conn,
            Err(e) => {
                error!("stream({session_id}-{stream_id}): unable to create stream task: {e}");
                mplx.reset_stream(stream_id, StreamResetReason::ConnectionSetupFailed);
                return None;
            }
        };

        let state = Arc::new(StreamTaskState::new(session_id, stream_id));
        let handle = StreamTaskHandle::new(state.clone(), input.gate(), output.gate());

        trace!("stream({session_id}-{stream_id}): installing bridge filters");
        conn.add_input_filter(
            handles.input,
            Box::new(TaskInput::new(state.clone(), input, input_data, input_eos)),
        );
        conn.add_output_filter(
            handles.output,
            Box::new(TaskOutput::new(state.clone(), output)),
        );
        trace!("stream({session_id}-{stream_id}): taking over connection");
        conn.mark_taken_over();
        conn.set_stream_ctx(state.clone());

        debug!("stream({session_id}-{stream_id}): task created");
        Some(StreamTask {
            state,
            handle,
            mplx: Some(mplx),
            arena: Some(TaskArena { conn, socket: None }),
        })
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

    /// A cloneable handle for the session layer; see [`StreamTaskHandle`].
    pub fn handle(&self) -> StreamTaskHandle {
        self.handle.clone()
    }

    /// Drives the stream through the processing pipeline.
    ///
    /// Blocks the calling worker until processing ends. If the stream never
    /// produced any output it is reset before this returns; the pipeline's
    /// own error, if any, is returned unchanged.
    pub fn run(&mut self, pipeline: &dyn ConnectionPipeline) -> io::Result<()> {
        let session_id = self.state.session_id();
        let stream_id = self.state.stream_id();
        let (Some(arena), Some(mplx)) = (self.arena.as_mut(), self.mplx.as_ref()) else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "stream task already destroyed",
            ));
        };
        debug!("stream({session_id}-{stream_id}): run");

        let TaskArena { conn, socket } = arena;
        let sock = match TransportSocket::placeholder(conn.client_addr()) {
            Ok(sock) => sock,
            Err(e) => {
                error!("stream({session_id}-{stream_id}): unable to allocate transport socket: {e}");
                mplx.reset_stream(stream_id, StreamResetReason::SocketSetupFailed);
                return Err(e);
            }
        };

        let r = pipeline.process_connection(conn, socket.insert(sock));

        if !self.state.output_started() {
            let reason = if self.state.is_aborted() {
                StreamResetReason::Aborted
            } else {
                StreamResetReason::SilentCompletion
            };
            debug!(
                "stream({session_id}-{stream_id}): no response, resetting stream ({})",
                reason.brief()
            );
            mplx.reset_stream(stream_id, reason);
        }

        *socket = None;
        r
    }

    /// Aborts the task; see [`StreamTaskHandle::abort`].
    pub fn abort(&self) {
        self.handle.abort()
    }

    /// Releases everything the task owns. Idempotent; also runs on drop.
    ///
    /// The stream queues are torn down first so the multiplexer side never
    /// parks on a stream that no longer exists, then the arena goes, and the
    /// multiplexer reference is dropped exactly once.
    pub fn destroy(&mut self) {
        if let Some(arena) = self.arena.take() {
            debug!(
                "stream({}-{}): destroy",
                self.state.session_id(),
                self.state.stream_id()
            );
            self.handle.close_gates();
            drop(arena);
        }
        if let Some(mplx) = self.mplx.take() {
            drop(mplx);
        }
    }
}

impl Drop for StreamTask {
    fn drop(&mut self) {
        self.destroy();
    }
}
