/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

/// Why a stream is being reset instead of completing with a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamResetReason {
    /// Task setup failed before a connection could be derived.
    TaskSetupFailed,
    /// The virtual connection could not be built.
    ConnectionSetupFailed,
    /// The placeholder transport socket could not be created.
    SocketSetupFailed,
    /// Processing returned normally but never produced any output.
    SilentCompletion,
    /// The task was aborted before producing any output.
    Aborted,
}

impl StreamResetReason {
    pub fn brief(&self) -> &'static str {
        match self {
            StreamResetReason::TaskSetupFailed => "TaskSetupFailed",
            StreamResetReason::ConnectionSetupFailed => "ConnectionSetupFailed",
            StreamResetReason::SocketSetupFailed => "SocketSetupFailed",
            StreamResetReason::SilentCompletion => "SilentCompletion",
            StreamResetReason::Aborted => "Aborted",
        }
    }
}

/// The component arbitrating all streams of one session over the real
/// transport connection.
///
/// Stream tasks hold a shared reference to it for the whole of their
/// lifetime: taken once at creation, dropped exactly once at destruction.
pub trait StreamMultiplexer: Send + Sync {
    /// Reports that the stream failed to produce a valid response.
    fn reset_stream(&self, stream_id: u32, reason: StreamResetReason);
}

pub type ArcStreamMultiplexer = Arc<dyn StreamMultiplexer>;
