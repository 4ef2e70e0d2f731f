/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod bucket;
pub use bucket::Bucket;

mod config;
pub use config::StreamServerConfig;

mod error;
pub use error::{BridgeError, ConnectionBuildError};

mod mplx;
pub use mplx::{ArcStreamMultiplexer, StreamMultiplexer, StreamResetReason};

mod queue;
pub use queue::{
    QueueClosedError, StreamInputFeeder, StreamInputSource, StreamOutputDrain, StreamOutputSink,
    new_stream_input_queue, new_stream_output_queue,
};

mod conn;
pub use conn::{ClientConnectionInfo, MasterConnection, TransportSocket, VirtualConnection};

mod filter;
pub use filter::{
    BlockingPolicy, FilterHandle, FilterLevel, ReadMode, StreamInputFilter, StreamOutputFilter,
    TaskFilterHandles, register_task_filters, task_filter_handles,
};

mod pipeline;
pub use pipeline::ConnectionPipeline;

mod task;
pub use task::{StreamTask, StreamTaskHandle, StreamTaskState, TaskInput, TaskOutput};
