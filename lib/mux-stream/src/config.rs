/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

const DEFAULT_STREAM_QUEUE_SIZE: usize = 16;

/// Server configuration shared by all streams of a session, carried on the
/// master connection.
#[derive(Clone, Debug)]
pub struct StreamServerConfig {
    pub server_name: String,
    /// Capacity of the per-stream input queue, in buckets.
    pub stream_recv_queue_size: usize,
    /// Capacity of the per-stream output queue, in buckets.
    pub stream_send_queue_size: usize,
}

impl Default for StreamServerConfig {
    fn default() -> Self {
        StreamServerConfig {
            server_name: String::from("mux-stream"),
            stream_recv_queue_size: DEFAULT_STREAM_QUEUE_SIZE,
            stream_send_queue_size: DEFAULT_STREAM_QUEUE_SIZE,
        }
    }
}
