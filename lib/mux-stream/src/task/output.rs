/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use crate::bucket::Bucket;
use crate::error::BridgeError;
use crate::filter::StreamOutputFilter;
use crate::queue::StreamOutputSink;

use super::state::StreamTaskState;

/// Output bridge: delivers bytes produced by the pipeline to the
/// multiplexer's per-stream queue.
///
/// Whether any data ever went out is tracked on the shared task state; the
/// task reads it at completion to detect a stream that stayed silent.
pub struct TaskOutput {
    state: Arc<StreamTaskState>,
    sink: StreamOutputSink,
}

impl TaskOutput {
    pub(crate) fn new(state: Arc<StreamTaskState>, sink: StreamOutputSink) -> Self {
        TaskOutput { state, sink }
    }

    pub fn has_started(&self) -> bool {
        self.state.output_started()
    }
}

impl StreamOutputFilter for TaskOutput {
    fn write(&mut self, bucket: Bucket) -> Result<(), BridgeError> {
        if self.state.is_aborted() {
            return Err(BridgeError::ConnectionAborted);
        }
        if bucket.is_empty() && !bucket.is_eos() {
            return Ok(());
        }
        let has_data = !bucket.is_empty();
        match self.sink.send(bucket) {
            Ok(_) => {
                if has_data {
                    self.state.set_output_started();
                }
                Ok(())
            }
            Err(_) => Err(BridgeError::ConnectionAborted),
        }
    }
}
