/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use crate::conn::{TransportSocket, VirtualConnection};

/// The synchronous connection-processing entry point.
///
/// A stream task invokes this exactly once, on its own worker, and the call
/// blocks until the whole stream has been processed. All input and output of
/// the processing happens through the filters installed on the connection.
pub trait ConnectionPipeline {
    fn process_connection(
        &self,
        conn: &mut VirtualConnection,
        socket: &TransportSocket,
    ) -> io::Result<()>;
}
