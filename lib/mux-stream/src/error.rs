/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

/// Errors surfaced by the bridge filters to the processing pipeline.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("connection aborted")]
    ConnectionAborted,
    #[error("no data available for non-blocking read")]
    WouldBlock,
    #[error("no filter installed on this connection")]
    NotInstalled,
}

impl From<BridgeError> for io::Error {
    fn from(e: BridgeError) -> Self {
        let kind = match &e {
            BridgeError::ConnectionAborted => io::ErrorKind::ConnectionAborted,
            BridgeError::WouldBlock => io::ErrorKind::WouldBlock,
            BridgeError::NotInstalled => io::ErrorKind::NotConnected,
        };
        io::Error::new(kind, e)
    }
}

/// Failure to derive a virtual connection from the session's real connection.
#[derive(Debug, Error)]
pub enum ConnectionBuildError {
    #[error("client address of the master connection is unspecified")]
    UnspecifiedClientAddress,
    #[error("server address of the master connection is unspecified")]
    UnspecifiedServerAddress,
}
