/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::trace;
use socket2::{Domain, Socket, Type};

use crate::bucket::Bucket;
use crate::config::StreamServerConfig;
use crate::error::{BridgeError, ConnectionBuildError};
use crate::filter::{
    BlockingPolicy, FilterHandle, ReadMode, StreamInputFilter, StreamOutputFilter,
};
use crate::task::StreamTaskState;

/// Address metadata of the real accepted connection, shared with every
/// virtual connection derived from it.
#[derive(Clone, Debug)]
pub struct ClientConnectionInfo {
    client_addr: SocketAddr,
    server_addr: SocketAddr,
}

impl ClientConnectionInfo {
    pub fn new(client_addr: SocketAddr, server_addr: SocketAddr) -> Self {
        ClientConnectionInfo {
            client_addr,
            server_addr,
        }
    }

    #[inline]
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    #[inline]
    pub fn client_ip(&self) -> IpAddr {
        self.client_addr.ip()
    }

    #[inline]
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    #[inline]
    pub fn server_ip(&self) -> IpAddr {
        self.server_addr.ip()
    }
}

/// The session's real transport connection, as seen by its stream tasks.
pub struct MasterConnection {
    id: u64,
    cc_info: ClientConnectionInfo,
    config: Arc<StreamServerConfig>,
}

impl MasterConnection {
    pub fn new(id: u64, cc_info: ClientConnectionInfo, config: Arc<StreamServerConfig>) -> Self {
        MasterConnection {
            id,
            cc_info,
            config,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn cc_info(&self) -> &ClientConnectionInfo {
        &self.cc_info
    }

    #[inline]
    pub fn config(&self) -> &Arc<StreamServerConfig> {
        &self.config
    }
}

/// Placeholder transport socket backing a virtual connection.
///
/// Never bound or connected; it exists because connection processing expects
/// a socket object behind every connection it is handed.
pub struct TransportSocket {
    socket: Socket,
}

impl TransportSocket {
    pub fn placeholder(client_addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(client_addr), Type::STREAM, None)?;
        Ok(TransportSocket { socket })
    }
}

impl AsRef<Socket> for TransportSocket {
    fn as_ref(&self) -> &Socket {
        &self.socket
    }
}

/// A connection object the processing pipeline accepts as real, derived from
/// the session's master connection instead of a socket accept.
pub struct VirtualConnection {
    id: u64,
    cc_info: ClientConnectionInfo,
    config: Arc<StreamServerConfig>,
    taken_over: bool,
    input_filters: Vec<(FilterHandle, Box<dyn StreamInputFilter>)>,
    output_filters: Vec<(FilterHandle, Box<dyn StreamOutputFilter>)>,
    stream_ctx: Option<Arc<StreamTaskState>>,
}

impl VirtualConnection {
    /// Derives a virtual connection from the session's real connection,
    /// reusing its address metadata and shared server configuration.
    pub fn new_for_stream(master: &MasterConnection, id: u64) -> Result<Self, ConnectionBuildError> {
        let cc_info = master.cc_info().clone();
        if cc_info.client_ip().is_unspecified() {
            return Err(ConnectionBuildError::UnspecifiedClientAddress);
        }
        if cc_info.server_ip().is_unspecified() {
            return Err(ConnectionBuildError::UnspecifiedServerAddress);
        }
        trace!("conn({id}): created from master {}", master.id());
        Ok(VirtualConnection {
            id,
            cc_info,
            config: master.config().clone(),
            taken_over: false,
            input_filters: Vec::new(),
            output_filters: Vec::new(),
            stream_ctx: None,
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn client_addr(&self) -> SocketAddr {
        self.cc_info.client_addr()
    }

    #[inline]
    pub fn server_addr(&self) -> SocketAddr {
        self.cc_info.server_addr()
    }

    #[inline]
    pub fn config(&self) -> &Arc<StreamServerConfig> {
        &self.config
    }

    pub fn add_input_filter(&mut self, handle: FilterHandle, filter: Box<dyn StreamInputFilter>) {
        trace!("conn({}): adding input filter {}", self.id, handle.name());
        self.input_filters.push((handle, filter));
    }

    pub fn add_output_filter(&mut self, handle: FilterHandle, filter: Box<dyn StreamOutputFilter>) {
        trace!("conn({}): adding output filter {}", self.id, handle.name());
        self.output_filters.push((handle, filter));
    }

    /// Signals that handling of this connection is fully taken over: generic
    /// connection processing must skip it and only the installed filters may
    /// move data.
    pub fn mark_taken_over(&mut self) {
        self.taken_over = true;
    }

    #[inline]
    pub fn is_taken_over(&self) -> bool {
        self.taken_over
    }

    /// Associates the owning stream task with this connection so later
    /// processing stages can find it.
    pub fn set_stream_ctx(&mut self, ctx: Arc<StreamTaskState>) {
        self.stream_ctx = Some(ctx);
    }

    #[inline]
    pub fn stream_ctx(&self) -> Option<&Arc<StreamTaskState>> {
        self.stream_ctx.as_ref()
    }

    /// Pulls bytes through the top-most installed input filter.
    pub fn read_input(
        &mut self,
        mode: ReadMode,
        blocking: BlockingPolicy,
        max_bytes: usize,
    ) -> Result<Bucket, BridgeError> {
        match self.input_filters.last_mut() {
            Some((_, filter)) => filter.read(mode, blocking, max_bytes),
            None => Err(BridgeError::NotInstalled),
        }
    }

    /// Pushes produced bytes through the top-most installed output filter.
    pub fn write_output(&mut self, bucket: Bucket) -> Result<(), BridgeError> {
        match self.output_filters.last_mut() {
            Some((_, filter)) => filter.write(bucket),
            None => Err(BridgeError::NotInstalled),
        }
    }
}
