/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::collections::HashMap;
use std::sync::Mutex;

use foldhash::fast::FixedState;

use crate::bucket::Bucket;
use crate::error::BridgeError;

/// How the pipeline wants input delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Return up to `max_bytes` and consume them.
    Bytes,
    /// Return available bytes without consuming them.
    Speculative,
}

/// Whether a read may park the calling worker until data arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockingPolicy {
    Blocking,
    NonBlocking,
}

/// Position of a filter in a connection's chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterLevel {
    /// Content-level transformation.
    Protocol,
    /// Innermost level, where bytes enter and leave the connection.
    Network,
}

/// Opaque handle to a registered filter, returned by one-time registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterHandle {
    name: &'static str,
    level: FilterLevel,
}

impl FilterHandle {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn level(&self) -> FilterLevel {
        self.level
    }
}

/// Source side of a connection's filter chain: the pipeline pulls buckets
/// through it as though reading from a network socket.
pub trait StreamInputFilter: Send {
    fn read(
        &mut self,
        mode: ReadMode,
        blocking: BlockingPolicy,
        max_bytes: usize,
    ) -> Result<Bucket, BridgeError>;
}

/// Sink side of a connection's filter chain: the pipeline pushes produced
/// buckets through it as though writing to a network socket.
pub trait StreamOutputFilter: Send {
    fn write(&mut self, bucket: Bucket) -> Result<(), BridgeError>;
}

/// Handles for the two task bridge filters, registered once per process.
#[derive(Clone, Copy, Debug)]
pub struct TaskFilterHandles {
    pub input: FilterHandle,
    pub output: FilterHandle,
}

const TASK_INPUT_FILTER_NAME: &str = "MUX_TO_PIPELINE";
const TASK_OUTPUT_FILTER_NAME: &str = "PIPELINE_TO_MUX";

static FILTER_REGISTRY: Mutex<FilterRegistry> = Mutex::new(FilterRegistry::new());

struct FilterRegistry {
    inner: HashMap<&'static str, FilterHandle, FixedState>,
}

impl FilterRegistry {
    const fn new() -> Self {
        FilterRegistry {
            inner: HashMap::with_hasher(FixedState::with_seed(0)),
        }
    }

    fn register(&mut self, name: &'static str, level: FilterLevel) -> FilterHandle {
        *self
            .inner
            .entry(name)
            .or_insert(FilterHandle { name, level })
    }

    fn get(&self, name: &'static str) -> Option<FilterHandle> {
        self.inner.get(name).copied()
    }
}

/// One-time process-wide registration of the task bridge filters.
///
/// Safe to call repeatedly; later calls return the handles registered first.
pub fn register_task_filters() -> TaskFilterHandles {
    let mut registry = FILTER_REGISTRY.lock().unwrap();
    TaskFilterHandles {
        input: registry.register(TASK_INPUT_FILTER_NAME, FilterLevel::Network),
        output: registry.register(TASK_OUTPUT_FILTER_NAME, FilterLevel::Network),
    }
}

/// Looks up the task bridge filter handles without registering them.
pub fn task_filter_handles() -> Option<TaskFilterHandles> {
    let registry = FILTER_REGISTRY.lock().unwrap();
    Some(TaskFilterHandles {
        input: registry.get(TASK_INPUT_FILTER_NAME)?,
        output: registry.get(TASK_OUTPUT_FILTER_NAME)?,
    })
}
