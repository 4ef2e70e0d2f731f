/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use bytes::Bytes;

/// One chunk of stream payload as exchanged through the per-stream queues.
///
/// The end-of-stream marker travels with the data, so a single bucket can
/// carry the final bytes of a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bucket {
    data: Bytes,
    end_of_stream: bool,
}

impl Bucket {
    pub fn data(data: Bytes) -> Self {
        Bucket {
            data,
            end_of_stream: false,
        }
    }

    pub fn data_eos(data: Bytes) -> Self {
        Bucket {
            data,
            end_of_stream: true,
        }
    }

    /// A bare end-of-stream marker with no payload.
    pub fn eos() -> Self {
        Bucket {
            data: Bytes::new(),
            end_of_stream: true,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn is_eos(&self) -> bool {
        self.end_of_stream
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}
