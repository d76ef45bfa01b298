// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Bounded buffer of serialized points awaiting flush.

use crate::error::TimelineError;
use serde_json::Value;

/// An ordered, size-bounded queue of serialized points.
///
/// Enqueue and batch detachment are made atomic with respect to each
/// other by the transport's lock; the buffer itself is single-threaded.
#[derive(Debug)]
pub(crate) struct PointBuffer {
    points: Vec<Value>,
    capacity: usize,
}

impl PointBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one point, failing when the buffer is saturated.
    pub fn push(&mut self, point: Value) -> Result<(), TimelineError> {
        if self.points.len() >= self.capacity {
            return Err(TimelineError::BufferFull);
        }
        self.points.push(point);
        Ok(())
    }

    /// Take the whole contents, leaving an empty buffer for new sends.
    pub fn detach(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.points)
    }

    /// Re-insert a failed batch ahead of any points enqueued since.
    ///
    /// The merged contents are truncated back to capacity; the number
    /// of newest points dropped by the truncation is returned.
    pub fn restore(&mut self, batch: Vec<Value>) -> usize {
        let mut merged = batch;
        merged.append(&mut self.points);
        let dropped = merged.len().saturating_sub(self.capacity);
        merged.truncate(self.capacity);
        self.points = merged;
        dropped
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
