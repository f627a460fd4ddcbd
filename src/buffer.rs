// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Output frame buffers exchanged between the client and the decode engine.

use std::collections::VecDeque;

use remain::sorted;
use thiserror::Error as ThisError;

use crate::error::Error;

/// A decoded-frame buffer, described by the bus address of each of its planes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    pub planes: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(planes: Vec<u32>) -> Self {
        FrameBuffer { planes }
    }
}

/// Who owns an output buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    /// Owned by the engine, which may decode into it.
    Free,
    /// Holds a decoded frame owned by the client.
    Decoded,
    /// Returned by the client, waiting for the engine to accept it back.
    Recycling,
}

#[sorted]
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer {index} is {state:?}, expected {expected:?}")]
    BadState {
        index: u8,
        state: BufferState,
        expected: BufferState,
    },
    #[error("no output buffer with index {0}")]
    InvalidIndex(u8),
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Error {
        match e {
            BufferError::InvalidIndex(_) => Error::InvalidParameter(e.to_string()),
            BufferError::BadState { .. } => Error::ProtocolViolation(e.to_string()),
        }
    }
}

/// Slot states of a session's output buffers plus the FIFO of buffers waiting to be handed back
/// to the engine.
pub struct OutputPool {
    states: Vec<BufferState>,
    // Indices of `Recycling` buffers, oldest first. Never holds more than `states.len()` entries.
    pending: VecDeque<u8>,
}

impl OutputPool {
    /// A pool of `count` buffers, all owned by the engine.
    pub fn new(count: usize) -> Self {
        OutputPool {
            states: vec![BufferState::Free; count],
            pending: VecDeque::with_capacity(count),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, index: u8) -> Option<BufferState> {
        self.states.get(index as usize).copied()
    }

    pub fn count(&self, state: BufferState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    fn transition(
        &mut self,
        index: u8,
        expected: BufferState,
        next: BufferState,
    ) -> Result<(), BufferError> {
        let state = self
            .states
            .get_mut(index as usize)
            .ok_or(BufferError::InvalidIndex(index))?;
        if *state != expected {
            return Err(BufferError::BadState {
                index,
                state: *state,
                expected,
            });
        }
        *state = next;
        Ok(())
    }

    /// The engine finished decoding into `index`.
    pub fn mark_decoded(&mut self, index: u8) -> Result<(), BufferError> {
        self.transition(index, BufferState::Free, BufferState::Decoded)
    }

    /// The client is done with `index`; queue it for recycling.
    pub fn queue_recycle(&mut self, index: u8) -> Result<(), BufferError> {
        self.transition(index, BufferState::Decoded, BufferState::Recycling)?;
        self.pending.push_back(index);
        Ok(())
    }

    /// Oldest buffer waiting to be recycled.
    pub fn next_recycle(&self) -> Option<u8> {
        self.pending.front().copied()
    }

    /// The oldest pending buffer was handed back to the engine.
    pub fn complete_recycle(&mut self) -> Option<u8> {
        let index = self.pending.pop_front()?;
        self.states[index as usize] = BufferState::Free;
        Some(index)
    }

    pub fn pending_recycles(&self) -> usize {
        self.pending.len()
    }

    /// Drops every pending recycle. Buffers keep their state, the engine no longer owns any.
    /// Returns how many buffers were outstanding.
    pub fn abandon(&mut self) -> usize {
        self.pending.clear();
        self.states
            .iter()
            .filter(|s| **s != BufferState::Free)
            .count()
    }
}
