// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Notifications sent from the completion path to the client.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Condvar;
use parking_lot::Mutex;
use remain::sorted;
use thiserror::Error as ThisError;

/// Events a session reports to its client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecoderEvent {
    /// Output buffer `buffer_index` holds a decoded frame and is owned by the client until it is
    /// submitted back.
    FrameDecoded {
        buffer_index: u8,
        /// Timestamp of the oldest access unit not yet matched with a frame.
        timestamp: Option<u64>,
        keyframe: bool,
        /// The engine flagged a decode error in this frame.
        corrupted: bool,
    },
    /// The stream geometry is known or changed.
    SourceChanged {
        width: u32,
        height: u32,
        min_buffers: u32,
    },
    /// The engine hit an unrecoverable fault. Only `stop()` is meaningful afterwards.
    HardwareFault,
}

#[sorted]
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum EventQueueError {
    #[error("event queue is closed")]
    Closed,
    #[error("event queue is full ({0} events pending)")]
    Full(usize),
}

/// FIFO of pending events with a capacity reserved up front, so queueing never allocates.
pub struct EventQueue<T> {
    pending_events: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

impl<T> EventQueue<T> {
    /// Create a new event queue able to hold `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending_events: VecDeque::with_capacity(capacity),
            capacity,
            closed: false,
        }
    }

    /// Add `event` to the queue.
    pub fn queue_event(&mut self, event: T) -> Result<(), EventQueueError> {
        if self.closed {
            return Err(EventQueueError::Closed);
        }
        if self.pending_events.len() >= self.capacity {
            return Err(EventQueueError::Full(self.pending_events.len()));
        }
        self.pending_events.push_back(event);
        Ok(())
    }

    /// Read the next event if there is one.
    pub fn try_dequeue_event(&mut self) -> Option<T> {
        self.pending_events.pop_front()
    }

    /// Returns the number of events currently pending on this queue.
    pub fn len(&self) -> usize {
        self.pending_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_events.is_empty()
    }
}

/// An `EventQueue` that is `Sync`, `Send`, and non-mut, with blocking reads.
pub struct SyncEventQueue<T> {
    queue: Mutex<EventQueue<T>>,
    available: Condvar,
}

impl<T> From<EventQueue<T>> for SyncEventQueue<T> {
    fn from(queue: EventQueue<T>) -> Self {
        Self {
            queue: Mutex::new(queue),
            available: Condvar::new(),
        }
    }
}

impl<T> SyncEventQueue<T> {
    /// Add `event` to the queue and wake up one reader.
    pub fn queue_event(&self, event: T) -> Result<(), EventQueueError> {
        self.queue.lock().queue_event(event)?;
        self.available.notify_one();
        Ok(())
    }

    /// Read the next event, blocking until an event becomes available. Fails once the queue is
    /// closed and drained.
    pub fn dequeue_event(&self) -> Result<T, EventQueueError> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(event) = queue.try_dequeue_event() {
                return Ok(event);
            }
            if queue.closed {
                return Err(EventQueueError::Closed);
            }
            self.available.wait(&mut queue);
        }
    }

    /// Like `dequeue_event`, but gives up after `timeout`.
    pub fn dequeue_event_timeout(&self, timeout: Duration) -> Option<T> {
        let mut queue = self.queue.lock();
        if queue.is_empty() && !queue.closed {
            self.available.wait_for(&mut queue, timeout);
        }
        queue.try_dequeue_event()
    }

    pub fn try_dequeue_event(&self) -> Option<T> {
        self.queue.lock().try_dequeue_event()
    }

    /// Refuse new events and wake up blocked readers. Pending events can still be read.
    pub fn close(&self) {
        self.queue.lock().closed = true;
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn event_queue() {
        let mut event_queue = EventQueue::with_capacity(2);

        assert_eq!(event_queue.queue_event(DecoderEvent::HardwareFault), Ok(()));
        assert_eq!(event_queue.len(), 1);
        assert_eq!(
            event_queue.queue_event(DecoderEvent::SourceChanged {
                width: 1920,
                height: 1080,
                min_buffers: 4,
            }),
            Ok(())
        );
        assert_eq!(
            event_queue.queue_event(DecoderEvent::HardwareFault),
            Err(EventQueueError::Full(2))
        );
        assert_eq!(event_queue.len(), 2);

        assert_eq!(
            event_queue.try_dequeue_event(),
            Some(DecoderEvent::HardwareFault)
        );
        assert!(matches!(
            event_queue.try_dequeue_event(),
            Some(DecoderEvent::SourceChanged { width: 1920, .. })
        ));
        assert_eq!(event_queue.try_dequeue_event(), None);
    }

    #[test]
    fn sync_queue_blocks_until_event() {
        let queue: Arc<SyncEventQueue<DecoderEvent>> =
            Arc::new(EventQueue::with_capacity(4).into());
        let reader = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue_event())
        };
        queue.queue_event(DecoderEvent::HardwareFault).unwrap();
        assert_eq!(reader.join().unwrap(), Ok(DecoderEvent::HardwareFault));
        assert!(queue.is_empty());
    }

    #[test]
    fn sync_queue_close_wakes_readers() {
        let queue: Arc<SyncEventQueue<u32>> = Arc::new(EventQueue::with_capacity(4).into());
        queue.queue_event(7).unwrap();
        queue.close();
        assert_eq!(queue.queue_event(8), Err(EventQueueError::Closed));
        // Pending events survive closing.
        assert_eq!(queue.dequeue_event(), Ok(7));
        assert_eq!(queue.dequeue_event(), Err(EventQueueError::Closed));
        assert_eq!(queue.dequeue_event_timeout(Duration::from_millis(1)), None);
    }

    #[test]
    fn sync_queue_timeout() {
        let queue: SyncEventQueue<u32> = EventQueue::with_capacity(1).into();
        assert_eq!(queue.dequeue_event_timeout(Duration::from_millis(5)), None);
        queue.queue_event(1).unwrap();
        assert_eq!(queue.dequeue_event_timeout(Duration::from_millis(5)), Some(1));
        assert_eq!(queue.len(), 0);
    }
}
