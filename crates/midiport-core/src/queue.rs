//! Inbound hand-off queue: driver thread (producer) -> event loop (consumer).
//!
//! One mutex guards a FIFO. The producer holds it only to append; the
//! consumer holds it only to take the whole backlog in one pass, and delivers
//! after releasing it. Unbounded unless a capacity is configured.

use crate::event_loop::Waker;
use crate::MidiMessage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Backlog size that triggers a one-off warning when no capacity is set.
pub const DEFAULT_HIGH_WATER_MARK: usize = 4096;

/// Backlog and drop counter read under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub dropped: u64,
}

struct Shared {
    messages: Mutex<VecDeque<MidiMessage>>,
    capacity: Option<usize>,
    high_water_mark: usize,
    over_high_water: AtomicBool,
    dropped: AtomicU64,
}

/// Consumer side. Owned by one input controller.
#[derive(Clone)]
pub struct InboundQueue {
    shared: Arc<Shared>,
}

impl InboundQueue {
    /// Unbounded queue.
    pub fn new() -> Self {
        Self::with_limits(None, DEFAULT_HIGH_WATER_MARK)
    }

    /// `capacity`: once reached, new messages are dropped and counted.
    /// `high_water_mark`: backlog size that logs a warning.
    pub fn with_limits(capacity: Option<usize>, high_water_mark: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                messages: Mutex::new(VecDeque::new()),
                capacity,
                high_water_mark: high_water_mark.max(1),
                over_high_water: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Producer handle for the driver callback; wakes `waker` after each push.
    pub fn producer(&self, waker: Waker) -> QueueProducer {
        QueueProducer {
            shared: Arc::clone(&self.shared),
            waker,
        }
    }

    /// Takes the whole backlog under a single lock acquisition.
    pub fn take_all(&self) -> VecDeque<MidiMessage> {
        let batch = std::mem::take(&mut *self.shared.messages.lock());
        self.shared.over_high_water.store(false, Ordering::Relaxed);
        batch
    }

    /// Discards the backlog. Returns how many messages were dropped.
    pub fn clear(&self) -> usize {
        let discarded = self.take_all().len();
        if discarded > 0 {
            trace!("Discarded {} undelivered MIDI messages", discarded);
        }
        discarded
    }

    /// Snapshot; the driver thread may push right after it is taken.
    pub fn len(&self) -> usize {
        self.shared.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.messages.lock().is_empty()
    }

    /// Consistent snapshot of the backlog and the drop counter.
    pub fn stats(&self) -> QueueStats {
        let messages = self.shared.messages.lock();
        QueueStats {
            pending: messages.len(),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }

    /// Messages rejected because the queue was at capacity.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InboundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("InboundQueue")
            .field("len", &stats.pending)
            .field("capacity", &self.shared.capacity)
            .field("dropped", &stats.dropped)
            .finish()
    }
}

/// Driver-side handle. Moved into the engine callback.
pub struct QueueProducer {
    shared: Arc<Shared>,
    waker: Waker,
}

impl QueueProducer {
    /// Appends `message` and wakes the consumer. Returns `false` if the
    /// message was dropped because the queue is at capacity.
    pub fn push(&self, message: MidiMessage) -> bool {
        let len = {
            let mut messages = self.shared.messages.lock();
            if let Some(capacity) = self.shared.capacity {
                if messages.len() >= capacity {
                    // Counted under the lock so `stats` never sees a full
                    // queue without its drop.
                    let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    drop(messages);
                    warn!(
                        "MIDI inbound queue full ({} messages); dropped {} so far",
                        capacity, dropped
                    );
                    return false;
                }
            }
            messages.push_back(message);
            messages.len()
        };

        if len >= self.shared.high_water_mark
            && !self.shared.over_high_water.swap(true, Ordering::Relaxed)
        {
            warn!(
                "MIDI inbound queue backlog reached {} messages; consumer is not keeping up",
                len
            );
        }

        self.waker.wake();
        true
    }
}

impl std::fmt::Debug for QueueProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProducer")
            .field("waker", &self.waker)
            .finish()
    }
}
