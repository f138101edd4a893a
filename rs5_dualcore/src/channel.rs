//! Ordered record transport between the two cores.
//!
//! Each direction is one [`Mailbox`]: a small fixed-capacity queue of whole
//! frames, so a record's marker and payload are never interleaved with
//! another record's. The producer never blocks. When the mailbox stays full
//! after [`PUSH_ATTEMPTS`] tries, frames wait in a local backlog that is
//! flushed ahead of any new record, keeping push order. A full backlog
//! sheds DataExchange frames before SystemChange frames.

use crossbeam::queue::ArrayQueue;
use rs5_common::consts::{BACKLOG_DEPTH, MAILBOX_DEPTH, PUSH_ATTEMPTS};
use rs5_common::record::{Frame, Record, RecordClass, SystemChange, encode};
use static_assertions::const_assert;
use tracing::{trace, warn};

use crate::dispatch::{Applied, apply_frame};
use crate::domain::{DeviceState, SyncCounters};

// A full mailbox must fit in the backlog behind it.
const_assert!(MAILBOX_DEPTH <= BACKLOG_DEPTH);

/// One direction of the inter-core link.
#[derive(Debug)]
pub struct Mailbox {
    queue: ArrayQueue<Frame>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        Self::with_capacity(MAILBOX_DEPTH)
    }

    pub fn with_capacity(frames: usize) -> Self {
        Self {
            queue: ArrayQueue::new(frames.max(1)),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Frames waiting for the consumer.
    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Producer and consumer ends. Borrowing `self` mutably keeps each
    /// mailbox to one producer and one consumer.
    pub fn split<'a>(&'a mut self, counters: &'a SyncCounters) -> (ChannelTx<'a>, ChannelRx<'a>) {
        let mailbox: &'a Self = self;
        (
            ChannelTx {
                mailbox,
                backlog: heapless::Vec::new(),
                counters,
            },
            ChannelRx { mailbox },
        )
    }
}

/// What happened to a pushed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// In the mailbox.
    Sent,
    /// Held in the producer backlog.
    Deferred,
    /// Held in the backlog after evicting an older, lower-priority frame.
    DroppedOldest,
    /// Discarded: the backlog holds only higher-priority frames.
    Dropped,
}

fn priority(frame: &Frame) -> u8 {
    frame.class().map_or(0, RecordClass::priority)
}

/// Producer end.
#[derive(Debug)]
pub struct ChannelTx<'a> {
    mailbox: &'a Mailbox,
    backlog: heapless::Vec<Frame, BACKLOG_DEPTH>,
    counters: &'a SyncCounters,
}

impl ChannelTx<'_> {
    /// Encode and send. Never blocks.
    pub fn push(&mut self, record: &Record) -> PushOutcome {
        self.push_frame(encode(record))
    }

    pub fn push_frame(&mut self, frame: Frame) -> PushOutcome {
        self.flush();
        if !self.backlog.is_empty() {
            return self.defer(frame);
        }
        let mut frame = frame;
        for _ in 0..PUSH_ATTEMPTS {
            match self.mailbox.queue.push(frame) {
                Ok(()) => return PushOutcome::Sent,
                Err(back) => {
                    frame = back;
                    std::hint::spin_loop();
                }
            }
        }
        self.defer(frame)
    }

    fn defer(&mut self, frame: Frame) -> PushOutcome {
        let frame = match self.backlog.push(frame) {
            Ok(()) => {
                self.counters.record_deferred();
                trace!(backlog = self.backlog.len(), "record deferred");
                return PushOutcome::Deferred;
            }
            Err(frame) => frame,
        };

        let incoming = priority(&frame);
        let victim = self
            .backlog
            .iter()
            .enumerate()
            .filter(|(_, f)| priority(f) <= incoming)
            .min_by_key(|(i, f)| (priority(f), *i))
            .map(|(i, _)| i);

        self.counters.record_dropped();
        match victim {
            Some(index) => {
                let evicted = self.backlog.remove(index);
                warn!(marker = evicted.marker(), "channel full, oldest record dropped");
                // A slot was just freed.
                let _ = self.backlog.push(frame);
                PushOutcome::DroppedOldest
            }
            None => {
                warn!(marker = frame.marker(), "channel full, record dropped");
                PushOutcome::Dropped
            }
        }
    }

    /// Move as much of the backlog into the mailbox as fits, oldest first.
    pub fn flush(&mut self) -> usize {
        let mut moved = 0;
        while let Some(frame) = self.backlog.first().cloned() {
            if self.mailbox.queue.push(frame).is_err() {
                break;
            }
            self.backlog.remove(0);
            moved += 1;
        }
        moved
    }

    #[inline]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: u32,
    pub rejected: u32,
}

/// Consumer end.
#[derive(Debug)]
pub struct ChannelRx<'a> {
    mailbox: &'a Mailbox,
}

impl ChannelRx<'_> {
    /// Apply every frame currently queued, in order, to `device`.
    ///
    /// SystemChange records are also handed to `on_change`; Boot changes are
    /// only ever handled there. Refused records are counted in
    /// `device.counters` and skipped.
    pub fn drain(
        &mut self,
        device: &DeviceState,
        mut on_change: impl FnMut(SystemChange),
    ) -> DrainReport {
        let mut report = DrainReport::default();
        for _ in 0..self.mailbox.capacity() {
            let Some(frame) = self.mailbox.queue.pop() else {
                break;
            };
            match apply_frame(&frame, device) {
                Ok(applied) => {
                    report.applied += 1;
                    device.counters.record_applied();
                    if let Applied::Change(change) = applied {
                        on_change(change);
                    }
                }
                Err(e) => {
                    report.rejected += 1;
                    device.counters.record_error(&e);
                    warn!(marker = frame.marker(), error = %e, "inbound record refused");
                }
            }
        }
        report
    }

    /// Pop without applying.
    pub fn recv(&mut self) -> Option<Frame> {
        self.mailbox.queue.pop()
    }
}
