//! Wrapping sequence numbers for ordering and loss detection.
//!
//! Sequence numbers are `u32` and wrap at 2^32. Two numbers are compared by
//! their wrapping distance: `a` is newer than `b` when `a - b` (mod 2^32) is
//! in the lower half of the range.

use tracing::debug;

const HALF_RANGE: u32 = 1 << 31;

/// Whether `a` was issued after `b`, accounting for wrap-around.
pub fn sequence_newer(a: u32, b: u32) -> bool {
    let diff = a.wrapping_sub(b);
    diff != 0 && diff < HALF_RANGE
}

/// Sender-side counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Return the current number and advance, wrapping after `u32::MAX`.
    pub fn next_sequence(&mut self) -> u32 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }

    /// The number the next call to [`next_sequence`](Self::next_sequence)
    /// returns.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

/// How an incoming sequence number relates to what was seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// The first packet observed.
    First,
    /// Exactly one after the latest.
    InOrder,
    /// Newer than the latest, with `lost` numbers skipped in between.
    Gap { lost: u32 },
    /// Equal to or older than the latest; callers usually drop these.
    Stale,
}

/// Receiver-side view of one sender's sequence stream.
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    latest: Option<u32>,
    received: u64,
    lost: u64,
    stale: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `seq` and, if it is newer, make it the latest.
    pub fn observe(&mut self, seq: u32) -> SequenceStatus {
        let status = match self.latest {
            None => SequenceStatus::First,
            Some(latest) if !sequence_newer(seq, latest) => SequenceStatus::Stale,
            Some(latest) => match seq.wrapping_sub(latest) {
                1 => SequenceStatus::InOrder,
                diff => SequenceStatus::Gap { lost: diff - 1 },
            },
        };

        match status {
            SequenceStatus::Stale => {
                self.stale += 1;
                return status;
            }
            SequenceStatus::Gap { lost } => {
                debug!(seq, lost, "sequence gap");
                self.lost += u64::from(lost);
            }
            SequenceStatus::First | SequenceStatus::InOrder => {}
        }
        self.latest = Some(seq);
        self.received += 1;
        status
    }

    /// Newest sequence number accepted so far.
    pub fn latest(&self) -> Option<u32> {
        self.latest
    }

    /// Packets accepted as new.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Sequence numbers skipped over by gaps. A late packet filling a gap
    /// is reported `Stale` and does not reduce this.
    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn stale(&self) -> u64 {
        self.stale
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
