use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Period {
    /// Next run is due `period` after the previous run was due.
    FixedRate(Duration),
    /// Next run is due `delay` after the previous run finished.
    FixedDelay(Duration),
}

pub(crate) enum Job {
    Once(Box<dyn FnOnce() + Send + 'static>),
    Repeating {
        body: Box<dyn FnMut() + Send + 'static>,
        period: Period,
    },
}

impl Job {
    pub fn is_periodic(&self) -> bool {
        matches!(self, Job::Repeating { .. })
    }
}

/// Status shared between a scheduled job and its handle.
#[derive(Debug, Default)]
pub(crate) struct JobStatus {
    pub cancelled: AtomicBool,
    pub done: AtomicBool,
    pub failed: AtomicBool,
    pub runs: AtomicU64,
}

pub(crate) struct ScheduledEntry {
    pub due: Instant,
    pub seq: u64,
    pub job: Job,
    pub status: std::sync::Arc<JobStatus>,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    // max-heap: the earliest due time, then the lowest sequence, is greatest
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Jobs ordered by due time; ties keep submission order.
#[derive(Default)]
pub(crate) struct DelayQueue {
    heap: BinaryHeap<ScheduledEntry>,
    next_seq: u64,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due: Instant, job: Job, status: std::sync::Arc<JobStatus>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEntry {
            due,
            seq,
            job,
            status,
        });
    }

    pub fn peek_due(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.due)
    }

    /// Pops the head if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<ScheduledEntry> {
        if self.heap.peek()?.due <= now {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Keeps only the entries for which `keep` returns true, returning the
    /// ones removed.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<ScheduledEntry>
    where
        F: FnMut(&ScheduledEntry) -> bool,
    {
        let (kept, removed): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.heap).into_iter().partition(|e| keep(e));
        self.heap = kept.into();
        removed
    }

    pub fn drain(&mut self) -> Vec<ScheduledEntry> {
        std::mem::take(&mut self.heap).into_vec()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
