//! Dispatch Queue
//!
//! Holds actions scheduled with `dispatch` or `dispatch_later` until they are
//! due. Entries come out in `(due, sequence)` order, so two actions due at
//! the same instant run in the order they were scheduled.
//!
//! The queue never runs anything itself. The engine drains it a tick at a
//! time: a tick takes only the entries that were already queued when it
//! started, which keeps an action that schedules itself from starving
//! everything else.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tokio::time::Instant;

use super::action::Action;
use crate::error::{EngineError, Result};

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    action: Action,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Pending scheduled dispatches.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
    capacity: Option<usize>,
}

impl DispatchQueue {
    /// A queue holding at most `capacity` entries (`None` for unbounded).
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            capacity,
        }
    }

    /// Schedule `action` to become due at `due`.
    pub fn push(&mut self, action: Action, due: Instant) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.heap.len() >= capacity {
                return Err(EngineError::QueueFull(self.heap.len()));
            }
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { due, seq, action }));
        Ok(())
    }

    /// Sequence number the next pushed entry will get. Entries pushed from
    /// now on compare greater than or equal to it.
    pub fn mark(&self) -> u64 {
        self.next_seq
    }

    /// Take the earliest entry if it is due at `now` and was queued before
    /// `mark`.
    pub fn pop_due(&mut self, now: Instant, mark: u64) -> Option<Action> {
        let Reverse(next) = self.heap.peek()?;
        if next.due > now || next.seq >= mark {
            return None;
        }
        self.heap.pop().map(|Reverse(entry)| entry.action)
    }

    /// When the earliest entry becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pops_in_due_then_schedule_order() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(None);
        queue.push(Action::new("late"), now + Duration::from_millis(5)).unwrap();
        queue.push(Action::new("first"), now).unwrap();
        queue.push(Action::new("second"), now).unwrap();

        let mark = queue.mark();
        let later = now + Duration::from_millis(10);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_due(later, mark))
            .map(|action| action.id().to_string())
            .collect();
        assert_eq!(order, vec!["first", "second", "late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn entries_not_yet_due_stay_queued() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(None);
        let due = now + Duration::from_millis(100);
        queue.push(Action::new("wait"), due).unwrap();

        assert!(queue.pop_due(now, queue.mark()).is_none());
        assert_eq!(queue.next_due(), Some(due));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn entries_after_the_mark_wait_for_the_next_tick() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(None);
        let mark = queue.mark();
        queue.push(Action::new("again"), now).unwrap();

        assert!(queue.pop_due(now, mark).is_none());
        assert!(queue.pop_due(now, queue.mark()).is_some());
    }

    #[test]
    fn capacity_is_enforced() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(Some(1));
        queue.push(Action::new("a"), now).unwrap();
        let err = queue.push(Action::new("b"), now).unwrap_err();
        assert_eq!(err, EngineError::QueueFull(1));
    }
}
