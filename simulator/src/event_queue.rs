//! Time-stamped event queue with deterministic tie-breaking.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::environment::MachineIndex;
use crate::trace::TaskIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    TaskSubmitted { task: TaskIndex },
    TaskReady { task: TaskIndex },
    TaskStarted { task: TaskIndex, machine: MachineIndex },
    TaskCompleted { task: TaskIndex, machine: MachineIndex },
    ScheduleTick,
}

impl Event {
    /// Tie-breaking priority within one tick: completions free resources
    /// before new work is admitted and promoted, the scheduling pass runs
    /// after all state has settled, and the start records it emits come last.
    fn priority(&self) -> u8 {
        match self {
            Event::TaskCompleted { .. } => 0,
            Event::TaskSubmitted { .. } => 1,
            Event::TaskReady { .. } => 2,
            Event::ScheduleTick => 3,
            Event::TaskStarted { .. } => 4,
        }
    }
}

#[derive(Debug)]
struct QueuedEvent {
    time: u64,
    seq: u64,
    event: Event,
}

impl QueuedEvent {
    fn key(&self) -> (u64, u8, u64) {
        (self.time, self.event.priority(), self.seq)
    }
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the std max-heap pops the smallest key first.
        other.key().cmp(&self.key())
    }
}

/// Min-heap of events keyed by `(timestamp, variant priority, seq)`, where
/// `seq` is assigned at push time. Two runs that push the same events in the
/// same order pop them in the same order.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    next_seq: u64,
    pushed: u64,
}

impl EventQueue {
    pub fn new() -> EventQueue {
        EventQueue::default()
    }

    pub fn push(&mut self, time: u64, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pushed += 1;
        self.heap.push(QueuedEvent { time, seq, event });
    }

    pub fn pop(&mut self) -> Option<(u64, Event)> {
        self.heap.pop().map(|q| (q.time, q.event))
    }

    pub fn peek(&self) -> Option<(u64, &Event)> {
        self.heap.peek().map(|q| (q.time, &q.event))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Total number of events pushed over the queue's lifetime.
    pub fn event_count(&self) -> u64 {
        self.pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_timestamp_order() {
        let mut queue = EventQueue::new();
        queue.push(30, Event::ScheduleTick);
        queue.push(10, Event::TaskSubmitted { task: 0 });
        queue.push(20, Event::TaskReady { task: 0 });

        assert_eq!(queue.peek(), Some((10, &Event::TaskSubmitted { task: 0 })));
        assert_eq!(queue.pop(), Some((10, Event::TaskSubmitted { task: 0 })));
        assert_eq!(queue.pop(), Some((20, Event::TaskReady { task: 0 })));
        assert_eq!(queue.pop(), Some((30, Event::ScheduleTick)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn same_tick_completion_precedes_everything() {
        let mut queue = EventQueue::new();
        queue.push(5, Event::TaskStarted { task: 1, machine: 0 });
        queue.push(5, Event::ScheduleTick);
        queue.push(5, Event::TaskReady { task: 2 });
        queue.push(5, Event::TaskSubmitted { task: 3 });
        queue.push(5, Event::TaskCompleted { task: 0, machine: 0 });

        assert_eq!(queue.pop(), Some((5, Event::TaskCompleted { task: 0, machine: 0 })));
        assert_eq!(queue.pop(), Some((5, Event::TaskSubmitted { task: 3 })));
        assert_eq!(queue.pop(), Some((5, Event::TaskReady { task: 2 })));
        assert_eq!(queue.pop(), Some((5, Event::ScheduleTick)));
        assert_eq!(queue.pop(), Some((5, Event::TaskStarted { task: 1, machine: 0 })));
    }

    #[test]
    fn insertion_order_breaks_ties_within_a_variant() {
        let mut queue = EventQueue::new();
        queue.push(0, Event::TaskSubmitted { task: 2 });
        queue.push(0, Event::TaskSubmitted { task: 0 });
        queue.push(0, Event::TaskSubmitted { task: 1 });

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|(_, e)| match e {
                Event::TaskSubmitted { task } => task,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn event_count_tracks_lifetime_pushes() {
        let mut queue = EventQueue::new();
        queue.push(0, Event::ScheduleTick);
        queue.push(1, Event::ScheduleTick);
        queue.pop();
        assert_eq!(queue.event_count(), 2);
        assert_eq!(queue.len(), 1);
    }
}
