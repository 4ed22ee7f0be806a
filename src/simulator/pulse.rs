//! Pulses in flight and the queue that orders them by arrival time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::{NeuronKey, SignalValue, TickTime};

/// A signal travelling along a synapse.
#[derive(Debug, Clone, Copy)]
pub struct Pulse<V, T> {
    /// Tick at which the pulse is delivered.
    pub arrival: T,
    /// Value added to the destination neuron.
    pub value: V,
    /// Receiving neuron.
    pub destination: NeuronKey,
    /// Insertion order, used to break ties between equal arrival times.
    sequence: u64,
}

impl<V, T: Ord> PartialEq for Pulse<V, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V, T: Ord> Eq for Pulse<V, T> {}

impl<V, T: Ord> PartialOrd for Pulse<V, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V, T: Ord> Ord for Pulse<V, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.arrival
            .cmp(&other.arrival)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Min-priority queue of pulses keyed by arrival time.
///
/// Pulses with equal arrival times come out in insertion order, so a fixed
/// input sequence always drains identically.
#[derive(Debug, Clone)]
pub struct PulseQueue<V, T> {
    heap: BinaryHeap<Reverse<Pulse<V, T>>>,
    next_sequence: u64,
}

impl<V, T: Ord> Default for PulseQueue<V, T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }
}

impl<V: SignalValue, T: TickTime> PulseQueue<V, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a pulse.
    pub fn push(&mut self, arrival: T, value: V, destination: NeuronKey) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(Pulse {
            arrival,
            value,
            destination,
            sequence,
        }));
    }

    /// Remove and return the earliest pulse if it is due at or before `now`.
    pub fn pop_due(&mut self, now: T) -> Option<Pulse<V, T>> {
        match self.heap.peek() {
            Some(Reverse(pulse)) if pulse.arrival <= now => self.heap.pop().map(|Reverse(p)| p),
            _ => None,
        }
    }

    /// Arrival time of the earliest pending pulse.
    #[must_use]
    pub fn next_arrival(&self) -> Option<T> {
        self.heap.peek().map(|Reverse(p)| p.arrival)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<NeuronKey> {
        let mut map: SlotMap<NeuronKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_pulses_drain_in_time_order() {
        let k = keys(3);
        let mut queue: PulseQueue<f64, u64> = PulseQueue::new();
        queue.push(5, 1.0, k[0]);
        queue.push(2, 2.0, k[1]);
        queue.push(9, 3.0, k[2]);

        assert_eq!(queue.next_arrival(), Some(2));
        assert!(queue.pop_due(1).is_none());

        let first = queue.pop_due(5).expect("pulse due at 2");
        assert_eq!(first.arrival, 2);
        let second = queue.pop_due(5).expect("pulse due at 5");
        assert_eq!(second.arrival, 5);
        assert!(queue.pop_due(5).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_equal_arrivals_are_fifo() {
        let k = keys(4);
        let mut queue: PulseQueue<f32, u32> = PulseQueue::new();
        for (i, key) in k.iter().enumerate() {
            queue.push(3, i as f32, *key);
        }

        let drained: Vec<NeuronKey> = std::iter::from_fn(|| queue.pop_due(3))
            .map(|p| p.destination)
            .collect();
        assert_eq!(drained, k);
        assert!(queue.is_empty());
    }
}
