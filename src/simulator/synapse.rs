use super::{NeuronKey, SignalValue, TickTime};

/// Directed link between two neurons with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synapse<V, T> {
    pub source: NeuronKey,
    pub destination: NeuronKey,
    pub weight: V,
    /// Ticks between the source firing and delivery; at least one.
    pub length: T,
}

impl<V: SignalValue, T: TickTime> Synapse<V, T> {
    #[must_use]
    pub fn new(source: NeuronKey, destination: NeuronKey, weight: V, length: T) -> Self {
        Self {
            source,
            destination,
            weight,
            length: length.max(T::ONE),
        }
    }

    /// Value delivered when the source fires with `value`.
    #[inline]
    #[must_use]
    pub fn transmit(&self, value: V) -> V {
        value * self.weight
    }
}
