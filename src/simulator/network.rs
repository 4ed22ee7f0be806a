//! Network driver: owns neurons, synapses and the pulse queue.

use std::fmt;

use slotmap::{SecondaryMap, SlotMap};
use tracing::trace;

use super::{Neuron, NeuronKey, NeuronParams, PulseQueue, SignalValue, Synapse, TickTime};

/// Observer invoked whenever a particular neuron fires.
pub trait NodeCallback<V, T>: Send {
    fn on_fire(&mut self, time: T, value: V);
}

impl<V, T, F> NodeCallback<V, T> for F
where
    F: FnMut(T, V) + Send,
{
    fn on_fire(&mut self, time: T, value: V) {
        self(time, value);
    }
}

/// Counters accumulated since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub ticks: u64,
    pub pulses_sent: u64,
    pub pulses_delivered: u64,
    /// Pulses whose arrival time would overflow the clock.
    pub pulses_dropped: u64,
    pub firings: u64,
}

/// A discrete-event spiking network.
///
/// Each call to [`Network::tick`]:
/// 1. advances the clock by one,
/// 2. delivers every pulse due at the new time,
/// 3. ticks every neuron once,
/// 4. schedules outgoing pulses for the neurons that fired.
///
/// Because delivery happens before any firing decision and new pulses always
/// arrive at least one tick later, the order in which neurons are visited
/// never changes the outcome of a tick.
pub struct Network<V, T> {
    neurons: SlotMap<NeuronKey, Neuron<V, T>>,
    synapses: Vec<Synapse<V, T>>,
    queue: PulseQueue<V, T>,
    callbacks: SecondaryMap<NeuronKey, Box<dyn NodeCallback<V, T>>>,
    fired: Vec<(NeuronKey, V)>,
    time: T,
    stats: NetworkStats,
}

impl<V: SignalValue, T: TickTime> Default for Network<V, T> {
    fn default() -> Self {
        Self {
            neurons: SlotMap::with_key(),
            synapses: Vec::new(),
            queue: PulseQueue::new(),
            callbacks: SecondaryMap::new(),
            fired: Vec::new(),
            time: T::ZERO,
            stats: NetworkStats::default(),
        }
    }
}

impl<V: SignalValue, T: TickTime> fmt::Debug for Network<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("neurons", &self.neurons.len())
            .field("synapses", &self.synapses.len())
            .field("pending_pulses", &self.queue.len())
            .field("time", &self.time)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<V: SignalValue, T: TickTime> Network<V, T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_neuron(&mut self, params: NeuronParams<V, T>) -> NeuronKey {
        self.neurons.insert(Neuron::new(params))
    }

    /// Add a synapse and return its index.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint is not a neuron of this network.
    pub fn connect(
        &mut self,
        source: NeuronKey,
        destination: NeuronKey,
        weight: V,
        length: T,
    ) -> usize {
        assert!(
            self.neurons.contains_key(source),
            "synapse source is not part of this network"
        );
        assert!(
            self.neurons.contains_key(destination),
            "synapse destination is not part of this network"
        );
        let index = self.synapses.len();
        self.neurons[source].outgoing.push(index);
        self.synapses
            .push(Synapse::new(source, destination, weight, length));
        index
    }

    /// Register an observer for a neuron's firings, replacing any previous one.
    pub fn set_callback(&mut self, neuron: NeuronKey, callback: Box<dyn NodeCallback<V, T>>) {
        self.callbacks.insert(neuron, callback);
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }

    /// Set the drive of a neuron. Unknown keys are ignored.
    pub fn set_drive(&mut self, neuron: NeuronKey, value: V) {
        if let Some(n) = self.neurons.get_mut(neuron) {
            n.set_drive(value);
        }
    }

    /// Schedule an external pulse `delay` ticks from now.
    ///
    /// The pulse is dropped if its arrival time does not fit the clock.
    pub fn inject(&mut self, neuron: NeuronKey, value: V, delay: T) {
        schedule(
            &mut self.queue,
            &mut self.stats,
            self.time.checked_add(delay.max(T::ONE)),
            value,
            neuron,
        );
    }

    /// Advance the simulation by one tick and return the neurons that fired.
    pub fn tick(&mut self) -> &[(NeuronKey, V)] {
        self.time = self.time.saturating_add(T::ONE);
        self.stats.ticks += 1;

        while let Some(pulse) = self.queue.pop_due(self.time) {
            if let Some(neuron) = self.neurons.get_mut(pulse.destination) {
                neuron.receive(pulse.value);
                self.stats.pulses_delivered += 1;
            }
        }

        self.fired.clear();
        for (key, neuron) in &mut self.neurons {
            if let Some(value) = neuron.tick() {
                self.fired.push((key, value));
            }
        }

        for &(key, value) in &self.fired {
            for &index in &self.neurons[key].outgoing {
                let synapse = &self.synapses[index];
                schedule(
                    &mut self.queue,
                    &mut self.stats,
                    self.time.checked_add(synapse.length),
                    synapse.transmit(value),
                    synapse.destination,
                );
            }
            if let Some(callback) = self.callbacks.get_mut(key) {
                callback.on_fire(self.time, value);
            }
        }
        self.stats.firings += self.fired.len() as u64;

        trace!(
            time = self.time.to_u64(),
            fired = self.fired.len(),
            pending = self.queue.len(),
            "network tick"
        );
        &self.fired
    }

    /// Return to time zero with no pulses in flight, keeping the wiring.
    pub fn reset(&mut self) {
        self.time = T::ZERO;
        self.queue.clear();
        self.fired.clear();
        self.stats = NetworkStats::default();
        for (_, neuron) in &mut self.neurons {
            neuron.reset();
        }
    }

    #[must_use]
    pub fn time(&self) -> T {
        self.time
    }

    #[must_use]
    pub fn neuron(&self, key: NeuronKey) -> Option<&Neuron<V, T>> {
        self.neurons.get(key)
    }

    pub fn neurons(&self) -> impl Iterator<Item = (NeuronKey, &Neuron<V, T>)> {
        self.neurons.iter()
    }

    #[must_use]
    pub fn synapses(&self) -> &[Synapse<V, T>] {
        &self.synapses
    }

    #[must_use]
    pub fn num_neurons(&self) -> usize {
        self.neurons.len()
    }

    #[must_use]
    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    #[must_use]
    pub fn pending_pulses(&self) -> usize {
        self.queue.len()
    }

    /// Neurons that fired on the most recent tick.
    #[must_use]
    pub fn last_fired(&self) -> &[(NeuronKey, V)] {
        &self.fired
    }

    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        self.stats
    }
}

/// Queue a pulse, or count it as dropped when its arrival overflowed the clock.
fn schedule<V: SignalValue, T: TickTime>(
    queue: &mut PulseQueue<V, T>,
    stats: &mut NetworkStats,
    arrival: Option<T>,
    value: V,
    destination: NeuronKey,
) {
    match arrival {
        Some(arrival) => {
            queue.push(arrival, value, destination);
            stats.pulses_sent += 1;
        }
        None => stats.pulses_dropped += 1,
    }
}
