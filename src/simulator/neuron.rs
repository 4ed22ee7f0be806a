//! Spiking neuron with a firing window and activity-dependent refractoriness.

use super::{SignalValue, TickTime};

/// Static parameters of a neuron, taken from its node gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuronParams<V, T> {
    pub threshold_min: V,
    pub threshold_max: V,
    /// Fraction of the stored value lost per tick.
    pub value_decay: f64,
    /// Smoothing rate of the activation-percentage estimate.
    pub activ_decay: f64,
    /// Refractory ticks when the neuron has been quiet.
    pub pulse_fast: T,
    /// Refractory ticks when the neuron fires every tick.
    pub pulse_slow: T,
}

impl<V: SignalValue, T: TickTime> NeuronParams<V, T> {
    /// Put inverted ranges in order and clamp the rates to `[0, 1]`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.threshold_min > self.threshold_max {
            std::mem::swap(&mut self.threshold_min, &mut self.threshold_max);
        }
        if self.pulse_fast > self.pulse_slow {
            std::mem::swap(&mut self.pulse_fast, &mut self.pulse_slow);
        }
        self.value_decay = self.value_decay.clamp(0.0, 1.0);
        self.activ_decay = self.activ_decay.clamp(0.0, 1.0);
        self
    }
}

/// Runtime state of one neuron.
#[derive(Debug, Clone)]
pub struct Neuron<V, T> {
    params: NeuronParams<V, T>,
    value: V,
    /// Sum of pulses delivered this tick, consumed by [`Neuron::tick`].
    incoming: V,
    /// External drive added every tick (input neurons).
    drive: V,
    refractory: T,
    activations: u64,
    activation_pct: f64,
    /// Indices of outgoing synapses in the owning network.
    pub(crate) outgoing: Vec<usize>,
}

impl<V: SignalValue, T: TickTime> Neuron<V, T> {
    #[must_use]
    pub fn new(params: NeuronParams<V, T>) -> Self {
        Self {
            params: params.normalized(),
            value: V::default(),
            incoming: V::default(),
            drive: V::default(),
            refractory: T::ZERO,
            activations: 0,
            activation_pct: 0.0,
            outgoing: Vec::new(),
        }
    }

    #[must_use]
    pub fn params(&self) -> &NeuronParams<V, T> {
        &self.params
    }

    #[must_use]
    pub fn value(&self) -> V {
        self.value
    }

    #[must_use]
    pub fn refractory(&self) -> T {
        self.refractory
    }

    /// Number of times this neuron has fired.
    #[must_use]
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Running estimate of the fraction of ticks on which this neuron fires.
    #[must_use]
    pub fn activation_pct(&self) -> f64 {
        self.activation_pct
    }

    #[must_use]
    pub fn outgoing(&self) -> &[usize] {
        &self.outgoing
    }

    /// Accumulate a delivered pulse.
    #[inline]
    pub fn receive(&mut self, value: V) {
        self.incoming = self.incoming + value;
    }

    /// Set the external drive applied on every tick.
    #[inline]
    pub fn set_drive(&mut self, value: V) {
        self.drive = value;
    }

    /// Refractory duration chosen after a firing: interpolates from
    /// `pulse_fast` towards `pulse_slow` as the activation percentage rises.
    #[must_use]
    pub fn refractory_period(&self) -> T {
        let fast = self.params.pulse_fast;
        let span = (self.params.pulse_slow - fast).to_u64() as f64;
        let extra = (span * self.activation_pct.clamp(0.0, 1.0)).round();
        fast.saturating_add(T::from_u32(extra as u32))
    }

    /// Advance one tick. Returns the value carried by the spike if the neuron fires.
    ///
    /// Pulses for this tick must already have been delivered with
    /// [`Neuron::receive`].
    pub fn tick(&mut self) -> Option<V> {
        let incoming = std::mem::take(&mut self.incoming) + self.drive;
        self.value = V::from_f64(self.value.to_f64() * (1.0 - self.params.value_decay));

        if self.refractory > T::ZERO {
            self.refractory = self.refractory - T::ONE;
            return None;
        }

        self.value = self.value + incoming;
        let fired =
            self.value >= self.params.threshold_min && self.value <= self.params.threshold_max;

        let rate = self.params.activ_decay;
        self.activation_pct = self.activation_pct * (1.0 - rate) + if fired { rate } else { 0.0 };

        if !fired {
            return None;
        }

        self.activations += 1;
        self.refractory = self.refractory_period();
        Some(std::mem::take(&mut self.value))
    }

    /// Clear all dynamic state, keeping parameters and wiring.
    pub fn reset(&mut self) {
        self.value = V::default();
        self.incoming = V::default();
        self.drive = V::default();
        self.refractory = T::ZERO;
        self.activations = 0;
        self.activation_pct = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min: f64, max: f64, fast: u64, slow: u64) -> NeuronParams<f64, u64> {
        NeuronParams {
            threshold_min: min,
            threshold_max: max,
            value_decay: 0.0,
            activ_decay: 0.5,
            pulse_fast: fast,
            pulse_slow: slow,
        }
    }

    #[test]
    fn test_fires_inside_window_only() {
        let mut neuron = Neuron::new(params(1.0, 2.0, 0, 0));

        neuron.receive(0.5);
        assert!(neuron.tick().is_none());

        neuron.receive(0.75);
        let spike = neuron.tick().expect("1.25 is inside [1, 2]");
        assert!((spike - 1.25).abs() < 1e-12);
        assert_eq!(neuron.value(), 0.0, "value resets after firing");

        neuron.receive(5.0);
        assert!(neuron.tick().is_none(), "above the window does not fire");
        assert_eq!(neuron.activations(), 1);
    }

    #[test]
    fn test_refractory_skips_and_discards_input() {
        let mut neuron = Neuron::new(params(1.0, 10.0, 2, 2));

        neuron.receive(1.0);
        assert!(neuron.tick().is_some());
        assert_eq!(neuron.refractory(), 2);

        neuron.receive(5.0);
        assert!(neuron.tick().is_none());
        neuron.receive(5.0);
        assert!(neuron.tick().is_none());
        assert_eq!(neuron.refractory(), 0);
        assert_eq!(neuron.value(), 0.0, "input during refractory is dropped");

        neuron.receive(1.0);
        assert!(neuron.tick().is_some());
    }

    #[test]
    fn test_busy_neuron_gets_slower() {
        let mut neuron = Neuron::new(params(1.0, 10.0, 1, 9));
        let quiet = neuron.refractory_period();

        neuron.set_drive(1.0);
        for _ in 0..50 {
            neuron.tick();
        }
        assert!(neuron.activation_pct() > 0.0);
        assert!(neuron.refractory_period() > quiet);
        assert!(neuron.refractory_period() <= 9);
    }

    #[test]
    fn test_value_decays() {
        let mut p = params(100.0, 200.0, 0, 0);
        p.value_decay = 0.5;
        let mut neuron = Neuron::new(p);
        neuron.receive(8.0);
        neuron.tick();
        assert!((neuron.value() - 8.0).abs() < 1e-12);
        neuron.tick();
        assert!((neuron.value() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalization_swaps_inverted_ranges() {
        let neuron = Neuron::new(params(3.0, 1.0, 7, 2));
        assert_eq!(neuron.params().threshold_min, 1.0);
        assert_eq!(neuron.params().threshold_max, 3.0);
        assert_eq!(neuron.params().pulse_fast, 2);
        assert_eq!(neuron.params().pulse_slow, 7);
    }
}
