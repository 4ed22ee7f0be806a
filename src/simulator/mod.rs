//! Discrete-event spiking network executor.
//!
//! The simulator is independent of genotypes: it knows neurons, synapses and
//! pulses. It is generic over the signal type ([`SignalValue`]) and the clock
//! type ([`TickTime`]) so that compact networks can run on `f32`/`u32` while
//! the evolution loop uses `f64`/`u64`.
//!
//! ## Arena layout
//!
//! Neurons live in a `SlotMap` owned by the [`Network`]. Synapses and pulses
//! refer to neurons by [`NeuronKey`], never by reference, so the neuron storage
//! can grow without invalidating anything.

pub mod network;
pub mod neuron;
pub mod pulse;
pub mod synapse;

use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

use slotmap::new_key_type;

pub use network::{Network, NetworkStats, NodeCallback};
pub use neuron::{Neuron, NeuronParams};
pub use pulse::{Pulse, PulseQueue};
pub use synapse::Synapse;

new_key_type! {
    /// Handle to a neuron inside a [`Network`].
    pub struct NeuronKey;
}

/// Numeric type carried by pulses and accumulated by neurons.
pub trait SignalValue:
    Copy
    + Default
    + PartialOrd
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Mul<Output = Self>
{
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl SignalValue for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl SignalValue for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Integer clock used for tick counts, delays and refractory countdowns.
pub trait TickTime:
    Copy + Default + Ord + Debug + Send + Sync + 'static + Add<Output = Self> + Sub<Output = Self>
{
    const ZERO: Self;
    const ONE: Self;

    fn from_u32(value: u32) -> Self;
    fn to_u64(self) -> u64;
    /// `None` when the sum does not fit the clock.
    fn checked_add(self, rhs: Self) -> Option<Self>;
    fn saturating_add(self, rhs: Self) -> Self;
}

macro_rules! impl_tick_time {
    ($($t:ty),*) => {
        $(
            impl TickTime for $t {
                const ZERO: Self = 0;
                const ONE: Self = 1;

                #[inline]
                fn from_u32(value: u32) -> Self {
                    // saturate rather than wrap for narrow clocks
                    <$t>::try_from(value).unwrap_or(<$t>::MAX)
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn checked_add(self, rhs: Self) -> Option<Self> {
                    <$t>::checked_add(self, rhs)
                }

                #[inline]
                fn saturating_add(self, rhs: Self) -> Self {
                    <$t>::saturating_add(self, rhs)
                }
            }
        )*
    };
}

impl_tick_time!(u16, u32, u64, usize);
