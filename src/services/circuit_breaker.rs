//! Circuit breaker capping early unlocks per wave.
//!
//! Each wave gets its own circuit. Every early unlock of a task in that wave
//! is recorded; once the limit is reached the circuit opens and the wave
//! falls back to its normal gate for the rest of the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a wave's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Early unlocks are allowed.
    #[default]
    Closed,
    /// The limit was reached, no more early unlocks.
    Open,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct WaveCircuit {
    unlocks: usize,
    state: CircuitState,
}

/// Per-wave early unlock limiter.
#[derive(Debug, Clone)]
pub struct EarlyUnlockBreaker {
    max_unlocks_per_wave: usize,
    circuits: HashMap<usize, WaveCircuit>,
}

impl EarlyUnlockBreaker {
    pub fn new(max_unlocks_per_wave: usize) -> Self {
        Self {
            max_unlocks_per_wave,
            circuits: HashMap::new(),
        }
    }

    /// Check if the circuit of `wave` allows another early unlock.
    pub fn allows(&self, wave: usize) -> bool {
        self.max_unlocks_per_wave > 0 && self.state(wave) == CircuitState::Closed
    }

    /// Record an early unlock in `wave`, returning the resulting state.
    pub fn record_unlock(&mut self, wave: usize) -> CircuitState {
        let limit = self.max_unlocks_per_wave;
        let circuit = self.circuits.entry(wave).or_default();
        circuit.unlocks += 1;

        if circuit.state == CircuitState::Closed && circuit.unlocks >= limit {
            circuit.state = CircuitState::Open;
            tracing::info!(
                wave,
                unlocks = circuit.unlocks,
                limit,
                "early unlock circuit opened"
            );
        }
        circuit.state
    }

    pub fn state(&self, wave: usize) -> CircuitState {
        self.circuits
            .get(&wave)
            .map_or(CircuitState::Closed, |c| c.state)
    }

    pub fn unlock_count(&self, wave: usize) -> usize {
        self.circuits.get(&wave).map_or(0, |c| c.unlocks)
    }

    /// Total early unlocks across all waves.
    pub fn total_unlocks(&self) -> usize {
        self.circuits.values().map(|c| c.unlocks).sum()
    }
}

impl Default for EarlyUnlockBreaker {
    fn default() -> Self {
        Self::new(3)
    }
}
