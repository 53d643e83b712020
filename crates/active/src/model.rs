//! Generative model: how states evolve under actions and what they emit.
//!
//! The agent only needs two conditional probabilities:
//! - `P(s' | s, a)`: [`TransitionModel`]
//! - `P(o | s)`: [`ObservationModel`]
//!
//! Both are implemented for plain closures and for sparse lookup tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transition model P(next | current, action).
pub trait TransitionModel: Send + Sync {
    /// Probability of moving to `next` from `current` under `action`.
    fn probability(&self, next: &str, current: &str, action: &str) -> f64;
}

impl<F> TransitionModel for F
where
    F: Fn(&str, &str, &str) -> f64 + Send + Sync,
{
    fn probability(&self, next: &str, current: &str, action: &str) -> f64 {
        self(next, current, action)
    }
}

/// Observation model P(observation | state).
pub trait ObservationModel: Send + Sync {
    /// Likelihood of `observation` in `state`.
    fn likelihood(&self, observation: &str, state: &str) -> f64;
}

impl<F> ObservationModel for F
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn likelihood(&self, observation: &str, state: &str) -> f64 {
        self(observation, state)
    }
}

/// Sparse transition table; missing entries have probability zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionTable {
    /// action → current → next → probability
    entries: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
}

impl TransitionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set P(next | current, action).
    pub fn set(&mut self, action: &str, current: &str, next: &str, p: f64) {
        self.entries
            .entry(action.to_string())
            .or_default()
            .entry(current.to_string())
            .or_default()
            .insert(next.to_string(), p);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, action: &str, current: &str, next: &str, p: f64) -> Self {
        self.set(action, current, next, p);
        self
    }

    /// `action` moves every listed state to `target` with certainty.
    pub fn with_move_to(mut self, action: &str, states: &[&str], target: &str) -> Self {
        for &s in states {
            self.set(action, s, target, 1.0);
        }
        self
    }

    /// `action` leaves every listed state where it is.
    pub fn with_stay(mut self, action: &str, states: &[&str]) -> Self {
        for &s in states {
            self.set(action, s, s, 1.0);
        }
        self
    }
}

impl TransitionModel for TransitionTable {
    fn probability(&self, next: &str, current: &str, action: &str) -> f64 {
        self.entries
            .get(action)
            .and_then(|by_current| by_current.get(current))
            .and_then(|by_next| by_next.get(next))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Sparse observation table; missing entries have likelihood zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    /// state → observation → likelihood
    entries: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ObservationTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set P(observation | state).
    pub fn set(&mut self, state: &str, observation: &str, p: f64) {
        self.entries
            .entry(state.to_string())
            .or_default()
            .insert(observation.to_string(), p);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, state: &str, observation: &str, p: f64) -> Self {
        self.set(state, observation, p);
        self
    }
}

impl ObservationModel for ObservationTable {
    fn likelihood(&self, observation: &str, state: &str) -> f64 {
        self.entries
            .get(state)
            .and_then(|by_obs| by_obs.get(observation))
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_models() {
        let stay = |next: &str, current: &str, _action: &str| {
            if next == current {
                1.0
            } else {
                0.0
            }
        };
        assert_eq!(stay.probability("a", "a", "wait"), 1.0);
        assert_eq!(stay.probability("b", "a", "wait"), 0.0);

        let noisy = |obs: &str, state: &str| if obs == state { 0.9 } else { 0.1 };
        assert_eq!(noisy.likelihood("a", "a"), 0.9);
    }

    #[test]
    fn test_transition_table() {
        let table = TransitionTable::new()
            .with_stay("wait", &["left", "right"])
            .with_move_to("go_left", &["left", "right"], "left")
            .with("flip", "left", "right", 0.5)
            .with("flip", "left", "left", 0.5);

        assert_eq!(table.probability("right", "right", "wait"), 1.0);
        assert_eq!(table.probability("left", "right", "go_left"), 1.0);
        assert_eq!(table.probability("right", "left", "flip"), 0.5);
        assert_eq!(table.probability("left", "right", "flip"), 0.0);
        assert_eq!(table.probability("left", "left", "jump"), 0.0);
    }

    #[test]
    fn test_observation_table_serde() {
        let table = ObservationTable::new()
            .with("left", "see_left", 0.8)
            .with("left", "see_right", 0.2);
        assert_eq!(table.likelihood("see_left", "left"), 0.8);
        assert_eq!(table.likelihood("see_left", "right"), 0.0);

        let json = serde_json::to_string(&table).unwrap();
        let back: ObservationTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
