//! Categorical belief state over hidden states.
//!
//! Represents the agent's approximate posterior q(s) over a fixed, ordered set
//! of state names, along with the most recent observations.

use crate::error::ActiveError;
use cognitive_prob::{Distribution, ProbError};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Beliefs q(s) over named states.
///
/// Probabilities sum to 1 after [`normalize`](Self::normalize); setters may
/// leave the state unnormalized in between.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeliefState {
    states: Vec<String>,
    probs: Vec<f64>,
    observations: BTreeMap<String, f64>,
}

impl BeliefState {
    /// Uniform beliefs over `states`.
    ///
    /// # Errors
    ///
    /// [`ActiveError::EmptyStates`] or [`ActiveError::DuplicateName`].
    pub fn uniform<S: Into<String>>(states: Vec<S>) -> Result<Self, ActiveError> {
        let states = unique_names(states)?;
        if states.is_empty() {
            return Err(ActiveError::EmptyStates);
        }
        let n = states.len();
        Ok(Self {
            states,
            probs: vec![1.0 / n as f64; n],
            observations: BTreeMap::new(),
        })
    }

    /// All mass on `state`.
    pub fn point<S: Into<String>>(states: Vec<S>, state: &str) -> Result<Self, ActiveError> {
        let mut beliefs = Self::uniform(states)?;
        let i = beliefs.index_of(state)?;
        beliefs.probs.iter_mut().for_each(|p| *p = 0.0);
        beliefs.probs[i] = 1.0;
        Ok(beliefs)
    }

    /// State names, in order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Probabilities, parallel to [`states`](Self::states).
    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false: a belief state has at least one state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn index_of(&self, state: &str) -> Result<usize, ActiveError> {
        self.states
            .iter()
            .position(|s| s == state)
            .ok_or_else(|| ActiveError::UnknownState {
                name: state.to_string(),
            })
    }

    /// q(state).
    pub fn probability(&self, state: &str) -> Result<f64, ActiveError> {
        Ok(self.probs[self.index_of(state)?])
    }

    /// Overwrite q(state) without renormalizing.
    pub fn set_probability(&mut self, state: &str, p: f64) -> Result<(), ActiveError> {
        let i = self.index_of(state)?;
        if !p.is_finite() || p < 0.0 {
            return Err(ActiveError::InvalidProbability {
                name: state.to_string(),
                value: p,
            });
        }
        self.probs[i] = p;
        Ok(())
    }

    /// Replace every probability at once, then normalize.
    ///
    /// On error the beliefs are left untouched.
    pub fn set_probabilities(&mut self, probs: Vec<f64>) -> Result<(), ActiveError> {
        if probs.len() != self.states.len() {
            return Err(ActiveError::LengthMismatch {
                expected: self.states.len(),
                got: probs.len(),
            });
        }
        for (state, &p) in self.states.iter().zip(&probs) {
            if !p.is_finite() || p < 0.0 {
                return Err(ActiveError::InvalidProbability {
                    name: state.clone(),
                    value: p,
                });
            }
        }
        let sum: f64 = probs.iter().sum();
        if sum <= 0.0 {
            return Err(ActiveError::DegenerateBeliefs {
                context: "all probabilities are zero".into(),
            });
        }
        self.probs = probs.into_iter().map(|p| p / sum).collect();
        Ok(())
    }

    /// Rescale so the probabilities sum to 1.
    ///
    /// # Errors
    ///
    /// [`ActiveError::DegenerateBeliefs`] if every probability is zero.
    pub fn normalize(&mut self) -> Result<(), ActiveError> {
        let sum: f64 = self.probs.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(ActiveError::DegenerateBeliefs {
                context: format!("cannot normalize beliefs with total mass {}", sum),
            });
        }
        for p in &mut self.probs {
            *p /= sum;
        }
        Ok(())
    }

    /// Shannon entropy in nats: H = -Σ q(s) ln q(s).
    pub fn entropy(&self) -> f64 {
        -self
            .probs
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| p * p.ln())
            .sum::<f64>()
    }

    /// Shannon entropy in bits.
    pub fn entropy_bits(&self) -> f64 {
        self.entropy() / std::f64::consts::LN_2
    }

    /// Most recent observations, name → weight.
    pub fn observations(&self) -> &BTreeMap<String, f64> {
        &self.observations
    }

    /// Record an observation with the given weight.
    pub fn record_observation(&mut self, observation: impl Into<String>, weight: f64) {
        self.observations.insert(observation.into(), weight);
    }

    /// Forget recorded observations.
    pub fn clear_observations(&mut self) {
        self.observations.clear();
    }

    /// Back to uniform beliefs with no observations.
    pub fn reset(&mut self) {
        let n = self.states.len();
        self.probs = vec![1.0 / n as f64; n];
        self.observations.clear();
    }

    /// Snapshot as an immutable [`Distribution`] over the state names.
    pub fn to_distribution(&self) -> Result<Distribution, ProbError> {
        Distribution::new(self.states.clone(), self.probs.clone())
    }
}

/// Collect names, rejecting duplicates.
pub(crate) fn unique_names<S: Into<String>>(names: Vec<S>) -> Result<Vec<String>, ActiveError> {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(ActiveError::DuplicateName { name: name.clone() });
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_uniform() {
        let beliefs = BeliefState::uniform(vec!["a", "b", "c", "d"]).unwrap();
        assert_eq!(beliefs.len(), 4);
        assert_abs_diff_eq!(beliefs.probability("c").unwrap(), 0.25);
        assert_abs_diff_eq!(beliefs.entropy(), 4f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(beliefs.entropy_bits(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_state_sets() {
        assert_eq!(
            BeliefState::uniform(Vec::<String>::new()),
            Err(ActiveError::EmptyStates)
        );
        assert!(matches!(
            BeliefState::uniform(vec!["a", "a"]),
            Err(ActiveError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_point_beliefs_have_zero_entropy() {
        let beliefs = BeliefState::point(vec!["a", "b"], "b").unwrap();
        assert_eq!(beliefs.probabilities(), &[0.0, 1.0]);
        assert_eq!(beliefs.entropy(), 0.0);
        assert!(BeliefState::point(vec!["a"], "z").is_err());
    }

    #[test]
    fn test_set_and_normalize() {
        let mut beliefs = BeliefState::uniform(vec!["a", "b"]).unwrap();
        beliefs.set_probability("a", 3.0).unwrap();
        beliefs.set_probability("b", 1.0).unwrap();
        beliefs.normalize().unwrap();
        assert_abs_diff_eq!(beliefs.probability("a").unwrap(), 0.75);

        assert!(matches!(
            beliefs.set_probability("a", -0.1),
            Err(ActiveError::InvalidProbability { .. })
        ));
        assert!(matches!(
            beliefs.set_probability("z", 0.1),
            Err(ActiveError::UnknownState { .. })
        ));
    }

    #[test]
    fn test_normalize_all_zero_fails() {
        let mut beliefs = BeliefState::uniform(vec!["a", "b"]).unwrap();
        beliefs.set_probability("a", 0.0).unwrap();
        beliefs.set_probability("b", 0.0).unwrap();
        assert!(matches!(
            beliefs.normalize(),
            Err(ActiveError::DegenerateBeliefs { .. })
        ));
    }

    #[test]
    fn test_set_probabilities_is_atomic() {
        let mut beliefs = BeliefState::uniform(vec!["a", "b"]).unwrap();
        assert!(beliefs.set_probabilities(vec![1.0, f64::NAN]).is_err());
        assert!(beliefs.set_probabilities(vec![0.0, 0.0]).is_err());
        assert!(beliefs.set_probabilities(vec![1.0]).is_err());
        assert_eq!(beliefs.probabilities(), &[0.5, 0.5]);

        beliefs.set_probabilities(vec![1.0, 4.0]).unwrap();
        assert_abs_diff_eq!(beliefs.probability("b").unwrap(), 0.8);
    }

    #[test]
    fn test_reset_clears_observations() {
        let mut beliefs = BeliefState::uniform(vec!["a", "b"]).unwrap();
        beliefs.set_probabilities(vec![0.9, 0.1]).unwrap();
        beliefs.record_observation("bright", 1.0);

        beliefs.reset();
        let once = beliefs.clone();
        beliefs.reset();
        assert_eq!(beliefs, once);
        assert_eq!(beliefs.probabilities(), &[0.5, 0.5]);
        assert!(beliefs.observations().is_empty());
    }

    #[test]
    fn test_to_distribution() {
        let beliefs = BeliefState::uniform(vec!["left", "right"]).unwrap();
        let dist = beliefs.to_distribution().unwrap();
        assert_eq!(dist.values().len(), 2);
        assert_abs_diff_eq!(dist.prob(&"left".into()), 0.5);
    }
}
