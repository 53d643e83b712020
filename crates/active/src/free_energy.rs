//! Variational and Expected Free Energy over categorical beliefs.
//!
//! # Variational Free Energy (VFE)
//!
//! For perception - how well beliefs explain the observations:
//! ```text
//! F = Σ_s q(s) Σ_o w(o) · (−ln P(o|s))  +  KL(q ‖ p) / γ
//!     └──────── accuracy ─────────┘      └ complexity ┘
//! ```
//! where `w` are the normalized observation weights, `p` the prior (preferred)
//! beliefs and `γ` the precision.
//!
//! # Expected Free Energy (EFE)
//!
//! For planning - what an action is expected to cost one step ahead:
//! ```text
//! q'(s') = Σ_s q(s) P(s'|s,a)
//! G(a)   = KL(q' ‖ p) + Σ_s' q'(s') H[P(o|s')]
//!          └── risk ─┘  └──── ambiguity ────┘
//! ```
//!
//! All logarithms are natural; `ln 0` is clamped at `ln(1e-16)`.

use crate::beliefs::BeliefState;
use crate::error::ActiveError;
use crate::model::{ObservationModel, TransitionModel};
use std::collections::BTreeMap;

/// Floor applied before taking logarithms.
const LOG_FLOOR: f64 = 1e-16;

fn safe_ln(p: f64) -> f64 {
    p.max(LOG_FLOOR).ln()
}

/// KL(q ‖ p) for parallel categorical vectors.
pub(crate) fn kl_divergence(q: &[f64], p: &[f64]) -> f64 {
    q.iter()
        .zip(p)
        .filter(|(&qi, _)| qi > 0.0)
        .map(|(&qi, &pi)| qi * (safe_ln(qi) - safe_ln(pi)))
        .sum()
}

/// Entropy of unnormalized likelihoods, normalized first. Zero mass → 0.
fn normalized_entropy(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    -weights
        .iter()
        .filter(|&&w| w > 0.0)
        .map(|&w| {
            let p = w / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Free-energy calculator with a fixed precision and prior preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct VariationalFreeEnergy {
    precision: f64,
    prior: Option<BTreeMap<String, f64>>,
}

impl Default for VariationalFreeEnergy {
    fn default() -> Self {
        Self::new()
    }
}

impl VariationalFreeEnergy {
    /// Precision 1.0 and a uniform prior.
    pub fn new() -> Self {
        Self {
            precision: 1.0,
            prior: None,
        }
    }

    /// Weight of the complexity term is `1 / precision`.
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Prior (preferred) beliefs as state → weight. Missing states get zero
    /// weight; weights are normalized over the states they are used with.
    pub fn with_prior<S, I>(mut self, prior: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        self.prior = Some(prior.into_iter().map(|(s, p)| (s.into(), p)).collect());
        self
    }

    /// The configured precision.
    pub fn precision(&self) -> f64 {
        self.precision
    }

    fn check_precision(&self) -> Result<(), ActiveError> {
        if !self.precision.is_finite() || self.precision <= 0.0 {
            return Err(ActiveError::InvalidPrecision {
                value: self.precision,
            });
        }
        Ok(())
    }

    /// Prior over `states`, normalized, in the same order.
    pub fn prior_for(&self, states: &[String]) -> Result<Vec<f64>, ActiveError> {
        let n = states.len();
        let Some(prior) = &self.prior else {
            return Ok(vec![1.0 / n as f64; n]);
        };

        let mut weights = Vec::with_capacity(n);
        for state in states {
            let w = prior.get(state).copied().unwrap_or(0.0);
            if !w.is_finite() || w < 0.0 {
                return Err(ActiveError::InvalidProbability {
                    name: state.clone(),
                    value: w,
                });
            }
            weights.push(w);
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ActiveError::DegenerateBeliefs {
                context: "prior puts no mass on any state".into(),
            });
        }
        Ok(weights.into_iter().map(|w| w / total).collect())
    }

    /// Variational free energy: `accuracy + complexity / precision`.
    ///
    /// `accuracy` is the expected negative log-likelihood of the observations
    /// (weights normalized; no observations means zero) and `complexity` is
    /// `KL(q ‖ prior)`.
    pub fn compute(
        &self,
        beliefs: &BeliefState,
        observations: &BTreeMap<String, f64>,
        likelihood: &dyn ObservationModel,
    ) -> Result<f64, ActiveError> {
        self.check_precision()?;

        for (name, &w) in observations {
            if !w.is_finite() || w < 0.0 {
                return Err(ActiveError::InvalidProbability {
                    name: name.clone(),
                    value: w,
                });
            }
        }
        let total_weight: f64 = observations.values().sum();

        let mut accuracy = 0.0;
        if total_weight > 0.0 {
            for (state, &q) in beliefs.states().iter().zip(beliefs.probabilities()) {
                if q == 0.0 {
                    continue;
                }
                let surprise: f64 = observations
                    .iter()
                    .map(|(obs, &w)| (w / total_weight) * -safe_ln(likelihood.likelihood(obs, state)))
                    .sum();
                accuracy += q * surprise;
            }
        }

        let prior = self.prior_for(beliefs.states())?;
        let complexity = kl_divergence(beliefs.probabilities(), &prior);

        Ok(accuracy + complexity / self.precision)
    }

    /// Beliefs one step ahead: `q'(s') = Σ_s q(s) P(s'|s,a)`, normalized.
    pub fn predict_states(
        beliefs: &BeliefState,
        action: &str,
        transition: &dyn TransitionModel,
    ) -> Result<Vec<f64>, ActiveError> {
        let states = beliefs.states();
        let mut predicted = vec![0.0; states.len()];
        for (current, &q) in states.iter().zip(beliefs.probabilities()) {
            if q == 0.0 {
                continue;
            }
            for (next, slot) in states.iter().zip(predicted.iter_mut()) {
                let p = transition.probability(next, current, action);
                if !p.is_finite() || p < 0.0 {
                    return Err(ActiveError::InvalidProbability {
                        name: format!("{} -> {} under {}", current, next, action),
                        value: p,
                    });
                }
                *slot += q * p;
            }
        }

        let total: f64 = predicted.iter().sum();
        if total <= 0.0 {
            return Err(ActiveError::DegenerateBeliefs {
                context: format!("action '{}' leads nowhere from the current beliefs", action),
            });
        }
        Ok(predicted.into_iter().map(|p| p / total).collect())
    }

    /// Expected free energy of taking `policy` from `beliefs`.
    ///
    /// `outcomes` are the observation names the ambiguity term ranges over.
    /// Lower values mark preferred or more informative actions.
    pub fn compute_expected_free_energy(
        &self,
        beliefs: &BeliefState,
        policy: &str,
        transition: &dyn TransitionModel,
        observation: &dyn ObservationModel,
        outcomes: &[String],
    ) -> Result<f64, ActiveError> {
        let predicted = Self::predict_states(beliefs, policy, transition)?;
        let prior = self.prior_for(beliefs.states())?;
        let risk = kl_divergence(&predicted, &prior);

        let mut likelihoods = Vec::with_capacity(outcomes.len());
        let mut ambiguity = 0.0;
        for (state, &q) in beliefs.states().iter().zip(&predicted) {
            if q == 0.0 {
                continue;
            }
            likelihoods.clear();
            likelihoods.extend(outcomes.iter().map(|o| observation.likelihood(o, state)));
            ambiguity += q * normalized_entropy(&likelihoods);
        }

        Ok(risk + ambiguity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObservationTable, TransitionTable};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::LN_2;

    fn states() -> Vec<&'static str> {
        vec!["left", "right"]
    }

    fn outcomes() -> Vec<String> {
        vec!["see_left".to_string(), "see_right".to_string()]
    }

    fn exact_eyes() -> ObservationTable {
        ObservationTable::new()
            .with("left", "see_left", 1.0)
            .with("right", "see_right", 1.0)
    }

    fn single_observation(name: &str) -> BTreeMap<String, f64> {
        let mut obs = BTreeMap::new();
        obs.insert(name.to_string(), 1.0);
        obs
    }

    #[test]
    fn test_uniform_beliefs_have_no_complexity() {
        let vfe = VariationalFreeEnergy::new();
        let beliefs = BeliefState::uniform(states()).unwrap();
        let f = vfe.compute(&beliefs, &BTreeMap::new(), &exact_eyes()).unwrap();
        assert_abs_diff_eq!(f, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_complexity_scaled_by_precision() {
        let beliefs = BeliefState::point(states(), "left").unwrap();
        let empty = BTreeMap::new();

        let f1 = VariationalFreeEnergy::new()
            .compute(&beliefs, &empty, &exact_eyes())
            .unwrap();
        let f2 = VariationalFreeEnergy::new()
            .with_precision(2.0)
            .compute(&beliefs, &empty, &exact_eyes())
            .unwrap();

        assert_abs_diff_eq!(f1, LN_2, epsilon = 1e-12);
        assert_abs_diff_eq!(f2, LN_2 / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_accuracy_is_expected_surprise() {
        let noisy = |obs: &str, state: &str| {
            if obs.ends_with(state) {
                0.8
            } else {
                0.2
            }
        };
        let beliefs = BeliefState::uniform(states()).unwrap();
        let f = VariationalFreeEnergy::new()
            .compute(&beliefs, &single_observation("see_left"), &noisy)
            .unwrap();

        let expected = 0.5 * -(0.8f64.ln()) + 0.5 * -(0.2f64.ln());
        assert_abs_diff_eq!(f, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_impossible_observation_is_clamped() {
        let beliefs = BeliefState::point(states(), "left").unwrap();
        let f = VariationalFreeEnergy::new()
            .compute(&beliefs, &single_observation("see_right"), &exact_eyes())
            .unwrap();
        assert!(f.is_finite());
        assert_abs_diff_eq!(f, -(1e-16f64.ln()) + LN_2, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_precision() {
        let beliefs = BeliefState::uniform(states()).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = VariationalFreeEnergy::new().with_precision(bad).compute(
                &beliefs,
                &BTreeMap::new(),
                &exact_eyes(),
            );
            assert!(matches!(result, Err(ActiveError::InvalidPrecision { .. })));
        }
    }

    #[test]
    fn test_prior_for() {
        let names: Vec<String> = states().into_iter().map(String::from).collect();
        let vfe = VariationalFreeEnergy::new().with_prior(vec![("left", 3.0), ("right", 1.0)]);
        assert_eq!(vfe.prior_for(&names).unwrap(), vec![0.75, 0.25]);

        let vfe = VariationalFreeEnergy::new().with_prior(vec![("elsewhere", 1.0)]);
        assert!(matches!(
            vfe.prior_for(&names),
            Err(ActiveError::DegenerateBeliefs { .. })
        ));
    }

    #[test]
    fn test_predict_states() {
        let beliefs = BeliefState::uniform(states()).unwrap();
        let go_left = TransitionTable::new().with_move_to("go_left", &states(), "left");
        let predicted = VariationalFreeEnergy::predict_states(&beliefs, "go_left", &go_left).unwrap();
        assert_eq!(predicted, vec![1.0, 0.0]);

        assert!(matches!(
            VariationalFreeEnergy::predict_states(&beliefs, "unknown", &go_left),
            Err(ActiveError::DegenerateBeliefs { .. })
        ));
    }

    #[test]
    fn test_efe_prefers_staying_under_uniform_prior() {
        let beliefs = BeliefState::uniform(states()).unwrap();
        let transitions = TransitionTable::new()
            .with_stay("stay", &states())
            .with_move_to("go_left", &states(), "left");
        let vfe = VariationalFreeEnergy::new();

        let stay = vfe
            .compute_expected_free_energy(&beliefs, "stay", &transitions, &exact_eyes(), &outcomes())
            .unwrap();
        let go = vfe
            .compute_expected_free_energy(&beliefs, "go_left", &transitions, &exact_eyes(), &outcomes())
            .unwrap();

        assert_abs_diff_eq!(stay, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(go, LN_2, epsilon = 1e-12);
    }

    #[test]
    fn test_efe_follows_preferences() {
        let beliefs = BeliefState::uniform(states()).unwrap();
        let transitions = TransitionTable::new()
            .with_stay("stay", &states())
            .with_move_to("go_left", &states(), "left");
        let vfe = VariationalFreeEnergy::new().with_prior(vec![("left", 0.99), ("right", 0.01)]);

        let stay = vfe
            .compute_expected_free_energy(&beliefs, "stay", &transitions, &exact_eyes(), &outcomes())
            .unwrap();
        let go = vfe
            .compute_expected_free_energy(&beliefs, "go_left", &transitions, &exact_eyes(), &outcomes())
            .unwrap();
        assert!(go < stay);
    }

    #[test]
    fn test_ambiguity_from_noisy_observations() {
        let beliefs = BeliefState::uniform(states()).unwrap();
        let transitions = TransitionTable::new().with_stay("stay", &states());
        let coin = |_obs: &str, _state: &str| 0.5;

        let g = VariationalFreeEnergy::new()
            .compute_expected_free_energy(&beliefs, "stay", &transitions, &coin, &outcomes())
            .unwrap();
        // No risk, one bit of ambiguity in every state
        assert_abs_diff_eq!(g, LN_2, epsilon = 1e-12);
    }
}
