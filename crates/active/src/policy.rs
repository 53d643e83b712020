//! Policy selection: expected free energies → an action.
//!
//! Actions with lower expected free energy G are preferred. Stochastic
//! selection samples from a Boltzmann distribution over the negated scores:
//!
//! ```text
//! P(a) = softmax(−G(a) / T)
//! ```
//!
//! where `T` is the temperature. Low temperatures approach greedy selection,
//! high temperatures approach uniform exploration.

use crate::error::ActiveError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Chooses among policies by their expected free energies.
#[derive(Debug, Clone)]
pub struct PolicySelector {
    rng: ChaCha20Rng,
}

impl Default for PolicySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicySelector {
    /// A selector seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// A selector with a fixed seed, for reproducible choices.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Selection probabilities `softmax(−G / T)`.
    ///
    /// The largest logit is subtracted before exponentiating, so scores of
    /// any magnitude are safe. `+∞` scores get probability zero.
    ///
    /// # Errors
    ///
    /// Empty scores, a non-positive or non-finite temperature, a NaN or `−∞`
    /// score, or every score being `+∞`.
    pub fn action_probabilities(efes: &[f64], temperature: f64) -> Result<Vec<f64>, ActiveError> {
        if efes.is_empty() {
            return Err(ActiveError::EmptyPolicySet);
        }
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(ActiveError::InvalidTemperature { value: temperature });
        }
        check_scores(efes, |i| format!("#{}", i))?;

        let logits: Vec<f64> = efes.iter().map(|g| -g / temperature).collect();
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return Err(ActiveError::AllScoresInfinite);
        }

        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / sum).collect())
    }

    /// Sample a policy from `softmax(−G / temperature)`.
    pub fn select_policy<'p, S: AsRef<str>>(
        &mut self,
        policies: &'p [S],
        efes: &[f64],
        temperature: f64,
    ) -> Result<&'p str, ActiveError> {
        check_lengths(policies, efes)?;
        check_scores(efes, |i| policies[i].as_ref().to_string())?;
        let probs = Self::action_probabilities(efes, temperature)?;

        let u: f64 = self.rng.gen();
        let mut cumsum = 0.0;
        for (i, &p) in probs.iter().enumerate() {
            cumsum += p;
            if u < cumsum {
                return Ok(policies[i].as_ref());
            }
        }
        // Rounding left u above the final cumulative sum
        let last = probs.iter().rposition(|&p| p > 0.0).unwrap_or(0);
        Ok(policies[last].as_ref())
    }

    /// The policy with the minimum expected free energy; ties go to the first.
    pub fn select_greedy<'p, S: AsRef<str>>(
        &self,
        policies: &'p [S],
        efes: &[f64],
    ) -> Result<&'p str, ActiveError> {
        check_lengths(policies, efes)?;
        if policies.is_empty() {
            return Err(ActiveError::EmptyPolicySet);
        }
        check_scores(efes, |i| policies[i].as_ref().to_string())?;

        let mut best = 0;
        for (i, &g) in efes.iter().enumerate().skip(1) {
            if g < efes[best] {
                best = i;
            }
        }
        if efes[best] == f64::INFINITY {
            return Err(ActiveError::AllScoresInfinite);
        }
        Ok(policies[best].as_ref())
    }
}

fn check_lengths<S>(policies: &[S], efes: &[f64]) -> Result<(), ActiveError> {
    if policies.len() != efes.len() {
        return Err(ActiveError::LengthMismatch {
            expected: policies.len(),
            got: efes.len(),
        });
    }
    Ok(())
}

fn check_scores(efes: &[f64], name: impl Fn(usize) -> String) -> Result<(), ActiveError> {
    for (i, &g) in efes.iter().enumerate() {
        if g.is_nan() || g == f64::NEG_INFINITY {
            return Err(ActiveError::NonFiniteScore {
                policy: name(i),
                value: g,
            });
        }
    }
    Ok(())
}
