//! Probability distributions over finite sets of values.

use crate::error::ProbError;
use crate::value::Value;
use crate::PROB_TOLERANCE;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A probability distribution over a finite, ordered set of distinct values.
///
/// Invariants:
/// - All probabilities are non-negative
/// - Probabilities sum to 1 (weights are normalized at construction)
/// - The distribution is immutable once built
///
/// # Example
///
/// ```rust
/// use cognitive_prob::Distribution;
///
/// // Weights need not be normalized
/// let weather = Distribution::new(vec!["sun", "rain"], vec![3.0, 1.0]).unwrap();
/// assert!((weather.prob(&"sun".into()) - 0.75).abs() < 1e-12);
/// assert_eq!(weather.mode(), &"sun".into());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDistribution")]
pub struct Distribution {
    values: Vec<Value>,
    probs: Vec<f64>,
}

/// Wire form of a [`Distribution`], validated through [`Distribution::new`].
#[derive(Deserialize)]
struct RawDistribution {
    values: Vec<Value>,
    probs: Vec<f64>,
}

impl TryFrom<RawDistribution> for Distribution {
    type Error = ProbError;

    fn try_from(raw: RawDistribution) -> Result<Self, Self::Error> {
        Distribution::new(raw.values, raw.probs)
    }
}

impl Distribution {
    /// Create a distribution from values and unnormalized weights.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The distribution is empty
    /// - `values` and `weights` have different lengths
    /// - Any weight is negative or not finite
    /// - All weights are zero
    /// - A value appears more than once
    pub fn new<V: Into<Value>>(values: Vec<V>, weights: Vec<f64>) -> Result<Self, ProbError> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(ProbError::EmptyDistribution);
        }
        if values.len() != weights.len() {
            return Err(ProbError::LengthMismatch {
                values: values.len(),
                weights: weights.len(),
            });
        }

        for (v, &w) in values.iter().zip(weights.iter()) {
            if !w.is_finite() || w < 0.0 {
                return Err(ProbError::InvalidWeight {
                    value: v.to_string(),
                    weight: w,
                });
            }
        }
        ensure_distinct(&values)?;

        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(ProbError::ZeroWeights);
        }

        let probs = weights.iter().map(|w| w / sum).collect();
        Ok(Self { values, probs })
    }

    /// Create a distribution from `(value, weight)` pairs.
    pub fn from_pairs<V, I>(pairs: I) -> Result<Self, ProbError>
    where
        V: Into<Value>,
        I: IntoIterator<Item = (V, f64)>,
    {
        let (values, weights): (Vec<Value>, Vec<f64>) =
            pairs.into_iter().map(|(v, w)| (v.into(), w)).unzip();
        Self::new(values, weights)
    }

    /// Create a distribution from integer frequency counts.
    pub fn from_counts<V, I>(counts: I) -> Result<Self, ProbError>
    where
        V: Into<Value>,
        I: IntoIterator<Item = (V, usize)>,
    {
        Self::from_pairs(counts.into_iter().map(|(v, c)| (v, c as f64)))
    }

    /// Uniform distribution over the given values.
    pub fn uniform<V: Into<Value>>(values: Vec<V>) -> Result<Self, ProbError> {
        let n = values.len();
        Self::new(values, vec![1.0; n])
    }

    /// Point mass (Dirac delta) at a single value.
    pub fn point(value: impl Into<Value>) -> Self {
        Self {
            values: vec![value.into()],
            probs: vec![1.0],
        }
    }

    /// The support values, in order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The probabilities, parallel to [`values`](Self::values).
    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    /// Iterate over `(value, probability)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, f64)> {
        self.values.iter().zip(self.probs.iter().copied())
    }

    /// Number of values in the support list.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed distribution.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Probability of `value`; zero for values outside the support list.
    pub fn prob(&self, value: &Value) -> f64 {
        self.index_of(value).map(|i| self.probs[i]).unwrap_or(0.0)
    }

    /// Position of `value` in the support list.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    /// Convert to a value → probability map.
    pub fn to_map(&self) -> HashMap<Value, f64> {
        self.iter().map(|(v, p)| (v.clone(), p)).collect()
    }

    /// Mode: the value with highest probability.
    ///
    /// Returns the first value if there are ties.
    pub fn mode(&self) -> &Value {
        let mut best = 0;
        for (i, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = i;
            }
        }
        &self.values[best]
    }

    /// Expected value: `Σ p[i] * value[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbError::NonNumericValue`] if any value is text.
    pub fn expectation(&self) -> Result<f64, ProbError> {
        let mut total = 0.0;
        for (v, p) in self.iter() {
            let x = v.as_f64().ok_or_else(|| ProbError::NonNumericValue {
                value: v.to_string(),
            })?;
            total += p * x;
        }
        Ok(total)
    }

    /// Shannon entropy: `H(p) = -Σ p[i] * ln(p[i])`
    ///
    /// Uses natural logarithm. Outcomes with zero probability contribute 0.
    pub fn entropy(&self) -> f64 {
        self.probs
            .iter()
            .filter(|&&x| x > 0.0)
            .map(|&x| -x * x.ln())
            .sum()
    }

    /// KL divergence: `D_KL(self || other) = Σ p(v) * ln(p(v) / q(v))`
    ///
    /// Values are matched by identity, not position. Returns infinity if self
    /// has support where other has zero probability.
    pub fn kl_divergence(&self, other: &Distribution) -> f64 {
        let mut kl = 0.0;
        for (v, p) in self.iter() {
            if p > 0.0 {
                let q = other.prob(v);
                if q <= 0.0 {
                    return f64::INFINITY;
                }
                kl += p * (p / q).ln();
            }
        }
        kl
    }

    /// Total variation distance: `TV(p, q) = 0.5 * Σ |p(v) - q(v)|` over the union of supports.
    pub fn tv_distance(&self, other: &Distribution) -> f64 {
        let mut sum: f64 = self.iter().map(|(v, p)| (p - other.prob(v)).abs()).sum();
        sum += other
            .iter()
            .filter(|(v, _)| self.index_of(v).is_none())
            .map(|(_, q)| q)
            .sum::<f64>();
        sum / 2.0
    }

    /// Index selected by a uniform value `u` in [0, 1), by inverse transform sampling.
    pub fn sample_index(&self, u: f64) -> usize {
        let mut cumsum = 0.0;
        for (i, &p) in self.probs.iter().enumerate() {
            cumsum += p;
            if u < cumsum {
                return i;
            }
        }
        // Edge case: u = 1.0 or floating point issues
        self.probs
            .iter()
            .rposition(|&p| p > 0.0)
            .unwrap_or(self.probs.len() - 1)
    }

    /// Draw `n` values with replacement according to the probabilities.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Value> {
        (0..n)
            .map(|_| self.values[self.sample_index(rng.gen::<f64>())].clone())
            .collect()
    }

    /// True if the probabilities sum to one within tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.probs.iter().sum::<f64>() - 1.0).abs() <= PROB_TOLERANCE
    }
}

/// Reject repeated values in a support or domain list.
pub(crate) fn ensure_distinct(values: &[Value]) -> Result<(), ProbError> {
    let mut seen = std::collections::HashSet::with_capacity(values.len());
    for v in values {
        if !seen.insert(v) {
            return Err(ProbError::DuplicateValue {
                value: v.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_deserialize_validates() {
        let d = Distribution::new(vec!["a", "b"], vec![1.0, 3.0]).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        let back: Distribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);

        // Weights are normalized on the way in
        let scaled: Distribution =
            serde_json::from_str(r#"{"values":["a","b"],"probs":[2.0,6.0]}"#).unwrap();
        assert_abs_diff_eq!(scaled.prob(&"b".into()), 0.75, epsilon = 1e-12);

        for bad in [
            r#"{"values":["a","a"],"probs":[0.5,0.5]}"#,
            r#"{"values":["a"],"probs":[-1.0]}"#,
            r#"{"values":[],"probs":[]}"#,
        ] {
            assert!(serde_json::from_str::<Distribution>(bad).is_err());
        }
    }

    #[test]
    fn test_dist_new_normalizes() {
        let d = Distribution::new(vec![1, 2, 3], vec![1.0, 2.0, 3.0]).unwrap();
        assert_abs_diff_eq!(d.probabilities()[0], 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.probabilities()[2], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d.probabilities().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dist_new_rejects_bad_input() {
        let empty: Vec<Value> = vec![];
        assert_eq!(
            Distribution::new(empty, vec![]),
            Err(ProbError::EmptyDistribution)
        );
        assert!(matches!(
            Distribution::new(vec!["a", "b"], vec![1.0]),
            Err(ProbError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Distribution::new(vec!["a", "b"], vec![-0.5, 1.5]),
            Err(ProbError::InvalidWeight { .. })
        ));
        assert!(matches!(
            Distribution::new(vec!["a", "b"], vec![f64::NAN, 1.0]),
            Err(ProbError::InvalidWeight { .. })
        ));
        assert_eq!(
            Distribution::new(vec!["a", "b"], vec![0.0, 0.0]),
            Err(ProbError::ZeroWeights)
        );
        assert!(matches!(
            Distribution::new(vec!["a", "a"], vec![0.5, 0.5]),
            Err(ProbError::DuplicateValue { .. })
        ));
    }

    #[test]
    fn test_dist_uniform_and_point() {
        let d = Distribution::uniform(vec!["n", "e", "s", "w"]).unwrap();
        for (_, p) in d.iter() {
            assert_abs_diff_eq!(p, 0.25, epsilon = 1e-12);
        }

        let point = Distribution::point(true);
        assert_eq!(point.values(), &[Value::Bool(true)]);
        assert_eq!(point.probabilities(), &[1.0]);
        assert_eq!(point.prob(&false.into()), 0.0);
    }

    #[test]
    fn test_mode_breaks_ties_by_first_occurrence() {
        let d = Distribution::new(vec!["x", "y", "z"], vec![0.2, 0.4, 0.4]).unwrap();
        assert_eq!(d.mode(), &Value::from("y"));
    }

    #[test]
    fn test_expectation() {
        let d = Distribution::new(vec![0, 1, 2, 3], vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_abs_diff_eq!(d.expectation().unwrap(), 2.0, epsilon = 1e-12);

        let coin = Distribution::new(vec![false, true], vec![0.3, 0.7]).unwrap();
        assert_abs_diff_eq!(coin.expectation().unwrap(), 0.7, epsilon = 1e-12);

        let labels = Distribution::uniform(vec!["a", "b"]).unwrap();
        assert!(matches!(
            labels.expectation(),
            Err(ProbError::NonNumericValue { .. })
        ));
    }

    #[test]
    fn test_entropy() {
        let d = Distribution::uniform(vec![1, 2, 3, 4]).unwrap();
        // H(uniform) = log(n)
        assert_abs_diff_eq!(d.entropy(), 4.0_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(Distribution::point(1).entropy(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kl_and_tv() {
        let p = Distribution::new(vec!["a", "b"], vec![0.5, 0.5]).unwrap();
        let q = Distribution::new(vec!["b", "a"], vec![0.5, 0.5]).unwrap();
        // Matching is by value, not by position
        assert_abs_diff_eq!(p.kl_divergence(&q), 0.0, epsilon = 1e-12);

        let r = Distribution::point("a");
        assert!(p.kl_divergence(&r).is_infinite());
        assert_abs_diff_eq!(p.tv_distance(&r), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_index() {
        let d = Distribution::new(vec!["lo", "hi"], vec![0.3, 0.7]).unwrap();
        assert_eq!(d.sample_index(0.0), 0);
        assert_eq!(d.sample_index(0.29), 0);
        assert_eq!(d.sample_index(0.31), 1);
        assert_eq!(d.sample_index(0.99), 1);
    }

    #[test]
    fn test_sample_is_reproducible_and_weighted() {
        let d = Distribution::new(vec!["lo", "hi"], vec![0.2, 0.8]).unwrap();

        let mut rng_a = ChaCha20Rng::seed_from_u64(7);
        let mut rng_b = ChaCha20Rng::seed_from_u64(7);
        let a = d.sample(5_000, &mut rng_a);
        let b = d.sample(5_000, &mut rng_b);
        assert_eq!(a, b);

        let hi = a.iter().filter(|v| **v == Value::from("hi")).count();
        let frac = hi as f64 / a.len() as f64;
        assert!((frac - 0.8).abs() < 0.03, "frac = {}", frac);
    }

    #[test]
    fn test_sample_never_returns_zero_probability_value() {
        let d = Distribution::new(vec!["never", "always"], vec![0.0, 1.0]).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(d
            .sample(1_000, &mut rng)
            .iter()
            .all(|v| *v == Value::from("always")));
    }
}
