//! Empirical priors from past cases.
//!
//! A prior for a network variable is bootstrapped by extracting the
//! variable's value from each stored case and normalizing the frequencies.

use crate::dist::{ensure_distinct, Distribution};
use crate::error::ProbError;
use crate::hooks::{InferenceHook, NullHook};
use crate::value::Value;
use std::sync::Arc;

/// Build the empirical distribution of `variable` over `cases`.
///
/// `extractor` returns the case's value for the variable, or `None` when the
/// case carries none. Values keep the order in which they were first seen. No
/// smoothing is applied; see [`PriorBuilder::with_laplace`].
///
/// # Errors
///
/// [`ProbError::NoObservations`] if no case yields a value.
///
/// # Example
///
/// ```rust
/// use cognitive_prob::build_prior_from_cases;
///
/// let cases = vec!["sunny", "rain", "sunny", "sunny"];
/// let prior = build_prior_from_cases(&cases, "weather", |c| Some(*c)).unwrap();
///
/// assert_eq!(prior.mode().as_str(), Some("sunny"));
/// assert!((prior.probabilities()[0] - 0.75).abs() < 1e-12);
/// ```
pub fn build_prior_from_cases<C, V, F>(
    cases: &[C],
    variable: &str,
    extractor: F,
) -> Result<Distribution, ProbError>
where
    F: Fn(&C) -> Option<V>,
    V: Into<Value>,
{
    PriorBuilder::new().build(cases, variable, extractor)
}

/// Configurable builder for empirical priors.
#[derive(Clone)]
pub struct PriorBuilder {
    laplace: Option<(f64, Vec<Value>)>,
    hook: Arc<dyn InferenceHook>,
}

impl Default for PriorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PriorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorBuilder")
            .field("laplace", &self.laplace)
            .finish()
    }
}

impl PriorBuilder {
    /// Plain frequency counting, no smoothing.
    pub fn new() -> Self {
        Self {
            laplace: None,
            hook: Arc::new(NullHook),
        }
    }

    /// Add `alpha` pseudo-counts to every value of `domain`.
    ///
    /// The resulting distribution ranges over the whole domain, in domain
    /// order, followed by any observed value outside it.
    pub fn with_laplace<V: Into<Value>>(mut self, alpha: f64, domain: Vec<V>) -> Self {
        self.laplace = Some((alpha, domain.into_iter().map(Into::into).collect()));
        self
    }

    /// Report built priors and failures to `hook`.
    pub fn with_hook(mut self, hook: Arc<dyn InferenceHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Build the prior of `variable` from `cases`.
    pub fn build<C, V, F>(
        &self,
        cases: &[C],
        variable: &str,
        extractor: F,
    ) -> Result<Distribution, ProbError>
    where
        F: Fn(&C) -> Option<V>,
        V: Into<Value>,
    {
        let result = self.try_build(cases, variable, extractor);
        match &result {
            Ok((dist, n_cases)) => self.hook.on_prior_built(variable, dist.len(), *n_cases),
            Err(e) => self.hook.on_error(e),
        }
        result.map(|(dist, _)| dist)
    }

    fn try_build<C, V, F>(
        &self,
        cases: &[C],
        variable: &str,
        extractor: F,
    ) -> Result<(Distribution, usize), ProbError>
    where
        F: Fn(&C) -> Option<V>,
        V: Into<Value>,
    {
        let mut values: Vec<Value> = Vec::new();
        let mut counts: Vec<f64> = Vec::new();

        if let Some((alpha, domain)) = &self.laplace {
            if !alpha.is_finite() || *alpha < 0.0 {
                return Err(ProbError::InvalidWeight {
                    value: format!("laplace alpha for '{}'", variable),
                    weight: *alpha,
                });
            }
            ensure_distinct(domain)?;
            values.extend(domain.iter().cloned());
            counts.resize(domain.len(), *alpha);
        }

        let mut n_cases = 0;
        for case in cases {
            let Some(value) = extractor(case) else {
                continue;
            };
            let value = value.into();
            n_cases += 1;
            match values.iter().position(|v| *v == value) {
                Some(i) => counts[i] += 1.0,
                None => {
                    values.push(value);
                    counts.push(1.0);
                }
            }
        }

        if n_cases == 0 && self.laplace.is_none() {
            return Err(ProbError::NoObservations {
                variable: variable.to_string(),
            });
        }

        let dist = Distribution::new(values, counts).map_err(|e| match e {
            ProbError::EmptyDistribution | ProbError::ZeroWeights => ProbError::NoObservations {
                variable: variable.to_string(),
            },
            other => other,
        })?;
        Ok((dist, n_cases))
    }
}
