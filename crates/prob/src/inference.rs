//! Posterior inference over a [`BayesianNetwork`].
//!
//! Two strategies are available:
//! - **variable_elimination**: exact, enumerates every joint assignment of the
//!   unobserved variables and marginalizes. Exponential in the number of free
//!   variables, intended for small networks.
//! - **mcmc**: Gibbs sampling (see [`GibbsConfig`]).
//!
//! Key insight: Conditioning is NOT plain composition. It requires renormalization
//! because observing evidence restricts the probability space.

use crate::bayesnet::BayesianNetwork;
use crate::compiled::{CompiledNetwork, Odometer};
use crate::dist::Distribution;
use crate::error::ProbError;
use crate::gibbs::{GibbsConfig, GibbsSampler};
use crate::hooks::InferenceHook;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Evidence: observed value per variable name.
pub type Evidence = HashMap<String, Value>;

/// How often exact enumeration polls its cancellation token.
const CANCEL_POLL_INTERVAL: usize = 4096;

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag shared between an engine and its caller.
///
/// Clones share the same flag, so a clone handed to another thread can stop a
/// long-running sampling call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Methods and strategies
// ============================================================================

/// Which inference algorithm an engine runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum InferenceMethod {
    /// Exact inference by enumeration.
    #[default]
    VariableElimination,
    /// Gibbs sampling.
    Mcmc(GibbsConfig),
}

impl InferenceMethod {
    /// The method's name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            InferenceMethod::VariableElimination => "variable_elimination",
            InferenceMethod::Mcmc(_) => "mcmc",
        }
    }

    fn strategy(&self) -> Box<dyn InferenceStrategy> {
        match self {
            InferenceMethod::VariableElimination => Box::new(ExactEnumeration),
            InferenceMethod::Mcmc(config) => Box::new(GibbsSampler::new(config.clone())),
        }
    }
}

impl FromStr for InferenceMethod {
    type Err = ProbError;

    /// `"mcmc"` uses the default [`GibbsConfig`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "variable_elimination" => Ok(InferenceMethod::VariableElimination),
            "mcmc" => Ok(InferenceMethod::Mcmc(GibbsConfig::default())),
            other => Err(ProbError::UnknownMethod {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for InferenceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One inference algorithm over a compiled network.
pub(crate) trait InferenceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Posterior weights for each query variable (none of them observed),
    /// indexed by value position in the variable's domain. Rows need not be
    /// normalized.
    fn marginals(
        &self,
        model: &CompiledNetwork,
        evidence: &[Option<usize>],
        query: &[usize],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f64>>, ProbError>;
}

/// Exact inference by brute-force enumeration of the joint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExactEnumeration;

impl ExactEnumeration {
    /// Visit every assignment consistent with the evidence along with its
    /// joint probability. Returns the total mass.
    fn enumerate<F>(
        model: &CompiledNetwork,
        evidence: &[Option<usize>],
        cancel: &CancellationToken,
        mut visit: F,
    ) -> Result<f64, ProbError>
    where
        F: FnMut(&[usize], f64),
    {
        let mut odo = Odometer::new(model, evidence);
        let mut total = 0.0;
        let mut visited = 0;
        loop {
            if visited % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(ProbError::Cancelled { completed: visited });
            }
            let p = model.joint(&odo.assignment);
            if p > 0.0 {
                visit(&odo.assignment, p);
                total += p;
            }
            visited += 1;
            if !odo.advance() {
                return Ok(total);
            }
        }
    }
}

impl InferenceStrategy for ExactEnumeration {
    fn name(&self) -> &'static str {
        "variable_elimination"
    }

    fn marginals(
        &self,
        model: &CompiledNetwork,
        evidence: &[Option<usize>],
        query: &[usize],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f64>>, ProbError> {
        let mut marginals: Vec<Vec<f64>> = query
            .iter()
            .map(|&q| vec![0.0; model.cardinality(q)])
            .collect();

        let total = Self::enumerate(model, evidence, cancel, |assignment, p| {
            for (m, &q) in marginals.iter_mut().zip(query) {
                m[assignment[q]] += p;
            }
        })?;

        if total <= 0.0 {
            return Err(ProbError::DegenerateDistribution {
                context: "evidence has zero probability".into(),
            });
        }
        Ok(marginals)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Answers posterior queries over one network.
///
/// The engine borrows the network for its whole lifetime, so the network
/// cannot be mutated while an engine exists. It keeps no state between calls
/// besides its method configuration; a seeded Gibbs configuration therefore
/// gives the same answer on every call.
///
/// # Example
///
/// ```rust
/// use cognitive_prob::{sprinkler_network, InferenceEngine, InferenceMethod, Value};
/// use std::collections::HashMap;
///
/// let net = sprinkler_network().unwrap();
/// let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();
///
/// let mut evidence = HashMap::new();
/// evidence.insert("WetGrass".to_string(), Value::from(true));
///
/// let rain = engine.compute_marginal("Rain", &evidence).unwrap();
/// assert!((rain.prob(&Value::from(true)) - 0.3577).abs() < 1e-4);
/// ```
pub struct InferenceEngine<'a> {
    network: &'a BayesianNetwork,
    model: CompiledNetwork,
    method: InferenceMethod,
    strategy: Box<dyn InferenceStrategy>,
    hook: Arc<dyn InferenceHook>,
    cancel: CancellationToken,
}

impl fmt::Debug for InferenceEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("method", &self.method)
            .field("variables", &self.model.len())
            .finish()
    }
}

impl<'a> InferenceEngine<'a> {
    /// Create an engine for `network`.
    ///
    /// The network is compiled into index-addressed tables up front. The
    /// engine reports through the network's hook unless
    /// [`with_hook`](Self::with_hook) replaces it.
    ///
    /// # Errors
    ///
    /// [`ProbError::CycleDetected`] or [`ProbError::MissingCpt`] if the
    /// network cannot be compiled; [`ProbError::InvalidConfig`] for an
    /// unusable Gibbs configuration.
    pub fn new(network: &'a BayesianNetwork, method: InferenceMethod) -> Result<Self, ProbError> {
        let hook = Arc::clone(network.hook());
        let compiled = Self::compile(network, &method);
        let model = compiled.map_err(|e| {
            hook.on_error(&e);
            e
        })?;

        Ok(Self {
            network,
            model,
            strategy: method.strategy(),
            method,
            hook,
            cancel: CancellationToken::new(),
        })
    }

    fn compile(
        network: &BayesianNetwork,
        method: &InferenceMethod,
    ) -> Result<CompiledNetwork, ProbError> {
        if let InferenceMethod::Mcmc(config) = method {
            config.validate()?;
        }
        CompiledNetwork::new(network)
    }

    /// Create an engine from a method name (`"variable_elimination"` or `"mcmc"`).
    ///
    /// # Errors
    ///
    /// [`ProbError::UnknownMethod`] for any other name.
    pub fn from_method_name(network: &'a BayesianNetwork, method: &str) -> Result<Self, ProbError> {
        let method: InferenceMethod = method.parse().map_err(|e: ProbError| {
            network.hook().on_error(&e);
            e
        })?;
        Self::new(network, method)
    }

    /// Report through `hook` instead of the network's hook.
    pub fn with_hook(mut self, hook: Arc<dyn InferenceHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Poll `token` during long computations.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The network this engine answers queries about.
    pub fn network(&self) -> &'a BayesianNetwork {
        self.network
    }

    /// The configured method.
    pub fn method(&self) -> &InferenceMethod {
        &self.method
    }

    /// The cancellation token polled by this engine.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Posterior distribution of each query variable given `evidence`.
    ///
    /// Results follow the order of `query`; each distribution ranges over the
    /// variable's full domain. A query variable that is also observed yields a
    /// point distribution at its evidence value.
    ///
    /// # Errors
    ///
    /// Unknown query or evidence variables and out-of-domain evidence values
    /// fail before any computation. Evidence with zero probability yields
    /// [`ProbError::DegenerateDistribution`]; sampling may also end with
    /// [`ProbError::Cancelled`] or [`ProbError::TimedOut`].
    pub fn infer<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Vec<Distribution>, ProbError> {
        let result = self.try_infer(query, evidence);
        if let Err(e) = &result {
            self.hook.on_error(e);
        }
        result
    }

    fn try_infer<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Vec<Distribution>, ProbError> {
        let vars = query
            .iter()
            .map(|q| self.model.variable(q.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let slots = self.model.resolve_evidence(evidence)?;

        let names: Vec<String> = query.iter().map(|q| q.as_ref().to_string()).collect();
        let method = self.strategy.name();
        self.hook.on_inference_start(method, &names, evidence.len());
        let started = Instant::now();

        let free: Vec<usize> = vars
            .iter()
            .copied()
            .filter(|&v| slots[v].is_none())
            .collect();
        let marginals = if free.is_empty() {
            Vec::new()
        } else {
            self.strategy
                .marginals(&self.model, &slots, &free, &self.cancel)?
        };
        let by_var: HashMap<usize, Vec<f64>> = free.into_iter().zip(marginals).collect();

        let mut results = Vec::with_capacity(vars.len());
        for &var in &vars {
            let dist = match slots[var] {
                Some(vi) => Distribution::point(self.model.domain(var)[vi].clone()),
                None => self.posterior(var, &by_var)?,
            };
            results.push(dist);
        }

        self.hook.on_inference_end(method, started.elapsed());
        Ok(results)
    }

    fn posterior(
        &self,
        var: usize,
        marginals: &HashMap<usize, Vec<f64>>,
    ) -> Result<Distribution, ProbError> {
        let weights = marginals.get(&var).cloned().unwrap_or_default();
        Distribution::new(self.model.domain(var).to_vec(), weights).map_err(|_| {
            ProbError::DegenerateDistribution {
                context: format!("posterior of '{}' has zero mass", self.model.name(var)),
            }
        })
    }

    /// Posterior of a single variable.
    pub fn compute_marginal(
        &self,
        variable: &str,
        evidence: &Evidence,
    ) -> Result<Distribution, ProbError> {
        let mut results = self.infer(&[variable], evidence)?;
        results.pop().ok_or_else(|| ProbError::DegenerateDistribution {
            context: format!("no posterior produced for '{}'", variable),
        })
    }

    /// Posteriors of every unobserved variable, in topological order.
    pub fn update_beliefs(&self, evidence: &Evidence) -> Result<Vec<(String, Distribution)>, ProbError> {
        let names: Vec<&str> = self
            .model
            .order()
            .iter()
            .map(|&v| self.model.name(v))
            .filter(|name| !evidence.contains_key(*name))
            .collect();
        let posteriors = self.infer(&names, evidence)?;
        Ok(names
            .into_iter()
            .map(str::to_string)
            .zip(posteriors)
            .collect())
    }

    /// Joint probability of a complete assignment of every variable.
    ///
    /// # Errors
    ///
    /// [`ProbError::InvalidEvidence`] if any variable is left unassigned or
    /// assigned outside its domain.
    pub fn joint_probability(&self, assignment: &Evidence) -> Result<f64, ProbError> {
        let slots = self.model.resolve_evidence(assignment)?;
        let mut full = Vec::with_capacity(slots.len());
        for (var, slot) in slots.into_iter().enumerate() {
            let vi = slot.ok_or_else(|| ProbError::InvalidEvidence {
                variable: self.model.name(var).to_string(),
                value: "<unassigned>".into(),
            })?;
            full.push(vi);
        }
        Ok(self.model.joint(&full))
    }

    /// Probability of the evidence, P(E = e), computed exactly.
    pub fn evidence_probability(&self, evidence: &Evidence) -> Result<f64, ProbError> {
        let slots = self.model.resolve_evidence(evidence)?;
        ExactEnumeration::enumerate(&self.model, &slots, &self.cancel, |_, _| {})
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayesnet::sprinkler_network;
    use crate::PROB_TOLERANCE;
    use approx::assert_abs_diff_eq;

    fn evidence(pairs: &[(&str, Value)]) -> Evidence {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// A -> B, P(A=T) = 0.3, P(B=T | A) = [0.1, 0.8].
    fn two_node_network() -> BayesianNetwork {
        let mut net = BayesianNetwork::new();
        net.add_node("A", vec![false, true], None).unwrap();
        net.add_node("B", vec![false, true], None).unwrap();
        net.add_edge("A", "B").unwrap();
        net.set_cpt_probs("A", vec![(Vec::<bool>::new(), vec![(false, 0.7), (true, 0.3)])])
            .unwrap();
        net.set_cpt_probs(
            "B",
            vec![
                (vec![false], vec![(false, 0.9), (true, 0.1)]),
                (vec![true], vec![(false, 0.2), (true, 0.8)]),
            ],
        )
        .unwrap();
        net
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "variable_elimination".parse::<InferenceMethod>().unwrap(),
            InferenceMethod::VariableElimination
        );
        assert_eq!(
            "mcmc".parse::<InferenceMethod>().unwrap(),
            InferenceMethod::Mcmc(GibbsConfig::default())
        );

        let err = "belief_propagation".parse::<InferenceMethod>().unwrap_err();
        assert!(err.is_inference_error());
        assert_eq!(InferenceMethod::default().to_string(), "variable_elimination");
    }

    #[test]
    fn test_unknown_method_name() {
        let net = two_node_network();
        let err = InferenceEngine::from_method_name(&net, "loopy").unwrap_err();
        assert_eq!(err, ProbError::UnknownMethod { name: "loopy".into() });
    }

    #[test]
    fn test_exact_marginal() {
        let net = two_node_network();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        // P(B=T) = 0.7 * 0.1 + 0.3 * 0.8 = 0.31
        let b = engine.compute_marginal("B", &Evidence::new()).unwrap();
        assert_eq!(b.values(), net.values("B").unwrap());
        assert_abs_diff_eq!(b.prob(&Value::from(true)), 0.31, epsilon = 1e-12);

        // P(A=T | B=T) = 0.24 / 0.31
        let a = engine
            .compute_marginal("A", &evidence(&[("B", true.into())]))
            .unwrap();
        assert_abs_diff_eq!(a.prob(&Value::from(true)), 0.24 / 0.31, epsilon = 1e-12);
    }

    #[test]
    fn test_sprinkler_exact() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        let rain = engine
            .compute_marginal("Rain", &evidence(&[("WetGrass", true.into())]))
            .unwrap();
        let expected = 0.16038 / 0.44838;
        assert_abs_diff_eq!(rain.prob(&Value::from(true)), expected, epsilon = 1e-9);
        assert!(rain.is_normalized());
    }

    #[test]
    fn test_query_on_evidence_is_point_mass() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        let results = engine
            .infer(&["Rain", "Sprinkler"], &evidence(&[("Rain", true.into())]))
            .unwrap();
        assert_eq!(results[0], Distribution::point(true));
        // P(S=T | R=T) = 0.01
        assert_abs_diff_eq!(results[1].prob(&Value::from(true)), 0.01, epsilon = PROB_TOLERANCE);
    }

    #[test]
    fn test_unknown_query_variable() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        let err = engine.infer(&["Z"], &Evidence::new()).unwrap_err();
        assert_eq!(err, ProbError::UnknownVariable { name: "Z".into() });
        assert!(err.is_inference_error());

        let err = engine
            .infer(&["Rain"], &evidence(&[("Cloudy", true.into())]))
            .unwrap_err();
        assert!(err.is_inference_error());
    }

    #[test]
    fn test_invalid_evidence_value() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();
        let err = engine
            .infer(&["Rain"], &evidence(&[("WetGrass", 1.into())]))
            .unwrap_err();
        assert!(matches!(err, ProbError::InvalidEvidence { .. }));
    }

    #[test]
    fn test_zero_probability_evidence() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        // Wet grass with neither rain nor sprinkler is impossible
        let ev = evidence(&[
            ("Rain", false.into()),
            ("Sprinkler", false.into()),
            ("WetGrass", true.into()),
        ]);
        assert_eq!(engine.evidence_probability(&ev).unwrap(), 0.0);

        // Observed query variables need no computation
        let results = engine.infer(&["Rain"], &ev).unwrap();
        assert_eq!(results[0], Distribution::point(false));
    }

    #[test]
    fn test_degenerate_evidence_on_free_query() {
        let mut net = BayesianNetwork::new();
        net.add_node("A", vec![false, true], None).unwrap();
        net.add_node("B", vec![false, true], None).unwrap();
        net.add_edge("A", "B").unwrap();
        net.set_cpt(
            "B",
            vec![
                (vec![false], Distribution::point(false)),
                (vec![true], Distribution::point(false)),
            ],
        )
        .unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        let err = engine
            .compute_marginal("A", &evidence(&[("B", true.into())]))
            .unwrap_err();
        assert!(matches!(err, ProbError::DegenerateDistribution { .. }));
    }

    #[test]
    fn test_update_beliefs_skips_evidence() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        let beliefs = engine
            .update_beliefs(&evidence(&[("WetGrass", true.into())]))
            .unwrap();
        let names: Vec<&str> = beliefs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Rain", "Sprinkler"]);
    }

    #[test]
    fn test_joint_and_evidence_probability() {
        let net = sprinkler_network().unwrap();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap();

        let full = evidence(&[
            ("Rain", true.into()),
            ("Sprinkler", false.into()),
            ("WetGrass", true.into()),
        ]);
        assert_abs_diff_eq!(engine.joint_probability(&full).unwrap(), 0.1584, epsilon = 1e-12);

        let partial = evidence(&[("Rain", true.into())]);
        assert!(matches!(
            engine.joint_probability(&partial),
            Err(ProbError::InvalidEvidence { .. })
        ));

        let wet = evidence(&[("WetGrass", true.into())]);
        assert_abs_diff_eq!(engine.evidence_probability(&wet).unwrap(), 0.44838, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_cpt_fails_at_engine_construction() {
        let mut net = BayesianNetwork::new();
        net.add_node("A", vec![false, true], None).unwrap();
        net.add_node("B", vec![false, true], None).unwrap();
        net.add_edge("A", "B").unwrap();

        let err = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap_err();
        assert_eq!(err, ProbError::MissingCpt { node: "B".into() });
    }

    #[test]
    fn test_cyclic_network_fails_at_engine_construction() {
        let mut net = BayesianNetwork::new();
        net.add_node("A", vec![false, true], None).unwrap();
        net.add_node("B", vec![false, true], None).unwrap();
        net.add_edge("A", "B").unwrap();
        net.add_edge("B", "A").unwrap();

        let err = InferenceEngine::new(&net, InferenceMethod::VariableElimination).unwrap_err();
        assert!(matches!(err, ProbError::CycleDetected { .. }));
    }

    #[test]
    fn test_invalid_gibbs_config_rejected() {
        let net = sprinkler_network().unwrap();
        let method = InferenceMethod::Mcmc(GibbsConfig::default().with_samples(0));
        assert!(matches!(
            InferenceEngine::new(&net, method),
            Err(ProbError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_gibbs_two_node() {
        let net = two_node_network();
        let config = GibbsConfig::default().with_samples(20_000).with_seed(42);
        let engine = InferenceEngine::new(&net, InferenceMethod::Mcmc(config)).unwrap();

        let a = engine
            .compute_marginal("A", &evidence(&[("B", true.into())]))
            .unwrap();
        assert_abs_diff_eq!(a.prob(&Value::from(true)), 0.24 / 0.31, epsilon = 0.03);
    }

    #[test]
    fn test_seeded_gibbs_is_reproducible() {
        let net = sprinkler_network().unwrap();
        let config = GibbsConfig::default().with_samples(2_000).with_burn_in(100).with_seed(7);
        let engine = InferenceEngine::new(&net, InferenceMethod::Mcmc(config)).unwrap();
        let ev = evidence(&[("WetGrass", true.into())]);

        let first = engine.compute_marginal("Rain", &ev).unwrap();
        let second = engine.compute_marginal("Rain", &ev).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let net = sprinkler_network().unwrap();
        let token = CancellationToken::new();
        let engine = InferenceEngine::new(&net, InferenceMethod::VariableElimination)
            .unwrap()
            .with_cancellation(token.clone());

        token.cancel();
        assert!(engine.cancellation_token().is_cancelled());
        assert!(matches!(
            engine.infer(&["Rain"], &Evidence::new()),
            Err(ProbError::Cancelled { .. })
        ));

        token.reset();
        assert!(engine.infer(&["Rain"], &Evidence::new()).is_ok());
    }
}
