//! Approximate inference by Gibbs sampling.
//!
//! The chain starts from an assignment with positive probability that agrees
//! with the evidence. Each sweep visits every unobserved variable in
//! topological order and resamples it jointly with its unobserved parents,
//! from their conditional given everything else:
//!
//! P(B | rest) ∝ ∏_{X ∈ B} P(X | parents(X)) · ∏_{C ∈ children(B)} P(C | parents(C))
//!
//! Joint moves let the chain cross between explanations that single-site
//! updates only reach through low-probability states (rain versus sprinkler
//! once the grass is wet). Blocks whose joint space exceeds 64 states fall
//! back to single-variable updates.
//!
//! The first `burn_in` sweeps are discarded; the next `samples` sweeps are
//! tallied into empirical marginals.

use crate::compiled::{Block, CompiledNetwork, Odometer};
use crate::error::ProbError;
use crate::inference::{CancellationToken, InferenceStrategy};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Forward-sampling attempts before falling back to an exhaustive search for
/// a starting state.
const MAX_INIT_ATTEMPTS: usize = 1_000;

/// Configuration for the Gibbs sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GibbsConfig {
    /// Sweeps tallied into the marginals.
    pub samples: usize,
    /// Sweeps discarded before tallying starts.
    pub burn_in: usize,
    /// Seed for the chain; `None` draws one from OS entropy per call.
    pub seed: Option<u64>,
    /// Wall-clock limit for one inference call.
    pub time_budget: Option<Duration>,
}

impl Default for GibbsConfig {
    fn default() -> Self {
        Self {
            samples: 10_000,
            burn_in: 1_000,
            seed: None,
            time_budget: None,
        }
    }
}

impl GibbsConfig {
    /// Set the number of retained sweeps.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Set the number of discarded sweeps.
    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    /// Fix the seed for reproducible chains.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Bound the wall-clock time of one inference call.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ProbError> {
        if self.samples == 0 {
            return Err(ProbError::InvalidConfig {
                reason: "Gibbs sampling needs at least one retained sample".into(),
            });
        }
        self.total_sweeps().map(|_| ())
    }

    /// Burn-in plus retained sweeps.
    pub(crate) fn total_sweeps(&self) -> Result<usize, ProbError> {
        self.burn_in
            .checked_add(self.samples)
            .ok_or_else(|| ProbError::InvalidConfig {
                reason: format!(
                    "burn-in {} plus {} samples overflows the sweep counter",
                    self.burn_in, self.samples
                ),
            })
    }

    /// A fresh generator for one chain.
    pub(crate) fn rng(&self) -> ChaCha20Rng {
        match self.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        }
    }
}

/// Gibbs sampling strategy.
#[derive(Debug, Clone)]
pub(crate) struct GibbsSampler {
    config: GibbsConfig,
}

impl GibbsSampler {
    pub(crate) fn new(config: GibbsConfig) -> Self {
        Self { config }
    }

    fn run(
        &self,
        model: &CompiledNetwork,
        evidence: &[Option<usize>],
        query: &[usize],
        cancel: &CancellationToken,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<f64>>, ProbError> {
        let total = self.config.total_sweeps()?;
        let mut state = initial_state(model, evidence, rng)?;
        let blocks: Vec<Block> = model
            .order()
            .iter()
            .copied()
            .filter(|&v| evidence[v].is_none())
            .map(|v| model.block(v, evidence))
            .collect();

        let mut counts: Vec<Vec<usize>> = query
            .iter()
            .map(|&q| vec![0; model.cardinality(q)])
            .collect();
        let mut weights = Vec::new();
        let started = Instant::now();

        for sweep in 0..total {
            if cancel.is_cancelled() {
                return Err(ProbError::Cancelled { completed: sweep });
            }
            if let Some(budget) = self.config.time_budget {
                if started.elapsed() >= budget {
                    return Err(ProbError::TimedOut { completed: sweep });
                }
            }

            for block in &blocks {
                model.block_conditional(block, &mut state, &mut weights);
                let config = draw(&weights, rng).ok_or_else(|| {
                    ProbError::DegenerateDistribution {
                        context: format!(
                            "conditional of '{}' has zero mass",
                            model.name(block.head())
                        ),
                    }
                })?;
                model.set_block(block, config, &mut state);
            }

            if sweep >= self.config.burn_in {
                for (c, &q) in counts.iter_mut().zip(query) {
                    c[state[q]] += 1;
                }
            }
        }

        let n = self.config.samples as f64;
        Ok(counts
            .into_iter()
            .map(|c| c.into_iter().map(|k| k as f64 / n).collect())
            .collect())
    }
}

impl InferenceStrategy for GibbsSampler {
    fn name(&self) -> &'static str {
        "mcmc"
    }

    fn marginals(
        &self,
        model: &CompiledNetwork,
        evidence: &[Option<usize>],
        query: &[usize],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f64>>, ProbError> {
        self.config.validate()?;
        let mut rng = self.config.rng();
        self.run(model, evidence, query, cancel, &mut rng)
    }
}

/// Sample an index proportionally to unnormalized `weights`.
fn draw(weights: &[f64], rng: &mut dyn RngCore) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    let u = rng.gen::<f64>() * total;
    let mut cumsum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumsum += w;
        if u < cumsum {
            return Some(i);
        }
    }
    weights.iter().rposition(|&w| w > 0.0)
}

/// A positive-probability assignment agreeing with the evidence.
///
/// Tries forward sampling first, then walks every assignment of the free
/// variables.
fn initial_state(
    model: &CompiledNetwork,
    evidence: &[Option<usize>],
    rng: &mut dyn RngCore,
) -> Result<Vec<usize>, ProbError> {
    let mut state: Vec<usize> = evidence.iter().map(|e| e.unwrap_or(0)).collect();

    for _ in 0..MAX_INIT_ATTEMPTS {
        for &var in model.order() {
            if evidence[var].is_none() {
                let row = model.local_row(var, &state);
                state[var] = draw(row, rng).unwrap_or(0);
            }
        }
        if model.joint(&state) > 0.0 {
            return Ok(state);
        }
    }

    tracing::debug!("forward sampling found no start state, searching exhaustively");
    let mut odo = Odometer::new(model, evidence);
    loop {
        if model.joint(&odo.assignment) > 0.0 {
            return Ok(odo.assignment);
        }
        if !odo.advance() {
            break;
        }
    }

    Err(ProbError::DegenerateDistribution {
        context: "evidence has zero probability".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayesnet::{sprinkler_network, BayesianNetwork};
    use crate::dist::Distribution;
    use approx::assert_abs_diff_eq;

    fn evidence(model: &CompiledNetwork, pairs: &[(&str, usize)]) -> Vec<Option<usize>> {
        let mut slots = vec![None; model.len()];
        for (name, v) in pairs {
            slots[model.variable(name).unwrap()] = Some(*v);
        }
        slots
    }

    #[test]
    fn test_default_config() {
        let config = GibbsConfig::default();
        assert_eq!(config.samples, 10_000);
        assert_eq!(config.burn_in, 1_000);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());

        assert!(matches!(
            config.with_samples(0).validate(),
            Err(ProbError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_sweep_count_overflow_rejected() {
        let config = GibbsConfig::default().with_samples(usize::MAX).with_burn_in(1);
        assert!(matches!(
            config.validate(),
            Err(ProbError::InvalidConfig { .. })
        ));

        // No burn-in leaves room for every sample
        let config = GibbsConfig::default().with_samples(usize::MAX).with_burn_in(0);
        assert_eq!(config.total_sweeps(), Ok(usize::MAX));
    }

    #[test]
    fn test_config_serde() {
        let config = GibbsConfig::default()
            .with_seed(7)
            .with_time_budget(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        let back: GibbsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_draw_skips_zero_weights() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..1000 {
            assert_eq!(draw(&[0.0, 2.0, 0.0], &mut rng), Some(1));
        }
        assert_eq!(draw(&[0.0, 0.0], &mut rng), None);
    }

    #[test]
    fn test_initial_state_respects_evidence() {
        let net = sprinkler_network().unwrap();
        let model = CompiledNetwork::new(&net).unwrap();
        let ev = evidence(&model, &[("WetGrass", 1)]);
        let mut rng = ChaCha20Rng::seed_from_u64(11);

        let state = initial_state(&model, &ev, &mut rng).unwrap();
        assert_eq!(state[2], 1);
        assert!(model.joint(&state) > 0.0);
    }

    #[test]
    fn test_impossible_evidence_is_degenerate() {
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

        let model = CompiledNetwork::new(&net).unwrap();
        let ev = evidence(&model, &[("B", 1)]);
        let sampler = GibbsSampler::new(GibbsConfig::default().with_seed(1));
        let result = sampler.marginals(&model, &ev, &[0], &CancellationToken::new());
        assert!(matches!(
            result,
            Err(ProbError::DegenerateDistribution { .. })
        ));
    }

    #[test]
    fn test_chain_recovers_simple_posterior() {
        // A ~ Bern(0.5), B | A deterministic copy: P(A=T | B=T) = 1
        let mut net = BayesianNetwork::new();
        net.add_node("A", vec![false, true], None).unwrap();
        net.add_node("B", vec![false, true], None).unwrap();
        net.add_edge("A", "B").unwrap();
        net.set_cpt(
            "B",
            vec![
                (vec![false], Distribution::point(false)),
                (vec![true], Distribution::point(true)),
            ],
        )
        .unwrap();

        let model = CompiledNetwork::new(&net).unwrap();
        let ev = evidence(&model, &[("B", 1)]);
        let sampler = GibbsSampler::new(
            GibbsConfig::default()
                .with_samples(500)
                .with_burn_in(10)
                .with_seed(5),
        );
        let marginals = sampler
            .marginals(&model, &ev, &[0], &CancellationToken::new())
            .unwrap();
        assert_abs_diff_eq!(marginals[0][1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_block_moves_mix_across_explanations() {
        // Given wet grass, rain and sprinkler compete; a short chain still
        // lands near the exact posterior
        let net = sprinkler_network().unwrap();
        let model = CompiledNetwork::new(&net).unwrap();
        let ev = evidence(&model, &[("WetGrass", 1)]);
        let exact = 0.16038 / 0.44838;

        for seed in 0..10 {
            let sampler = GibbsSampler::new(
                GibbsConfig::default()
                    .with_samples(5_000)
                    .with_burn_in(100)
                    .with_seed(seed),
            );
            let marginals = sampler
                .marginals(&model, &ev, &[0], &CancellationToken::new())
                .unwrap();
            assert_abs_diff_eq!(marginals[0][1], exact, epsilon = 0.05);
        }
    }

    #[test]
    fn test_cancelled_before_first_sweep() {
        let net = sprinkler_network().unwrap();
        let model = CompiledNetwork::new(&net).unwrap();
        let ev = evidence(&model, &[]);
        let token = CancellationToken::new();
        token.cancel();

        let sampler = GibbsSampler::new(GibbsConfig::default().with_seed(9));
        assert_eq!(
            sampler.marginals(&model, &ev, &[0], &token),
            Err(ProbError::Cancelled { completed: 0 })
        );
    }

    #[test]
    fn test_zero_time_budget_times_out() {
        let net = sprinkler_network().unwrap();
        let model = CompiledNetwork::new(&net).unwrap();
        let ev = evidence(&model, &[]);

        let sampler = GibbsSampler::new(
            GibbsConfig::default()
                .with_samples(1_000_000)
                .with_seed(9)
                .with_time_budget(Duration::ZERO),
        );
        let result = sampler.marginals(&model, &ev, &[0], &CancellationToken::new());
        assert!(matches!(result, Err(ProbError::TimedOut { .. })));
    }
}
