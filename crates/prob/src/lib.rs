//! # Cognitive Prob - Discrete Bayesian Networks and Posterior Inference
//!
//! This crate implements the probabilistic reasoning core: finite distributions,
//! Bayesian networks over named discrete variables, and an inference engine
//! that answers posterior queries exactly or by Gibbs sampling.
//!
//! ## Core Concepts
//!
//! - **Distributions are immutable**: weights are normalized once, at construction
//! - **Networks factorize the joint**: `P(X₁, ..., Xₙ) = ∏ᵢ P(Xᵢ | parents(Xᵢ))`
//! - **CPTs are index-addressed**: rows keyed by the row-major index of parent values
//! - **Conditioning renormalizes**: posteriors are joint mass restricted to the evidence
//! - **Logging is injected**: an [`InferenceHook`] observes mutations and queries
//!
//! ## Example: Sprinkler Network
//!
//! ```rust
//! use cognitive_prob::{sprinkler_network, InferenceEngine, InferenceMethod, Value};
//! use std::collections::HashMap;
//!
//! let net = sprinkler_network().unwrap();
//! let engine = InferenceEngine::from_method_name(&net, "variable_elimination").unwrap();
//!
//! // The grass is wet: did it rain?
//! let mut evidence = HashMap::new();
//! evidence.insert("WetGrass".to_string(), Value::from(true));
//! let rain = engine.compute_marginal("Rain", &evidence).unwrap();
//!
//! // Prior 20%, posterior about 36%
//! assert!(rain.prob(&Value::from(true)) > 0.35);
//! ```

mod bayesnet;
mod compiled;
mod dist;
mod error;
mod gibbs;
mod hooks;
mod inference;
mod prior;
mod value;

pub use bayesnet::{
    sprinkler_network, BayesianNetwork, Cpt, CptRowSnapshot, NetworkSnapshot, NodeSnapshot,
};
pub use dist::Distribution;
pub use error::{ErrorKind, ProbError};
pub use gibbs::GibbsConfig;
pub use hooks::{CompositeHook, InferenceHook, NullHook, TracingHook};
pub use inference::{CancellationToken, Evidence, InferenceEngine, InferenceMethod};
pub use prior::{build_prior_from_cases, PriorBuilder};
pub use value::Value;

/// Tolerance for probability comparisons.
pub const PROB_TOLERANCE: f64 = 1e-9;
