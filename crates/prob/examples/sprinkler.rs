//! Sprinkler network walkthrough
//!
//! Run with: cargo run -p cognitive-prob --example sprinkler
//!
//! This example demonstrates:
//! - Building a Bayesian network node by node
//! - Exact posteriors by enumeration
//! - Approximate posteriors by Gibbs sampling
//! - Explaining away: observing the sprinkler lowers belief in rain

use cognitive_prob::{
    sprinkler_network, Evidence, GibbsConfig, InferenceEngine, InferenceMethod, ProbError,
    TracingHook, Value,
};
use std::sync::Arc;

fn main() -> Result<(), ProbError> {
    println!("=== Sprinkler Network ===\n");

    // -------------------------------------------------------------------------
    // 1. Structure
    // -------------------------------------------------------------------------
    println!("1. Structure");
    println!("------------");
    println!();
    println!("       Rain (R)");
    println!("       ↙     ↘");
    println!("  Sprinkler   │");
    println!("      (S)     │");
    println!("         ↘    ↓");
    println!("        WetGrass (W)");
    println!();

    let net = sprinkler_network()?.with_hook(Arc::new(TracingHook));
    println!("Topological order: {:?}", net.topological_order()?);
    for (parent, child) in net.edges() {
        println!("  {} -> {}", parent, child);
    }
    println!();

    // -------------------------------------------------------------------------
    // 2. Exact inference
    // -------------------------------------------------------------------------
    println!("2. Exact inference");
    println!("------------------");
    println!();

    let exact = InferenceEngine::new(&net, InferenceMethod::VariableElimination)?;
    let prior = exact.compute_marginal("Rain", &Evidence::new())?;
    println!("P(Rain=T)                   = {:.4}", prior.prob(&Value::from(true)));

    let mut wet = Evidence::new();
    wet.insert("WetGrass".to_string(), Value::from(true));
    let rain = exact.compute_marginal("Rain", &wet)?;
    println!("P(Rain=T | Wet=T)           = {:.4}", rain.prob(&Value::from(true)));

    let mut explained = wet.clone();
    explained.insert("Sprinkler".to_string(), Value::from(true));
    let rain_explained = exact.compute_marginal("Rain", &explained)?;
    println!(
        "P(Rain=T | Wet=T, Sprk=T)   = {:.4}  (explaining away)",
        rain_explained.prob(&Value::from(true))
    );
    println!("P(Wet=T)                    = {:.4}", exact.evidence_probability(&wet)?);
    println!();

    // -------------------------------------------------------------------------
    // 3. Gibbs sampling
    // -------------------------------------------------------------------------
    println!("3. Gibbs sampling");
    println!("-----------------");
    println!();

    for samples in [1_000, 10_000, 100_000] {
        let config = GibbsConfig::default().with_samples(samples).with_seed(42);
        let gibbs = InferenceEngine::new(&net, InferenceMethod::Mcmc(config))?;
        let approx = gibbs.compute_marginal("Rain", &wet)?;
        let estimate = approx.prob(&Value::from(true));
        println!(
            "  {:>7} samples: P(Rain=T | Wet=T) ≈ {:.4}  (error {:.4})",
            samples,
            estimate,
            (estimate - rain.prob(&Value::from(true))).abs()
        );
    }
    println!();

    // -------------------------------------------------------------------------
    // 4. All beliefs at once
    // -------------------------------------------------------------------------
    println!("4. Belief update");
    println!("----------------");
    println!();

    for (name, dist) in exact.update_beliefs(&wet)? {
        println!("  {:<10} mode={} entropy={:.4} nats", name, dist.mode(), dist.entropy());
    }

    Ok(())
}
