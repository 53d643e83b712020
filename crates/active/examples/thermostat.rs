//! Thermostat agent walkthrough
//!
//! Run with: cargo run -p cognitive-active --example thermostat
//!
//! This example demonstrates:
//! - Declaring a generative model with tables and closures
//! - Perception as Bayesian belief updating
//! - Action selection by expected free energy
//! - Preferences steering the agent toward warm rooms

use cognitive_active::{
    ActiveError, ActiveInferenceAgent, AgentConfig, ObservationTable, TracingHook,
    TransitionTable,
};
use std::sync::Arc;

fn main() -> Result<(), ActiveError> {
    println!("=== Thermostat Agent ===\n");

    let rooms = ["cold", "warm"];

    // -------------------------------------------------------------------------
    // 1. Generative model
    // -------------------------------------------------------------------------
    println!("1. Generative model");
    println!("-------------------");
    println!();
    println!("  wait: room stays as it is");
    println!("  heat: room becomes warm");
    println!("  P(shiver | cold) = 0.9, P(sweat | warm) = 0.9");
    println!();

    let mut agent = ActiveInferenceAgent::new(
        rooms.to_vec(),
        vec!["shiver", "sweat"],
        vec!["wait", "heat"],
    )?
    .with_config(AgentConfig::default().greedy())?
    .with_preferences(vec![("cold", 0.1), ("warm", 0.9)])?
    .with_hook(Arc::new(TracingHook));

    agent.set_transition_model(
        TransitionTable::new()
            .with_stay("wait", &rooms)
            .with_move_to("heat", &rooms, "warm"),
    );
    agent.set_observation_model(
        ObservationTable::new()
            .with("cold", "shiver", 0.9)
            .with("cold", "sweat", 0.1)
            .with("warm", "shiver", 0.1)
            .with("warm", "sweat", 0.9),
    );
    println!("Phase: {:?}\n", agent.phase());

    // -------------------------------------------------------------------------
    // 2. Perception-action loop
    // -------------------------------------------------------------------------
    println!("2. Perception-action loop");
    println!("-------------------------");
    println!();

    for (step, observation) in ["shiver", "sweat", "sweat"].iter().enumerate() {
        agent.update_beliefs(observation)?;
        let beliefs = agent.beliefs();
        println!(
            "Step {}: observed {:<6}  q(cold) = {:.3}  H = {:.3} nats",
            step,
            observation,
            beliefs.probability("cold")?,
            beliefs.entropy()
        );

        for (action, g) in agent.expected_free_energies(None)? {
            println!("    G({:<4}) = {:.4}", action, g);
        }

        let action = agent.select_action(None)?;
        println!("    → {}", action);
        agent.advance(&action)?;
        println!("    F = {:.4}\n", agent.compute_free_energy(None, None)?);
    }

    // -------------------------------------------------------------------------
    // 3. Reset
    // -------------------------------------------------------------------------
    println!("3. Reset");
    println!("--------");
    agent.reset();
    println!("Beliefs: {:?}", agent.beliefs().probabilities());
    println!("Phase:   {:?}", agent.phase());

    Ok(())
}
