//! # Cognitive Active - Active Inference over Discrete States
//!
//! An agent that keeps categorical beliefs over hidden states, updates them
//! from observations, and chooses actions by expected free energy.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      cognitive-active                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  beliefs.rs      BeliefState: q(s) and recent observations      │
//! │  model.rs        TransitionModel, ObservationModel, tables      │
//! │  free_energy.rs  VariationalFreeEnergy: F and G                 │
//! │  policy.rs       PolicySelector: softmax(−G/T) or argmin G      │
//! │  agent.rs        ActiveInferenceAgent: the perception loop      │
//! │  hooks.rs        AgentHook: logging and metrics                 │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │ uses
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       cognitive-prob                            │
//! │              Distribution, ProbError, Value                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use cognitive_active::{ActiveInferenceAgent, ObservationTable, TransitionTable};
//!
//! let states = ["cold", "warm"];
//! let mut agent = ActiveInferenceAgent::new(
//!     states.to_vec(),
//!     vec!["shiver", "sweat"],
//!     vec!["wait", "heat"],
//! )
//! .unwrap();
//!
//! agent.set_transition_model(
//!     TransitionTable::new()
//!         .with_stay("wait", &states)
//!         .with_move_to("heat", &states, "warm"),
//! );
//! agent.set_observation_model(|obs: &str, state: &str| match (obs, state) {
//!     ("shiver", "cold") | ("sweat", "warm") => 0.9,
//!     _ => 0.1,
//! });
//!
//! agent.update_beliefs("shiver").unwrap();
//! let action = agent.select_action(None).unwrap();
//! agent.advance(&action).unwrap();
//! ```

mod agent;
mod beliefs;
mod error;
mod free_energy;
mod hooks;
mod model;
mod policy;

pub use agent::{ActiveInferenceAgent, AgentConfig, AgentPhase, SelectionMode};
pub use beliefs::BeliefState;
pub use error::ActiveError;
pub use free_energy::VariationalFreeEnergy;
pub use hooks::{AgentHook, CompositeHook, NullHook, TracingHook};
pub use model::{ObservationModel, ObservationTable, TransitionModel, TransitionTable};
pub use policy::PolicySelector;
