//! Agent hooks for observing the perception–action loop.
//!
//! Hooks allow you to observe the agent without changing its behavior:
//! - Logging and debugging
//! - Metrics collection
//! - Replaying decisions
//!
//! ## Example
//!
//! ```ignore
//! struct PrintHook;
//!
//! impl AgentHook for PrintHook {
//!     fn on_action_selected(&self, action: &str, efe: f64) {
//!         println!("chose {} (G = {:.3})", action, efe);
//!     }
//! }
//! ```

use crate::error::ActiveError;

// ============================================================================
// Agent Hook Trait
// ============================================================================

/// Trait for observing agent events.
///
/// All methods have default no-op implementations, so you only need to
/// implement the events you care about.
pub trait AgentHook: Send + Sync {
    /// Called once both the transition and observation models are set.
    fn on_models_set(&self) {}

    /// Called after beliefs were updated from an observation.
    ///
    /// # Arguments
    /// * `observation` - The observation that was incorporated
    /// * `entropy` - Entropy of the updated beliefs, in nats
    fn on_beliefs_updated(&self, _observation: &str, _entropy: f64) {}

    /// Called after an action was chosen.
    ///
    /// # Arguments
    /// * `action` - The chosen action
    /// * `expected_free_energy` - Its expected free energy
    fn on_action_selected(&self, _action: &str, _expected_free_energy: f64) {}

    /// Called after beliefs were reset to uniform.
    fn on_reset(&self) {}

    /// Called when an agent operation fails.
    fn on_error(&self, _error: &ActiveError) {}
}

// ============================================================================
// Null Hook (Default)
// ============================================================================

/// A no-op hook implementation for when no observation is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHook;

impl AgentHook for NullHook {}

// ============================================================================
// Tracing Hook
// ============================================================================

/// A hook that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl AgentHook for TracingHook {
    fn on_models_set(&self) {
        tracing::debug!("generative model complete");
    }

    fn on_beliefs_updated(&self, observation: &str, entropy: f64) {
        tracing::debug!(observation, entropy, "beliefs updated");
    }

    fn on_action_selected(&self, action: &str, expected_free_energy: f64) {
        tracing::info!(action, expected_free_energy, "action selected");
    }

    fn on_reset(&self) {
        tracing::debug!("beliefs reset");
    }

    fn on_error(&self, error: &ActiveError) {
        tracing::warn!(%error, "agent operation failed");
    }
}

// ============================================================================
// Composite Hook
// ============================================================================

/// A hook that delegates to multiple inner hooks.
pub struct CompositeHook {
    hooks: Vec<Box<dyn AgentHook>>,
}

impl CompositeHook {
    /// Create a new composite hook.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the composite.
    pub fn with<H: AgentHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }
}

impl Default for CompositeHook {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentHook for CompositeHook {
    fn on_models_set(&self) {
        for hook in &self.hooks {
            hook.on_models_set();
        }
    }

    fn on_beliefs_updated(&self, observation: &str, entropy: f64) {
        for hook in &self.hooks {
            hook.on_beliefs_updated(observation, entropy);
        }
    }

    fn on_action_selected(&self, action: &str, expected_free_energy: f64) {
        for hook in &self.hooks {
            hook.on_action_selected(action, expected_free_energy);
        }
    }

    fn on_reset(&self) {
        for hook in &self.hooks {
            hook.on_reset();
        }
    }

    fn on_error(&self, error: &ActiveError) {
        for hook in &self.hooks {
            hook.on_error(error);
        }
    }
}
