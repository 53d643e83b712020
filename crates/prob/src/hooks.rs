//! Observation hooks for network mutation and inference.
//!
//! The core never owns a logger. Callers inject a hook and decide where the
//! events go; the default [`NullHook`] discards them.
//!
//! ## Events
//!
//! - `on_node_added` / `on_edge_added` / `on_cpt_set`: network mutation
//! - `on_inference_start` / `on_inference_end`: one `infer` call
//! - `on_prior_built`: an empirical prior was derived from cases
//! - `on_error`: an operation failed
//!
//! ## Example
//!
//! ```ignore
//! struct PrintHook;
//!
//! impl InferenceHook for PrintHook {
//!     fn on_node_added(&self, name: &str, n_values: usize) {
//!         println!("node {} with {} values", name, n_values);
//!     }
//! }
//! ```

use crate::error::ProbError;
use std::time::Duration;

// ============================================================================
// Inference Hook Trait
// ============================================================================

/// Trait for observing network and inference events.
///
/// All methods have default no-op implementations, so you only need to
/// implement the events you care about.
pub trait InferenceHook: Send + Sync {
    /// Called after a node is registered.
    fn on_node_added(&self, _name: &str, _n_values: usize) {}

    /// Called after an edge `parent -> child` is registered.
    fn on_edge_added(&self, _parent: &str, _child: &str) {}

    /// Called after a CPT is assigned.
    ///
    /// # Arguments
    /// * `node` - The child node
    /// * `rows` - Number of parent configurations in the table
    fn on_cpt_set(&self, _node: &str, _rows: usize) {}

    /// Called before an inference call starts computing.
    ///
    /// # Arguments
    /// * `method` - Inference method name
    /// * `query` - Queried variable names
    /// * `n_evidence` - Number of evidence assignments
    fn on_inference_start(&self, _method: &str, _query: &[String], _n_evidence: usize) {}

    /// Called after an inference call succeeded.
    fn on_inference_end(&self, _method: &str, _elapsed: Duration) {}

    /// Called after an empirical prior was built.
    ///
    /// # Arguments
    /// * `variable` - Variable the prior is for
    /// * `n_values` - Number of distinct values in the prior
    /// * `n_cases` - Number of cases that contributed a value
    fn on_prior_built(&self, _variable: &str, _n_values: usize, _n_cases: usize) {}

    /// Called when an operation fails.
    fn on_error(&self, _error: &ProbError) {}
}

// ============================================================================
// Null Hook (Default)
// ============================================================================

/// A no-op hook implementation for when no observation is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHook;

impl InferenceHook for NullHook {}

// ============================================================================
// Tracing Hook
// ============================================================================

/// A hook that emits structured `tracing` events.
///
/// Subscriber setup is left to the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl InferenceHook for TracingHook {
    fn on_node_added(&self, name: &str, n_values: usize) {
        tracing::debug!(node = name, n_values, "node added");
    }

    fn on_edge_added(&self, parent: &str, child: &str) {
        tracing::debug!(parent, child, "edge added");
    }

    fn on_cpt_set(&self, node: &str, rows: usize) {
        tracing::debug!(node, rows, "cpt set");
    }

    fn on_inference_start(&self, method: &str, query: &[String], n_evidence: usize) {
        tracing::info!(method, ?query, n_evidence, "inference started");
    }

    fn on_inference_end(&self, method: &str, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros() as u64;
        tracing::info!(method, elapsed_us, "inference finished");
    }

    fn on_prior_built(&self, variable: &str, n_values: usize, n_cases: usize) {
        tracing::debug!(variable, n_values, n_cases, "prior built");
    }

    fn on_error(&self, error: &ProbError) {
        tracing::warn!(%error, kind = ?error.kind(), "operation failed");
    }
}

// ============================================================================
// Composite Hook
// ============================================================================

/// A hook that delegates to multiple inner hooks.
pub struct CompositeHook {
    hooks: Vec<Box<dyn InferenceHook>>,
}

impl CompositeHook {
    /// Create a new composite hook.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the composite.
    pub fn with<H: InferenceHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }
}

impl Default for CompositeHook {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceHook for CompositeHook {
    fn on_node_added(&self, name: &str, n_values: usize) {
        for hook in &self.hooks {
            hook.on_node_added(name, n_values);
        }
    }

    fn on_edge_added(&self, parent: &str, child: &str) {
        for hook in &self.hooks {
            hook.on_edge_added(parent, child);
        }
    }

    fn on_cpt_set(&self, node: &str, rows: usize) {
        for hook in &self.hooks {
            hook.on_cpt_set(node, rows);
        }
    }

    fn on_inference_start(&self, method: &str, query: &[String], n_evidence: usize) {
        for hook in &self.hooks {
            hook.on_inference_start(method, query, n_evidence);
        }
    }

    fn on_inference_end(&self, method: &str, elapsed: Duration) {
        for hook in &self.hooks {
            hook.on_inference_end(method, elapsed);
        }
    }

    fn on_prior_built(&self, variable: &str, n_values: usize, n_cases: usize) {
        for hook in &self.hooks {
            hook.on_prior_built(variable, n_values, n_cases);
        }
    }

    fn on_error(&self, error: &ProbError) {
        for hook in &self.hooks {
            hook.on_error(error);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
