//! Error types for probability operations.

use thiserror::Error;

/// The three families of failure a caller may want to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A distribution could not be constructed or queried.
    Distribution,
    /// The network structure is invalid for the requested mutation or query.
    NetworkStructure,
    /// Inference could not be carried out.
    Inference,
}

/// Errors that can occur in probability computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbError {
    // ------------------------------------------------------------------
    // Distribution errors
    // ------------------------------------------------------------------
    /// Empty distribution.
    #[error("Distribution cannot be empty")]
    EmptyDistribution,

    /// Values and weights have different lengths.
    #[error("Length mismatch: {values} values but {weights} weights")]
    LengthMismatch { values: usize, weights: usize },

    /// Negative or non-finite weight encountered.
    #[error("Invalid weight {weight} for value {value}")]
    InvalidWeight { value: String, weight: f64 },

    /// All weights are zero (can't normalize).
    #[error("Cannot normalize: all weights are zero")]
    ZeroWeights,

    /// The same value appears twice in a support or domain.
    #[error("Duplicate value {value}")]
    DuplicateValue { value: String },

    /// Expectation requested over a non-numeric value.
    #[error("Value {value} is not numeric")]
    NonNumericValue { value: String },

    /// No case produced a value for the variable.
    #[error("No observations for variable '{variable}'")]
    NoObservations { variable: String },

    // ------------------------------------------------------------------
    // Network structure errors
    // ------------------------------------------------------------------
    /// A node with this name already exists.
    #[error("Node '{name}' already exists")]
    DuplicateNode { name: String },

    /// A node was declared with no values.
    #[error("Node '{name}' has an empty domain")]
    EmptyDomain { name: String },

    /// An edge or CPT references a node that was never added.
    #[error("Unknown node '{name}'")]
    UnknownNode { name: String },

    /// The edge already exists.
    #[error("Edge {parent} -> {child} already exists")]
    DuplicateEdge { parent: String, child: String },

    /// Adding a parent would invalidate an already assigned CPT.
    #[error("Node '{node}' already has a CPT; add edges before setting CPTs")]
    CptAlreadySet { node: String },

    /// CPT configuration has the wrong number of parent values.
    #[error("CPT for '{node}' expects {expected} parent values, got {got}")]
    ArityMismatch {
        node: String,
        expected: usize,
        got: usize,
    },

    /// A value is not in the domain of the node it is attached to.
    #[error("Value {value} is not in the domain of '{node}'")]
    UnknownValue { node: String, value: String },

    /// A CPT does not cover every parent configuration.
    #[error("CPT for '{node}' is missing {missing} parent configuration(s)")]
    IncompleteCpt { node: String, missing: usize },

    /// A child node has neither a CPT nor a prior.
    #[error("Node '{node}' has parents but no CPT or prior")]
    MissingCpt { node: String },

    /// The edge set contains a cycle.
    #[error("Cycle detected through node '{node}'")]
    CycleDetected { node: String },

    // ------------------------------------------------------------------
    // Inference errors
    // ------------------------------------------------------------------
    /// Inference method name not recognized.
    #[error("Unknown inference method '{name}'")]
    UnknownMethod { name: String },

    /// Query or evidence variable absent from the network.
    #[error("Unknown variable '{name}'")]
    UnknownVariable { name: String },

    /// Evidence assigns a value outside the variable's domain.
    #[error("Evidence {variable}={value} is outside the variable's domain")]
    InvalidEvidence { variable: String, value: String },

    /// A distribution could not be normalized mid-computation.
    #[error("Degenerate distribution: {context}")]
    DegenerateDistribution { context: String },

    /// Invalid engine configuration.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Sampling was cancelled through a cancellation token.
    #[error("Inference cancelled after {completed} sweep(s)")]
    Cancelled { completed: usize },

    /// Sampling exceeded its time budget.
    #[error("Inference exceeded its time budget after {completed} sweep(s)")]
    TimedOut { completed: usize },
}

impl ProbError {
    /// The error family this variant belongs to.
    pub fn kind(&self) -> ErrorKind {
        use ProbError::*;
        match self {
            EmptyDistribution
            | LengthMismatch { .. }
            | InvalidWeight { .. }
            | ZeroWeights
            | DuplicateValue { .. }
            | NonNumericValue { .. }
            | NoObservations { .. } => ErrorKind::Distribution,
            DuplicateNode { .. }
            | EmptyDomain { .. }
            | UnknownNode { .. }
            | DuplicateEdge { .. }
            | CptAlreadySet { .. }
            | ArityMismatch { .. }
            | UnknownValue { .. }
            | IncompleteCpt { .. }
            | MissingCpt { .. }
            | CycleDetected { .. } => ErrorKind::NetworkStructure,
            UnknownMethod { .. }
            | UnknownVariable { .. }
            | InvalidEvidence { .. }
            | DegenerateDistribution { .. }
            | InvalidConfig { .. }
            | Cancelled { .. }
            | TimedOut { .. } => ErrorKind::Inference,
        }
    }

    /// Shorthand for `kind() == ErrorKind::NetworkStructure`.
    pub fn is_structure_error(&self) -> bool {
        self.kind() == ErrorKind::NetworkStructure
    }

    /// Shorthand for `kind() == ErrorKind::Inference`.
    pub fn is_inference_error(&self) -> bool {
        self.kind() == ErrorKind::Inference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let dup = ProbError::DuplicateNode { name: "X".into() };
        assert!(dup.is_structure_error());

        let method = ProbError::UnknownMethod {
            name: "belief_propagation".into(),
        };
        assert!(method.is_inference_error());
        assert_eq!(ProbError::ZeroWeights.kind(), ErrorKind::Distribution);
    }

    #[test]
    fn test_error_display() {
        let err = ProbError::ArityMismatch {
            node: "WetGrass".into(),
            expected: 2,
            got: 1,
        };
        assert_eq!(
            err.to_string(),
            "CPT for 'WetGrass' expects 2 parent values, got 1"
        );
    }
}
