//! Error types for active inference.

use cognitive_prob::ProbError;
use thiserror::Error;

/// Errors that can occur while updating beliefs or selecting actions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActiveError {
    /// No policies to choose from.
    #[error("Policy set is empty")]
    EmptyPolicySet,

    /// Parallel lists (policies and scores, states and probabilities) differ in length.
    #[error("Length mismatch: expected {expected} entries, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// The agent was used before its generative model was complete.
    #[error("Agent used before its {missing} was set")]
    ModelsNotSet { missing: &'static str },

    /// A state set must not be empty.
    #[error("State set is empty")]
    EmptyStates,

    /// An observation set must not be empty.
    #[error("Observation set is empty")]
    EmptyObservations,

    /// A state, observation or action name appears twice.
    #[error("Duplicate name '{name}'")]
    DuplicateName { name: String },

    /// State name not declared.
    #[error("Unknown state '{name}'")]
    UnknownState { name: String },

    /// Observation name not declared.
    #[error("Unknown observation '{name}'")]
    UnknownObservation { name: String },

    /// Action name not declared.
    #[error("Unknown action '{name}'")]
    UnknownAction { name: String },

    /// Softmax temperature must be positive and finite.
    #[error("Invalid temperature {value}: must be positive and finite")]
    InvalidTemperature { value: f64 },

    /// Complexity precision must be positive and finite.
    #[error("Invalid precision {value}: must be positive and finite")]
    InvalidPrecision { value: f64 },

    /// A probability or weight is negative or not finite.
    #[error("Invalid probability {value} for '{name}'")]
    InvalidProbability { name: String, value: f64 },

    /// A policy score is NaN or negative infinity.
    #[error("Score {value} for policy '{policy}' is not usable")]
    NonFiniteScore { policy: String, value: f64 },

    /// Every policy scored positive infinity.
    #[error("Every policy has infinite expected free energy")]
    AllScoresInfinite,

    /// Beliefs could not be normalized.
    #[error("Degenerate beliefs: {context}")]
    DegenerateBeliefs { context: String },

    /// Error from the probability layer.
    #[error(transparent)]
    Prob(#[from] ProbError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ActiveError::LengthMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "Length mismatch: expected 3 entries, got 2");

        let err = ActiveError::ModelsNotSet {
            missing: "transition model",
        };
        assert_eq!(err.to_string(), "Agent used before its transition model was set");
    }

    #[test]
    fn test_prob_error_converts() {
        fn inner() -> Result<(), ActiveError> {
            Err(ProbError::ZeroWeights)?;
            Ok(())
        }
        assert_eq!(inner(), Err(ActiveError::Prob(ProbError::ZeroWeights)));
    }
}
