//! The active-inference agent.
//!
//! The agent keeps categorical beliefs over hidden states and runs the
//! perception–action loop of the free-energy principle:
//!
//! ```text
//!   observation ──▶ update_beliefs ──▶ q(s)
//!                                       │
//!              select_action ◀── G(a) for every action
//!                    │
//!                    ▼
//!              advance(action) ──▶ q'(s')
//! ```
//!
//! Perception minimizes variational free energy by exact Bayesian updating;
//! action selection ranks actions by expected free energy.

use crate::beliefs::{unique_names, BeliefState};
use crate::error::ActiveError;
use crate::free_energy::VariationalFreeEnergy;
use crate::hooks::{AgentHook, NullHook};
use crate::model::{ObservationModel, TransitionModel};
use crate::policy::PolicySelector;
use cognitive_prob::Distribution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Agent Configuration
// ============================================================================

/// How an action is picked from the expected free energies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Sample from `softmax(−G / temperature)`.
    #[default]
    Softmax,
    /// Take the minimum G; ties go to the first action.
    Greedy,
}

/// Configuration for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Softmax temperature for action sampling
    pub temperature: f64,
    /// Precision weighting the complexity term of free energy
    pub precision: f64,
    /// Action selection rule
    pub selection: SelectionMode,
    /// Seed for action sampling; `None` uses OS entropy
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            precision: 1.0,
            selection: SelectionMode::Softmax,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set precision.
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Set the selection rule.
    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    /// Shorthand for greedy selection.
    pub fn greedy(self) -> Self {
        self.with_selection(SelectionMode::Greedy)
    }

    /// Fix the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check temperature and precision are positive and finite.
    pub fn validate(&self) -> Result<(), ActiveError> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(ActiveError::InvalidTemperature {
                value: self.temperature,
            });
        }
        if !self.precision.is_finite() || self.precision <= 0.0 {
            return Err(ActiveError::InvalidPrecision {
                value: self.precision,
            });
        }
        Ok(())
    }
}

/// Lifecycle of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    /// At least one of the models is missing.
    Uninitialized,
    /// Both models set, no step taken since construction or reset.
    Ready,
    /// Inside the perception–action loop.
    Running,
}

// ============================================================================
// Agent
// ============================================================================

/// An agent that perceives and acts by minimizing free energy.
///
/// # Example
///
/// ```rust
/// use cognitive_active::{ActiveInferenceAgent, AgentConfig, ObservationTable, TransitionTable};
///
/// let mut agent = ActiveInferenceAgent::new(
///     vec!["left", "right"],
///     vec!["see_left", "see_right"],
///     vec!["stay", "go_left"],
/// )
/// .unwrap()
/// .with_config(AgentConfig::default().greedy())
/// .unwrap();
///
/// agent.set_transition_model(
///     TransitionTable::new()
///         .with_stay("stay", &["left", "right"])
///         .with_move_to("go_left", &["left", "right"], "left"),
/// );
/// agent.set_observation_model(
///     ObservationTable::new()
///         .with("left", "see_left", 0.9)
///         .with("left", "see_right", 0.1)
///         .with("right", "see_left", 0.1)
///         .with("right", "see_right", 0.9),
/// );
///
/// agent.update_beliefs("see_right").unwrap();
/// assert!(agent.beliefs().probability("right").unwrap() > 0.5);
///
/// let action = agent.select_action(None).unwrap();
/// assert_eq!(action, "stay");
/// ```
pub struct ActiveInferenceAgent {
    states: Vec<String>,
    observations: Vec<String>,
    actions: Vec<String>,
    beliefs: BeliefState,
    transition: Option<Box<dyn TransitionModel>>,
    observation: Option<Box<dyn ObservationModel>>,
    free_energy: VariationalFreeEnergy,
    selector: PolicySelector,
    config: AgentConfig,
    phase: AgentPhase,
    hook: Arc<dyn AgentHook>,
}

impl fmt::Debug for ActiveInferenceAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveInferenceAgent")
            .field("states", &self.states)
            .field("observations", &self.observations)
            .field("actions", &self.actions)
            .field("beliefs", &self.beliefs)
            .field("config", &self.config)
            .field("phase", &self.phase)
            .finish()
    }
}

impl ActiveInferenceAgent {
    /// Create an agent with uniform beliefs and no models.
    ///
    /// # Errors
    ///
    /// Empty state or observation sets and duplicate names within any set.
    /// An empty action set is accepted; [`select_action`](Self::select_action)
    /// then fails with [`ActiveError::EmptyPolicySet`].
    pub fn new<S, O, A>(
        states: Vec<S>,
        observations: Vec<O>,
        actions: Vec<A>,
    ) -> Result<Self, ActiveError>
    where
        S: Into<String>,
        O: Into<String>,
        A: Into<String>,
    {
        let beliefs = BeliefState::uniform(states)?;
        let observations = unique_names(observations)?;
        if observations.is_empty() {
            return Err(ActiveError::EmptyObservations);
        }
        let actions = unique_names(actions)?;
        let config = AgentConfig::default();

        Ok(Self {
            states: beliefs.states().to_vec(),
            observations,
            actions,
            beliefs,
            transition: None,
            observation: None,
            free_energy: VariationalFreeEnergy::new().with_precision(config.precision),
            selector: PolicySelector::new(),
            config,
            phase: AgentPhase::Uninitialized,
            hook: Arc::new(NullHook),
        })
    }

    /// Apply a configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Result<Self, ActiveError> {
        config.validate()?;
        self.selector = match config.seed {
            Some(seed) => PolicySelector::with_seed(seed),
            None => PolicySelector::new(),
        };
        self.free_energy = self.free_energy.with_precision(config.precision);
        self.config = config;
        Ok(self)
    }

    /// Preferred states, used as the prior of every free-energy computation.
    pub fn with_preferences<K, I>(mut self, preferences: I) -> Result<Self, ActiveError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        let free_energy = self.free_energy.clone().with_prior(preferences);
        free_energy.prior_for(&self.states)?;
        self.free_energy = free_energy;
        Ok(self)
    }

    /// Report events to `hook`.
    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hook = hook;
        self
    }

    // ------------------------------------------------------------------
    // Generative model
    // ------------------------------------------------------------------

    /// Set P(next | current, action).
    pub fn set_transition_model<M: TransitionModel + 'static>(&mut self, model: M) {
        self.transition = Some(Box::new(model));
        self.models_changed();
    }

    /// Set P(observation | state).
    pub fn set_observation_model<M: ObservationModel + 'static>(&mut self, model: M) {
        self.observation = Some(Box::new(model));
        self.models_changed();
    }

    fn models_changed(&mut self) {
        if self.phase == AgentPhase::Uninitialized
            && self.transition.is_some()
            && self.observation.is_some()
        {
            self.phase = AgentPhase::Ready;
            self.hook.on_models_set();
        }
    }

    fn models(&self) -> Result<(&dyn TransitionModel, &dyn ObservationModel), ActiveError> {
        match (&self.transition, &self.observation) {
            (Some(t), Some(o)) => Ok((t.as_ref(), o.as_ref())),
            (None, Some(_)) => Err(ActiveError::ModelsNotSet {
                missing: "transition model",
            }),
            (Some(_), None) => Err(ActiveError::ModelsNotSet {
                missing: "observation model",
            }),
            (None, None) => Err(ActiveError::ModelsNotSet {
                missing: "transition and observation models",
            }),
        }
    }

    fn report<T>(&self, result: Result<T, ActiveError>) -> Result<T, ActiveError> {
        if let Err(e) = &result {
            self.hook.on_error(e);
        }
        result
    }

    // ------------------------------------------------------------------
    // Perception
    // ------------------------------------------------------------------

    /// Incorporate `observation` if given, then return the current beliefs.
    pub fn predict(&mut self, observation: Option<&str>) -> Result<Distribution, ActiveError> {
        let result = self.models().map(|_| ());
        self.report(result)?;
        if let Some(obs) = observation {
            self.update_beliefs(obs)?;
        }
        self.phase = AgentPhase::Running;
        let snapshot = self.beliefs.to_distribution().map_err(ActiveError::from);
        self.report(snapshot)
    }

    /// Bayesian update `q(s) ∝ q(s) · P(observation | s)`.
    ///
    /// # Errors
    ///
    /// Missing models, an undeclared observation, or an observation every
    /// believed state deems impossible. Beliefs are untouched on error.
    pub fn update_beliefs(&mut self, observation: &str) -> Result<(), ActiveError> {
        let result = self.posterior(observation);
        let posterior = self.report(result)?;

        let result = self.beliefs.set_probabilities(posterior);
        self.report(result)?;
        self.beliefs.clear_observations();
        self.beliefs.record_observation(observation, 1.0);
        self.phase = AgentPhase::Running;
        self.hook
            .on_beliefs_updated(observation, self.beliefs.entropy());
        Ok(())
    }

    fn posterior(&self, observation: &str) -> Result<Vec<f64>, ActiveError> {
        let (_, likelihood) = self.models()?;
        if !self.observations.iter().any(|o| o == observation) {
            return Err(ActiveError::UnknownObservation {
                name: observation.to_string(),
            });
        }

        let mut posterior = Vec::with_capacity(self.states.len());
        for (state, &q) in self.states.iter().zip(self.beliefs.probabilities()) {
            let l = likelihood.likelihood(observation, state);
            if !l.is_finite() || l < 0.0 {
                return Err(ActiveError::InvalidProbability {
                    name: format!("{} | {}", observation, state),
                    value: l,
                });
            }
            posterior.push(q * l);
        }
        if posterior.iter().sum::<f64>() <= 0.0 {
            return Err(ActiveError::DegenerateBeliefs {
                context: format!("observation '{}' has zero likelihood under the beliefs", observation),
            });
        }
        Ok(posterior)
    }

    /// Variational free energy of `beliefs` given `observations`, defaulting
    /// to the agent's own beliefs and most recent observations.
    pub fn compute_free_energy(
        &self,
        beliefs: Option<&BeliefState>,
        observations: Option<&BTreeMap<String, f64>>,
    ) -> Result<f64, ActiveError> {
        let result = self.models().and_then(|(_, likelihood)| {
            let beliefs = beliefs.unwrap_or(&self.beliefs);
            let observations = observations.unwrap_or(self.beliefs.observations());
            self.free_energy.compute(beliefs, observations, likelihood)
        });
        self.report(result)
    }

    // ------------------------------------------------------------------
    // Action
    // ------------------------------------------------------------------

    /// Expected free energy of every action, in declaration order.
    ///
    /// Evaluated from certainty in `state` when given, otherwise from the
    /// current beliefs.
    pub fn expected_free_energies(
        &self,
        state: Option<&str>,
    ) -> Result<Vec<(String, f64)>, ActiveError> {
        let result = self.try_expected_free_energies(state);
        self.report(result)
    }

    fn try_expected_free_energies(
        &self,
        state: Option<&str>,
    ) -> Result<Vec<(String, f64)>, ActiveError> {
        let (transition, observation) = self.models()?;
        let point;
        let beliefs = match state {
            Some(s) => {
                point = BeliefState::point(self.states.clone(), s)?;
                &point
            }
            None => &self.beliefs,
        };

        self.actions
            .iter()
            .map(|action| {
                let g = self.free_energy.compute_expected_free_energy(
                    beliefs,
                    action,
                    transition,
                    observation,
                    &self.observations,
                )?;
                Ok((action.clone(), g))
            })
            .collect()
    }

    /// Choose an action by expected free energy.
    ///
    /// Uses softmax sampling or greedy selection according to the
    /// configuration.
    pub fn select_action(&mut self, state: Option<&str>) -> Result<String, ActiveError> {
        let result = self.try_select_action(state);
        let (action, g) = self.report(result)?;
        self.phase = AgentPhase::Running;
        self.hook.on_action_selected(&action, g);
        Ok(action)
    }

    fn try_select_action(&mut self, state: Option<&str>) -> Result<(String, f64), ActiveError> {
        self.models()?;
        if self.actions.is_empty() {
            return Err(ActiveError::EmptyPolicySet);
        }
        let scored = self.try_expected_free_energies(state)?;
        let (policies, efes): (Vec<String>, Vec<f64>) = scored.into_iter().unzip();

        let chosen = match self.config.selection {
            SelectionMode::Softmax => {
                self.selector
                    .select_policy(&policies, &efes, self.config.temperature)?
            }
            SelectionMode::Greedy => self.selector.select_greedy(&policies, &efes)?,
        };
        let i = policies
            .iter()
            .position(|p| p == chosen)
            .ok_or(ActiveError::EmptyPolicySet)?;
        Ok((policies[i].clone(), efes[i]))
    }

    /// Propagate beliefs through the transition model after taking `action`.
    pub fn advance(&mut self, action: &str) -> Result<(), ActiveError> {
        let result = self.predicted_after(action);
        let predicted = self.report(result)?;
        let result = self.beliefs.set_probabilities(predicted);
        self.report(result)?;
        self.phase = AgentPhase::Running;
        Ok(())
    }

    fn predicted_after(&self, action: &str) -> Result<Vec<f64>, ActiveError> {
        let (transition, _) = self.models()?;
        if !self.actions.iter().any(|a| a == action) {
            return Err(ActiveError::UnknownAction {
                name: action.to_string(),
            });
        }
        VariationalFreeEnergy::predict_states(&self.beliefs, action, transition)
    }

    /// Back to uniform beliefs with no observations.
    ///
    /// Calling it twice is the same as calling it once.
    pub fn reset(&mut self) {
        self.beliefs.reset();
        self.phase = if self.transition.is_some() && self.observation.is_some() {
            AgentPhase::Ready
        } else {
            AgentPhase::Uninitialized
        };
        self.hook.on_reset();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current lifecycle phase.
    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Current beliefs.
    pub fn beliefs(&self) -> &BeliefState {
        &self.beliefs
    }

    /// Declared states.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Declared observations.
    pub fn observations(&self) -> &[String] {
        &self.observations
    }

    /// Declared actions.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Active configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
