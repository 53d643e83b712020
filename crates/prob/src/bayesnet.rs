//! Bayesian networks over named discrete variables.
//!
//! A Bayesian network is a directed acyclic graph where:
//! - Nodes are random variables with a fixed, ordered domain of values
//! - Edges represent conditional dependencies (parent → child)
//! - Each node has a conditional probability table (CPT) given its parents
//!
//! The joint distribution factorizes as `P(X₁, ..., Xₙ) = ∏ᵢ P(Xᵢ | parents(Xᵢ))`.
//!
//! Nodes live in a `petgraph` arena and are addressed by stable integer
//! indices; names are resolved once at the API boundary.

use crate::dist::{ensure_distinct, Distribution};
use crate::error::ProbError;
use crate::hooks::{InferenceHook, NullHook};
use crate::value::Value;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A conditional probability table P(node | parents).
///
/// Rows are indexed by the row-major encoding of the parents' value indices
/// (each index taken within that parent's domain); columns follow the node's
/// own domain order.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpt {
    /// Number of states for each parent, in parent order.
    parent_states: Vec<usize>,
    /// `rows[config][state]` = P(node = state | parents = config).
    rows: Vec<Vec<f64>>,
}

impl Cpt {
    /// Number of parent configurations.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of states for each parent.
    pub fn parent_states(&self) -> &[usize] {
        &self.parent_states
    }

    /// Encode parent states into a single index (row-major order).
    ///
    /// For parents with states [s0, s1], values [v0, v1] encodes as:
    /// idx = v0 * s1 + v1
    ///
    /// `None` if the arity is wrong or a value index is out of range.
    pub fn encode_parents(&self, parent_values: &[usize]) -> Option<usize> {
        if parent_values.len() != self.parent_states.len() {
            return None;
        }
        let mut idx = 0;
        for (&val, &states) in parent_values.iter().zip(&self.parent_states) {
            if val >= states {
                return None;
            }
            idx = idx * states + val;
        }
        Some(idx)
    }

    /// Decode a parent configuration index into individual value indices.
    pub fn decode_parents(&self, idx: usize) -> Option<Vec<usize>> {
        (idx < self.rows.len()).then(|| self.config_values(idx))
    }

    fn config_values(&self, mut idx: usize) -> Vec<usize> {
        let mut values = vec![0; self.parent_states.len()];
        for i in (0..self.parent_states.len()).rev() {
            values[i] = idx % self.parent_states[i];
            idx /= self.parent_states[i];
        }
        values
    }

    /// The distribution row for a parent configuration index.
    pub fn row(&self, config: usize) -> Option<&[f64]> {
        self.rows.get(config).map(Vec::as_slice)
    }

    /// Row lookup for configurations built from in-range value indices.
    pub(crate) fn row_at(&self, config: usize) -> &[f64] {
        &self.rows[config]
    }

    /// Get P(node=state | parent_values), all given as domain indices.
    pub fn prob(&self, state: usize, parent_values: &[usize]) -> Option<f64> {
        let row = self.row(self.encode_parents(parent_values)?)?;
        row.get(state).copied()
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    values: Vec<Value>,
    /// Prior re-expressed over the full domain, in domain order.
    prior: Option<Distribution>,
    cpt: Option<Cpt>,
    /// Parents in the order their edges were added.
    parents: Vec<NodeIndex>,
}

impl NodeData {
    fn value_index(&self, value: &Value) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }
}

/// A Bayesian network over named discrete variables.
///
/// Built incrementally: add nodes, then edges between them, then CPTs. Every
/// mutator validates its input completely before touching the network, so a
/// failed call leaves the structure unchanged.
///
/// An [`InferenceEngine`](crate::InferenceEngine) borrows the network
/// immutably, so the structure cannot change while an engine exists.
///
/// # Example
///
/// ```rust
/// use cognitive_prob::{BayesianNetwork, Distribution};
///
/// let mut net = BayesianNetwork::new();
/// net.add_node("Rain", vec![false, true], None).unwrap();
/// net.add_node("Wet", vec![false, true], None).unwrap();
/// net.add_edge("Rain", "Wet").unwrap();
/// net.set_cpt("Rain", vec![(Vec::<bool>::new(), Distribution::new(vec![false, true], vec![0.8, 0.2]).unwrap())]).unwrap();
/// net.set_cpt("Wet", vec![
///     (vec![false], Distribution::new(vec![false, true], vec![0.9, 0.1]).unwrap()),
///     (vec![true], Distribution::new(vec![false, true], vec![0.1, 0.9]).unwrap()),
/// ]).unwrap();
///
/// assert_eq!(net.topological_order().unwrap(), vec!["Rain", "Wet"]);
/// ```
#[derive(Clone)]
pub struct BayesianNetwork {
    graph: DiGraph<NodeData, ()>,
    index: HashMap<String, NodeIndex>,
    hook: Arc<dyn InferenceHook>,
}

impl Default for BayesianNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BayesianNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BayesianNetwork")
            .field("nodes", &self.node_names())
            .field("edges", &self.edges())
            .finish()
    }
}

impl BayesianNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            hook: Arc::new(NullHook),
        }
    }

    /// Attach a hook that observes mutations and errors.
    pub fn with_hook(mut self, hook: Arc<dyn InferenceHook>) -> Self {
        self.hook = hook;
        self
    }

    /// The hook attached to this network.
    pub fn hook(&self) -> &Arc<dyn InferenceHook> {
        &self.hook
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Register a node with its ordered domain and an optional prior.
    ///
    /// # Errors
    ///
    /// Structure errors for a duplicate name, an empty domain or repeated
    /// domain values; [`ProbError::UnknownValue`] if the prior puts mass on a
    /// value outside the domain.
    pub fn add_node<V: Into<Value>>(
        &mut self,
        name: impl Into<String>,
        values: Vec<V>,
        prior: Option<Distribution>,
    ) -> Result<(), ProbError> {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let result = self.validate_node(&name, &values, prior.as_ref());
        let prior = self.report(result)?;

        let n_values = values.len();
        let idx = self.graph.add_node(NodeData {
            name: name.clone(),
            values,
            prior,
            cpt: None,
            parents: Vec::new(),
        });
        self.hook.on_node_added(&name, n_values);
        self.index.insert(name, idx);
        Ok(())
    }

    fn validate_node(
        &self,
        name: &str,
        values: &[Value],
        prior: Option<&Distribution>,
    ) -> Result<Option<Distribution>, ProbError> {
        if self.index.contains_key(name) {
            return Err(ProbError::DuplicateNode {
                name: name.to_string(),
            });
        }
        if values.is_empty() {
            return Err(ProbError::EmptyDomain {
                name: name.to_string(),
            });
        }
        ensure_distinct(values)?;

        prior
            .map(|p| align_to_domain(name, values, p))
            .transpose()
    }

    /// Register a directed edge `parent -> child`.
    ///
    /// The parent is appended to the child's parent list; CPT keys follow
    /// this order.
    ///
    /// # Errors
    ///
    /// [`ProbError::UnknownNode`] if either endpoint is unregistered,
    /// [`ProbError::DuplicateEdge`] for a repeated edge and
    /// [`ProbError::CptAlreadySet`] if the child's CPT was already assigned.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), ProbError> {
        let result = self.validate_edge(parent, child);
        let (p, c) = self.report(result)?;

        self.graph.add_edge(p, c, ());
        self.graph[c].parents.push(p);
        self.hook.on_edge_added(parent, child);
        Ok(())
    }

    fn validate_edge(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<(NodeIndex, NodeIndex), ProbError> {
        let p = self.node_index(parent)?;
        let c = self.node_index(child)?;
        if self.graph[c].parents.contains(&p) {
            return Err(ProbError::DuplicateEdge {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if self.graph[c].cpt.is_some() {
            return Err(ProbError::CptAlreadySet {
                node: child.to_string(),
            });
        }
        Ok((p, c))
    }

    /// Assign the CPT of `node`.
    ///
    /// `table` maps every parent-value tuple (ordered like the node's parents)
    /// to a distribution over the node's values. Values of the node missing
    /// from a row get probability zero. A root node takes a single row keyed
    /// by the empty tuple.
    ///
    /// # Errors
    ///
    /// Structure errors for an unknown node, a tuple whose arity differs from
    /// the parent count, a value outside a parent's or the node's domain, a
    /// repeated tuple, or a table that misses a parent configuration.
    pub fn set_cpt<K, V, I>(&mut self, node: &str, table: I) -> Result<(), ProbError>
    where
        I: IntoIterator<Item = (K, Distribution)>,
        K: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let table: Vec<(Vec<Value>, Distribution)> = table
            .into_iter()
            .map(|(k, d)| (k.into_iter().map(Into::into).collect(), d))
            .collect();
        let result = self.build_cpt(node, &table);
        let (idx, cpt) = self.report(result)?;

        let rows = cpt.n_rows();
        self.graph[idx].cpt = Some(cpt);
        self.hook.on_cpt_set(node, rows);
        Ok(())
    }

    /// Assign the CPT of `node` from raw probability maps.
    ///
    /// Each row is normalized like a [`Distribution`].
    pub fn set_cpt_probs<K, V, I, P, W>(&mut self, node: &str, table: I) -> Result<(), ProbError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: IntoIterator<Item = V>,
        V: Into<Value>,
        P: IntoIterator<Item = (W, f64)>,
        W: Into<Value>,
    {
        let mut rows = Vec::new();
        for (key, probs) in table {
            let dist = Distribution::from_pairs(probs);
            let dist = self.report(dist)?;
            rows.push((key, dist));
        }
        self.set_cpt(node, rows)
    }

    fn build_cpt(
        &self,
        node: &str,
        table: &[(Vec<Value>, Distribution)],
    ) -> Result<(NodeIndex, Cpt), ProbError> {
        let idx = self.node_index(node)?;
        let data = &self.graph[idx];
        let parents: Vec<&NodeData> = data.parents.iter().map(|&p| &self.graph[p]).collect();
        let parent_states: Vec<usize> = parents.iter().map(|p| p.values.len()).collect();
        let n_rows: usize = parent_states.iter().product();

        let mut cpt = Cpt {
            parent_states,
            rows: vec![Vec::new(); n_rows],
        };

        for (key, dist) in table {
            if key.len() != parents.len() {
                return Err(ProbError::ArityMismatch {
                    node: node.to_string(),
                    expected: parents.len(),
                    got: key.len(),
                });
            }

            let mut config = Vec::with_capacity(key.len());
            for (parent, value) in parents.iter().zip(key.iter()) {
                let vi = parent
                    .value_index(value)
                    .ok_or_else(|| ProbError::UnknownValue {
                        node: parent.name.clone(),
                        value: value.to_string(),
                    })?;
                config.push(vi);
            }

            let row_idx = cpt
                .encode_parents(&config)
                .ok_or_else(|| ProbError::ArityMismatch {
                    node: node.to_string(),
                    expected: parents.len(),
                    got: config.len(),
                })?;
            if !cpt.rows[row_idx].is_empty() {
                return Err(ProbError::DuplicateValue {
                    value: format_config(key),
                });
            }

            let row = align_to_domain(node, &data.values, dist)?;
            cpt.rows[row_idx] = row.probabilities().to_vec();
        }

        let missing = cpt.rows.iter().filter(|r| r.is_empty()).count();
        if missing > 0 {
            return Err(ProbError::IncompleteCpt {
                node: node.to_string(),
                missing,
            });
        }

        Ok((idx, cpt))
    }

    fn report<T>(&self, result: Result<T, ProbError>) -> Result<T, ProbError> {
        if let Err(e) = &result {
            self.hook.on_error(e);
        }
        result
    }

    // ------------------------------------------------------------------
    // Structure queries
    // ------------------------------------------------------------------

    /// Topological order of the node names.
    ///
    /// Iterative depth-first search with an explicit stack; roots are visited
    /// in insertion order, so the result is stable for an unmutated network.
    ///
    /// # Errors
    ///
    /// [`ProbError::CycleDetected`] if the edge set contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, ProbError> {
        let result = self.topological_indices();
        let order = self.report(result)?;
        Ok(order
            .into_iter()
            .map(|i| self.graph[i].name.clone())
            .collect())
    }

    /// Topological order as arena indices.
    pub(crate) fn topological_indices(&self) -> Result<Vec<NodeIndex>, ProbError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let n = self.graph.node_count();
        let children: Vec<Vec<NodeIndex>> = self
            .graph
            .node_indices()
            .map(|i| self.sorted_children(i))
            .collect();

        let mut marks = vec![Mark::Unvisited; n];
        let mut postorder = Vec::with_capacity(n);
        // (node, position of the next child to visit)
        let mut stack: Vec<(NodeIndex, usize)> = Vec::new();

        for root in self.graph.node_indices() {
            if marks[root.index()] != Mark::Unvisited {
                continue;
            }
            marks[root.index()] = Mark::InProgress;
            stack.push((root, 0));

            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                if let Some(&child) = children[node.index()].get(*next) {
                    *next += 1;
                    match marks[child.index()] {
                        Mark::Unvisited => {
                            marks[child.index()] = Mark::InProgress;
                            stack.push((child, 0));
                        }
                        Mark::InProgress => {
                            return Err(ProbError::CycleDetected {
                                node: self.graph[child].name.clone(),
                            });
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node.index()] = Mark::Done;
                    postorder.push(node);
                    stack.pop();
                }
            }
        }

        postorder.reverse();
        Ok(postorder)
    }

    fn sorted_children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    pub(crate) fn node_index(&self, name: &str) -> Result<NodeIndex, ProbError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ProbError::UnknownNode {
                name: name.to_string(),
            })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// True if no node has been added.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// True if a node with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Node names in insertion order.
    pub fn node_names(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|i| self.graph[i].name.as_str())
            .collect()
    }

    /// Edges as `(parent, child)` name pairs, grouped by child in insertion order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .node_indices()
            .flat_map(|c| {
                self.graph[c]
                    .parents
                    .iter()
                    .map(move |&p| (self.graph[p].name.as_str(), self.graph[c].name.as_str()))
            })
            .collect()
    }

    /// Domain of a node.
    pub fn values(&self, name: &str) -> Result<&[Value], ProbError> {
        Ok(&self.graph[self.node_index(name)?].values)
    }

    /// Parents of a node, in CPT key order.
    pub fn parents(&self, name: &str) -> Result<Vec<&str>, ProbError> {
        let idx = self.node_index(name)?;
        Ok(self.graph[idx]
            .parents
            .iter()
            .map(|&p| self.graph[p].name.as_str())
            .collect())
    }

    /// Children of a node, in insertion order.
    pub fn children(&self, name: &str) -> Result<Vec<&str>, ProbError> {
        let idx = self.node_index(name)?;
        Ok(self
            .sorted_children(idx)
            .into_iter()
            .map(|c| self.graph[c].name.as_str())
            .collect())
    }

    /// Prior of a node, expressed over its full domain.
    pub fn prior(&self, name: &str) -> Result<Option<&Distribution>, ProbError> {
        Ok(self.graph[self.node_index(name)?].prior.as_ref())
    }

    /// CPT of a node, if assigned.
    pub fn cpt(&self, name: &str) -> Result<Option<&Cpt>, ProbError> {
        Ok(self.graph[self.node_index(name)?].cpt.as_ref())
    }

    // ------------------------------------------------------------------
    // Local models (used by the inference engine)
    // ------------------------------------------------------------------

    /// Local conditional table of a node, falling back to its prior and, for
    /// root nodes, to a uniform distribution.
    pub(crate) fn local_table(&self, idx: NodeIndex) -> Result<Cpt, ProbError> {
        let data = &self.graph[idx];
        if let Some(cpt) = &data.cpt {
            return Ok(cpt.clone());
        }
        if let Some(prior) = &data.prior {
            return Ok(Cpt {
                parent_states: Vec::new(),
                rows: vec![prior.probabilities().to_vec()],
            });
        }
        if data.parents.is_empty() {
            let n = data.values.len();
            return Ok(Cpt {
                parent_states: Vec::new(),
                rows: vec![vec![1.0 / n as f64; n]],
            });
        }
        Err(ProbError::MissingCpt {
            node: data.name.clone(),
        })
    }

    /// Whether the local table ignores the parents (prior fallback).
    pub(crate) fn uses_parents(&self, idx: NodeIndex) -> bool {
        self.graph[idx].cpt.is_some()
    }

    pub(crate) fn node_parents(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.graph[idx].parents
    }

    pub(crate) fn node_values(&self, idx: NodeIndex) -> &[Value] {
        &self.graph[idx].values
    }

    pub(crate) fn node_name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    // ------------------------------------------------------------------
    // Read-only export
    // ------------------------------------------------------------------

    /// Plain nested representation of the structure, for read-only consumers.
    pub fn snapshot(&self) -> NetworkSnapshot {
        let nodes = self
            .graph
            .node_indices()
            .map(|i| {
                let data = &self.graph[i];
                let cpt = data
                    .cpt
                    .as_ref()
                    .map(|cpt| {
                        cpt.rows
                            .iter()
                            .enumerate()
                            .map(|(r, row)| CptRowSnapshot {
                                parents: cpt
                                    .config_values(r)
                                    .iter()
                                    .zip(data.parents.iter())
                                    .map(|(&vi, &p)| self.graph[p].values[vi].clone())
                                    .collect(),
                                probabilities: row.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                NodeSnapshot {
                    name: data.name.clone(),
                    values: data.values.clone(),
                    parents: data
                        .parents
                        .iter()
                        .map(|&p| self.graph[p].name.clone())
                        .collect(),
                    prior: data.prior.clone(),
                    cpt,
                }
            })
            .collect();

        let edges = self
            .edges()
            .into_iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();

        NetworkSnapshot { nodes, edges }
    }

    /// The snapshot rendered as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self.snapshot())
    }
}

/// Plain-data view of a whole network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<(String, String)>,
}

/// Plain-data view of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub values: Vec<Value>,
    pub parents: Vec<String>,
    pub prior: Option<Distribution>,
    pub cpt: Vec<CptRowSnapshot>,
}

/// One CPT row: parent values and the probabilities over the node's domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CptRowSnapshot {
    pub parents: Vec<Value>,
    pub probabilities: Vec<f64>,
}

/// Re-express `dist` over `domain`, in domain order.
fn align_to_domain(
    node: &str,
    domain: &[Value],
    dist: &Distribution,
) -> Result<Distribution, ProbError> {
    let mut weights = vec![0.0; domain.len()];
    for (value, p) in dist.iter() {
        let i = domain
            .iter()
            .position(|v| v == value)
            .ok_or_else(|| ProbError::UnknownValue {
                node: node.to_string(),
                value: value.to_string(),
            })?;
        weights[i] = p;
    }
    Distribution::new(domain.to_vec(), weights)
}

fn format_config(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

/// Create the classic "sprinkler" Bayesian network.
///
/// Structure:
/// ```text
///      Rain (R)
///      ↙     ↘
/// Sprinkler   │
///     (S)     │
///        ↘    ↓
///       WetGrass (W)
/// ```
///
/// All variables are boolean. WetGrass's parents are ordered `[Rain, Sprinkler]`.
/// P(Rain=true | WetGrass=true) ≈ 0.3577.
pub fn sprinkler_network() -> Result<BayesianNetwork, ProbError> {
    let tf = || vec![false, true];
    let bern = |p_true: f64| Distribution::new(tf(), vec![1.0 - p_true, p_true]);

    let mut net = BayesianNetwork::new();
    net.add_node("Rain", tf(), None)?;
    net.add_node("Sprinkler", tf(), None)?;
    net.add_node("WetGrass", tf(), None)?;

    net.add_edge("Rain", "Sprinkler")?;
    net.add_edge("Rain", "WetGrass")?;
    net.add_edge("Sprinkler", "WetGrass")?;

    // P(Rain)
    net.set_cpt("Rain", vec![(Vec::<bool>::new(), bern(0.2)?)])?;

    // P(Sprinkler | Rain)
    net.set_cpt(
        "Sprinkler",
        vec![
            (vec![false], bern(0.4)?),  // No rain: sprinkler on 40%
            (vec![true], bern(0.01)?), // Rain: sprinkler on 1%
        ],
    )?;

    // P(WetGrass | Rain, Sprinkler)
    net.set_cpt(
        "WetGrass",
        vec![
            (vec![false, false], bern(0.0)?), // grass dry
            (vec![false, true], bern(0.9)?),  // sprinkler only
            (vec![true, false], bern(0.8)?),  // rain only
            (vec![true, true], bern(0.99)?),  // both
        ],
    )?;

    Ok(net)
}
