//! Index-addressed view of a network, built once per inference engine.
//!
//! Variables are addressed by their arena index and values by their position
//! in the variable's domain, so the inner loops of both inference strategies
//! never touch names.

use crate::bayesnet::{BayesianNetwork, Cpt};
use crate::error::ProbError;
use crate::value::Value;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

/// Per-variable evidence: `Some(value index)` when observed.
pub(crate) type EvidenceSlots = Vec<Option<usize>>;

#[derive(Debug, Clone)]
pub(crate) struct CompiledNetwork {
    names: Vec<String>,
    index: HashMap<String, usize>,
    domains: Vec<Vec<Value>>,
    /// Topological order of variable indices.
    order: Vec<usize>,
    /// Parents the local table is conditioned on (empty for prior fallbacks).
    parents: Vec<Vec<usize>>,
    /// Variables whose local table mentions this one as a parent.
    children: Vec<Vec<usize>>,
    tables: Vec<Cpt>,
}

impl CompiledNetwork {
    /// Compile the network.
    ///
    /// # Errors
    ///
    /// [`ProbError::CycleDetected`] for a cyclic network and
    /// [`ProbError::MissingCpt`] for a child node with no local model.
    pub(crate) fn new(net: &BayesianNetwork) -> Result<Self, ProbError> {
        let order: Vec<usize> = net
            .topological_indices()?
            .into_iter()
            .map(|i| i.index())
            .collect();

        let n = net.len();
        let mut names = Vec::with_capacity(n);
        let mut domains = Vec::with_capacity(n);
        let mut parents = Vec::with_capacity(n);
        let mut tables = Vec::with_capacity(n);

        for i in 0..n {
            let idx = NodeIndex::new(i);
            names.push(net.node_name(idx).to_string());
            domains.push(net.node_values(idx).to_vec());
            tables.push(net.local_table(idx)?);
            parents.push(if net.uses_parents(idx) {
                net.node_parents(idx).iter().map(|p| p.index()).collect()
            } else {
                Vec::new()
            });
        }

        let mut children = vec![Vec::new(); n];
        for (child, ps) in parents.iter().enumerate() {
            for &p in ps {
                children[p].push(child);
            }
        }

        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Ok(Self {
            names,
            index,
            domains,
            order,
            parents,
            children,
            tables,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn name(&self, var: usize) -> &str {
        &self.names[var]
    }

    pub(crate) fn domain(&self, var: usize) -> &[Value] {
        &self.domains[var]
    }

    pub(crate) fn cardinality(&self, var: usize) -> usize {
        self.domains[var].len()
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn children(&self, var: usize) -> &[usize] {
        &self.children[var]
    }

    /// Resolve a variable name.
    pub(crate) fn variable(&self, name: &str) -> Result<usize, ProbError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ProbError::UnknownVariable {
                name: name.to_string(),
            })
    }

    /// Resolve a name → value evidence map into per-variable slots.
    pub(crate) fn resolve_evidence(
        &self,
        evidence: &HashMap<String, Value>,
    ) -> Result<EvidenceSlots, ProbError> {
        let mut slots = vec![None; self.len()];
        for (name, value) in evidence {
            let var = self.variable(name)?;
            let vi = self.domains[var]
                .iter()
                .position(|v| v == value)
                .ok_or_else(|| ProbError::InvalidEvidence {
                    variable: name.clone(),
                    value: value.to_string(),
                })?;
            slots[var] = Some(vi);
        }
        Ok(slots)
    }

    /// Local distribution row of `var` under the parent values in `assignment`.
    pub(crate) fn local_row(&self, var: usize, assignment: &[usize]) -> &[f64] {
        let table = &self.tables[var];
        let config = self.parents[var]
            .iter()
            .zip(table.parent_states())
            .fold(0, |acc, (&p, &states)| acc * states + assignment[p]);
        table.row_at(config)
    }

    /// P(var = assignment[var] | parents) under a full assignment.
    pub(crate) fn local(&self, var: usize, assignment: &[usize]) -> f64 {
        self.local_row(var, assignment)[assignment[var]]
    }

    /// Joint probability of a full assignment: the product of all local terms.
    pub(crate) fn joint(&self, assignment: &[usize]) -> f64 {
        let mut p = 1.0;
        for var in 0..self.len() {
            p *= self.local(var, assignment);
            if p == 0.0 {
                break;
            }
        }
        p
    }

    /// The Gibbs block for `var`: the variable plus its unobserved parents,
    /// or `var` alone when that joint space exceeds [`MAX_BLOCK_STATES`].
    pub(crate) fn block(&self, var: usize, evidence: &[Option<usize>]) -> Block {
        let mut vars = vec![var];
        vars.extend(
            self.parents[var]
                .iter()
                .copied()
                .filter(|&p| evidence[p].is_none()),
        );

        let joint_states = vars
            .iter()
            .try_fold(1usize, |acc, &v| acc.checked_mul(self.cardinality(v)))
            .filter(|&n| n <= MAX_BLOCK_STATES);
        let states = match joint_states {
            Some(n) => n,
            None => {
                vars.truncate(1);
                self.cardinality(var)
            }
        };

        let mut factors = vars.clone();
        for &v in &vars {
            factors.extend_from_slice(self.children(v));
        }
        factors.sort_unstable();
        factors.dedup();

        Block {
            vars,
            factors,
            states,
        }
    }

    /// Write joint configuration `config` of `block` into `assignment`.
    /// The last block variable changes fastest.
    pub(crate) fn set_block(&self, block: &Block, mut config: usize, assignment: &mut [usize]) {
        for &v in block.vars.iter().rev() {
            let k = self.cardinality(v);
            assignment[v] = config % k;
            config /= k;
        }
    }

    /// Unnormalized conditional of every joint configuration of `block`
    /// given the rest of `assignment`.
    ///
    /// The block's entries of `assignment` are used as scratch space and
    /// restored before return.
    pub(crate) fn block_conditional(
        &self,
        block: &Block,
        assignment: &mut [usize],
        out: &mut Vec<f64>,
    ) {
        let saved: Vec<usize> = block.vars.iter().map(|&v| assignment[v]).collect();
        out.clear();
        for config in 0..block.states {
            self.set_block(block, config, assignment);
            let mut w = 1.0;
            for &f in &block.factors {
                w *= self.local(f, assignment);
                if w == 0.0 {
                    break;
                }
            }
            out.push(w);
        }
        for (&v, &k) in block.vars.iter().zip(&saved) {
            assignment[v] = k;
        }
    }
}

/// Largest joint state space resampled as one Gibbs block.
pub(crate) const MAX_BLOCK_STATES: usize = 64;

/// Variables resampled jointly, with the local terms that mention any of them.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    vars: Vec<usize>,
    /// Variables whose local probability depends on the block.
    factors: Vec<usize>,
    states: usize,
}

impl Block {
    /// The variable the block was built around.
    pub(crate) fn head(&self) -> usize {
        self.vars[0]
    }
}

/// Mixed-radix counter over the unobserved variables of an assignment.
///
/// Observed variables stay at their evidence value; the first call to
/// [`advance`](Odometer::advance) moves past the initial assignment.
pub(crate) struct Odometer<'m> {
    model: &'m CompiledNetwork,
    free: Vec<usize>,
    pub(crate) assignment: Vec<usize>,
}

impl<'m> Odometer<'m> {
    pub(crate) fn new(model: &'m CompiledNetwork, evidence: &[Option<usize>]) -> Self {
        let assignment = evidence.iter().map(|e| e.unwrap_or(0)).collect();
        let free = (0..model.len()).filter(|&v| evidence[v].is_none()).collect();
        Self {
            model,
            free,
            assignment,
        }
    }

    /// Step to the next assignment; false once every assignment was visited.
    pub(crate) fn advance(&mut self) -> bool {
        for &var in self.free.iter().rev() {
            self.assignment[var] += 1;
            if self.assignment[var] < self.model.cardinality(var) {
                return true;
            }
            self.assignment[var] = 0;
        }
        false
    }
}
