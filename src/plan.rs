//! Logical plan nodes the rewrite rules operate on.
//!
//! Only the node kinds that carry scalar expressions or that the column
//! pruning rules look through are modeled. Plans are immutable; rules build
//! replacement nodes and keep the id of the node they replace.

use crate::error::{OptimizerError, OptimizerResult};
use crate::ir::utils::symbols_of;
use crate::ir::{Expression, Symbol};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(u64);

impl PlanNodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out fresh plan node ids
#[derive(Debug, Default)]
pub struct PlanNodeIdAllocator {
    next: AtomicU64,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first id is `next`, for extending an existing plan
    pub fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    pub fn next_id(&self) -> PlanNodeId {
        PlanNodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered mapping from output symbols to the expressions computing them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignments {
    entries: Vec<(Symbol, Expression)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign each symbol to a reference to itself
    pub fn identity<'a>(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        symbols
            .into_iter()
            .map(|symbol| (symbol.clone(), symbol.to_reference()))
            .collect()
    }

    /// Add an assignment. A later assignment to the same symbol replaces the
    /// earlier one in place.
    pub fn put(&mut self, symbol: Symbol, expression: Expression) {
        match self.entries.iter_mut().find(|(s, _)| *s == symbol) {
            Some(entry) => entry.1 = expression,
            None => self.entries.push((symbol, expression)),
        }
    }

    pub fn with(mut self, symbol: Symbol, expression: Expression) -> Self {
        self.put(symbol, expression);
        self
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Expression> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, e)| e)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.entries.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.entries.iter().map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, Expression)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every assignment is `symbol := symbol`
    pub fn is_identity(&self) -> bool {
        self.entries
            .iter()
            .all(|(s, e)| e.as_symbol().as_ref() == Some(s))
    }

    /// Symbols referenced by the assigned expressions
    pub fn referenced_symbols(&self) -> BTreeSet<Symbol> {
        self.expressions().flat_map(symbols_of).collect()
    }

    /// Rewrite every expression, keeping the output symbols
    pub fn try_map<F>(&self, mut f: F) -> OptimizerResult<Assignments>
    where
        F: FnMut(&Expression) -> OptimizerResult<Expression>,
    {
        let entries = self
            .entries
            .iter()
            .map(|(symbol, expression)| Ok((symbol.clone(), f(expression)?)))
            .collect::<OptimizerResult<Vec<_>>>()?;
        Ok(Assignments { entries })
    }
}

impl FromIterator<(Symbol, Expression)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (Symbol, Expression)>>(iter: I) -> Self {
        let mut assignments = Assignments::new();
        for (symbol, expression) in iter {
            assignments.put(symbol, expression);
        }
        assignments
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// A node of the logical plan tree
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Inline rows. Each row is an expression producing a row value with one
    /// field per output symbol, usually a `ROW(...)` constructor.
    Values {
        id: PlanNodeId,
        output_symbols: Vec<Symbol>,
        rows: Vec<Expression>,
    },

    /// Keep rows for which the predicate is true
    Filter {
        id: PlanNodeId,
        source: Box<PlanNode>,
        predicate: Expression,
    },

    /// Compute new columns
    Project {
        id: PlanNodeId,
        source: Box<PlanNode>,
        assignments: Assignments,
    },

    Join {
        id: PlanNodeId,
        join_type: JoinType,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        filter: Option<Expression>,
    },

    /// Skip the first `count` rows
    Offset {
        id: PlanNodeId,
        source: Box<PlanNode>,
        count: u64,
    },

    /// Row pattern matching (MATCH_RECOGNIZE). Measures are output columns
    /// computed over a match; variable definitions are the predicates
    /// classifying rows into pattern variables.
    PatternRecognition {
        id: PlanNodeId,
        source: Box<PlanNode>,
        measures: Assignments,
        variable_definitions: Vec<(String, Expression)>,
    },
}

impl PlanNode {
    pub fn values(id: PlanNodeId, output_symbols: Vec<Symbol>, rows: Vec<Expression>) -> Self {
        PlanNode::Values {
            id,
            output_symbols,
            rows,
        }
    }

    pub fn filter(id: PlanNodeId, source: PlanNode, predicate: Expression) -> Self {
        PlanNode::Filter {
            id,
            source: Box::new(source),
            predicate,
        }
    }

    pub fn project(id: PlanNodeId, source: PlanNode, assignments: Assignments) -> Self {
        PlanNode::Project {
            id,
            source: Box::new(source),
            assignments,
        }
    }

    pub fn join(
        id: PlanNodeId,
        join_type: JoinType,
        left: PlanNode,
        right: PlanNode,
        filter: Option<Expression>,
    ) -> Self {
        PlanNode::Join {
            id,
            join_type,
            left: Box::new(left),
            right: Box::new(right),
            filter,
        }
    }

    pub fn offset(id: PlanNodeId, source: PlanNode, count: u64) -> Self {
        PlanNode::Offset {
            id,
            source: Box::new(source),
            count,
        }
    }

    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Values { id, .. }
            | PlanNode::Filter { id, .. }
            | PlanNode::Project { id, .. }
            | PlanNode::Join { id, .. }
            | PlanNode::Offset { id, .. }
            | PlanNode::PatternRecognition { id, .. } => *id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanNode::Values { .. } => "Values",
            PlanNode::Filter { .. } => "Filter",
            PlanNode::Project { .. } => "Project",
            PlanNode::Join { .. } => "Join",
            PlanNode::Offset { .. } => "Offset",
            PlanNode::PatternRecognition { .. } => "PatternRecognition",
        }
    }

    /// Symbols produced by this node, in order
    pub fn output_symbols(&self) -> Vec<Symbol> {
        match self {
            PlanNode::Values { output_symbols, .. } => output_symbols.clone(),
            PlanNode::Filter { source, .. } | PlanNode::Offset { source, .. } => {
                source.output_symbols()
            }
            PlanNode::Project { assignments, .. } => assignments.symbols(),
            PlanNode::Join { left, right, .. } => {
                let mut symbols = left.output_symbols();
                symbols.extend(right.output_symbols());
                symbols
            }
            PlanNode::PatternRecognition {
                source, measures, ..
            } => {
                let mut symbols = source.output_symbols();
                symbols.extend(measures.symbols());
                symbols
            }
        }
    }

    pub fn sources(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Values { .. } => vec![],
            PlanNode::Filter { source, .. }
            | PlanNode::Project { source, .. }
            | PlanNode::Offset { source, .. }
            | PlanNode::PatternRecognition { source, .. } => vec![source.as_ref()],
            PlanNode::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Copy of this node over new sources, given in the order of [`sources`](Self::sources)
    pub fn replace_sources(&self, sources: Vec<PlanNode>) -> OptimizerResult<PlanNode> {
        let expected = self.sources().len();
        if sources.len() != expected {
            return Err(OptimizerError::InvalidPlan(format!(
                "{} expects {} sources, got {}",
                self.kind_name(),
                expected,
                sources.len()
            )));
        }

        let mut sources = sources.into_iter().map(Box::new);
        let mut next = || {
            sources
                .next()
                .ok_or_else(|| OptimizerError::InvalidPlan("missing source".to_string()))
        };
        let node = match self {
            PlanNode::Values { .. } => self.clone(),
            PlanNode::Filter { id, predicate, .. } => PlanNode::Filter {
                id: *id,
                source: next()?,
                predicate: predicate.clone(),
            },
            PlanNode::Project {
                id, assignments, ..
            } => PlanNode::Project {
                id: *id,
                source: next()?,
                assignments: assignments.clone(),
            },
            PlanNode::Join {
                id,
                join_type,
                filter,
                ..
            } => PlanNode::Join {
                id: *id,
                join_type: *join_type,
                left: next()?,
                right: next()?,
                filter: filter.clone(),
            },
            PlanNode::Offset { id, count, .. } => PlanNode::Offset {
                id: *id,
                source: next()?,
                count: *count,
            },
            PlanNode::PatternRecognition {
                id,
                measures,
                variable_definitions,
                ..
            } => PlanNode::PatternRecognition {
                id: *id,
                source: next()?,
                measures: measures.clone(),
                variable_definitions: variable_definitions.clone(),
            },
        };
        Ok(node)
    }

    /// Indented one-node-per-line rendering of the tree
    pub fn explain(&self) -> String {
        let mut output = String::new();
        self.explain_into(&mut output, 0);
        output
    }

    fn explain_into(&self, output: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let line = match self {
            PlanNode::Values {
                output_symbols,
                rows,
                ..
            } => format!(
                "Values [{}] rows={}",
                join(output_symbols.iter()),
                join(rows.iter())
            ),
            PlanNode::Filter { predicate, .. } => format!("Filter {}", predicate),
            PlanNode::Project { assignments, .. } => format!(
                "Project [{}]",
                assignments
                    .iter()
                    .map(|(s, e)| format!("{} := {}", s, e))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            PlanNode::Join {
                join_type, filter, ..
            } => match filter {
                Some(filter) => format!("Join {:?} filter={}", join_type, filter),
                None => format!("Join {:?}", join_type),
            },
            PlanNode::Offset { count, .. } => format!("Offset {}", count),
            PlanNode::PatternRecognition {
                measures,
                variable_definitions,
                ..
            } => format!(
                "PatternRecognition measures=[{}] define=[{}]",
                measures
                    .iter()
                    .map(|(s, e)| format!("{} := {}", s, e))
                    .collect::<Vec<_>>()
                    .join(", "),
                variable_definitions
                    .iter()
                    .map(|(name, e)| format!("{} AS {}", name, e))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        output.push_str(&indent);
        output.push_str(&line);
        output.push('\n');
        for source in self.sources() {
            source.explain_into(output, depth + 1);
        }
    }
}

fn join<T: fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}
