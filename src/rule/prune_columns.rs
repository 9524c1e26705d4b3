//! Pruning of columns nobody reads.
//!
//! Each rule matches a Project directly over a node of one kind, works out
//! which of that node's outputs the projection references, and narrows the
//! node (or its own source) to those. A rule does not fire when every output
//! is already referenced.

use crate::error::OptimizerResult;
use crate::ir::utils::symbols_of;
use crate::ir::{Constant, ExprKind, Expression, Symbol};
use crate::plan::{Assignments, PlanNode, PlanNodeIdAllocator};
use crate::rule::{Outcome, Rule, RuleContext};
use crate::types::DataType;
use crate::value::Value;
use log::trace;
use std::collections::BTreeSet;

/// Outputs of the child still referenced by `expressions`, or `None` when
/// all of them are
pub fn prune_inputs<'a>(
    available: &[Symbol],
    expressions: impl IntoIterator<Item = &'a Expression>,
) -> Option<Vec<Symbol>> {
    let referenced: BTreeSet<Symbol> = expressions.into_iter().flat_map(symbols_of).collect();
    let pruned: Vec<Symbol> = available
        .iter()
        .filter(|symbol| referenced.contains(symbol))
        .cloned()
        .collect();
    if pruned.len() == available.len() {
        None
    } else {
        Some(pruned)
    }
}

/// Wrap `node` in an identity projection keeping only `permitted` outputs, or
/// `None` if it already produces nothing else
pub fn restrict_outputs(
    id_allocator: &PlanNodeIdAllocator,
    node: &PlanNode,
    permitted: &BTreeSet<Symbol>,
) -> Option<PlanNode> {
    let outputs = node.output_symbols();
    let restricted: Vec<Symbol> = outputs
        .iter()
        .filter(|symbol| permitted.contains(symbol))
        .cloned()
        .collect();
    if restricted.len() == outputs.len() {
        return None;
    }
    Some(PlanNode::project(
        id_allocator.next_id(),
        node.clone(),
        Assignments::identity(&restricted),
    ))
}

/// Restrict every source of `node` to `permitted`, or `None` if no source
/// changed
pub fn restrict_child_outputs(
    id_allocator: &PlanNodeIdAllocator,
    node: &PlanNode,
    permitted: &BTreeSet<Symbol>,
) -> OptimizerResult<Option<PlanNode>> {
    let mut changed = false;
    let sources = node
        .sources()
        .into_iter()
        .map(|source| match restrict_outputs(id_allocator, source, permitted) {
            Some(restricted) => {
                changed = true;
                restricted
            }
            None => source.clone(),
        })
        .collect::<Vec<_>>();
    if !changed {
        return Ok(None);
    }
    node.replace_sources(sources).map(Some)
}

/// Shared driver for the Project-over-X pruning rules
fn prune_project_source<F>(
    node: &PlanNode,
    context: &RuleContext,
    rule_name: &str,
    push_down: F,
) -> OptimizerResult<Outcome>
where
    F: FnOnce(&PlanNode, &BTreeSet<Symbol>, &RuleContext) -> OptimizerResult<Option<PlanNode>>,
{
    let (source, assignments) = match node {
        PlanNode::Project {
            source,
            assignments,
            ..
        } => (source.as_ref(), assignments),
        _ => return Ok(Outcome::Unchanged),
    };

    let pruned = match prune_inputs(&source.output_symbols(), assignments.expressions()) {
        Some(pruned) => pruned,
        None => return Ok(Outcome::Unchanged),
    };
    let referenced: BTreeSet<Symbol> = pruned.into_iter().collect();

    match push_down(source, &referenced, context)? {
        Some(new_source) => {
            trace!(
                "{}: narrowed {} {} to [{}]",
                rule_name,
                source.kind_name(),
                source.id(),
                referenced
                    .iter()
                    .map(Symbol::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Ok(Outcome::Rewritten(node.replace_sources(vec![new_source])?))
        }
        None => Ok(Outcome::Unchanged),
    }
}

fn is_project_over(node: &PlanNode, matches_source: fn(&PlanNode) -> bool) -> bool {
    match node {
        PlanNode::Project { source, .. } => matches_source(source),
        _ => false,
    }
}

/// Narrow the input of an Offset to the columns the projection above reads.
/// The offset count does not depend on any column.
pub struct PruneOffsetColumns;

impl Rule for PruneOffsetColumns {
    fn name(&self) -> &str {
        "PruneOffsetColumns"
    }

    fn matches(&self, node: &PlanNode) -> bool {
        is_project_over(node, |source| matches!(source, PlanNode::Offset { .. }))
    }

    fn apply(&self, node: &PlanNode, context: &RuleContext) -> OptimizerResult<Outcome> {
        prune_project_source(node, context, self.name(), |offset, referenced, context| {
            restrict_child_outputs(context.id_allocator(), offset, referenced)
        })
    }
}

/// Narrow the input of a Filter to the columns the projection above and the
/// predicate read
pub struct PruneFilterColumns;

impl Rule for PruneFilterColumns {
    fn name(&self) -> &str {
        "PruneFilterColumns"
    }

    fn matches(&self, node: &PlanNode) -> bool {
        is_project_over(node, |source| matches!(source, PlanNode::Filter { .. }))
    }

    fn apply(&self, node: &PlanNode, context: &RuleContext) -> OptimizerResult<Outcome> {
        prune_project_source(node, context, self.name(), |filter, referenced, context| {
            let predicate = match filter {
                PlanNode::Filter { predicate, .. } => predicate,
                _ => return Ok(None),
            };
            let mut permitted = referenced.clone();
            permitted.extend(symbols_of(predicate));
            restrict_child_outputs(context.id_allocator(), filter, &permitted)
        })
    }
}

/// Drop unreferenced columns from inline rows
pub struct PruneValuesColumns;

impl Rule for PruneValuesColumns {
    fn name(&self) -> &str {
        "PruneValuesColumns"
    }

    fn matches(&self, node: &PlanNode) -> bool {
        is_project_over(node, |source| matches!(source, PlanNode::Values { .. }))
    }

    fn apply(&self, node: &PlanNode, context: &RuleContext) -> OptimizerResult<Outcome> {
        prune_project_source(node, context, self.name(), |values, referenced, _context| {
            Ok(prune_values(values, referenced))
        })
    }
}

fn prune_values(values: &PlanNode, referenced: &BTreeSet<Symbol>) -> Option<PlanNode> {
    let (id, output_symbols, rows) = match values {
        PlanNode::Values {
            id,
            output_symbols,
            rows,
        } => (id, output_symbols, rows),
        _ => return None,
    };

    let kept: Vec<usize> = output_symbols
        .iter()
        .enumerate()
        .filter(|(_, symbol)| referenced.contains(symbol))
        .map(|(i, _)| i)
        .collect();
    let new_outputs: Vec<Symbol> = kept.iter().map(|&i| output_symbols[i].clone()).collect();

    let new_rows = rows
        .iter()
        .map(|row| prune_row(row, output_symbols.len(), &kept))
        .collect::<Option<Vec<_>>>()?;

    Some(PlanNode::Values {
        id: *id,
        output_symbols: new_outputs,
        rows: new_rows,
    })
}

/// Keep the fields at `kept` of a `ROW(...)` constructor or a folded row
/// constant. Rows given by any other row-valued expression cannot be narrowed.
fn prune_row(row: &Expression, width: usize, kept: &[usize]) -> Option<Expression> {
    match row.kind() {
        ExprKind::Row(row) if row.items.len() == width => Some(Expression::row(
            kept.iter().map(|&i| row.items[i].clone()).collect(),
        )),
        ExprKind::Constant(Constant {
            data_type: DataType::Row(fields),
            value: Value::Row(items),
        }) if fields.len() == width && items.len() == width => Some(Expression::constant(
            DataType::Row(kept.iter().map(|&i| fields[i].clone()).collect()),
            Value::Row(kept.iter().map(|&i| items[i].clone()).collect()),
        )),
        _ => None,
    }
}
