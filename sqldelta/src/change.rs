//! Edit records over borrowed expression nodes.

use core::fmt;

use banksia::{DiffTree, EditOp};

use crate::expr::Expr;
use crate::tree::ExprTree;

/// One record of an expression diff.
///
/// Records borrow the nodes of the trees passed to [`crate::diff`].
/// Equality and hashing go through the referenced node's content, so a
/// result can be compared as a set against records built from fresh
/// expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change<'a> {
    /// Node unchanged in value and position. References the source node.
    Keep(&'a Expr),
    /// Target node with no source counterpart.
    Insert(&'a Expr),
    /// Source node with no target counterpart.
    Remove(&'a Expr),
    /// Matched node whose own primitive arguments changed: (source, target).
    Update(&'a Expr, &'a Expr),
    /// Matched node that changed position or parent. References the target node.
    Move(&'a Expr),
}

impl<'a> Change<'a> {
    /// Whether this is a [`Change::Keep`].
    pub fn is_keep(&self) -> bool {
        matches!(self, Change::Keep(_))
    }

    /// The node this record is about. For updates, the target node.
    pub fn node(&self) -> &'a Expr {
        match *self {
            Change::Keep(node)
            | Change::Insert(node)
            | Change::Remove(node)
            | Change::Move(node)
            | Change::Update(_, node) => node,
        }
    }

    /// Name of the referenced node's kind.
    pub fn kind_name(&self) -> &'static str {
        self.node().kind.name()
    }

    /// Map an engine operation back to the expression nodes it is about.
    pub(crate) fn from_op(op: &EditOp, source: &ExprTree<'a>, target: &ExprTree<'a>) -> Self {
        match *op {
            EditOp::Keep { source: s, .. } => Change::Keep(*source.label(s)),
            EditOp::Insert { target: t } => Change::Insert(*target.label(t)),
            EditOp::Remove { source: s } => Change::Remove(*source.label(s)),
            EditOp::Update {
                source: s,
                target: t,
            } => Change::Update(*source.label(s), *target.label(t)),
            EditOp::Move { target: t, .. } => Change::Move(*target.label(t)),
        }
    }
}

impl fmt::Display for Change<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Keep(node) => write!(f, "Keep {node}"),
            Change::Insert(node) => write!(f, "Insert {node}"),
            Change::Remove(node) => write!(f, "Remove {node}"),
            Change::Update(old, new) => write!(f, "Update {old} -> {new}"),
            Change::Move(node) => write!(f, "Move {node}"),
        }
    }
}

/// The records of `changes` other than [`Change::Keep`].
pub fn delta_only<'a>(changes: &[Change<'a>]) -> Vec<Change<'a>> {
    changes
        .iter()
        .filter(|change| !change.is_keep())
        .copied()
        .collect()
}
