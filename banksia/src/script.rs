//! Edit script generation.
//!
//! Turns a [`Matching`] into one record per node:
//! 1. Unmatched source nodes are removed, unmatched target nodes inserted,
//!    at every depth (an unmatched subtree yields one record per node)
//! 2. Matched pairs whose own values differ are updated
//! 3. Matched children that left the longest increasing subsequence of
//!    their parent's matched children, or left the parent altogether, moved
//! 4. Every other matched pair is kept

use core::fmt;

use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use crate::lis::longest_increasing_subsequence;
use crate::matching::Matching;
use crate::tree::DiffTree;
use crate::{debug, trace};

/// One record of the edit script.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOp {
    /// Matched pair, identical in value and stable in position.
    Keep {
        /// Node in the source tree
        source: NodeId,
        /// Its match in the target tree
        target: NodeId,
    },

    /// Target node with no source counterpart.
    Insert {
        /// Node in the target tree
        target: NodeId,
    },

    /// Source node with no target counterpart.
    Remove {
        /// Node in the source tree
        source: NodeId,
    },

    /// Matched pair whose own primitive value changed.
    Update {
        /// Node in the source tree
        source: NodeId,
        /// Its match in the target tree
        target: NodeId,
    },

    /// Matched pair that changed position among its siblings, or changed parent.
    Move {
        /// Node in the source tree
        source: NodeId,
        /// Its match in the target tree
        target: NodeId,
    },
}

impl EditOp {
    /// Whether this is a [`EditOp::Keep`].
    pub fn is_keep(&self) -> bool {
        matches!(self, EditOp::Keep { .. })
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOp::Keep { source, target } => {
                write!(f, "Keep(s:{} = t:{})", usize::from(*source), usize::from(*target))
            }
            EditOp::Insert { target } => write!(f, "Insert(t:{})", usize::from(*target)),
            EditOp::Remove { source } => write!(f, "Remove(s:{})", usize::from(*source)),
            EditOp::Update { source, target } => {
                write!(f, "Update(s:{} → t:{})", usize::from(*source), usize::from(*target))
            }
            EditOp::Move { source, target } => {
                write!(f, "Move(s:{} → t:{})", usize::from(*source), usize::from(*target))
            }
        }
    }
}

impl fmt::Debug for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Per-variant counts of an edit script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditScriptSummary {
    /// Keep records
    pub keeps: usize,
    /// Insert records
    pub inserts: usize,
    /// Remove records
    pub removes: usize,
    /// Update records
    pub updates: usize,
    /// Move records
    pub moves: usize,
}

impl EditScriptSummary {
    /// Count the records of `ops`.
    pub fn of(ops: &[EditOp]) -> Self {
        let mut summary = Self::default();
        for op in ops {
            match op {
                EditOp::Keep { .. } => summary.keeps += 1,
                EditOp::Insert { .. } => summary.inserts += 1,
                EditOp::Remove { .. } => summary.removes += 1,
                EditOp::Update { .. } => summary.updates += 1,
                EditOp::Move { .. } => summary.moves += 1,
            }
        }
        summary
    }

    /// Number of records other than Keep.
    pub fn delta(&self) -> usize {
        self.inserts + self.removes + self.updates + self.moves
    }
}

impl fmt::Display for EditScriptSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} kept, {} inserted, {} removed, {} updated, {} moved",
            self.keeps, self.inserts, self.removes, self.updates, self.moves
        )
    }
}

/// Wrapper for collecting edit operations with tracing.
struct Ops {
    inner: Vec<EditOp>,
}

impl Ops {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, op: EditOp) {
        if !op.is_keep() {
            debug!(%op, "emit");
        }
        self.inner.push(op);
    }

    fn into_inner(self) -> Vec<EditOp> {
        self.inner
    }
}

/// Generate the edit script for a matching between two finalized trees.
///
/// Source nodes are reported in source document order, followed by inserted
/// target nodes in target document order. Callers should still treat the
/// result as a set.
pub fn generate_edit_script<TA, TB>(source: &TA, target: &TB, matching: &Matching) -> Vec<EditOp>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    trace!(matched_pairs = matching.len(), "generate_edit_script start");
    let moved = detect_moves(source, target, matching);
    let mut ops = Ops::with_capacity(source.node_count() + target.node_count() - matching.len());

    for s in source.iter() {
        let Some(t) = matching.target_of(s) else {
            ops.push(EditOp::Remove { source: s });
            continue;
        };
        if source.value(s) != target.value(t) {
            ops.push(EditOp::Update {
                source: s,
                target: t,
            });
        } else if moved.contains(&s) {
            ops.push(EditOp::Move {
                source: s,
                target: t,
            });
        } else {
            ops.push(EditOp::Keep {
                source: s,
                target: t,
            });
        }
    }

    for t in target.iter() {
        if !matching.contains_target(t) {
            ops.push(EditOp::Insert { target: t });
        }
    }

    let ops = ops.into_inner();
    debug!(summary = %EditScriptSummary::of(&ops), "generate_edit_script done");
    ops
}

/// Source nodes that must be reported as moved.
///
/// For each matched parent pair (p, q), p's matched children that landed
/// under q form a sequence of target positions. Children outside its longest
/// increasing subsequence moved, and so did every matched child of p whose
/// counterpart is not a child of q. Each parent is handled on its own.
fn detect_moves<TA, TB>(source: &TA, target: &TB, matching: &Matching) -> HashSet<NodeId>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let mut moved = HashSet::default();

    for (p, q) in matching.pairs() {
        let mut stayed: Vec<NodeId> = Vec::new();
        let mut positions: Vec<usize> = Vec::new();

        for child in source.children(p) {
            let Some(counterpart) = matching.target_of(child) else {
                continue;
            };
            if target.parent(counterpart) == Some(q) {
                stayed.push(child);
                positions.push(target.position(counterpart));
            } else {
                trace!(source = usize::from(child), "move: changed parent");
                moved.insert(child);
            }
        }

        if stayed.len() < 2 {
            continue;
        }

        let mut stable = vec![false; stayed.len()];
        for i in longest_increasing_subsequence(&positions) {
            stable[i] = true;
        }
        for (child, stable) in stayed.into_iter().zip(stable) {
            if !stable {
                trace!(source = usize::from(child), "move: reordered");
                moved.insert(child);
            }
        }
    }

    moved
}
