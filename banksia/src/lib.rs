//! # Banksia
//!
//! Structural diffing of ordered, labeled trees, with minimal move detection.
//!
//! Named after the banksia, which only opens its seed pods once the bush
//! around it has burned: a tree, rearranged.
//!
//! ## Algorithm Overview
//!
//! The diff runs in two stages:
//!
//! 1. **Matching** ([`compute_matching`]): identical subtrees are paired by
//!    BLAKE3 fingerprint wherever they occur, leftover leaves are paired by
//!    kind and value, then internal nodes are paired bottom-up when most of
//!    their children or descendants already are.
//! 2. **Edit script** ([`generate_edit_script`]): every node becomes exactly
//!    one [`EditOp`]. Matched children that fall outside the longest
//!    increasing subsequence of their parent's children are moves, so the
//!    number of moves reported per parent is minimal.
//!
//! ## Usage
//!
//! ```
//! use banksia::{EditScriptSummary, MatchingConfig, NodeData, SimpleTypes, Tree, diff_trees};
//!
//! type Types = SimpleTypes;
//!
//! let mut tree_a: Tree<Types> = Tree::new(NodeData::simple("list"));
//! for name in ["a", "b", "c"] {
//!     tree_a.add_child(tree_a.root, NodeData::simple_valued("item", Some(name.to_string())));
//! }
//! tree_a.finalize();
//!
//! let mut tree_b: Tree<Types> = Tree::new(NodeData::simple("list"));
//! for name in ["c", "a", "b"] {
//!     tree_b.add_child(tree_b.root, NodeData::simple_valued("item", Some(name.to_string())));
//! }
//! tree_b.finalize();
//!
//! let ops = diff_trees(&tree_a, &tree_b, &MatchingConfig::default());
//! assert_eq!(EditScriptSummary::of(&ops).moves, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Subtree fingerprints
pub mod fingerprint;
/// Longest increasing subsequence
pub mod lis;
/// Node matching between two trees
pub mod matching;
mod script;
/// Tree representation
pub mod tree;

pub use fingerprint::NodeHash;
pub use matching::{MatchOrigin, Matching, MatchingConfig, compute_matching};
pub use script::*;
pub use tree::{DiffTree, NodeData, SimpleTypes, Tree, TreeTypes};

/// Diff two finalized trees.
///
/// Computes a [`Matching`] and turns it into an edit script with one record
/// per node of either tree.
pub fn diff_trees<T: DiffTree>(
    tree_a: &T,
    tree_b: &T,
    config: &MatchingConfig,
) -> Vec<EditOp> {
    let (ops, _matching) = diff_trees_with_matching(tree_a, tree_b, config);
    ops
}

/// Like [`diff_trees`], but also returns the node matching.
///
/// Callers that attach their own data to nodes need the matching to map
/// target-side nodes back to their source counterparts.
pub fn diff_trees_with_matching<T: DiffTree>(
    tree_a: &T,
    tree_b: &T,
    config: &MatchingConfig,
) -> (Vec<EditOp>, Matching) {
    let matching = compute_matching(tree_a, tree_b, config);
    let ops = generate_edit_script(tree_a, tree_b, &matching);
    (ops, matching)
}
