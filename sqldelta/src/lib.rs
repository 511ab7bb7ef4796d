//! Structural diffs of query expression trees, built on banksia.
//!
//! sqldelta explains what changed between two parsed queries at the level
//! of syntax-tree nodes. Every node of either tree gets exactly one
//! [`Change`]: kept, inserted, removed, updated in place, or moved.
//!
//! # Example
//!
//! ```rust
//! use sqldelta::{Change, Expr, ExprKind, delta_only, diff};
//!
//! // SELECT a, b, c  ->  SELECT c, a, b
//! let source = Expr::select(vec![Expr::column("a"), Expr::column("b"), Expr::column("c")]);
//! let target = Expr::select(vec![Expr::column("c"), Expr::column("a"), Expr::column("b")]);
//!
//! let changes = diff(&source, &target).unwrap();
//! assert_eq!(delta_only(&changes), vec![Change::Move(&Expr::column("c"))]);
//!
//! // a + b  ->  a - b
//! let source = Expr::binary(ExprKind::Add, Expr::column("a"), Expr::column("b"));
//! let target = Expr::binary(ExprKind::Sub, Expr::column("a"), Expr::column("b"));
//! let changes = diff(&source, &target).unwrap();
//! assert_eq!(
//!     delta_only(&changes),
//!     vec![Change::Remove(&source), Change::Insert(&target)]
//! );
//! ```

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

pub mod change;
pub mod error;
pub mod expr;
pub mod tree;

pub use banksia::MatchingConfig;
pub use change::{Change, delta_only};
pub use error::DiffError;
pub use expr::{Arg, ArgValue, Expr, ExprKind, JoinSide, Value};

/// Diff two expression trees with the default [`MatchingConfig`].
///
/// Fails without output if either tree doesn't fit its kinds' argument
/// schemas. The records reference nodes of `source` and `target`; callers
/// should treat their order as unspecified.
pub fn diff<'a>(source: &'a Expr, target: &'a Expr) -> Result<Vec<Change<'a>>, DiffError> {
    diff_with(source, target, &MatchingConfig::default())
}

/// Like [`diff`], with an explicit matching configuration.
///
/// Use `cross_position: false` for a purely positional diff, or
/// `propagation_threshold` to make ancestors harder or easier to pair.
pub fn diff_with<'a>(
    source: &'a Expr,
    target: &'a Expr,
    config: &MatchingConfig,
) -> Result<Vec<Change<'a>>, DiffError> {
    let source_tree = tree::build_tree(source)?;
    let target_tree = tree::build_tree(target)?;
    debug!(
        source_nodes = banksia::DiffTree::node_count(&source_tree),
        target_nodes = banksia::DiffTree::node_count(&target_tree),
        "diffing expression trees"
    );

    let ops = banksia::diff_trees(&source_tree, &target_tree, config);
    let changes: Vec<Change<'a>> = ops
        .iter()
        .map(|op| Change::from_op(op, &source_tree, &target_tree))
        .collect();

    debug!(
        changes = changes.len(),
        delta = changes.iter().filter(|c| !c.is_keep()).count(),
        "diff done"
    );
    Ok(changes)
}
