//! Node matching between a source and a target tree.
//!
//! Three phases run in order, each only considering nodes the previous
//! phases left unmatched:
//! 1. Subtree: identical subtrees (by fingerprint) wherever they occur, largest first
//! 2. Leaves: remaining leaves of the same kind, exact values first, then nearest
//! 3. Bottom-up: internal nodes whose children/descendants are mostly matched,
//!    iterated to a fixed point
//!
//! Finally, two unmatched roots of the same kind are paired.

use core::fmt;

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

use crate::debug;
use crate::tree::DiffTree;

mod bottom_up;
mod leaves;
mod subtree;

/// Which phase produced a matched pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOrigin {
    /// Part of an identical subtree
    Subtree,
    /// Paired by the leaf matcher
    Leaf,
    /// Accepted by bottom-up propagation
    Propagated,
    /// Roots of the same kind paired as a last resort
    Root,
}

impl fmt::Display for MatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchOrigin::Subtree => "subtree",
            MatchOrigin::Leaf => "leaf",
            MatchOrigin::Propagated => "propagated",
            MatchOrigin::Root => "root",
        })
    }
}

/// A partial one-to-one mapping between source and target nodes.
///
/// Lookups are O(1) in both directions, indexed by `NodeId`.
#[derive(Debug, Default)]
pub struct Matching {
    source_to_target: Vec<Option<(NodeId, MatchOrigin)>>,
    target_to_source: Vec<Option<NodeId>>,
    /// Insertion order, since a `NodeId` can't be rebuilt from its index
    pairs: Vec<(NodeId, NodeId)>,
}

impl Matching {
    /// Create an empty matching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty matching sized for trees of the given node counts.
    pub fn with_capacity(source_nodes: usize, target_nodes: usize) -> Self {
        // indextree indices are 1-based
        Self {
            source_to_target: vec![None; source_nodes + 1],
            target_to_source: vec![None; target_nodes + 1],
            pairs: Vec::new(),
        }
    }

    /// Record a pair. Neither node may already be matched.
    pub fn add(&mut self, source: NodeId, target: NodeId, origin: MatchOrigin) {
        debug_assert!(
            !self.contains_source(source) && !self.contains_target(target),
            "matching must stay one-to-one"
        );
        let s = usize::from(source);
        let t = usize::from(target);
        if s >= self.source_to_target.len() {
            self.source_to_target.resize(s + 1, None);
        }
        if t >= self.target_to_source.len() {
            self.target_to_source.resize(t + 1, None);
        }
        self.source_to_target[s] = Some((target, origin));
        self.target_to_source[t] = Some(source);
        self.pairs.push((source, target));
    }

    /// Whether a source node is matched.
    #[inline]
    pub fn contains_source(&self, source: NodeId) -> bool {
        self.target_of(source).is_some()
    }

    /// Whether a target node is matched.
    #[inline]
    pub fn contains_target(&self, target: NodeId) -> bool {
        self.source_of(target).is_some()
    }

    /// The target node matched to `source`.
    #[inline]
    pub fn target_of(&self, source: NodeId) -> Option<NodeId> {
        self.source_to_target
            .get(usize::from(source))
            .copied()
            .flatten()
            .map(|(target, _)| target)
    }

    /// The source node matched to `target`.
    #[inline]
    pub fn source_of(&self, target: NodeId) -> Option<NodeId> {
        self.target_to_source
            .get(usize::from(target))
            .copied()
            .flatten()
    }

    /// The phase that matched `source`.
    pub fn origin(&self, source: NodeId) -> Option<MatchOrigin> {
        self.source_to_target
            .get(usize::from(source))
            .copied()
            .flatten()
            .map(|(_, origin)| origin)
    }

    /// All pairs, in the order they were added.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs produced by a given phase.
    pub fn count_by(&self, origin: MatchOrigin) -> usize {
        self.pairs
            .iter()
            .filter(|(source, _)| self.origin(*source) == Some(origin))
            .count()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is matched.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Configuration for the matching phases.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum score for bottom-up propagation to pair two internal nodes.
    ///
    /// The score is the larger of the fraction of the source node's children
    /// matched into the candidate's children and the Dice coefficient of
    /// their matched descendants. A pair is accepted at or above this value.
    pub propagation_threshold: f64,

    /// Allow identical subtrees and leaves to match wherever they occur.
    ///
    /// When false, only nodes at the same child positions under same-kind
    /// ancestors are considered, which gives a purely positional diff.
    pub cross_position: bool,

    /// Subtrees with fewer nodes than this are left to the leaf matcher.
    pub min_subtree_size: usize,

    /// Pair unmatched roots of the same kind after propagation.
    pub match_roots: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            propagation_threshold: 0.5,
            cross_position: true,
            min_subtree_size: 2,
            match_roots: true,
        }
    }
}

/// Pairs of nodes at the same path from the roots, descending only through
/// same-kind pairs. Used to restrict matching when cross-position matching
/// is disabled.
pub(crate) struct Alignment {
    source_to_target: HashMap<NodeId, NodeId>,
}

impl Alignment {
    fn compute<TA, TB>(source: &TA, target: &TB) -> Self
    where
        TA: DiffTree,
        TB: DiffTree<Types = TA::Types>,
    {
        let mut source_to_target = HashMap::default();
        let mut stack = vec![(source.root(), target.root())];
        while let Some((s, t)) = stack.pop() {
            source_to_target.insert(s, t);
            if source.kind(s) != target.kind(t) {
                continue;
            }
            stack.extend(source.children(s).zip(target.children(t)));
        }
        Self { source_to_target }
    }

    fn permits(&self, source: NodeId, target: NodeId) -> bool {
        self.source_to_target.get(&source) == Some(&target)
    }
}

/// Whether a pair may be considered at all under the current alignment.
#[inline]
pub(crate) fn permitted(alignment: Option<&Alignment>, source: NodeId, target: NodeId) -> bool {
    alignment.is_none_or(|alignment| alignment.permits(source, target))
}

/// Compute the matching between two finalized trees.
pub fn compute_matching<TA, TB>(source: &TA, target: &TB, config: &MatchingConfig) -> Matching
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    debug!(
        source_nodes = source.node_count(),
        target_nodes = target.node_count(),
        cross_position = config.cross_position,
        "compute_matching start"
    );
    let mut matching = Matching::with_capacity(source.node_count(), target.node_count());
    let alignment = (!config.cross_position).then(|| Alignment::compute(source, target));
    let alignment = alignment.as_ref();

    subtree::match_identical_subtrees(source, target, &mut matching, config, alignment);
    debug!(matched = matching.len(), "after subtree phase");

    leaves::match_leaves(source, target, &mut matching, alignment);
    debug!(matched = matching.len(), "after leaf phase");

    bottom_up::propagate(source, target, &mut matching, config, alignment);
    debug!(matched = matching.len(), "after bottom-up phase");

    let (source_root, target_root) = (source.root(), target.root());
    if config.match_roots
        && !matching.contains_source(source_root)
        && !matching.contains_target(target_root)
        && source.kind(source_root) == target.kind(target_root)
    {
        debug!(kind = %source.kind(source_root), "pairing roots by kind");
        matching.add(source_root, target_root, MatchOrigin::Root);
    }

    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeData, SimpleTypes, Tree};
    use facet_testhelpers::test;

    type TestTypes = SimpleTypes;

    fn ident(name: &str) -> NodeData<TestTypes> {
        NodeData::simple_valued("identifier", Some(name.to_string()))
    }

    /// `select(column(name)...)`
    fn select(columns: &[&str]) -> Tree<TestTypes> {
        let mut tree: Tree<TestTypes> = Tree::new(NodeData::simple("select"));
        for name in columns {
            let column = tree.add_child(tree.root, NodeData::simple("column"));
            tree.add_child(column, ident(name));
        }
        tree.finalize();
        tree
    }

    #[test]
    fn test_identical_trees_match_completely() {
        let tree_a = select(&["a", "b", "c"]);
        let tree_b = select(&["a", "b", "c"]);

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());

        assert_eq!(matching.len(), 7);
        assert_eq!(matching.count_by(MatchOrigin::Subtree), 7);
        assert_eq!(matching.target_of(tree_a.root), Some(tree_b.root));
    }

    #[test]
    fn test_reordered_subtrees_match_where_they_occur() {
        let tree_a = select(&["a", "b", "c"]);
        let tree_b = select(&["c", "a", "b"]);

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());

        let a_cols: Vec<_> = tree_a.children(tree_a.root).collect();
        let b_cols: Vec<_> = tree_b.children(tree_b.root).collect();
        assert_eq!(matching.target_of(a_cols[0]), Some(b_cols[1]));
        assert_eq!(matching.target_of(a_cols[1]), Some(b_cols[2]));
        assert_eq!(matching.target_of(a_cols[2]), Some(b_cols[0]));
        assert_eq!(matching.origin(tree_a.root), Some(MatchOrigin::Propagated));
        assert_eq!(matching.len(), 7);
    }

    #[test]
    fn test_changed_leaf_value_is_paired() {
        let tree_a = select(&["a", "table_one"]);
        let tree_b = select(&["a", "table_two"]);

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());

        let a_col = tree_a.children(tree_a.root).nth(1).unwrap();
        let b_col = tree_b.children(tree_b.root).nth(1).unwrap();
        let a_leaf = tree_a.children(a_col).next().unwrap();
        let b_leaf = tree_b.children(b_col).next().unwrap();

        assert_eq!(matching.target_of(a_leaf), Some(b_leaf));
        assert_eq!(matching.origin(a_leaf), Some(MatchOrigin::Leaf));
        assert_eq!(matching.target_of(a_col), Some(b_col));
        assert_eq!(matching.origin(a_col), Some(MatchOrigin::Propagated));
        assert_eq!(matching.len(), 5);
    }

    #[test]
    fn test_roots_of_same_kind_are_paired() {
        let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::simple("select"));
        tree_a.add_child(tree_a.root, ident("x"));
        tree_a.finalize();
        let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::simple("select"));
        tree_b.add_child(tree_b.root, NodeData::simple("star"));
        tree_b.finalize();

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());
        assert_eq!(matching.origin(tree_a.root), Some(MatchOrigin::Root));
        assert_eq!(matching.len(), 1);

        let config = MatchingConfig {
            match_roots: false,
            ..Default::default()
        };
        let matching = compute_matching(&tree_a, &tree_b, &config);
        assert!(matching.is_empty());
    }

    #[test]
    fn test_positional_mode_does_not_cross_match() {
        let tree_a = select(&["a", "b"]);
        let tree_b = select(&["b", "a"]);

        let config = MatchingConfig {
            cross_position: false,
            ..Default::default()
        };
        let matching = compute_matching(&tree_a, &tree_b, &config);

        let a_cols: Vec<_> = tree_a.children(tree_a.root).collect();
        let b_cols: Vec<_> = tree_b.children(tree_b.root).collect();
        // same positions pair up, and the leaves under them become updates
        assert_eq!(matching.target_of(a_cols[0]), Some(b_cols[0]));
        assert_eq!(matching.target_of(a_cols[1]), Some(b_cols[1]));
        assert_eq!(matching.len(), 5);
    }

    #[test]
    fn test_matching_is_one_to_one() {
        let tree_a = select(&["a", "a", "a"]);
        let tree_b = select(&["a", "a"]);

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());

        let mut seen = std::collections::HashSet::new();
        for (s, t) in matching.pairs() {
            assert_eq!(matching.source_of(t), Some(s));
            assert!(seen.insert(t), "target matched twice");
        }
        // two columns with their identifiers, plus the root
        assert_eq!(matching.len(), 5);
    }
}
