//! Phase 3: propagate matches from children up to their ancestors.

use core::cell::RefCell;

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use super::{Alignment, MatchOrigin, Matching, MatchingConfig, permitted};
use crate::tree::{DiffTree, TreeTypes};
use crate::{debug, trace};

/// Proper descendant sets, computed on first use.
struct LazyDescendantMap<'a, T: DiffTree> {
    tree: &'a T,
    cache: RefCell<HashMap<NodeId, HashSet<NodeId>>>,
}

impl<'a, T: DiffTree> LazyDescendantMap<'a, T> {
    fn new(tree: &'a T) -> Self {
        Self {
            tree,
            cache: RefCell::new(HashMap::default()),
        }
    }

    fn get_or_compute(&self, id: NodeId) -> core::cell::Ref<'_, HashSet<NodeId>> {
        self.cache
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| self.tree.descendants(id).skip(1).collect());
        core::cell::Ref::map(self.cache.borrow(), |cache| &cache[&id])
    }
}

#[derive(Clone, Copy)]
struct Candidate {
    target: NodeId,
    score: f64,
    /// The candidate's parent is the match of the source node's parent
    anchored: bool,
}

/// Match unmatched internal nodes whose children or descendants are mostly
/// matched into a same-kind target node, until a full pass adds nothing.
///
/// Source nodes are visited in document order, parents before children, so
/// an enclosing node claims its best counterpart before nested nodes of the
/// same kind compete for it. Matches only ever get added, and there are
/// finitely many nodes, so the loop terminates.
pub(super) fn propagate<TA, TB>(
    source: &TA,
    target: &TB,
    matching: &mut Matching,
    config: &MatchingConfig,
    alignment: Option<&Alignment>,
) where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let desc_source = LazyDescendantMap::new(source);
    let desc_target = LazyDescendantMap::new(target);

    let mut by_kind: HashMap<<TA::Types as TreeTypes>::Kind, Vec<NodeId>> = HashMap::default();
    for t in target.iter() {
        if !target.is_leaf(t) && !matching.contains_target(t) {
            by_kind.entry(target.kind(t).clone()).or_default().push(t);
        }
    }

    loop {
        let mut added = 0;

        for s in source.iter() {
            if source.is_leaf(s) || matching.contains_source(s) {
                continue;
            }
            let Some(candidates) = by_kind.get(source.kind(s)) else {
                continue;
            };
            let anchor = source.parent(s).and_then(|p| matching.target_of(p));

            let mut best: Option<Candidate> = None;
            for &t in candidates {
                if matching.contains_target(t) || !permitted(alignment, s, t) {
                    continue;
                }
                let score = score(source, target, s, t, matching, &desc_source, &desc_target);
                trace!(
                    source = usize::from(s),
                    target = usize::from(t),
                    kind = %source.kind(s),
                    score,
                    "bottom-up: candidate"
                );
                if score < config.propagation_threshold {
                    continue;
                }
                let anchored = anchor.is_some() && target.parent(t) == anchor;
                let better = match best {
                    None => true,
                    Some(b) => score > b.score || (score == b.score && anchored && !b.anchored),
                };
                if better {
                    best = Some(Candidate {
                        target: t,
                        score,
                        anchored,
                    });
                }
            }

            if let Some(best) = best {
                trace!(
                    source = usize::from(s),
                    target = usize::from(best.target),
                    score = best.score,
                    anchored = best.anchored,
                    "bottom-up: match"
                );
                matching.add(s, best.target, MatchOrigin::Propagated);
                added += 1;
            }
        }

        debug!(added, "bottom-up round");
        if added == 0 {
            break;
        }
    }
}

/// The larger of the child-slot ratio and the descendant Dice coefficient.
fn score<TA, TB>(
    source: &TA,
    target: &TB,
    s: NodeId,
    t: NodeId,
    matching: &Matching,
    desc_source: &LazyDescendantMap<'_, TA>,
    desc_target: &LazyDescendantMap<'_, TB>,
) -> f64
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    child_ratio(source, target, s, t, matching).max(dice_coefficient(
        s,
        t,
        matching,
        desc_source,
        desc_target,
    ))
}

/// Fraction of `s`'s children matched to children of `t`.
fn child_ratio<TA, TB>(source: &TA, target: &TB, s: NodeId, t: NodeId, matching: &Matching) -> f64
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let mut total = 0usize;
    let mut matched = 0usize;
    for child in source.children(s) {
        total += 1;
        if matching
            .target_of(child)
            .is_some_and(|m| target.parent(m) == Some(t))
        {
            matched += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    }
}

/// dice(s, t) = 2 × |descendants of s matched into descendants of t| / (|desc s| + |desc t|)
fn dice_coefficient<TA, TB>(
    s: NodeId,
    t: NodeId,
    matching: &Matching,
    desc_source: &LazyDescendantMap<'_, TA>,
    desc_target: &LazyDescendantMap<'_, TB>,
) -> f64
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let desc_s = desc_source.get_or_compute(s);
    let desc_t = desc_target.get_or_compute(t);

    if desc_s.is_empty() && desc_t.is_empty() {
        return 0.0;
    }

    let common = desc_s
        .iter()
        .filter(|&&d| matching.target_of(d).is_some_and(|m| desc_t.contains(&m)))
        .count();

    2.0 * common as f64 / (desc_s.len() + desc_t.len()) as f64
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

    /// Pair every leaf with the same-valued leaf on the other side, by hand.
    fn seed_leaves(tree_a: &Tree<TestTypes>, tree_b: &Tree<TestTypes>) -> Matching {
        let mut matching = Matching::new();
        for a in tree_a.iter().filter(|&a| tree_a.is_leaf(a)) {
            let found = tree_b.iter().find(|&b| {
                tree_b.is_leaf(b) && !matching.contains_target(b) && tree_b.hash(b) == tree_a.hash(a)
            });
            if let Some(b) = found {
                matching.add(a, b, MatchOrigin::Leaf);
            }
        }
        matching
    }

    #[test]
    fn test_parent_with_all_children_matched_propagates() {
        let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::simple("select"));
        let from_a = tree_a.add_child(tree_a.root, NodeData::simple("from"));
        tree_a.add_child(from_a, ident("t"));
        tree_a.finalize();

        let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::simple("select"));
        let from_b = tree_b.add_child(tree_b.root, NodeData::simple("from"));
        tree_b.add_child(from_b, ident("t"));
        tree_b.finalize();

        let mut matching = seed_leaves(&tree_a, &tree_b);
        propagate(&tree_a, &tree_b, &mut matching, &MatchingConfig::default(), None);

        assert_eq!(matching.target_of(from_a), Some(from_b));
        assert_eq!(matching.target_of(tree_a.root), Some(tree_b.root));
    }

    #[test]
    fn test_minority_matched_does_not_propagate() {
        // call(x, y, z) vs call(x, p, q): one of three children matched
        let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::simple("root"));
        let call_a = tree_a.add_child(tree_a.root, NodeData::simple("call"));
        for name in ["x", "y", "z"] {
            tree_a.add_child(call_a, ident(name));
        }
        tree_a.finalize();

        let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::simple("root"));
        let call_b = tree_b.add_child(tree_b.root, NodeData::simple("call"));
        for name in ["x", "p", "q"] {
            tree_b.add_child(call_b, ident(name));
        }
        tree_b.finalize();

        let mut matching = seed_leaves(&tree_a, &tree_b);
        propagate(&tree_a, &tree_b, &mut matching, &MatchingConfig::default(), None);

        assert!(!matching.contains_source(call_a));
    }

    #[test]
    fn test_kinds_must_agree() {
        let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::simple("add"));
        tree_a.add_child(tree_a.root, ident("a"));
        tree_a.finalize();
        let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::simple("sub"));
        tree_b.add_child(tree_b.root, ident("a"));
        tree_b.finalize();

        let mut matching = seed_leaves(&tree_a, &tree_b);
        propagate(&tree_a, &tree_b, &mut matching, &MatchingConfig::default(), None);

        assert!(!matching.contains_source(tree_a.root));
    }

    #[test]
    fn test_outer_node_claims_outer_counterpart() {
        // or(or(a, b), c) vs or(or(c, b), a)
        fn nested(x: &str, y: &str, z: &str) -> (Tree<TestTypes>, NodeId) {
            let mut tree: Tree<TestTypes> = Tree::new(NodeData::simple("or"));
            let inner = tree.add_child(tree.root, NodeData::simple("or"));
            tree.add_child(inner, ident(x));
            tree.add_child(inner, ident(y));
            tree.add_child(tree.root, ident(z));
            tree.finalize();
            (tree, inner)
        }
        let (tree_a, inner_a) = nested("a", "b", "c");
        let (tree_b, inner_b) = nested("c", "b", "a");

        let mut matching = seed_leaves(&tree_a, &tree_b);
        propagate(&tree_a, &tree_b, &mut matching, &MatchingConfig::default(), None);

        assert_eq!(matching.target_of(tree_a.root), Some(tree_b.root));
        assert_eq!(matching.target_of(inner_a), Some(inner_b));
    }

    #[test]
    fn test_fixed_point_reaches_grandparents() {
        // the grandparent only qualifies once its child is matched
        // root -> wrap -> pair(x, y) vs root -> wrap -> pair(x, y2)
        let build = |y: &str| {
            let mut tree: Tree<TestTypes> = Tree::new(NodeData::simple("root"));
            let wrap = tree.add_child(tree.root, NodeData::simple("wrap"));
            let pair = tree.add_child(wrap, NodeData::simple("pair"));
            tree.add_child(pair, ident("x"));
            tree.add_child(pair, ident(y));
            tree.finalize();
            (tree, wrap, pair)
        };
        let (tree_a, wrap_a, pair_a) = build("y");
        let (tree_b, wrap_b, pair_b) = build("y2");

        let mut matching = seed_leaves(&tree_a, &tree_b);
        propagate(&tree_a, &tree_b, &mut matching, &MatchingConfig::default(), None);

        assert_eq!(matching.target_of(pair_a), Some(pair_b));
        assert_eq!(matching.target_of(wrap_a), Some(wrap_b));
        assert_eq!(matching.target_of(tree_a.root), Some(tree_b.root));
    }
}
