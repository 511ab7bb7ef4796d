//! Phase 1: identical subtrees, matched wherever they occur.

use core::cmp::Reverse;

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

use super::{Alignment, MatchOrigin, Matching, MatchingConfig, permitted};
use crate::fingerprint::NodeHash;
use crate::tree::DiffTree;
use crate::{debug, trace};

/// Greedily pair source and target subtrees with equal fingerprints.
///
/// Source subtrees are visited largest first, ties in document order, and
/// each takes the first unmatched target subtree with the same fingerprint
/// in document order. A matched pair consumes every descendant on both sides.
///
/// Processing by descending size keeps this consistent: when a subtree is
/// reached, nothing inside it (on either side) can have been matched yet,
/// since everything matched so far is at least as large and not an ancestor.
pub(super) fn match_identical_subtrees<TA, TB>(
    source: &TA,
    target: &TB,
    matching: &mut Matching,
    config: &MatchingConfig,
    alignment: Option<&Alignment>,
) where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let min_size = config.min_subtree_size.max(1);

    let mut index: HashMap<NodeHash, Vec<NodeId>> = HashMap::default();
    for t in target.iter() {
        if target.size(t) >= min_size {
            index.entry(target.hash(t)).or_default().push(t);
        }
    }

    let mut candidates: Vec<NodeId> = source
        .iter()
        .filter(|&s| source.size(s) >= min_size && index.contains_key(&source.hash(s)))
        .collect();
    candidates.sort_by_key(|&s| (Reverse(source.size(s)), source.order(s)));
    debug!(
        candidates = candidates.len(),
        distinct_target_hashes = index.len(),
        "subtree phase"
    );

    for s in candidates {
        if matching.contains_source(s) {
            continue;
        }
        let Some(targets) = index.get(&source.hash(s)) else {
            continue;
        };
        let found = targets.iter().copied().find(|&t| {
            !matching.contains_target(t)
                && target.kind(t) == source.kind(s)
                && permitted(alignment, s, t)
        });
        if let Some(t) = found {
            trace!(
                source = usize::from(s),
                target = usize::from(t),
                kind = %source.kind(s),
                size = source.size(s),
                "subtree match"
            );
            match_in_lockstep(source, target, s, t, matching);
        }
    }
}

/// Match two identical subtrees node by node. Equal fingerprints mean equal
/// shapes, so their pre-order walks line up.
fn match_in_lockstep<TA, TB>(
    source: &TA,
    target: &TB,
    s: NodeId,
    t: NodeId,
    matching: &mut Matching,
) where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    for (sd, td) in source.descendants(s).zip(target.descendants(t)) {
        matching.add(sd, td, MatchOrigin::Subtree);
    }
}
