//! Phase 2: pair the leaves the subtree phase left behind.

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

use super::{Alignment, MatchOrigin, Matching, permitted};
use crate::fingerprint::NodeHash;
use crate::tree::{DiffTree, TreeTypes};
use crate::{debug, trace};

/// How many unmatched targets on each side of a source leaf's document
/// position are considered for a nearest pairing.
const NEAREST_WINDOW: usize = 8;

/// Pair unmatched leaves of the same kind.
///
/// Per kind, equal-valued leaves pair first (k-th occurrence with k-th
/// occurrence), which maximizes exact matches. The rest pair by smallest
/// document-order distance among nearby targets, skipping any pair that
/// would cross one already chosen (exact pairs included), so the
/// assignment stays order-preserving. Differently-valued pairs become
/// updates.
pub(super) fn match_leaves<TA, TB>(
    source: &TA,
    target: &TB,
    matching: &mut Matching,
    alignment: Option<&Alignment>,
) where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    type Kind<T> = <<T as DiffTree>::Types as TreeTypes>::Kind;

    let mut kinds: Vec<Kind<TA>> = Vec::new();
    let mut source_leaves: HashMap<Kind<TA>, Vec<NodeId>> = HashMap::default();
    for s in source.iter() {
        if source.is_leaf(s) && !matching.contains_source(s) {
            let kind = source.kind(s);
            if !source_leaves.contains_key(kind) {
                kinds.push(kind.clone());
            }
            source_leaves.entry(kind.clone()).or_default().push(s);
        }
    }

    let mut target_leaves: HashMap<Kind<TA>, Vec<NodeId>> = HashMap::default();
    for t in target.iter() {
        if target.is_leaf(t) && !matching.contains_target(t) {
            target_leaves.entry(target.kind(t).clone()).or_default().push(t);
        }
    }

    for kind in &kinds {
        let (Some(sources), Some(targets)) = (source_leaves.get(kind), target_leaves.get(kind))
        else {
            continue;
        };
        let mut chosen = Chosen::new(sources.len(), targets.len());
        match_exact(source, target, sources, targets, matching, alignment, &mut chosen);
        match_nearest(source, target, sources, targets, matching, alignment, &mut chosen);
        debug!(
            %kind,
            leaves = sources.len(),
            matched = sources.iter().filter(|&&s| matching.contains_source(s)).count(),
            "leaf phase"
        );
    }
}

/// Largest value recorded at any rank below a given one, with point
/// inserts. A Fenwick tree over `value + 1`, zero meaning empty.
struct PrefixMax(Vec<usize>);

impl PrefixMax {
    fn new(ranks: usize) -> Self {
        Self(vec![0; ranks + 1])
    }

    fn insert(&mut self, rank: usize, value: usize) {
        let mut i = rank + 1;
        while i < self.0.len() {
            self.0[i] = self.0[i].max(value + 1);
            i += i & i.wrapping_neg();
        }
    }

    fn below(&self, rank: usize) -> Option<usize> {
        let mut i = rank;
        let mut best = 0;
        while i > 0 {
            best = best.max(self.0[i]);
            i -= i & i.wrapping_neg();
        }
        best.checked_sub(1)
    }
}

/// Leaf pairs chosen so far for one kind, as (source rank, target rank)
/// within that kind's leaves.
struct Chosen {
    /// Target ranks by source rank
    before: PrefixMax,
    /// Mirrored target ranks by mirrored source rank
    after: PrefixMax,
    sources: usize,
    targets: usize,
}

impl Chosen {
    fn new(sources: usize, targets: usize) -> Self {
        Self {
            before: PrefixMax::new(sources),
            after: PrefixMax::new(sources),
            sources,
            targets,
        }
    }

    fn insert(&mut self, s: usize, t: usize) {
        self.before.insert(s, t);
        self.after.insert(self.sources - 1 - s, self.targets - 1 - t);
    }

    /// Whether pairing `s` with `t` would cross a chosen pair.
    fn crosses(&self, s: usize, t: usize) -> bool {
        let earlier_lands_later = self.before.below(s).is_some_and(|ct| ct > t);
        let later_lands_earlier = self
            .after
            .below(self.sources - 1 - s)
            .is_some_and(|mirrored| self.targets - 1 - mirrored < t);
        earlier_lands_later || later_lands_earlier
    }
}

fn match_exact<TA, TB>(
    source: &TA,
    target: &TB,
    sources: &[NodeId],
    targets: &[NodeId],
    matching: &mut Matching,
    alignment: Option<&Alignment>,
    chosen: &mut Chosen,
) where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let mut by_hash: HashMap<NodeHash, Vec<usize>> = HashMap::default();
    for (j, &t) in targets.iter().enumerate() {
        by_hash.entry(target.hash(t)).or_default().push(j);
    }

    for (i, &s) in sources.iter().enumerate() {
        let Some(candidates) = by_hash.get(&source.hash(s)) else {
            continue;
        };
        let found = candidates.iter().copied().find(|&j| {
            !matching.contains_target(targets[j]) && permitted(alignment, s, targets[j])
        });
        if let Some(j) = found {
            let t = targets[j];
            trace!(source = usize::from(s), target = usize::from(t), "leaf: exact");
            matching.add(s, t, MatchOrigin::Leaf);
            chosen.insert(i, j);
        }
    }
}

fn match_nearest<TA, TB>(
    source: &TA,
    target: &TB,
    sources: &[NodeId],
    targets: &[NodeId],
    matching: &mut Matching,
    alignment: Option<&Alignment>,
    chosen: &mut Chosen,
) where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let free: Vec<usize> = (0..targets.len())
        .filter(|&j| !matching.contains_target(targets[j]))
        .collect();

    // (distance, source rank, target rank); ranks follow document order
    let mut pairs: Vec<(usize, usize, usize)> = Vec::new();
    for (i, &s) in sources.iter().enumerate() {
        if matching.contains_source(s) {
            continue;
        }
        let so = source.order(s);
        let split = free.partition_point(|&j| target.order(targets[j]) < so);
        let lo = split.saturating_sub(NEAREST_WINDOW);
        let hi = (split + NEAREST_WINDOW).min(free.len());
        for &j in &free[lo..hi] {
            if permitted(alignment, s, targets[j]) {
                pairs.push((so.abs_diff(target.order(targets[j])), i, j));
            }
        }
    }
    pairs.sort_unstable();

    for (_, i, j) in pairs {
        let (s, t) = (sources[i], targets[j]);
        if matching.contains_source(s) || matching.contains_target(t) || chosen.crosses(i, j) {
            continue;
        }
        trace!(
            source = usize::from(s),
            target = usize::from(t),
            distance = source.order(s).abs_diff(target.order(t)),
            "leaf: nearest"
        );
        matching.add(s, t, MatchOrigin::Leaf);
        chosen.insert(i, j);
    }
}
