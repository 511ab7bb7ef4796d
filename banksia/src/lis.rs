//! Longest increasing subsequence, the basis of minimal move detection.

/// Positions (into `values`) of one strictly increasing subsequence of
/// maximal length, in ascending order.
///
/// Patience sorting with predecessor links, O(k log k). Of the maximal
/// subsequences, this returns the one ending at the last value placed on the
/// final pile.
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    // tails[len - 1] = position of the smallest tail of an increasing run of length len
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessors: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let pile = tails.partition_point(|&tail| values[tail] < value);
        if pile > 0 {
            predecessors[i] = Some(tails[pile - 1]);
        }
        if pile == tails.len() {
            tails.push(i);
        } else {
            tails[pile] = i;
        }
    }

    let mut positions = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        positions.push(i);
        cursor = predecessors[i];
    }
    positions.reverse();
    positions
}
