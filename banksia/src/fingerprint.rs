//! Structural fingerprints.
//!
//! A node's fingerprint is a BLAKE3 digest over its kind, its own value, and
//! its children's edges and fingerprints in order, computed bottom-up. A
//! child's edge counts toward its parent's digest, not its own, so a subtree
//! keeps its fingerprint when it moves to another slot. Identical
//! subtrees get identical fingerprints wherever they sit in either tree, so
//! subtree equality is a 32-byte comparison.
//!
//! Matching assumes fingerprints never collide for different content. That
//! is an assumption about the digest, not something checked at runtime.

use core::fmt;
use core::hash::{Hash, Hasher};

use indextree::NodeId;

use crate::trace;
use crate::tree::{DiffTree, Tree, TreeTypes};

/// Domain tag mixed into every node digest.
const DOMAIN: &[u8] = b"banksia-node-v1:";

/// Content-derived identity of a subtree.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash(pub [u8; 32]);

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHash({self})")
    }
}

/// Feeds `Hash` impls into a BLAKE3 state.
struct DigestWriter(blake3::Hasher);

impl Hasher for DigestWriter {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.0.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

/// Fingerprint of one node given its children's edges and fingerprints.
pub fn node_fingerprint<K, V, E, I>(kind: &K, value: &V, children: I) -> NodeHash
where
    K: Hash + ?Sized,
    V: Hash + ?Sized,
    E: Hash,
    I: IntoIterator<Item = (E, NodeHash)>,
    I::IntoIter: ExactSizeIterator,
{
    let children = children.into_iter();
    let mut writer = DigestWriter(blake3::Hasher::new());
    writer.0.update(DOMAIN);
    kind.hash(&mut writer);
    value.hash(&mut writer);
    writer.write_u64(children.len() as u64);
    for (edge, child) in children {
        edge.hash(&mut writer);
        writer.0.update(&child.0);
    }
    NodeHash(*writer.0.finalize().as_bytes())
}

/// Compute fingerprints and subtree sizes for every node, children first.
pub(crate) fn fingerprint_tree<T: TreeTypes>(tree: &mut Tree<T>) {
    let nodes: Vec<NodeId> = tree.post_order().collect();
    for id in nodes {
        let mut children = Vec::new();
        let mut size = 1;
        for child in tree.children(id) {
            let data = tree.get(child);
            children.push((&data.edge, data.hash));
            size += data.size;
        }

        let data = tree.get(id);
        let hash = node_fingerprint(&data.kind, &data.value, children);
        trace!(node = usize::from(id), kind = %data.kind, %hash, size, "fingerprint");

        let data = tree.get_mut(id);
        data.hash = hash;
        data.size = size;
    }
}
