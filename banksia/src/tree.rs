//! Arena tree representation consumed by the matchers.
//!
//! Nodes live in an [`indextree`] arena. After building, [`Tree::finalize`]
//! caches everything the engine reads per node: fingerprint, subtree size,
//! document (pre-order) index and position among siblings.

use core::fmt;
use core::hash::Hash;

use indextree::{Arena, NodeEdge, NodeId};

use crate::fingerprint::{self, NodeHash};

/// The associated types of a tree flavor.
pub trait TreeTypes {
    /// Syntactic category of a node. Matching never pairs nodes of different kinds.
    type Kind: Clone + Eq + Hash + fmt::Debug + fmt::Display;

    /// The node's own primitive payload. `Default` means "carries nothing".
    ///
    /// Two matched nodes whose values differ produce an update.
    type Value: Clone + Default + Eq + Hash + fmt::Debug;

    /// Caller data attached to each node, never inspected by the engine.
    type Label: Clone;

    /// Name of the slot a node occupies under its parent. `Default` for the
    /// root and for trees whose children are purely positional.
    ///
    /// Edges are part of the parent's fingerprint, never of the node's own.
    type Edge: Clone + Default + Eq + Hash + fmt::Debug;
}

/// Per-node data stored in the arena.
pub struct NodeData<T: TreeTypes> {
    /// Syntactic category
    pub kind: T::Kind,
    /// Own primitive value
    pub value: T::Value,
    /// Caller label
    pub label: T::Label,
    /// Slot under the parent
    pub edge: T::Edge,
    /// Structural fingerprint, valid after [`Tree::finalize`]
    pub hash: NodeHash,
    /// Number of nodes in the subtree rooted here, valid after [`Tree::finalize`]
    pub size: usize,
    /// Pre-order index in the whole tree, valid after [`Tree::finalize`]
    pub order: usize,
    /// Index among siblings, valid after [`Tree::finalize`]
    pub position: usize,
}

impl<T: TreeTypes> NodeData<T> {
    /// Create node data; derived fields are filled in by [`Tree::finalize`].
    pub fn new(kind: T::Kind, value: T::Value, label: T::Label) -> Self {
        Self {
            kind,
            value,
            label,
            edge: T::Edge::default(),
            hash: NodeHash::default(),
            size: 1,
            order: 0,
            position: 0,
        }
    }

    /// Place the node in the named slot of its parent.
    pub fn in_slot(mut self, edge: T::Edge) -> Self {
        self.edge = edge;
        self
    }
}

/// A tree stored in an arena.
pub struct Tree<T: TreeTypes> {
    /// Backing arena
    pub arena: Arena<NodeData<T>>,
    /// Root node
    pub root: NodeId,
}

impl<T: TreeTypes> Tree<T> {
    /// Create a tree holding a single root node.
    pub fn new(root: NodeData<T>) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self { arena, root }
    }

    /// Append a child as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData<T>) -> NodeId {
        let id = self.arena.new_node(data);
        parent.append(id, &mut self.arena);
        id
    }

    /// Node data for `id`.
    #[inline]
    pub fn get(&self, id: NodeId) -> &NodeData<T> {
        self.arena[id].get()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut NodeData<T> {
        self.arena[id].get_mut()
    }

    /// Compute the derived per-node fields. Call once the tree is fully built;
    /// adding nodes afterwards requires calling it again.
    pub fn finalize(&mut self) {
        let preorder: Vec<NodeId> = self.root.descendants(&self.arena).collect();
        for (order, &id) in preorder.iter().enumerate() {
            self.get_mut(id).order = order;
            let children: Vec<NodeId> = id.children(&self.arena).collect();
            for (position, child) in children.into_iter().enumerate() {
                self.get_mut(child).position = position;
            }
        }
        fingerprint::fingerprint_tree(self);
    }
}

/// Read-only view of a tree, as seen by the matchers and the edit script builder.
///
/// Two trees with different concrete types can be diffed as long as they
/// share the same [`TreeTypes`].
pub trait DiffTree {
    /// Node type bundle
    type Types: TreeTypes;

    /// Root node
    fn root(&self) -> NodeId;

    /// Total number of nodes
    fn node_count(&self) -> usize;

    /// Node kind
    fn kind(&self, id: NodeId) -> &<Self::Types as TreeTypes>::Kind;

    /// Node's own primitive value
    fn value(&self, id: NodeId) -> &<Self::Types as TreeTypes>::Value;

    /// Caller label
    fn label(&self, id: NodeId) -> &<Self::Types as TreeTypes>::Label;

    /// Slot under the parent
    fn edge(&self, id: NodeId) -> &<Self::Types as TreeTypes>::Edge;

    /// Structural fingerprint of the subtree rooted at `id`
    fn hash(&self, id: NodeId) -> NodeHash;

    /// Node count of the subtree rooted at `id`
    fn size(&self, id: NodeId) -> usize;

    /// Pre-order index
    fn order(&self, id: NodeId) -> usize;

    /// Parent, `None` for the root
    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// Children in order
    fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_;

    /// Number of children
    fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Index among siblings
    fn position(&self, id: NodeId) -> usize;

    /// Whether the node has no children
    fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).next().is_none()
    }

    /// All nodes in pre-order (document order)
    fn iter(&self) -> impl Iterator<Item = NodeId> + '_;

    /// All nodes in post-order (children before parents)
    fn post_order(&self) -> impl Iterator<Item = NodeId> + '_;

    /// `id` followed by all of its descendants, in pre-order
    fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

impl<T: TreeTypes> DiffTree for Tree<T> {
    type Types = T;

    fn root(&self) -> NodeId {
        self.root
    }

    fn node_count(&self) -> usize {
        self.arena.len()
    }

    fn kind(&self, id: NodeId) -> &T::Kind {
        &self.get(id).kind
    }

    fn value(&self, id: NodeId) -> &T::Value {
        &self.get(id).value
    }

    fn label(&self, id: NodeId) -> &T::Label {
        &self.get(id).label
    }

    fn edge(&self, id: NodeId) -> &T::Edge {
        &self.get(id).edge
    }

    fn hash(&self, id: NodeId) -> NodeHash {
        self.get(id).hash
    }

    fn size(&self, id: NodeId) -> usize {
        self.get(id).size
    }

    fn order(&self, id: NodeId) -> usize {
        self.get(id).order
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    fn position(&self, id: NodeId) -> usize {
        self.get(id).position
    }

    fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_none()
    }

    fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(id) => Some(id),
            NodeEdge::Start(_) => None,
        })
    }

    fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }
}

/// Tree types for tests and simple callers: string kinds, optional string
/// values, slots named by static strings.
pub struct SimpleTypes<K = &'static str, V = Option<String>>(core::marker::PhantomData<(K, V)>);

impl<K, V> TreeTypes for SimpleTypes<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + fmt::Display,
    V: Clone + Default + Eq + Hash + fmt::Debug,
{
    type Kind = K;
    type Value = V;
    type Label = ();
    type Edge = &'static str;
}

impl<K, V> NodeData<SimpleTypes<K, V>>
where
    K: Clone + Eq + Hash + fmt::Debug + fmt::Display,
    V: Clone + Default + Eq + Hash + fmt::Debug,
{
    /// A node with no primitive value.
    pub fn simple(kind: K) -> Self {
        Self::new(kind, V::default(), ())
    }

    /// A node carrying a primitive value.
    pub fn simple_valued(kind: K, value: V) -> Self {
        Self::new(kind, value, ())
    }
}
