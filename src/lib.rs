//! # rbtree-rs
//!
//! An arena-backed red-black tree storing records under unique string keys.
//!
//! Every record derives its key through [`Keyed`]. The tree keeps that key
//! next to the record and rebalances after each insertion, so lookups stay
//! logarithmic no matter what order the records arrive in.
//!
//! ## Example
//!
//! ```rust
//! use rbtree_rs::RbTree;
//!
//! let mut tree: RbTree<(String, u32)> = RbTree::new();
//! assert!(tree.insert(("hello".to_string(), 1)));
//! assert!(tree.insert(("world".to_string(), 2)));
//!
//! // The first record under a key wins; later ones are dropped.
//! assert!(!tree.insert(("hello".to_string(), 3)));
//!
//! assert!(tree.find("hello"));
//! assert_eq!(tree.get("hello").map(|r| r.1), Some(1));
//! assert!(!tree.find("missing"));
//! ```

#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use log::{debug, trace};

pub mod bintree;

pub use bintree::BinTree;

// =============================================================================
// Records
// =============================================================================

/// A record that can be stored in a tree.
///
/// The key must be stable: the tree derives it once when the record is
/// inserted and never asks again.
pub trait Keyed {
    fn key(&self) -> Cow<'_, str>;
}

impl Keyed for String {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl Keyed for &str {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }
}

impl Keyed for Box<str> {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&**self)
    }
}

/// Key/value pair records, keyed by the first element.
impl<V> Keyed for (String, V) {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0.as_str())
    }
}

// =============================================================================
// Node arena
// =============================================================================
//
// Links live in `nodes`, payloads in `entries`. Slot 0 of `nodes` is the
// sentinel: always black, standing in for every absent child and for the
// root's parent. Slot `i > 0` keeps its key and record at `entries[i - 1]`.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

/// Handle into the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    const NIL: NodeId = NodeId(0);

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dir {
    Left,
    Right,
}

impl Dir {
    #[inline]
    fn opposite(self) -> Self {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Node {
    color: Color,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
}

impl Node {
    const SENTINEL: Node = Node {
        color: Color::Black,
        parent: NodeId::NIL,
        left: NodeId::NIL,
        right: NodeId::NIL,
    };

    /// New nodes start red and detached, with sentinel children.
    const FRESH: Node = Node {
        color: Color::Red,
        ..Node::SENTINEL
    };
}

#[derive(Clone)]
struct Entry<R> {
    key: Box<str>,
    record: R,
}

/// Handle for the next arena slot. Panics once handles would no longer fit
/// in 32 bits, instead of wrapping onto live nodes.
#[inline]
pub(crate) fn arena_handle(len: usize) -> u32 {
    u32::try_from(len).expect("node arena full")
}

// =============================================================================
// Invariant checking
// =============================================================================

/// A broken structural property, as reported by [`RbTree::check_invariants`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    SentinelNotBlack,
    RedRoot,
    /// A red node has a red child.
    RedChildOfRed { key: String },
    /// Two root-to-sentinel paths disagree on their count of black nodes.
    BlackHeightMismatch { expected: usize, found: usize },
    /// A node's parent link does not point back at the node holding it.
    BrokenParentLink { key: String },
    /// In-order keys are not strictly ascending at `key`.
    OutOfOrder { key: String },
    /// Reachable nodes differ from the number of stored records.
    CountMismatch { reachable: usize, len: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SentinelNotBlack => write!(f, "sentinel is not black"),
            Self::RedRoot => write!(f, "root is red"),
            Self::RedChildOfRed { key } => write!(f, "red node {key:?} has a red child"),
            Self::BlackHeightMismatch { expected, found } => write!(
                f,
                "black height mismatch: expected {expected}, found {found}"
            ),
            Self::BrokenParentLink { key } => {
                write!(f, "node {key:?} has an inconsistent parent link")
            }
            Self::OutOfOrder { key } => write!(f, "key {key:?} is out of order"),
            Self::CountMismatch { reachable, len } => write!(
                f,
                "{reachable} nodes reachable from the root, but {len} records stored"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

// =============================================================================
// RbTree
// =============================================================================

/// A red-black tree of records, ordered by their [`Keyed`] keys.
///
/// - Arena storage: nodes are addressed by 32-bit handles, parent links are
///   plain handles, and the whole tree is released in one go on drop
/// - Duplicate keys are ignored: the first record inserted under a key stays
/// - No deletion
#[derive(Clone)]
pub struct RbTree<R> {
    nodes: Vec<Node>,
    entries: Vec<Entry<R>>,
    root: NodeId,
}

impl<R> RbTree<R> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty tree with room for `capacity` records before the
    /// arena reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 1);
        nodes.push(Node::SENTINEL);
        Self {
            nodes,
            entries: Vec::with_capacity(capacity),
            root: NodeId::NIL,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, key: &str) -> bool {
        !self.locate(key).is_nil()
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        let id = self.locate(key);
        (!id.is_nil()).then(|| &self.entry(id).record)
    }

    /// Number of nodes on the longest path from the root down to a sentinel.
    pub fn height(&self) -> usize {
        let mut max = 0;
        let mut stack = Vec::new();
        if !self.root.is_nil() {
            stack.push((self.root, 1));
        }
        while let Some((id, depth)) = stack.pop() {
            max = max.max(depth);
            for dir in [Dir::Left, Dir::Right] {
                let child = self.child(id, dir);
                if !child.is_nil() {
                    stack.push((child, depth + 1));
                }
            }
        }
        max
    }

    /// Black nodes on any path from the root down to a sentinel, not counting
    /// the root itself. Zero for an empty tree or a lone root.
    pub fn black_height(&self) -> usize {
        if self.root.is_nil() {
            return 0;
        }
        let mut count = 0;
        let mut current = self.child(self.root, Dir::Left);
        while !current.is_nil() {
            if self.color(current) == Color::Black {
                count += 1;
            }
            current = self.child(current, Dir::Left);
        }
        count
    }

    /// In-order iterator over `(key, record)` pairs.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter {
            tree: self,
            stack: Vec::new(),
            current: self.root,
            remaining: self.len(),
        }
    }

    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.entries.clear();
        self.root = NodeId::NIL;
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node>()
            + self.entries.capacity() * std::mem::size_of::<Entry<R>>()
            + self.entries.iter().map(|e| e.key.len()).sum::<usize>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        self.entries.shrink_to_fit();
    }

    /// Walks the whole tree and verifies the red-black properties, key
    /// ordering, parent links, and the record count.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.nodes[0].color != Color::Black {
            return Err(InvariantViolation::SentinelNotBlack);
        }
        if self.color(self.root) == Color::Red {
            return Err(InvariantViolation::RedRoot);
        }
        if !self.root.is_nil() && !self.parent(self.root).is_nil() {
            return Err(InvariantViolation::BrokenParentLink {
                key: self.key(self.root).to_string(),
            });
        }

        let mut expected_black: Option<usize> = None;
        let mut reachable = 0usize;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, blacks)) = stack.pop() {
            if id.is_nil() {
                match expected_black {
                    None => expected_black = Some(blacks),
                    Some(expected) if expected != blacks => {
                        return Err(InvariantViolation::BlackHeightMismatch {
                            expected,
                            found: blacks,
                        });
                    }
                    Some(_) => {}
                }
                continue;
            }

            reachable += 1;
            if reachable > self.len() {
                // Also stops the walk on a cycle.
                return Err(InvariantViolation::CountMismatch {
                    reachable,
                    len: self.len(),
                });
            }

            let color = self.color(id);
            for dir in [Dir::Left, Dir::Right] {
                let child = self.child(id, dir);
                if child.is_nil() {
                    continue;
                }
                if color == Color::Red && self.color(child) == Color::Red {
                    return Err(InvariantViolation::RedChildOfRed {
                        key: self.key(id).to_string(),
                    });
                }
                if self.parent(child) != id {
                    return Err(InvariantViolation::BrokenParentLink {
                        key: self.key(child).to_string(),
                    });
                }
            }

            let blacks = blacks + usize::from(color == Color::Black);
            stack.push((self.child(id, Dir::Right), blacks));
            stack.push((self.child(id, Dir::Left), blacks));
        }

        if reachable != self.len() {
            return Err(InvariantViolation::CountMismatch {
                reachable,
                len: self.len(),
            });
        }

        let mut prev: Option<&str> = None;
        for (key, _) in self.iter() {
            if prev.is_some_and(|p| p >= key) {
                return Err(InvariantViolation::OutOfOrder {
                    key: key.to_string(),
                });
            }
            prev = Some(key);
        }

        Ok(())
    }

    // --- node access ---

    #[inline]
    fn color(&self, id: NodeId) -> Color {
        self.nodes[id.index()].color
    }

    #[inline]
    fn set_color(&mut self, id: NodeId, color: Color) {
        self.nodes[id.index()].color = color;
    }

    #[inline]
    fn parent(&self, id: NodeId) -> NodeId {
        self.nodes[id.index()].parent
    }

    #[inline]
    fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id.index()].parent = parent;
    }

    #[inline]
    fn child(&self, id: NodeId, dir: Dir) -> NodeId {
        let node = &self.nodes[id.index()];
        match dir {
            Dir::Left => node.left,
            Dir::Right => node.right,
        }
    }

    #[inline]
    fn set_child(&mut self, id: NodeId, dir: Dir, child: NodeId) {
        let node = &mut self.nodes[id.index()];
        match dir {
            Dir::Left => node.left = child,
            Dir::Right => node.right = child,
        }
    }

    #[inline]
    fn entry(&self, id: NodeId) -> &Entry<R> {
        debug_assert!(!id.is_nil(), "the sentinel has no entry");
        &self.entries[id.index() - 1]
    }

    #[inline]
    fn key(&self, id: NodeId) -> &str {
        &self.entry(id).key
    }

    /// Which child of its parent `id` is. The parent must not be the sentinel.
    #[inline]
    fn side_of(&self, id: NodeId) -> Dir {
        if self.child(self.parent(id), Dir::Left) == id {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    fn locate(&self, key: &str) -> NodeId {
        let mut current = self.root;
        while !current.is_nil() {
            current = match key.cmp(self.key(current)) {
                Ordering::Less => self.child(current, Dir::Left),
                Ordering::Greater => self.child(current, Dir::Right),
                Ordering::Equal => return current,
            };
        }
        NodeId::NIL
    }

    // --- structural edits ---

    /// Rotates `x` down toward `dir`, promoting its child on the opposite
    /// side into `x`'s place. `Dir::Left` is a left rotation.
    ///
    /// Preserves in-order key sequence and leaves every color untouched.
    fn rotate(&mut self, x: NodeId, dir: Dir) {
        let y = self.child(x, dir.opposite());
        debug_assert!(!y.is_nil(), "rotation needs a child to promote");

        let inner = self.child(y, dir);
        self.set_child(x, dir.opposite(), inner);
        if !inner.is_nil() {
            self.set_parent(inner, x);
        }

        let parent = self.parent(x);
        self.set_parent(y, parent);
        if parent.is_nil() {
            self.root = y;
        } else {
            let side = self.side_of(x);
            self.set_child(parent, side, y);
        }

        self.set_child(y, dir, x);
        self.set_parent(x, y);
        trace!("rotated {:?} at {:?}", dir, self.key(x));
    }

    fn alloc(&mut self, key: Box<str>, record: R) -> NodeId {
        let id = NodeId(arena_handle(self.nodes.len()));
        self.nodes.push(Node::FRESH);
        self.entries.push(Entry { key, record });
        id
    }
}

impl<R: Keyed> RbTree<R> {
    /// Inserts `record` under its key and rebalances.
    ///
    /// Returns `false` and drops `record` if the key is already present; the
    /// stored record is not replaced.
    pub fn insert(&mut self, record: R) -> bool {
        let key: Box<str> = record.key().into();
        match self.bst_insert(key, record) {
            Some(id) => {
                self.insert_fixup(id);
                true
            }
            None => false,
        }
    }

    /// Plain binary-search-tree placement of a new red node.
    fn bst_insert(&mut self, key: Box<str>, record: R) -> Option<NodeId> {
        let mut parent = NodeId::NIL;
        let mut side = Dir::Left;
        let mut current = self.root;
        while !current.is_nil() {
            parent = current;
            side = match (*key).cmp(self.key(current)) {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal => {
                    debug!("key {key:?} already present, insert ignored");
                    return None;
                }
            };
            current = self.child(current, side);
        }

        let id = self.alloc(key, record);
        self.set_parent(id, parent);
        if parent.is_nil() {
            self.root = id;
        } else {
            self.set_child(parent, side, id);
        }
        Some(id)
    }

    /// Restores the red-black properties after `z` was placed red.
    ///
    /// The only possible violation is `z` and its parent both being red. Each
    /// pass either recolors and moves the violation two levels up (red
    /// uncle), or rotates it away and stops (black uncle).
    fn insert_fixup(&mut self, mut z: NodeId) {
        while self.color(self.parent(z)) == Color::Red {
            let parent = self.parent(z);
            // A red parent is never the root, so the grandparent is real.
            let grandparent = self.parent(parent);
            let side = self.side_of(parent);
            let uncle = self.child(grandparent, side.opposite());

            if self.color(uncle) == Color::Red {
                trace!("red uncle, recoloring under {:?}", self.key(grandparent));
                self.set_color(parent, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(grandparent, Color::Red);
                z = grandparent;
                continue;
            }

            if z == self.child(parent, side.opposite()) {
                // Zig-zag: straighten into a line first.
                z = parent;
                self.rotate(z, side);
            }

            let parent = self.parent(z);
            let grandparent = self.parent(parent);
            self.set_color(parent, Color::Black);
            self.set_color(grandparent, Color::Red);
            self.rotate(grandparent, side.opposite());
            break;
        }

        let root = self.root;
        self.set_color(root, Color::Black);
    }
}

impl<R> Default for RbTree<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: fmt::Debug> fmt::Debug for RbTree<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<R: Keyed> Extend<R> for RbTree<R> {
    fn extend<I: IntoIterator<Item = R>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl<R: Keyed> FromIterator<R> for RbTree<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<'a, R> IntoIterator for &'a RbTree<R> {
    type Item = (&'a str, &'a R);
    type IntoIter = Iter<'a, R>;

    fn into_iter(self) -> Iter<'a, R> {
        self.iter()
    }
}

pub struct Iter<'a, R> {
    tree: &'a RbTree<R>,
    stack: Vec<NodeId>,
    current: NodeId,
    remaining: usize,
}

impl<'a, R> Iterator for Iter<'a, R> {
    type Item = (&'a str, &'a R);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.current.is_nil() {
            self.stack.push(self.current);
            self.current = self.tree.child(self.current, Dir::Left);
        }
        let id = self.stack.pop()?;
        self.current = self.tree.child(id, Dir::Right);
        self.remaining -= 1;
        let entry = self.tree.entry(id);
        Some((&*entry.key, &entry.record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<R> ExactSizeIterator for Iter<'_, R> {}


#[cfg(test)]
mod proptests;
