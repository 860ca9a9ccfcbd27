//! Unbalanced binary search tree over the same record model.
//!
//! Same find/insert contract as [`RbTree`](crate::RbTree), but nodes stay
//! wherever the descent drops them. Sorted input therefore degrades it to a
//! linked list with linear-time lookups.

use std::cmp::Ordering;

use log::debug;

use crate::{arena_handle, Keyed};

#[derive(Clone)]
struct BinNode<R> {
    key: Box<str>,
    record: R,
    left: Option<u32>,
    right: Option<u32>,
}

#[derive(Clone)]
pub struct BinTree<R> {
    nodes: Vec<BinNode<R>>,
    root: Option<u32>,
}

impl<R> BinTree<R> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, key: &str) -> bool {
        self.locate(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.locate(key).map(|idx| &self.nodes[idx as usize].record)
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(u32, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((idx, depth)) = stack.pop() {
            max = max.max(depth);
            let node = &self.nodes[idx as usize];
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        max
    }

    fn locate(&self, key: &str) -> Option<u32> {
        let mut current = self.root;
        while let Some(idx) = current {
            let node = &self.nodes[idx as usize];
            current = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(idx),
            };
        }
        None
    }
}

impl<R: Keyed> BinTree<R> {
    /// Returns `false` and drops `record` if its key is already present.
    pub fn insert(&mut self, record: R) -> bool {
        let key: Box<str> = record.key().into();
        let idx = arena_handle(self.nodes.len());

        let Some(mut current) = self.root else {
            self.root = Some(idx);
            self.push(key, record);
            return true;
        };

        loop {
            let node = &mut self.nodes[current as usize];
            let slot = match (*key).cmp(&*node.key) {
                Ordering::Less => &mut node.left,
                Ordering::Greater => &mut node.right,
                Ordering::Equal => {
                    debug!("key {key:?} already present, insert ignored");
                    return false;
                }
            };
            match *slot {
                Some(next) => current = next,
                None => {
                    *slot = Some(idx);
                    break;
                }
            }
        }

        self.push(key, record);
        true
    }

    fn push(&mut self, key: Box<str>, record: R) {
        self.nodes.push(BinNode {
            key,
            record,
            left: None,
            right: None,
        });
    }
}

impl<R> Default for BinTree<R> {
    fn default() -> Self {
        Self::new()
    }
}
