//! Augmented interval tree.
//!
//! A red-black tree ordered by interval start (ties broken by insertion
//! order) where every node also records the largest interval end in its
//! subtree. Overlap queries prune every subtree whose largest end lies before
//! the query start.
//!
//! Nodes live in an arena indexed by `usize`. Slot `0` is the shared black
//! sentinel standing in for every leaf and for the root's parent; its
//! `max_end` is `None`, which orders below every `Some`.
//!
//! The tree stores keys, never components. Each key appears at most once;
//! inserting a key that is already present replaces its interval.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Entry<P, K> {
    start: P,
    end: P,
    seq: u64,
    key: K,
}

#[derive(Debug, Clone)]
struct Node<P, K> {
    left: usize,
    right: usize,
    parent: usize,
    color: Color,
    max_end: Option<P>,
    entry: Option<Entry<P, K>>,
}

impl<P, K> Node<P, K> {
    const fn sentinel() -> Self {
        Self {
            left: NIL,
            right: NIL,
            parent: NIL,
            color: Color::Black,
            max_end: None,
            entry: None,
        }
    }
}

/// Interval tree over points `P` holding keys `K`.
#[derive(Debug, Clone)]
pub struct IntervalTree<P, K> {
    nodes: Vec<Node<P, K>>,
    free: Vec<usize>,
    root: usize,
    by_key: HashMap<K, usize>,
    next_seq: u64,
}

impl<P, K> Default for IntervalTree<P, K>
where
    P: Ord + Copy,
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, K> IntervalTree<P, K>
where
    P: Ord + Copy,
    K: Clone + Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::sentinel()],
            free: Vec::new(),
            root: NIL,
            by_key: HashMap::new(),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// Returns the stored interval for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<(P, P)> {
        let entry = self.nodes[*self.by_key.get(key)?].entry.as_ref()?;
        Some((entry.start, entry.end))
    }

    /// Releases every node.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[NIL] = Node::sentinel();
        self.free.clear();
        self.by_key.clear();
        self.root = NIL;
    }

    /// Inserts `[start, end)` for `key`, replacing the key's previous
    /// interval if it had one.
    ///
    /// An interval whose end precedes its start is stored as the empty
    /// interval at `start`. Returns `false` if an existing interval was
    /// replaced.
    pub fn insert(&mut self, start: P, end: P, key: K) -> bool {
        let replaced = self.remove(&key);

        let end = end.max(start);
        let seq = self.next_seq;
        self.next_seq += 1;

        let z = self.alloc(Entry {
            start,
            end,
            seq,
            key: key.clone(),
        });
        self.by_key.insert(key, z);

        let mut parent = NIL;
        let mut cursor = self.root;
        while cursor != NIL {
            parent = cursor;
            cursor = if self.order(z) < self.order(cursor) {
                self.nodes[cursor].left
            } else {
                self.nodes[cursor].right
            };
        }

        self.nodes[z].parent = parent;
        if parent == NIL {
            self.root = z;
        } else if self.order(z) < self.order(parent) {
            self.nodes[parent].left = z;
        } else {
            self.nodes[parent].right = z;
        }

        self.update_to_root(z);
        self.insert_fixup(z);
        !replaced
    }

    /// Removes the interval stored for `key`. Returns whether it existed.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(z) = self.by_key.remove(key) else {
            return false;
        };

        let mut y = z;
        let mut y_original_color = self.nodes[y].color;
        let x;

        if self.nodes[z].left == NIL {
            x = self.nodes[z].right;
            self.transplant(z, x);
        } else if self.nodes[z].right == NIL {
            x = self.nodes[z].left;
            self.transplant(z, x);
        } else {
            y = self.minimum(self.nodes[z].right);
            y_original_color = self.nodes[y].color;
            x = self.nodes[y].right;
            if self.nodes[y].parent == z {
                self.nodes[x].parent = y;
            } else {
                self.transplant(y, x);
                self.nodes[y].right = self.nodes[z].right;
                let right = self.nodes[y].right;
                self.nodes[right].parent = y;
            }
            self.transplant(z, y);
            self.nodes[y].left = self.nodes[z].left;
            let left = self.nodes[y].left;
            self.nodes[left].parent = y;
            self.nodes[y].color = self.nodes[z].color;
        }

        // x may be the sentinel, whose parent was set by the splice above.
        let changed_from = self.nodes[x].parent;
        self.update_to_root(changed_from);

        if y_original_color == Color::Black {
            self.delete_fixup(x);
        }

        self.nodes[NIL] = Node::sentinel();
        self.release(z);
        true
    }

    /// Returns the keys of every interval `[s, e)` with
    /// `s <= query_end && e >= query_start`, ordered by start.
    #[must_use]
    pub fn search(&self, query_start: P, query_end: P) -> Vec<K> {
        let mut out = Vec::new();
        self.search_node(self.root, query_start, query_end, &mut out);
        out
    }

    fn search_node(&self, n: usize, qs: P, qe: P, out: &mut Vec<K>) {
        if n == NIL || self.nodes[n].max_end < Some(qs) {
            return;
        }
        let node = &self.nodes[n];
        let Some(entry) = node.entry.as_ref() else {
            return;
        };

        if self.nodes[node.left].max_end >= Some(qs) {
            self.search_node(node.left, qs, qe, out);
        }
        if entry.start <= qe && entry.end >= qs {
            out.push(entry.key.clone());
        }
        if entry.start <= qe {
            self.search_node(node.right, qs, qe, out);
        }
    }

    fn alloc(&mut self, entry: Entry<P, K>) -> usize {
        let node = Node {
            left: NIL,
            right: NIL,
            parent: NIL,
            color: Color::Red,
            max_end: Some(entry.end),
            entry: Some(entry),
        };
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, n: usize) {
        self.nodes[n] = Node::sentinel();
        self.free.push(n);
    }

    /// Sort key of a live node.
    fn order(&self, n: usize) -> Option<(P, u64)> {
        self.nodes[n].entry.as_ref().map(|e| (e.start, e.seq))
    }

    fn minimum(&self, mut n: usize) -> usize {
        while self.nodes[n].left != NIL {
            n = self.nodes[n].left;
        }
        n
    }

    /// Recomputes `max_end` of `n` from its own end and its children.
    fn update(&mut self, n: usize) {
        if n == NIL {
            return;
        }
        let node = &self.nodes[n];
        let own = node.entry.as_ref().map(|e| e.end);
        let max_end = own
            .max(self.nodes[node.left].max_end)
            .max(self.nodes[node.right].max_end);
        self.nodes[n].max_end = max_end;
    }

    fn update_to_root(&mut self, mut n: usize) {
        while n != NIL {
            self.update(n);
            n = self.nodes[n].parent;
        }
    }

    fn transplant(&mut self, u: usize, v: usize) {
        let parent = self.nodes[u].parent;
        if parent == NIL {
            self.root = v;
        } else if u == self.nodes[parent].left {
            self.nodes[parent].left = v;
        } else {
            self.nodes[parent].right = v;
        }
        self.nodes[v].parent = parent;
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.nodes[x].right;
        let y_left = self.nodes[y].left;

        self.nodes[x].right = y_left;
        if y_left != NIL {
            self.nodes[y_left].parent = x;
        }
        self.transplant(x, y);
        self.nodes[y].left = x;
        self.nodes[x].parent = y;

        self.update(x);
        self.update(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.nodes[x].left;
        let y_right = self.nodes[y].right;

        self.nodes[x].left = y_right;
        if y_right != NIL {
            self.nodes[y_right].parent = x;
        }
        self.transplant(x, y);
        self.nodes[y].right = x;
        self.nodes[x].parent = y;

        self.update(x);
        self.update(y);
    }

    fn color(&self, n: usize) -> Color {
        self.nodes[n].color
    }

    fn insert_fixup(&mut self, mut z: usize) {
        while self.color(self.nodes[z].parent) == Color::Red {
            let parent = self.nodes[z].parent;
            let grandparent = self.nodes[parent].parent;

            if parent == self.nodes[grandparent].left {
                let uncle = self.nodes[grandparent].right;
                if self.color(uncle) == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    z = grandparent;
                } else {
                    if z == self.nodes[parent].right {
                        z = parent;
                        self.rotate_left(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.nodes[grandparent].left;
                if self.color(uncle) == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    z = grandparent;
                } else {
                    if z == self.nodes[parent].left {
                        z = parent;
                        self.rotate_right(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    self.rotate_left(grandparent);
                }
            }
        }
        let root = self.root;
        self.nodes[root].color = Color::Black;
    }

    fn delete_fixup(&mut self, mut x: usize) {
        while x != self.root && self.color(x) == Color::Black {
            let parent = self.nodes[x].parent;
            if x == self.nodes[parent].left {
                let mut w = self.nodes[parent].right;
                if self.color(w) == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.rotate_left(parent);
                    w = self.nodes[parent].right;
                }
                if self.color(self.nodes[w].left) == Color::Black
                    && self.color(self.nodes[w].right) == Color::Black
                {
                    self.nodes[w].color = Color::Red;
                    x = parent;
                } else {
                    if self.color(self.nodes[w].right) == Color::Black {
                        let w_left = self.nodes[w].left;
                        self.nodes[w_left].color = Color::Black;
                        self.nodes[w].color = Color::Red;
                        self.rotate_right(w);
                        w = self.nodes[parent].right;
                    }
                    self.nodes[w].color = self.nodes[parent].color;
                    self.nodes[parent].color = Color::Black;
                    let w_right = self.nodes[w].right;
                    self.nodes[w_right].color = Color::Black;
                    self.rotate_left(parent);
                    x = self.root;
                }
            } else {
                let mut w = self.nodes[parent].left;
                if self.color(w) == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.rotate_right(parent);
                    w = self.nodes[parent].left;
                }
                if self.color(self.nodes[w].right) == Color::Black
                    && self.color(self.nodes[w].left) == Color::Black
                {
                    self.nodes[w].color = Color::Red;
                    x = parent;
                } else {
                    if self.color(self.nodes[w].left) == Color::Black {
                        let w_right = self.nodes[w].right;
                        self.nodes[w_right].color = Color::Black;
                        self.nodes[w].color = Color::Red;
                        self.rotate_left(w);
                        w = self.nodes[parent].left;
                    }
                    self.nodes[w].color = self.nodes[parent].color;
                    self.nodes[parent].color = Color::Black;
                    let w_left = self.nodes[w].left;
                    self.nodes[w_left].color = Color::Black;
                    self.rotate_right(parent);
                    x = self.root;
                }
            }
        }
        self.nodes[x].color = Color::Black;
    }
}

#[cfg(test)]
impl<P, K> IntervalTree<P, K>
where
    P: Ord + Copy + std::fmt::Debug,
    K: Clone + Eq + Hash,
{
    /// Checks ordering, augmentation and red-black properties.
    fn check_invariants(&self) -> Result<(), String> {
        if self.color(self.root) != Color::Black {
            return Err("root is red".to_string());
        }
        if self.nodes[NIL].max_end.is_some() || self.color(NIL) != Color::Black {
            return Err("sentinel was modified".to_string());
        }
        let (count, _) = self.check_node(self.root, NIL, None, None)?;
        if count != self.by_key.len() {
            return Err(format!("{count} nodes but {} keys", self.by_key.len()));
        }
        Ok(())
    }

    /// Returns (node count, black height).
    fn check_node(
        &self,
        n: usize,
        parent: usize,
        lower: Option<(P, u64)>,
        upper: Option<(P, u64)>,
    ) -> Result<(usize, usize), String> {
        if n == NIL {
            return Ok((0, 1));
        }
        let node = &self.nodes[n];
        if node.parent != parent {
            return Err(format!("node {n} has wrong parent"));
        }
        let order = self.order(n);
        if order.is_none() || (lower.is_some() && order < lower) || (upper.is_some() && order > upper) {
            return Err(format!("node {n} breaks ordering"));
        }
        if node.color == Color::Red
            && (self.color(node.left) == Color::Red || self.color(node.right) == Color::Red)
        {
            return Err(format!("red node {n} has a red child"));
        }

        let own = node.entry.as_ref().map(|e| e.end);
        let expected = own
            .max(self.nodes[node.left].max_end)
            .max(self.nodes[node.right].max_end);
        if node.max_end != expected {
            return Err(format!(
                "node {n} max_end {:?} != {expected:?}",
                node.max_end
            ));
        }

        let (left_count, left_height) = self.check_node(node.left, n, lower, order)?;
        let (right_count, right_height) = self.check_node(node.right, n, order, upper)?;
        if left_height != right_height {
            return Err(format!("node {n} has unequal black heights"));
        }
        let height = left_height + usize::from(node.color == Color::Black);
        Ok((left_count + right_count + 1, height))
    }
}
