//! Disjoint sets over interned formula slots.
//!
//! Entries are never removed: a collected formula's slot keeps pointing
//! into its old group, it is simply never looked up again.

/// Index of an interned [`FormulaId`](crate::FormulaId).
pub(crate) type Slot = usize;

#[derive(Debug, Default, Clone)]
pub(crate) struct UnionFind {
    parent: Vec<Slot>,
    /// only meaningful for group representatives
    size: Vec<usize>,
}

impl UnionFind {
    /// Makes every slot below `len` a known entry; new ones start as
    /// singleton groups.
    pub fn grow(&mut self, len: usize) {
        for slot in self.parent.len()..len {
            self.parent.push(slot);
            self.size.push(1);
        }
    }

    /// Representative of `slot`'s group. Every node on the way is repointed
    /// straight at the representative.
    pub fn find(&mut self, mut slot: Slot) -> Slot {
        let mut root = slot;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[slot] != root {
            let next = self.parent[slot];
            self.parent[slot] = root;
            slot = next;
        }
        root
    }

    /// Merges the groups of `left` and `right`, returning the new
    /// representative, or `None` when they already share a group.
    ///
    /// The smaller tree goes under the larger one; on a tie `left`'s
    /// representative goes under `right`'s.
    pub fn union(&mut self, left: Slot, right: Slot) -> Option<Slot> {
        let left_root = self.find(left);
        let right_root = self.find(right);
        if left_root == right_root {
            return None;
        }
        let left_size = self.size[left_root];
        let right_size = self.size[right_root];
        let (child, root) = if left_size <= right_size {
            (left_root, right_root)
        } else {
            (right_root, left_root)
        };
        self.parent[child] = root;
        self.size[root] = left_size + right_size;
        Some(root)
    }

    pub fn group_size(&mut self, slot: Slot) -> usize {
        let root = self.find(slot);
        self.size[root]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(n: usize) -> UnionFind {
        let mut uf = UnionFind::default();
        uf.grow(n);
        uf
    }

    #[test]
    fn singletons_are_their_own_group() {
        let mut uf = sets(3);
        assert_eq!(uf.parent.len(), 3);
        for slot in 0..3 {
            assert_eq!(uf.find(slot), slot);
            assert_eq!(uf.group_size(slot), 1);
        }
    }

    #[test]
    fn ties_attach_left_under_right() {
        let mut uf = sets(2);
        assert_eq!(uf.union(0, 1), Some(1));
        assert_eq!(uf.find(0), 1);
        assert_eq!(uf.union(1, 0), None);
    }

    #[test]
    fn smaller_tree_goes_under_larger() {
        let mut uf = sets(4);
        uf.union(0, 1);
        assert_eq!(uf.union(1, 2), Some(1));
        assert_eq!(uf.union(3, 0), Some(1));
        assert_eq!(uf.group_size(3), 4);
    }

    #[test]
    fn find_compresses_paths() {
        let mut uf = sets(5);
        // 0 -> 1 -> 3 once these are merged
        uf.union(0, 1);
        uf.union(2, 3);
        uf.union(1, 3);
        uf.union(4, 3);
        let root = uf.find(0);
        assert_eq!(uf.parent[0], root);
        for slot in 0..5 {
            let group = uf.find(slot);
            assert_eq!(uf.find(group), group);
        }
    }

    #[test]
    fn grow_is_idempotent() {
        let mut uf = sets(2);
        uf.union(0, 1);
        uf.grow(2);
        assert_eq!(uf.find(0), uf.find(1));
        uf.grow(3);
        assert_eq!(uf.find(2), 2);
    }
}
