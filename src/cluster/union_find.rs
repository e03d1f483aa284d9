/// Disjoint sets over `0..n` with path compression and union by size.
///
/// Representative choice depends on union order; set membership does not.
#[derive(Clone, Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Second pass: point every node on the path at the root.
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets holding `a` and `b`. Returns false if they were
    /// already one set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        let (big, small) = if self.size[ra] < self.size[rb] {
            (rb, ra)
        } else {
            (ra, rb)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }

    /// Current sets, each sorted ascending, ordered by smallest member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root = vec![usize::MAX; self.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for x in 0..self.len() {
            let root = self.find(x);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(x);
        }
        groups
    }
}

/// Connected components of `0..n` under the given accepted pairs.
pub fn union_find_partition(
    n: usize,
    accepted: impl IntoIterator<Item = (usize, usize)>,
) -> Vec<Vec<usize>> {
    let mut uf = UnionFind::new(n);
    for (a, b) in accepted {
        uf.union(a, b);
    }
    uf.components()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_without_edges() {
        let groups = union_find_partition(3, Vec::<(usize, usize)>::new());
        assert_eq!(groups, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_transitive_merge() {
        let groups = union_find_partition(4, [(0, 1), (1, 2)]);
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_union_reports_merges() {
        let mut uf = UnionFind::new(3);
        assert!(uf.union(0, 2));
        assert!(!uf.union(2, 0));
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(1), uf.find(0));
    }

    #[test]
    fn test_order_of_unions_does_not_change_membership() {
        let edges = [(0, 1), (2, 3), (1, 3), (5, 6)];
        let forward = union_find_partition(7, edges);
        let reversed = union_find_partition(7, edges.iter().rev().copied());
        assert_eq!(forward, reversed);
        assert_eq!(forward, vec![vec![0, 1, 2, 3], vec![4], vec![5, 6]]);
    }

    #[test]
    fn test_long_chain_compresses() {
        let n = 10_000;
        let mut uf = UnionFind::new(n);
        for i in 1..n {
            uf.union(i - 1, i);
        }
        let root = uf.find(n - 1);
        assert_eq!(uf.find(0), root);
        assert_eq!(uf.components().len(), 1);
    }
}
