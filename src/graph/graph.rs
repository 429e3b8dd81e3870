use std::collections::{HashMap, VecDeque};

use crate::error::{Result, RsmError};

/// An undirected zone adjacency graph in compressed sparse row format.
/// Nodes are row positions in the zone table, not zone ids.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    size: usize,
    offsets: Vec<u32>,
    edges: Vec<u32>,
}

impl Graph {
    /// Construct a graph from adjacency lists (one list per node).
    pub fn new(num_nodes: usize, edges: &[Vec<u32>]) -> Self {
        assert!(edges.len() == num_nodes, "edges.len() must equal num_nodes");
        edges.iter().enumerate().for_each(|(i, list)| {
            assert!(list.iter().all(|&v| (v as usize) < num_nodes), "edges[{i}] references a node out of range");
        });

        Self {
            size: num_nodes,
            offsets: std::iter::once(0u32).chain(
                edges.iter()
                    .map(|v| v.len() as u32)
                    .scan(0u32, |acc, len| {*acc += len; Some(*acc)})
            ).collect::<Vec<u32>>(),
            edges: edges.iter().flatten().copied().collect(),
        }
    }

    /// Build a graph over `ids` (node i has zone id `ids[i]`) from unordered
    /// id pairs. Duplicate pairs and self loops are dropped; pairs naming an
    /// unknown id are rejected.
    pub fn from_id_pairs(ids: &[i64], pairs: &[(i64, i64)]) -> Result<Self> {
        let index = ids.iter().enumerate()
            .map(|(i, &id)| (id, i as u32))
            .collect::<HashMap<_, _>>();

        let mut lists = vec![Vec::new(); ids.len()];
        for &(a, b) in pairs {
            let lookup = |id: i64| index.get(&id).copied()
                .ok_or_else(|| RsmError::InvalidData(format!("adjacency references unknown zone {id}")));
            let (u, v) = (lookup(a)?, lookup(b)?);
            if u == v { continue }
            lists[u as usize].push(v);
            lists[v as usize].push(u);
        }
        for list in &mut lists {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self::new(ids.len(), &lists))
    }

    /// Get the number of nodes in the graph.
    #[inline] pub fn node_count(&self) -> usize { self.size }

    /// Get the range of edges for a given node.
    #[inline]
    fn range(&self, node: usize) -> std::ops::Range<usize> {
        self.offsets[node] as usize .. self.offsets[node + 1] as usize
    }

    /// Get an iterator over the neighbors of a given node.
    #[inline]
    pub fn edges(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.range(node).map(move |v| self.edges[v] as usize)
    }

    /// Induced subgraph on `nodes`; node i of the result is `nodes[i]`.
    pub fn subgraph(&self, nodes: &[usize]) -> Graph {
        let mut position = vec![u32::MAX; self.size];
        for (i, &u) in nodes.iter().enumerate() { position[u] = i as u32 }

        let lists = nodes.iter()
            .map(|&u| self.edges(u)
                .filter_map(|v| (position[v] != u32::MAX).then_some(position[v]))
                .collect::<Vec<_>>())
            .collect::<Vec<_>>();

        Graph::new(nodes.len(), &lists)
    }

    /// Label every node with its connected component (0-based, in order of
    /// the lowest node of each component). Returns (labels, component count).
    pub fn components(&self) -> (Vec<usize>, usize) {
        let mut labels = vec![usize::MAX; self.size];
        let mut count = 0;

        for start in 0..self.size {
            if labels[start] != usize::MAX { continue }
            labels[start] = count;
            let mut queue = VecDeque::from([start]);
            while let Some(u) = queue.pop_front() {
                for v in self.edges(u) {
                    if labels[v] == usize::MAX {
                        labels[v] = count;
                        queue.push_back(v);
                    }
                }
            }
            count += 1;
        }

        (labels, count)
    }

    /// Check whether `nodes` induce a connected subgraph.
    pub fn is_connected_subset(&self, nodes: &[usize]) -> bool {
        if nodes.is_empty() { return true }
        let mut inside = vec![false; self.size];
        nodes.iter().for_each(|&u| inside[u] = true);

        let mut visited = vec![false; self.size];
        visited[nodes[0]] = true;
        let mut seen = 1;
        let mut queue = VecDeque::from([nodes[0]]);
        while let Some(u) = queue.pop_front() {
            for v in self.edges(u) {
                if inside[v] && !visited[v] {
                    visited[v] = true;
                    seen += 1;
                    queue.push_back(v);
                }
            }
        }
        seen == inside.iter().filter(|&&flag| flag).count()
    }
}
