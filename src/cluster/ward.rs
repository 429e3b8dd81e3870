use std::{cmp::Ordering, collections::BinaryHeap};

use log::{info, warn};
use ndarray::{Array2, ArrayView1};

use crate::{cluster::DisconnectedPolicy, error::{Result, RsmError}, graph::Graph};

#[inline]
fn sq_dist(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Ward merge cost between clusters of sizes `na`, `nb` with centroids `a`, `b`.
#[inline]
fn ward_cost(na: f64, nb: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    na * nb / (na + nb) * sq_dist(a, b)
}

/// Minimal union-find over row positions.
struct DisjointSet { parent: Vec<usize> }

impl DisjointSet {
    fn new(n: usize) -> Self { Self { parent: (0..n).collect() } }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb { self.parent[ra.max(rb)] = ra.min(rb) }
    }

    /// Labels 0..k in order of first appearance.
    fn labels(&mut self) -> Vec<usize> {
        let mut relabel = vec![usize::MAX; self.parent.len()];
        let mut next = 0;
        (0..self.parent.len()).map(|x| {
            let root = self.find(x);
            if relabel[root] == usize::MAX { relabel[root] = next; next += 1 }
            relabel[root]
        }).collect()
    }
}

/// Working state of an agglomeration: each active slot holds one cluster,
/// and slot `s` always contains row `s`.
struct Clusters {
    centroids: Array2<f64>,
    sizes: Vec<f64>,
    active: Vec<bool>,
}

impl Clusters {
    fn new(data: &Array2<f64>) -> Self {
        Self { centroids: data.clone(), sizes: vec![1.0; data.nrows()], active: vec![true; data.nrows()] }
    }

    #[inline]
    fn cost(&self, a: usize, b: usize) -> f64 {
        ward_cost(self.sizes[a], self.sizes[b], self.centroids.row(a), self.centroids.row(b))
    }

    /// Merge slots `a` and `b` into the lower one; returns the surviving slot.
    fn merge(&mut self, a: usize, b: usize) -> usize {
        let (keep, gone) = (a.min(b), a.max(b));
        let (nk, ng) = (self.sizes[keep], self.sizes[gone]);
        let merged = (&self.centroids.row(keep) * nk + &self.centroids.row(gone) * ng) / (nk + ng);
        self.centroids.row_mut(keep).assign(&merged);
        self.sizes[keep] = nk + ng;
        self.active[gone] = false;
        keep
    }
}

/// Nearest-neighbour chain over the active slots of `clusters`. Returns every
/// merge as (cost, a, b) in the order performed.
fn nn_chain(clusters: &mut Clusters) -> Vec<(f64, usize, usize)> {
    let mut merges = Vec::new();
    let mut chain: Vec<usize> = Vec::new();
    let mut remaining = clusters.active.iter().filter(|&&a| a).count();

    while remaining > 1 {
        if chain.is_empty() {
            chain.extend(clusters.active.iter().position(|&a| a));
        }
        let Some(&a) = chain.last() else { break };
        let prev = chain.len().checked_sub(2).map(|i| chain[i]);

        // Nearest active neighbour of `a`; the previous chain element wins ties.
        let mut best = prev.map(|p| (clusters.cost(a, p), p));
        for b in (0..clusters.active.len()).filter(|&b| b != a && clusters.active[b]) {
            let cost = clusters.cost(a, b);
            if best.is_none_or(|(c, _)| cost < c) { best = Some((cost, b)) }
        }
        let Some((cost, b)) = best else { break };

        if Some(b) == prev {
            chain.truncate(chain.len() - 2);
            clusters.merge(a, b);
            merges.push((cost, a, b));
            remaining -= 1;
        } else {
            chain.push(b);
        }
    }
    merges
}

/// Unconstrained Ward clustering of the rows of `data` into `k` clusters.
/// Deterministic; labels are 0..k in order of first appearance.
pub fn ward(data: &Array2<f64>, k: usize) -> Vec<usize> {
    let n = data.nrows();
    let mut clusters = Clusters::new(data);
    let mut merges = nn_chain(&mut clusters);
    merges.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut sets = DisjointSet::new(n);
    merges.iter().take(n.saturating_sub(k)).for_each(|&(_, a, b)| sets.union(a, b));
    sets.labels()
}

/// Candidate merge in the constrained heap, ordered so the cheapest pops first.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    cost: f64,
    a: usize,
    b: usize,
    stamp: (u32, u32), // versions of a and b when the cost was computed
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
            .then_with(|| (other.a, other.b).cmp(&(self.a, self.b)))
    }
}

/// Ward clustering where only clusters adjacent in `graph` may merge.
///
/// When the graph has more connected components than `k`, adjacent merges
/// cannot reach `k`. `Error` fails before clustering; `Bridge` runs the
/// adjacent merges, then finishes with unconstrained Ward merges between the
/// component clusters.
pub fn ward_constrained(data: &Array2<f64>, graph: &Graph, k: usize, policy: DisconnectedPolicy) -> Result<Vec<usize>> {
    let n = data.nrows();
    if graph.node_count() != n {
        return Err(RsmError::InvalidData(format!(
            "adjacency graph has {} nodes for {n} zones", graph.node_count()
        )));
    }

    let (_, n_components) = graph.components();
    if n_components > k {
        match policy {
            DisconnectedPolicy::Error => return Err(RsmError::Config(format!(
                "adjacency graph has {n_components} connected components, more than the {k} clusters requested"
            ))),
            DisconnectedPolicy::Bridge => warn!(
                "adjacency graph has {n_components} connected components for {k} clusters; merging across components"
            ),
        }
    }

    let mut clusters = Clusters::new(data);
    let mut neighbors = (0..n).map(|u| graph.edges(u).filter(|&v| v != u).collect::<Vec<_>>()).collect::<Vec<_>>();
    let mut version = vec![0u32; n];
    let mut sets = DisjointSet::new(n);

    let mut heap = BinaryHeap::new();
    for a in 0..n {
        for &b in neighbors[a].iter().filter(|&&b| b > a) {
            heap.push(Candidate { cost: clusters.cost(a, b), a, b, stamp: (0, 0) });
        }
    }

    let mut remaining = n;
    while remaining > k {
        let Some(Candidate { a, b, stamp, .. }) = heap.pop() else { break };
        if !clusters.active[a] || !clusters.active[b] || stamp != (version[a], version[b]) { continue }

        let keep = clusters.merge(a, b);
        let gone = a + b - keep;
        sets.union(a, b);
        remaining -= 1;

        // Move the absorbed slot's neighbours onto the survivor.
        let mut merged = std::mem::take(&mut neighbors[a]);
        merged.append(&mut std::mem::take(&mut neighbors[b]));
        merged.retain(|&v| v != a && v != b && clusters.active[v]);
        merged.sort_unstable();
        merged.dedup();
        for &v in &merged {
            neighbors[v].retain(|&w| w != gone);
            if !neighbors[v].contains(&keep) { neighbors[v].push(keep) }
        }
        version[keep] += 1;
        for &v in &merged {
            let (lo, hi) = (keep.min(v), keep.max(v));
            heap.push(Candidate { cost: clusters.cost(lo, hi), a: lo, b: hi, stamp: (version[lo], version[hi]) });
        }
        neighbors[keep] = merged;
    }

    // Only reached with more components than clusters, under `Bridge`.
    if remaining > k {
        let mut merges = nn_chain(&mut clusters);
        merges.sort_by(|x, y| x.0.total_cmp(&y.0));
        merges.iter().take(remaining - k).for_each(|&(_, a, b)| sets.union(a, b));
    }

    info!("constrained ward: {n} zones into {k} clusters");
    Ok(sets.labels())
}
