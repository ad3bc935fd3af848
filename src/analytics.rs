use crate::config::PathSettings;
use crate::matrix::SymMatrix;
use crate::network::{Network, PersonId};
use crate::sampling::PairSampler;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;

/// Undirected graph over the vertices `0..n` of one group.
#[derive(Debug, Clone, Default)]
pub struct GroupGraph {
    adj: Vec<Vec<usize>>,
    n_edges: usize,
}

impl GroupGraph {
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut graph = Self {
            adj: vec![Vec::new(); n],
            n_edges: 0,
        };
        for &(a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    /// Partnerships and friendships between members of `slots`.
    pub fn from_network(net: &Network, slots: Range<usize>) -> Self {
        let start = slots.start;
        let mut graph = Self::from_edges(slots.len(), &[]);
        for slot in slots.clone() {
            let person = net.get(PersonId(slot));
            let neighbours = person.partners().ids().chain(person.friends().iter());
            for other in neighbours {
                if slots.contains(&other.0) && other.0 > slot {
                    graph.add_edge(slot - start, other.0 - start);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        if a == b || self.adj[a].contains(&b) {
            return;
        }
        self.adj[a].push(b);
        self.adj[b].push(a);
        self.n_edges += 1;
    }

    pub fn n_vertices(&self) -> usize {
        self.adj.len()
    }

    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    pub fn neighbours(&self, v: usize) -> &[usize] {
        &self.adj[v]
    }

    fn are_adjacent(&self, a: usize, b: usize) -> bool {
        self.adj[a].contains(&b)
    }
}

/// Read access to an all-pairs distance table.
pub trait Distances {
    fn dist(&self, row: usize, col: usize) -> u32;
}

impl Distances for SymMatrix<u32> {
    fn dist(&self, row: usize, col: usize) -> u32 {
        self.get(row, col)
    }
}

/// Full row-major `n x n` distance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FullMatrix {
    n: usize,
    data: Vec<u32>,
}

impl Distances for FullMatrix {
    fn dist(&self, row: usize, col: usize) -> u32 {
        self.data[row * self.n + col]
    }
}

pub fn floyd_warshall_full(graph: &GroupGraph) -> FullMatrix {
    let n = graph.n_vertices();
    // Unreachable pairs keep distance `n`, longer than any real path.
    let inf = n as u32;
    let mut data = vec![inf; n * n];
    for v in 0..n {
        data[v * n + v] = 0;
        for &w in graph.neighbours(v) {
            data[v * n + w] = 1;
        }
    }
    for k in 0..n {
        for i in 0..n {
            let d_ik = data[i * n + k];
            if d_ik == inf {
                continue;
            }
            for j in 0..n {
                let through = d_ik + data[k * n + j];
                if through < data[i * n + j] {
                    data[i * n + j] = through;
                }
            }
        }
    }
    FullMatrix { n, data }
}

pub fn floyd_warshall_compact(graph: &GroupGraph) -> SymMatrix<u32> {
    let n = graph.n_vertices();
    let inf = n as u32;
    let mut mat = SymMatrix::new(n, inf);
    for v in 0..n {
        for &w in graph.neighbours(v) {
            mat.set(v, w, 1);
        }
    }
    for k in 0..n {
        for i in 0..n {
            let d_ik = mat.get(i, k);
            if i == k || d_ik == inf {
                continue;
            }
            for j in 0..i {
                let through = d_ik + mat.get(k, j);
                if through < mat.get(i, j) {
                    mat.set(i, j, through);
                }
            }
        }
    }
    mat
}

/// Breadth-first distances from `src` to every vertex.
fn bfs_from(graph: &GroupGraph, src: usize, dist: &mut [u32], queue: &mut VecDeque<usize>) {
    let inf = graph.n_vertices() as u32;
    dist.fill(inf);
    dist[src] = 0;
    queue.clear();
    queue.push_back(src);
    while let Some(v) = queue.pop_front() {
        for &w in graph.neighbours(v) {
            if dist[w] == inf {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
        }
    }
}

pub fn bfs_all_pairs(graph: &GroupGraph) -> SymMatrix<u32> {
    let n = graph.n_vertices();
    let mut mat = SymMatrix::new(n, n as u32);
    let mut dist = vec![0; n];
    let mut queue = VecDeque::new();
    for src in 0..n {
        bfs_from(graph, src, &mut dist, &mut queue);
        for (tgt, &d) in dist.iter().enumerate().take(src) {
            mat.set(src, tgt, d);
        }
    }
    mat
}

/// Length of the shortest path from `src` to `tgt`, or `n` if unreachable.
pub fn bfs_distance(graph: &GroupGraph, src: usize, tgt: usize) -> u32 {
    let n = graph.n_vertices();
    if src == tgt {
        return 0;
    }
    let mut dist = vec![n as u32; n];
    let mut queue = VecDeque::from([src]);
    dist[src] = 0;
    while let Some(v) = queue.pop_front() {
        for &w in graph.neighbours(v) {
            if dist[w] == n as u32 {
                dist[w] = dist[v] + 1;
                if w == tgt {
                    return dist[w];
                }
                queue.push_back(w);
            }
        }
    }
    n as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMethod {
    Bfs,
    FloydWarshall,
    FloydWarshallCompact,
    Sampled,
}

/// Small-world network metrics of one group at the end of a trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwnInfo {
    pub trial: usize,
    pub group: usize,
    pub method: Option<PathMethod>,

    pub vertices: usize,
    pub edges: usize,
    pub connected: bool,
    pub avg_degree: f64,
    pub cost: f64,

    pub diameter: u32,
    pub path_length: f64,
    pub clustering: f64,

    pub global_efficiency: f64,
    pub global_efficiency_var: f64,
    pub global_efficiency_sem: f64,
    pub local_efficiency: f64,
    pub local_efficiency_var: f64,
    pub local_efficiency_sem: f64,
    pub global_connectivity: f64,
    pub local_connectivity: f64,

    pub regular_path_length: f64,
    pub regular_clustering: f64,
    pub random_path_length: f64,
    pub random_clustering: f64,
}

/// Compute the small-world metrics of `graph`.
///
/// Groups up to `settings.exact_threshold` vertices are computed exactly,
/// with breadth-first search when `pr_casual` reaches `settings.bfs_threshold`
/// and Floyd-Warshall otherwise. Larger groups are estimated from sampled
/// pairs.
pub fn analyze<R: Rng + ?Sized>(
    graph: &GroupGraph,
    settings: &PathSettings,
    pr_casual: f64,
    rng: &mut R,
) -> Result<SwnInfo> {
    let n = graph.n_vertices();
    let mut info = SwnInfo {
        vertices: n,
        edges: graph.n_edges(),
        connected: true,
        ..Default::default()
    };
    fill_baselines(&mut info);
    fill_clustering(graph, &mut info);
    if n < 2 {
        return Ok(info);
    }

    if n > settings.exact_threshold {
        info.method = Some(PathMethod::Sampled);
        fill_sampled_paths(graph, settings.sample_pairs, &mut info, rng)
            .context("failed to estimate path lengths")?;
    } else if pr_casual >= settings.bfs_threshold {
        info.method = Some(PathMethod::Bfs);
        fill_exact_paths(&bfs_all_pairs(graph), n, &mut info, rng);
    } else if settings.compact_matrix {
        info.method = Some(PathMethod::FloydWarshallCompact);
        fill_exact_paths(&floyd_warshall_compact(graph), n, &mut info, rng);
    } else {
        info.method = Some(PathMethod::FloydWarshall);
        fill_exact_paths(&floyd_warshall_full(graph), n, &mut info, rng);
    }
    info.global_connectivity = reciprocal(info.global_efficiency);
    info.local_connectivity = reciprocal(info.local_efficiency);
    Ok(info)
}

fn reciprocal(val: f64) -> f64 {
    if val > 0.0 { 1.0 / val } else { 0.0 }
}

/// Closed-form path length and clustering of regular and random graphs with
/// the same number of vertices and edges.
fn fill_baselines(info: &mut SwnInfo) {
    let n = info.vertices as f64;
    if info.vertices == 0 {
        return;
    }
    let k = 2.0 * info.edges as f64 / n;
    info.avg_degree = k;
    if info.vertices > 1 {
        info.cost = info.edges as f64 / (n * (n - 1.0) / 2.0);
    }
    if k > 0.0 {
        info.regular_path_length = n / (2.0 * k);
    }
    if k > 2.0 {
        info.regular_clustering = 3.0 * (k - 2.0) / (4.0 * (k - 1.0));
    }
    if k > 1.0 {
        info.random_path_length = n.ln() / k.ln();
    }
    info.random_clustering = k / n;
}

fn fill_clustering(graph: &GroupGraph, info: &mut SwnInfo) {
    let n = graph.n_vertices();
    if n == 0 {
        return;
    }
    let mut sum = 0.0;
    for v in 0..n {
        let nbrs = graph.neighbours(v);
        let k = nbrs.len();
        if k < 2 {
            continue;
        }
        let mut closed = 0;
        for (i, &a) in nbrs.iter().enumerate() {
            for &b in &nbrs[i + 1..] {
                if graph.are_adjacent(a, b) {
                    closed += 1;
                }
            }
        }
        sum += closed as f64 / (k * (k - 1) / 2) as f64;
    }
    info.clustering = sum / n as f64;

    let mut local = Accumulator::new();
    for v in 0..n {
        local.add(local_efficiency(graph, v));
    }
    info.local_efficiency = local.mean();
    info.local_efficiency_var = local.variance().unwrap_or(0.0);
    info.local_efficiency_sem = local.sem().unwrap_or(0.0);
}

/// Efficiency of the subgraph induced by the neighbours of `v`.
fn local_efficiency(graph: &GroupGraph, v: usize) -> f64 {
    let nbrs = graph.neighbours(v);
    let k = nbrs.len();
    if k < 2 {
        return 0.0;
    }
    let sub_edges: Vec<_> = nbrs
        .iter()
        .enumerate()
        .flat_map(|(i, &a)| {
            nbrs[i + 1..]
                .iter()
                .enumerate()
                .filter(move |&(_, &b)| graph.are_adjacent(a, b))
                .map(move |(j, _)| (i, i + 1 + j))
        })
        .collect();
    let sub = GroupGraph::from_edges(k, &sub_edges);
    let dist = bfs_all_pairs(&sub);
    let mut sum = 0.0;
    for a in 0..k {
        for b in 0..a {
            let d = dist.get(a, b);
            if (d as usize) < k {
                sum += 1.0 / d as f64;
            }
        }
    }
    sum / (k * (k - 1) / 2) as f64
}

fn fill_exact_paths<D: Distances, R: Rng + ?Sized>(
    dist: &D,
    n: usize,
    info: &mut SwnInfo,
    rng: &mut R,
) {
    let inf = n as u32;
    let mut means = Vec::with_capacity(n);
    let mut global = Accumulator::new();
    let mut diameter = 0;
    for i in 0..n {
        let mut sum = 0u64;
        let mut reached = 0usize;
        let mut inv_sum = 0.0;
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = dist.dist(i, j);
            diameter = diameter.max(d);
            if d == inf {
                info.connected = false;
                continue;
            }
            sum += d as u64;
            reached += 1;
            inv_sum += 1.0 / d as f64;
        }
        if reached > 0 {
            means.push(sum as f64 / reached as f64);
        }
        global.add(inv_sum / (n - 1) as f64);
    }
    info.diameter = diameter;
    info.path_length = median(&mut means, rng);
    info.global_efficiency = global.mean();
    info.global_efficiency_var = global.variance().unwrap_or(0.0);
    info.global_efficiency_sem = global.sem().unwrap_or(0.0);
}

fn fill_sampled_paths<R: Rng + ?Sized>(
    graph: &GroupGraph,
    sample_pairs: usize,
    info: &mut SwnInfo,
    rng: &mut R,
) -> Result<()> {
    let n = graph.n_vertices();
    let inf = n as u32;
    let requested = sample_pairs.min(PairSampler::max_sample(n));
    let mut sampler = PairSampler::new(n, requested)?;
    let mut lengths = Accumulator::new();
    let mut efficiency = Accumulator::new();
    let mut diameter = 0;
    while let Some((src, tgt)) = sampler.next(rng) {
        let d = bfs_distance(graph, src, tgt);
        diameter = diameter.max(d);
        if d == inf {
            info.connected = false;
            efficiency.add(0.0);
        } else {
            lengths.add(d as f64);
            efficiency.add(1.0 / d as f64);
        }
    }
    info.diameter = diameter;
    info.path_length = lengths.mean();
    info.global_efficiency = efficiency.mean();
    Ok(())
}

/// Median after a randomised quicksort; even lengths average the two
/// middle values.
pub fn median<R: Rng + ?Sized>(vals: &mut [f64], rng: &mut R) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    quicksort(vals, rng);
    let mid = vals.len() / 2;
    if vals.len() % 2 == 0 {
        (vals[mid - 1] + vals[mid]) / 2.0
    } else {
        vals[mid]
    }
}

/// Three-way partition around a random pivot. The equal band is left out of
/// both sides, and only the smaller side is recursed into.
fn quicksort<R: Rng + ?Sized>(mut vals: &mut [f64], rng: &mut R) {
    while vals.len() > 1 {
        let pivot = vals[rng.random_range(0..vals.len())];
        let (mut lt, mut i, mut gt) = (0, 0, vals.len());
        while i < gt {
            if vals[i] < pivot {
                vals.swap(i, lt);
                lt += 1;
                i += 1;
            } else if vals[i] > pivot {
                gt -= 1;
                vals.swap(i, gt);
            } else {
                i += 1;
            }
        }
        let (low, rest) = std::mem::take(&mut vals).split_at_mut(lt);
        let high = &mut rest[gt - lt..];
        if low.len() < high.len() {
            quicksort(low, rng);
            vals = high;
        } else {
            quicksort(high, rng);
            vals = low;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand_chacha::ChaCha12Rng;

    fn ring(n: usize) -> GroupGraph {
        let edges: Vec<_> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        GroupGraph::from_edges(n, &edges)
    }

    fn complete(n: usize) -> GroupGraph {
        let edges: Vec<_> = (0..n)
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .collect();
        GroupGraph::from_edges(n, &edges)
    }

    fn assert_same_distances(graph: &GroupGraph) {
        let n = graph.n_vertices();
        let full = floyd_warshall_full(graph);
        let compact = floyd_warshall_compact(graph);
        let bfs = bfs_all_pairs(graph);
        for i in 0..n {
            for j in 0..n {
                assert_eq!(full.dist(i, j), bfs.dist(i, j), "pair ({i}, {j})");
                assert_eq!(compact.dist(i, j), bfs.dist(i, j), "pair ({i}, {j})");
                assert_eq!(bfs_distance(graph, i, j), bfs.dist(i, j));
            }
        }
    }

    #[test]
    fn algorithms_agree() {
        assert_same_distances(&complete(9));
        assert_same_distances(&ring(11));
        assert_same_distances(&GroupGraph::from_edges(
            7,
            &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5)],
        ));
    }

    #[test]
    fn four_cycle_metrics() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let graph = ring(4);
        for (pr_casual, compact, method) in [
            (0.9, true, PathMethod::Bfs),
            (0.1, true, PathMethod::FloydWarshallCompact),
            (0.1, false, PathMethod::FloydWarshall),
        ] {
            let settings = PathSettings {
                compact_matrix: compact,
                ..Default::default()
            };
            let info = analyze(&graph, &settings, pr_casual, &mut rng).unwrap();
            assert_eq!(info.method, Some(method));
            assert_eq!(info.diameter, 2);
            assert!(info.connected);
            // Median of the per-vertex means (1 + 1 + 2) / 3. The mean over
            // all pairs would be the often quoted 1.5.
            assert_approx_eq!(info.path_length, 4.0 / 3.0);
            assert_approx_eq!(info.clustering, 0.0);
            assert_approx_eq!(info.global_efficiency, (1.0 + 1.0 + 0.5) / 3.0);
            assert_approx_eq!(info.avg_degree, 2.0);
            assert_approx_eq!(info.cost, 4.0 / 6.0);
        }
    }

    #[test]
    fn complete_graph_metrics() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let info = analyze(&complete(6), &PathSettings::default(), 0.0, &mut rng).unwrap();
        assert_eq!(info.diameter, 1);
        assert_approx_eq!(info.path_length, 1.0);
        assert_approx_eq!(info.clustering, 1.0);
        assert_approx_eq!(info.global_efficiency, 1.0);
        assert_approx_eq!(info.local_efficiency, 1.0);
        assert_approx_eq!(info.global_efficiency_var, 0.0);
        assert_approx_eq!(info.global_connectivity, 1.0);
        assert_approx_eq!(info.cost, 1.0);
        assert_approx_eq!(info.regular_clustering, 3.0 * 3.0 / 16.0);
    }

    #[test]
    fn disconnected_pairs_bound_the_diameter() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let graph = GroupGraph::from_edges(5, &[(0, 1), (1, 2), (3, 4)]);
        let info = analyze(&graph, &PathSettings::default(), 0.0, &mut rng).unwrap();
        assert!(!info.connected);
        assert_eq!(info.diameter, 5);
        // Per-vertex means: 1.5, 1, 1.5, 1, 1.
        assert_approx_eq!(info.path_length, 1.0);
    }

    #[test]
    fn large_groups_are_sampled() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let settings = PathSettings {
            exact_threshold: 10,
            sample_pairs: 100,
            ..Default::default()
        };
        let info = analyze(&complete(30), &settings, 0.0, &mut rng).unwrap();
        assert_eq!(info.method, Some(PathMethod::Sampled));
        assert_eq!(info.diameter, 1);
        assert_approx_eq!(info.path_length, 1.0);
        assert!(info.connected);
    }

    #[test]
    fn median_of_even_and_odd_lengths() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        assert_eq!(median(&mut [3.0, 1.0, 2.0], &mut rng), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0], &mut rng), 2.5);
        assert_eq!(median(&mut [], &mut rng), 0.0);

        let mut vals: Vec<f64> = (0..100).map(|i| ((i * 37) % 100) as f64).collect();
        quicksort(&mut vals, &mut rng);
        assert!(vals.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn median_of_repeated_values() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        // Isolated pairs all have a per-vertex mean of one.
        let mut vals = vec![1.0; 200_000];
        assert_eq!(median(&mut vals, &mut rng), 1.0);

        let mut vals: Vec<f64> = (0..100_000).map(|i| (i % 3) as f64).collect();
        let worker = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || {
                let mut rng = ChaCha12Rng::seed_from_u64(1);
                let mid = median(&mut vals, &mut rng);
                (mid, vals.windows(2).all(|w| w[0] <= w[1]))
            })
            .unwrap();
        assert_eq!(worker.join().unwrap(), (1.0, true));
    }
}
