//! Initial tour construction.
//!
//! The default is a candidate-biased random walk; the deterministic
//! constructors (nearest neighbor, greedy, Boruvka, space-filling orders)
//! break every tie by node id so a fixed seed reproduces the run exactly.

use rand::{Rng, rngs::StdRng};

use super::candidates::CandidateSet;

/// Random walk preferring candidate edges, zero-alpha candidates first.
pub fn walk(start: usize, cands: &CandidateSet, rng: &mut StdRng) -> Vec<usize> {
    let n = cands.len();
    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n);
    let mut pool: Vec<usize> = (0..n).collect();

    let mut current = start;
    visited[current] = true;
    tour.push(current);

    while tour.len() < n {
        let list = cands.neighbors(current);
        let zero: Vec<usize> = list
            .iter()
            .filter(|cand| cand.alpha == 0 && !visited[cand.to as usize])
            .map(|cand| cand.to as usize)
            .collect();
        let next = if !zero.is_empty() {
            zero[rng.random_range(0..zero.len())]
        } else {
            let open: Vec<usize> = list
                .iter()
                .filter(|cand| !visited[cand.to as usize])
                .map(|cand| cand.to as usize)
                .collect();
            if !open.is_empty() {
                open[rng.random_range(0..open.len())]
            } else {
                loop {
                    let at = rng.random_range(0..pool.len());
                    let v = pool[at];
                    if visited[v] {
                        pool.swap_remove(at);
                    } else {
                        break v;
                    }
                }
            }
        };
        visited[next] = true;
        tour.push(next);
        current = next;
    }

    tour
}

pub fn nearest_neighbor(n: usize, c: &dyn Fn(usize, usize) -> i64, start: usize) -> Vec<usize> {
    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n);
    let mut current = start;
    visited[current] = true;
    tour.push(current);

    while tour.len() < n {
        let next = (0..n)
            .filter(|&j| !visited[j])
            .min_by_key(|&j| (c(current, j), j))
            .expect("an unvisited node remains");
        visited[next] = true;
        tour.push(next);
        current = next;
    }

    tour
}

/// Cheapest-edge-first over the candidate graph, then fragment completion.
pub fn greedy(n: usize, c: &dyn Fn(usize, usize) -> i64, cands: &CandidateSet) -> Vec<usize> {
    let mut edges = candidate_edges(n, cands);
    edges.sort_unstable();

    let mut uf = UnionFind::new(n);
    let mut degree = vec![0u8; n];
    let mut adjacent: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (_, u, v) in edges {
        if degree[u] < 2 && degree[v] < 2 && uf.union(u, v) {
            degree[u] += 1;
            degree[v] += 1;
            adjacent[u].push(v);
            adjacent[v].push(u);
        }
    }

    fragments_to_tour(n, c, &adjacent)
}

/// Component-merging greedy: every round each fragment grabs its cheapest
/// outgoing candidate edge.
pub fn boruvka(n: usize, c: &dyn Fn(usize, usize) -> i64, cands: &CandidateSet) -> Vec<usize> {
    let edges = candidate_edges(n, cands);

    let mut uf = UnionFind::new(n);
    let mut degree = vec![0u8; n];
    let mut adjacent: Vec<Vec<usize>> = vec![Vec::new(); n];

    loop {
        let mut best: Vec<Option<(i64, usize, usize)>> = vec![None; n];
        for &(cost, u, v) in &edges {
            if degree[u] >= 2 || degree[v] >= 2 {
                continue;
            }
            let (ru, rv) = (uf.find(u), uf.find(v));
            if ru == rv {
                continue;
            }
            for root in [ru, rv] {
                if best[root].is_none_or(|entry| (cost, u, v) < entry) {
                    best[root] = Some((cost, u, v));
                }
            }
        }

        let mut added = false;
        for root in 0..n {
            let Some((_, u, v)) = best[root] else {
                continue;
            };
            if degree[u] < 2 && degree[v] < 2 && uf.union(u, v) {
                degree[u] += 1;
                degree[v] += 1;
                adjacent[u].push(v);
                adjacent[v].push(u);
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    fragments_to_tour(n, c, &adjacent)
}

/// Space-filling-curve order over node coordinates; `swap_axes` selects the
/// Moore variant of the traversal.
pub fn space_filling(points: &[(f64, f64)], swap_axes: bool) -> Vec<usize> {
    const ORDER: u32 = 16;
    let grid = (1u32 << ORDER) - 1;

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let scale_x = if max_x > min_x { grid as f64 / (max_x - min_x) } else { 0.0 };
    let scale_y = if max_y > min_y { grid as f64 / (max_y - min_y) } else { 0.0 };

    let mut keyed: Vec<(u64, usize)> = points
        .iter()
        .enumerate()
        .map(|(id, &(x, y))| {
            let gx = ((x - min_x) * scale_x) as u32;
            let gy = ((y - min_y) * scale_y) as u32;
            let key = if swap_axes {
                hilbert_index(ORDER, gy, gx)
            } else {
                hilbert_index(ORDER, gx, gy)
            };
            (key, id)
        })
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, id)| id).collect()
}

fn hilbert_index(order: u32, mut x: u32, mut y: u32) -> u64 {
    let mut d = 0u64;
    let mut s = 1u32 << (order - 1);
    while s > 0 {
        let rx = u32::from(x & s != 0);
        let ry = u32::from(y & s != 0);
        d += (s as u64) * (s as u64) * u64::from((3 * rx) ^ ry);
        if ry == 0 {
            if rx == 1 {
                x = (s - 1).wrapping_sub(x & (s - 1));
                y = (s - 1).wrapping_sub(y & (s - 1));
            }
            std::mem::swap(&mut x, &mut y);
        }
        s >>= 1;
    }
    d
}

/// Undirected candidate edges, deduplicated, as `(cost, u, v)` with `u < v`.
fn candidate_edges(n: usize, cands: &CandidateSet) -> Vec<(i64, usize, usize)> {
    let mut edges = Vec::new();
    for u in 0..n {
        for cand in cands.neighbors(u) {
            let v = cand.to as usize;
            if u < v {
                edges.push((cand.cost, u, v));
            } else {
                edges.push((cand.cost, v, u));
            }
        }
    }
    edges.sort_unstable();
    edges.dedup();
    edges
}

/// Stitches a forest of degree-<=2 paths into one tour, appending the
/// cheapest reachable fragment endpoint each time.
fn fragments_to_tour(n: usize, c: &dyn Fn(usize, usize) -> i64, adjacent: &[Vec<usize>]) -> Vec<usize> {
    let mut visited = vec![false; n];
    let mut fragments: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if visited[start] || adjacent[start].len() > 1 {
            continue;
        }
        // Walk a path fragment from an endpoint (or keep an isolated node).
        let mut fragment = vec![start];
        visited[start] = true;
        let mut prev = start;
        let mut at = start;
        while let Some(&next) = adjacent[at].iter().find(|&&w| w != prev && !visited[w]) {
            visited[next] = true;
            fragment.push(next);
            prev = at;
            at = next;
        }
        fragments.push(fragment);
    }
    debug_assert!(
        visited.iter().all(|&seen| seen),
        "fragment graph must be acyclic"
    );

    let mut tour = fragments.swap_remove(
        fragments
            .iter()
            .position(|fragment| fragment.contains(&0))
            .expect("node 0 belongs to some fragment"),
    );

    while !fragments.is_empty() {
        let tail = *tour.last().expect("tour is non-empty");
        let mut best = (i64::MAX, usize::MAX, 0usize, false);
        for (idx, fragment) in fragments.iter().enumerate() {
            let head = fragment[0];
            let last = *fragment.last().expect("fragments are non-empty");
            for (endpoint, reversed) in [(head, false), (last, true)] {
                let key = (c(tail, endpoint), endpoint, idx, reversed);
                if (key.0, key.1) < (best.0, best.1) {
                    best = (key.0, key.1, key.2, key.3);
                }
            }
        }
        let (_, _, idx, reversed) = best;
        let mut fragment = fragments.swap_remove(idx);
        if reversed {
            fragment.reverse();
        }
        tour.extend(fragment);
    }

    tour
}

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, mut v: usize) -> usize {
        while self.parent[v] as usize != v {
            let grand = self.parent[self.parent[v] as usize];
            self.parent[v] = grand;
            v = grand as usize;
        }
        v
    }

    fn union(&mut self, u: usize, v: usize) -> bool {
        let (ru, rv) = (self.find(u), self.find(v));
        if ru == rv {
            return false;
        }
        self.parent[ru] = rv as u32;
        true
    }
}
