//! Per-node candidate edge lists, ranked by alpha.
//!
//! Lists are built once after the ascent and then maintained across trials:
//! `adjust` pulls the edges of the two best tours forward whenever a better
//! tour is recorded, `extend` inserts single edges, and `reset` prunes the
//! infinite-alpha entries that `adjust` appended and restores alpha order.

use super::ascent::{AlphaComputer, OneTree, SPECIAL_NODE};

/// Alpha assigned to edges forced in without a 1-tree ranking.
pub const ALPHA_INFINITY: i64 = i64::MAX / 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub to: u32,
    pub cost: i64,
    pub alpha: i64,
}

#[derive(Clone, Debug)]
pub struct CandidateSet {
    lists: Vec<Vec<Candidate>>,
    backbone: Option<Vec<Vec<Candidate>>>,
}

impl CandidateSet {
    /// Builds the alpha-ranked candidate lists from a finished ascent.
    ///
    /// Per node, the `ascent_candidates` cheapest neighbors are ranked by
    /// alpha; the `max_candidates` best survive, subject to the `max_alpha`
    /// excess cut. The cut never empties a list.
    pub fn create(
        n: usize,
        c: &dyn Fn(usize, usize) -> i64,
        tree: &OneTree,
        max_candidates: usize,
        ascent_candidates: usize,
        max_alpha: i64,
    ) -> Self {
        let computer = AlphaComputer::new(tree);
        let shortlist_len = ascent_candidates.max(max_candidates).max(2);
        let mut beta = vec![0i64; n];
        let mut lists = Vec::with_capacity(n);

        for i in 0..n {
            let mut neighbors: Vec<(i64, usize)> =
                (0..n).filter(|&j| j != i).map(|j| (c(i, j), j)).collect();
            neighbors.sort_unstable();
            neighbors.truncate(shortlist_len);

            if i != SPECIAL_NODE {
                computer.betas_from(i, &mut beta);
            }

            let mut list: Vec<Candidate> = neighbors
                .into_iter()
                .map(|(cost, j)| {
                    let alpha = if i == SPECIAL_NODE {
                        computer.special_alpha(j, cost)
                    } else if j == SPECIAL_NODE {
                        computer.special_alpha(i, cost)
                    } else {
                        cost - beta[j]
                    };
                    Candidate {
                        to: j as u32,
                        cost,
                        alpha,
                    }
                })
                .collect();
            list.sort_unstable_by_key(|cand| (cand.alpha, cand.cost, cand.to));

            // The excess cut trims high-alpha edges but never empties a list.
            let cut = list.partition_point(|cand| cand.alpha <= max_alpha);
            list.truncate(cut.max(2).min(list.len()));
            list.truncate(max_candidates.max(1));
            assert!(!list.is_empty(), "candidate list of node {i} is empty");
            lists.push(list);
        }

        Self {
            lists,
            backbone: None,
        }
    }

    /// Builds trivial nearest-neighbor lists; used when the ascent is disabled.
    pub fn nearest_neighbors(
        n: usize,
        c: &dyn Fn(usize, usize) -> i64,
        max_candidates: usize,
    ) -> Self {
        let mut lists = Vec::with_capacity(n);
        for i in 0..n {
            let mut neighbors: Vec<(i64, usize)> =
                (0..n).filter(|&j| j != i).map(|j| (c(i, j), j)).collect();
            neighbors.sort_unstable();
            neighbors.truncate(max_candidates.max(1));
            lists.push(
                neighbors
                    .into_iter()
                    .map(|(cost, j)| Candidate {
                        to: j as u32,
                        cost,
                        alpha: 0,
                    })
                    .collect(),
            );
        }
        Self {
            lists,
            backbone: None,
        }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn neighbors(&self, v: usize) -> &[Candidate] {
        &self.lists[v]
    }

    pub fn contains(&self, from: usize, to: usize) -> bool {
        self.lists[from].iter().any(|cand| cand.to as usize == to)
    }

    /// Inserts an edge in (alpha, cost) order; present edges are left alone.
    pub fn extend(&mut self, from: usize, to: usize, cost: i64, alpha: i64) {
        if self.contains(from, to) {
            return;
        }
        let cand = Candidate {
            to: to as u32,
            cost,
            alpha,
        };
        let at = self.lists[from].partition_point(|other| (other.alpha, other.cost) <= (alpha, cost));
        self.lists[from].insert(at, cand);
    }

    /// Drops forced entries (alpha infinity) and restores alpha order.
    pub fn reset(&mut self) {
        for list in &mut self.lists {
            list.retain(|cand| cand.alpha < ALPHA_INFINITY);
            list.sort_unstable_by_key(|cand| (cand.alpha, cand.cost, cand.to));
        }
    }

    /// Reorders every list after a new best tour was recorded.
    ///
    /// Edges shared by the best and second-best tours come first, then edges
    /// of either tour, then the rest; within a class the previous order is
    /// kept. Any best-tour edge missing from a list is appended with infinite
    /// alpha, so afterwards both best-tour neighbors of every node are
    /// guaranteed to be among its candidates.
    pub fn adjust(
        &mut self,
        c: &dyn Fn(usize, usize) -> i64,
        best_succ: &[usize],
        best_pred: &[usize],
        next_best_succ: Option<&[usize]>,
        next_best_pred: Option<&[usize]>,
    ) {
        for (u, list) in self.lists.iter_mut().enumerate() {
            for &t in &[best_succ[u], best_pred[u]] {
                if t != u && !list.iter().any(|cand| cand.to as usize == t) {
                    list.push(Candidate {
                        to: t as u32,
                        cost: c(u, t),
                        alpha: ALPHA_INFINITY,
                    });
                }
            }

            let in_best = |t: usize| t == best_succ[u] || t == best_pred[u];
            let in_next = |t: usize| {
                next_best_succ.is_some_and(|succ| succ[u] == t)
                    || next_best_pred.is_some_and(|pred| pred[u] == t)
            };
            list.sort_by_key(|cand| {
                let t = cand.to as usize;
                match (in_best(t) || in_next(t), in_best(t) && in_next(t)) {
                    (_, true) => 0,
                    (true, false) => 1,
                    (false, false) => 2,
                }
            });
        }
    }

    /// Materializes the backbone lists as a copy of the current ones.
    pub fn init_backbone(&mut self) {
        if self.backbone.is_none() {
            self.backbone = Some(self.lists.clone());
        }
    }

    /// Exchanges the active lists with the backbone lists.
    pub fn swap_backbone(&mut self) {
        let backbone = self
            .backbone
            .as_mut()
            .expect("backbone lists must be initialized before swapping");
        std::mem::swap(&mut self.lists, backbone);
    }

    pub fn drop_backbone(&mut self) {
        self.backbone = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::ascent::minimum_one_tree;
    use super::{ALPHA_INFINITY, CandidateSet};

    fn grid_cost(i: usize, j: usize) -> i64 {
        // Six points on a line; distance is index difference.
        (i as i64 - j as i64).abs()
    }

    fn build() -> CandidateSet {
        let tree = minimum_one_tree(6, grid_cost);
        CandidateSet::create(6, &grid_cost, &tree, 3, 5, i64::MAX)
    }

    #[test]
    fn create_yields_sorted_unique_bounded_lists() {
        let set = build();
        for v in 0..set.len() {
            let list = set.neighbors(v);
            assert!(!list.is_empty());
            assert!(list.len() <= 3);
            for pair in list.windows(2) {
                assert!((pair[0].alpha, pair[0].cost) <= (pair[1].alpha, pair[1].cost));
                assert_ne!(pair[0].to, pair[1].to);
            }
        }
    }

    #[test]
    fn extend_inserts_in_alpha_order_once() {
        let mut set = build();
        let missing = set
            .neighbors(0)
            .iter()
            .all(|cand| cand.to != 5)
            .then_some(5usize)
            .expect("node 5 should not be a candidate of node 0");

        set.extend(0, missing, grid_cost(0, missing), 1);
        assert!(set.contains(0, missing));
        let before = set.neighbors(0).len();
        set.extend(0, missing, grid_cost(0, missing), 1);
        assert_eq!(set.neighbors(0).len(), before);

        let list = set.neighbors(0);
        for pair in list.windows(2) {
            assert!((pair[0].alpha, pair[0].cost) <= (pair[1].alpha, pair[1].cost));
        }
    }

    #[test]
    fn adjust_guarantees_best_tour_neighbors_are_candidates() {
        let mut set = build();
        // Best tour 0-5-1-4-2-3-0 deliberately uses non-candidate edges.
        let best = [5usize, 4, 3, 0, 2, 1];
        let mut best_pred = [0usize; 6];
        for (u, &s) in best.iter().enumerate() {
            best_pred[s] = u;
        }

        set.adjust(&grid_cost, &best, &best_pred, None, None);
        for u in 0..6 {
            assert!(set.contains(u, best[u]), "missing best succ of {u}");
            assert!(set.contains(u, best_pred[u]), "missing best pred of {u}");
        }
    }

    #[test]
    fn adjust_prefers_edges_shared_by_both_tours() {
        let mut set = build();
        let best = [1usize, 2, 3, 4, 5, 0];
        let best_pred = [5usize, 0, 1, 2, 3, 4];
        // Second-best shares only the edge (2,3).
        let next = [2usize, 5, 3, 1, 0, 4];
        let mut next_pred = [0usize; 6];
        for (u, &s) in next.iter().enumerate() {
            next_pred[s] = u;
        }

        set.adjust(&grid_cost, &best, &best_pred, Some(&next), Some(&next_pred));
        let front = set.neighbors(2)[0];
        assert_eq!(front.to, 3);
    }

    #[test]
    fn reset_drops_forced_entries_and_restores_alpha_order() {
        let mut set = build();
        set.extend(0, 5, grid_cost(0, 5), ALPHA_INFINITY);
        assert!(set.contains(0, 5));
        set.reset();
        assert!(!set.contains(0, 5));
        for v in 0..set.len() {
            for pair in set.neighbors(v).windows(2) {
                assert!((pair[0].alpha, pair[0].cost) <= (pair[1].alpha, pair[1].cost));
            }
        }
    }

    #[test]
    fn backbone_swap_roundtrips() {
        let mut set = build();
        set.init_backbone();
        let original = set.neighbors(1).to_vec();

        set.swap_backbone();
        set.extend(1, 5, grid_cost(1, 5), 0);
        set.swap_backbone();
        assert_eq!(set.neighbors(1), original.as_slice());
    }
}
