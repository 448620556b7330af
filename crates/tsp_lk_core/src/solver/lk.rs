//! Sequential variable-depth edge exchange.
//!
//! One improvement attempt from a node `t1` breaks a tour edge `(t1, t2)`,
//! follows a candidate edge `(t2, t3)` with positive partial gain, and closes
//! the exchange by removing the tour edge at `t3` that keeps a single
//! Hamiltonian cycle. Each such step is executed as one `flip`, so the tour
//! stays a valid cycle at every depth; the edge just added toward `t1` is the
//! next edge to break, and the chain extends while the partial gain stays
//! positive, up to `move_type - 1` flips. The best prefix of the chain is
//! kept; everything after it is rolled back through the inverse flips.
//! Removed edges may not be re-added within a chain and added edges may not
//! be removed. With backtracking enabled the first two levels iterate over
//! all candidates; deeper levels pursue only the best continuation.

use std::collections::VecDeque;

use super::candidates::CandidateSet;
use super::twolevel::TwoLevelTour;

type Edge = (usize, usize);

fn edge(u: usize, v: usize) -> Edge {
    if u < v { (u, v) } else { (v, u) }
}

/// One executed flip: removed `(a,b)`, `(c,d)`; added `(a,c)`, `(b,d)`.
#[derive(Clone, Copy, Debug)]
struct Flip {
    a: usize,
    b: usize,
    c: usize,
    d: usize,
}

impl Flip {
    fn undo(self, tour: &mut TwoLevelTour) {
        tour.flip(self.a, self.c, self.b, self.d);
    }
}

pub struct SearchLimits {
    /// `k` of sequential k-opt: a chain exchanges at most `k` edges.
    pub move_type: usize,
    /// Iterate candidates at the second level too, not just the first.
    pub backtracking: bool,
    /// Cap on committed flips per call.
    pub max_swaps: usize,
}

/// Optimizes the tour in place and returns the total (scaled) gain.
///
/// On return no node admits a further improvement under the configured move
/// type, so an immediate second call returns zero.
pub fn optimize(
    tour: &mut TwoLevelTour,
    cost: &dyn Fn(usize, usize) -> i64,
    cands: &CandidateSet,
    limits: &SearchLimits,
) -> i64 {
    let n = tour.len();
    if n < 4 {
        return 0;
    }
    let max_depth = limits.move_type.saturating_sub(1).max(1);
    let mut swaps = 0usize;
    let mut total_gain = 0i64;
    let mut touched = Vec::new();

    // Active-node queue; improvements reactivate the nodes they moved.
    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut queued = vec![true; n];

    loop {
        let mut sweep_gain = 0i64;
        while let Some(t1) = queue.pop_front() {
            queued[t1] = false;
            loop {
                if swaps >= limits.max_swaps {
                    return total_gain + sweep_gain;
                }
                touched.clear();
                let gain = improve_node(
                    tour,
                    cost,
                    cands,
                    t1,
                    max_depth,
                    limits.backtracking,
                    &mut swaps,
                    &mut touched,
                );
                if gain == 0 {
                    break;
                }
                sweep_gain += gain;
                for &v in &touched {
                    if !queued[v] {
                        queued[v] = true;
                        queue.push_back(v);
                    }
                }
            }
        }
        total_gain += sweep_gain;
        if sweep_gain == 0 || swaps >= limits.max_swaps {
            return total_gain;
        }
        // Re-examine everything once more; stop at the first clean sweep.
        queue.extend(0..n);
        queued.fill(true);
    }
}

#[allow(clippy::too_many_arguments)]
fn improve_node(
    tour: &mut TwoLevelTour,
    cost: &dyn Fn(usize, usize) -> i64,
    cands: &CandidateSet,
    t1: usize,
    max_depth: usize,
    backtracking: bool,
    swaps: &mut usize,
    touched: &mut Vec<usize>,
) -> i64 {
    for direction in 0..2 {
        let t2 = if direction == 0 { tour.succ(t1) } else { tour.pred(t1) };
        let gain = search_chain(tour, cost, cands, t1, t2, max_depth, backtracking, swaps, touched);
        if gain > 0 {
            return gain;
        }
    }
    0
}

#[allow(clippy::too_many_arguments)]
fn search_chain(
    tour: &mut TwoLevelTour,
    cost: &dyn Fn(usize, usize) -> i64,
    cands: &CandidateSet,
    t1: usize,
    t2: usize,
    max_depth: usize,
    backtracking: bool,
    swaps: &mut usize,
    touched: &mut Vec<usize>,
) -> i64 {
    let g0 = cost(t1, t2);
    let level1: Vec<_> = cands.neighbors(t2).to_vec();

    for cand1 in &level1 {
        let t3 = cand1.to as usize;
        if t3 == t1 || t3 == tour.succ(t2) || t3 == tour.pred(t2) {
            continue;
        }
        if g0 - cand1.cost <= 0 {
            continue;
        }

        let mut log: Vec<Flip> = Vec::with_capacity(max_depth);
        let mut removed: Vec<Edge> = Vec::with_capacity(2 * max_depth);
        let mut added: Vec<Edge> = Vec::with_capacity(max_depth);

        let (cur, delta, flip) = apply_step(tour, cost, t1, t2, t3);
        removed.push(edge(t1, t2));
        removed.push(edge(flip.c, flip.d));
        added.push(edge(t2, t3));
        log.push(flip);

        let g_total = delta;
        let mut best_gain = g_total.max(0);
        let mut best_len = if g_total > 0 { 1 } else { 0 };

        if backtracking && max_depth >= 2 {
            // Second level iterates candidates as well; each branch continues
            // greedily and is undone before the next branch is tried.
            let level2: Vec<_> = cands.neighbors(cur).to_vec();
            for cand2 in &level2 {
                let floor = log.len();
                if let Some((cur3, g3)) = try_extension(
                    tour, cost, t1, cur, cand2.to as usize, cand2.cost, g_total, &mut removed,
                    &mut added, &mut log,
                ) {
                    let (branch_gain, branch_len) = extend_greedily(
                        tour, cost, cands, t1, cur3, g3, 3, max_depth, &mut removed, &mut added,
                        &mut log,
                    );
                    let local_best = g3.max(branch_gain);
                    if local_best > best_gain {
                        best_gain = local_best;
                        best_len = if branch_gain >= g3 { branch_len } else { floor + 1 };
                        // Keep the winning branch applied and stop branching.
                        break;
                    }
                    rollback(tour, &mut log, &mut removed, &mut added, floor);
                }
            }
        } else {
            let (chain_gain, chain_len) = extend_greedily(
                tour, cost, cands, t1, cur, g_total, 2, max_depth, &mut removed, &mut added,
                &mut log,
            );
            if chain_gain > best_gain {
                best_gain = chain_gain;
                best_len = chain_len;
            }
        }

        // Keep the best prefix, undo the rest.
        rollback(tour, &mut log, &mut removed, &mut added, best_len);
        if best_gain > 0 && best_len > 0 {
            *swaps += best_len;
            for flip in &log {
                touched.push(flip.a);
                touched.push(flip.b);
                touched.push(flip.c);
                touched.push(flip.d);
            }
            return best_gain;
        }
        debug_assert!(log.is_empty(), "rejected chain must be fully undone");
    }

    0
}

/// Greedy tail of a chain: from `cur`, repeatedly apply the extension with
/// the best closed gain while the open gain stays positive. Returns the best
/// closed gain seen and the log length realizing it.
#[allow(clippy::too_many_arguments)]
fn extend_greedily(
    tour: &mut TwoLevelTour,
    cost: &dyn Fn(usize, usize) -> i64,
    cands: &CandidateSet,
    t1: usize,
    mut cur: usize,
    mut g_total: i64,
    from_level: usize,
    max_depth: usize,
    removed: &mut Vec<Edge>,
    added: &mut Vec<Edge>,
    log: &mut Vec<Flip>,
) -> (i64, usize) {
    let mut best_gain = g_total.max(0);
    let mut best_len = if g_total > 0 { log.len() } else { 0 };

    for _ in from_level..=max_depth {
        let pending = cost(t1, cur);
        let forward = tour.succ(t1) == cur;
        let mut best_choice: Option<(i64, i64, usize)> = None;

        for cand in cands.neighbors(cur) {
            let t3 = cand.to as usize;
            if t3 == t1 || t3 == tour.succ(cur) || t3 == tour.pred(cur) {
                continue;
            }
            let g_open = g_total + pending - cand.cost;
            if g_open <= 0 {
                continue;
            }
            if removed.contains(&edge(cur, t3)) {
                continue;
            }
            let t4 = if forward { tour.pred(t3) } else { tour.succ(t3) };
            if added.contains(&edge(t3, t4)) {
                continue;
            }
            let delta = pending + cost(t4, t3) - cand.cost - cost(t1, t4);
            if best_choice.is_none_or(|(best_delta, _, _)| delta > best_delta) {
                best_choice = Some((delta, cand.cost, t3));
            }
        }

        let Some((_, cand_cost, t3)) = best_choice else {
            break;
        };
        let Some((next_cur, g_next)) =
            try_extension(tour, cost, t1, cur, t3, cand_cost, g_total, removed, added, log)
        else {
            break;
        };
        cur = next_cur;
        g_total = g_next;
        if g_total > best_gain {
            best_gain = g_total;
            best_len = log.len();
        }
    }

    (best_gain, best_len)
}

/// Validates and applies one chain extension; returns the new chain end and
/// the closed gain after the flip.
#[allow(clippy::too_many_arguments)]
fn try_extension(
    tour: &mut TwoLevelTour,
    cost: &dyn Fn(usize, usize) -> i64,
    t1: usize,
    cur: usize,
    t3: usize,
    cand_cost: i64,
    g_total: i64,
    removed: &mut Vec<Edge>,
    added: &mut Vec<Edge>,
    log: &mut Vec<Flip>,
) -> Option<(usize, i64)> {
    if t3 == t1 || t3 == tour.succ(cur) || t3 == tour.pred(cur) {
        return None;
    }
    let pending = cost(t1, cur);
    if g_total + pending - cand_cost <= 0 {
        return None;
    }
    if removed.contains(&edge(cur, t3)) {
        return None;
    }
    let forward = tour.succ(t1) == cur;
    let t4 = if forward { tour.pred(t3) } else { tour.succ(t3) };
    if added.contains(&edge(t3, t4)) {
        return None;
    }

    let (next_cur, delta, flip) = apply_step(tour, cost, t1, cur, t3);
    removed.push(edge(t1, cur));
    removed.push(edge(flip.c, flip.d));
    added.push(edge(cur, t3));
    log.push(flip);
    Some((next_cur, g_total + delta))
}

/// Executes the 2-opt flip that breaks `(t1, cur)` and the tour edge at `t3`
/// on the side that keeps one cycle, adding `(cur, t3)` and the new pending
/// edge `(t1, t4)`.
fn apply_step(
    tour: &mut TwoLevelTour,
    cost: &dyn Fn(usize, usize) -> i64,
    t1: usize,
    cur: usize,
    t3: usize,
) -> (usize, i64, Flip) {
    let forward = tour.succ(t1) == cur;
    debug_assert!(forward || tour.pred(t1) == cur, "pending edge must be on the tour");

    let (t4, flip) = if forward {
        let t4 = tour.pred(t3);
        tour.flip(t1, cur, t4, t3);
        (t4, Flip { a: t1, b: cur, c: t4, d: t3 })
    } else {
        let t4 = tour.succ(t3);
        tour.flip(cur, t1, t3, t4);
        (t4, Flip { a: cur, b: t1, c: t3, d: t4 })
    };
    debug_assert!(t4 != t1 && t4 != cur);

    let delta = cost(t1, cur) + cost(t4, t3) - cost(cur, t3) - cost(t1, t4);
    (t4, delta, flip)
}

fn rollback(
    tour: &mut TwoLevelTour,
    log: &mut Vec<Flip>,
    removed: &mut Vec<Edge>,
    added: &mut Vec<Edge>,
    keep: usize,
) {
    while log.len() > keep {
        let flip = log.pop().expect("log is non-empty");
        flip.undo(tour);
        removed.truncate(removed.len().saturating_sub(2));
        added.pop();
    }
}
