//! Population layer: tour recombination across runs.
//!
//! The population keeps at most `max_size` distinct-fitness tours sorted by
//! cost. Parents are drawn by linear rank selection (bias 1.25) and
//! recombined edge-recombination style: the child follows edges common to
//! both parents first, then edges of either parent, preferring the neighbor
//! with the smallest remaining neighbor union, with candidate alpha and node
//! id as tie-breaks.

use rand::{Rng, rngs::StdRng};

use super::candidates::CandidateSet;

pub const SELECTION_BIAS: f64 = 1.25;

#[derive(Clone, Debug)]
pub struct Individual {
    pub cost: i64,
    pub tour: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct Population {
    members: Vec<Individual>,
    max_size: usize,
}

impl Population {
    pub fn new(max_size: usize) -> Self {
        Self {
            members: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_size
    }

    pub fn member(&self, at: usize) -> &Individual {
        &self.members[at]
    }

    pub fn worst_cost(&self) -> Option<i64> {
        self.members.last().map(|member| member.cost)
    }

    /// A tour with this exact cost is already represented.
    pub fn has_fitness(&self, cost: i64) -> bool {
        self.members.iter().any(|member| member.cost == cost)
    }

    pub fn add(&mut self, cost: i64, tour: Vec<usize>) {
        debug_assert!(!self.is_full() && !self.has_fitness(cost));
        let at = self.members.partition_point(|member| member.cost <= cost);
        self.members.insert(at, Individual { cost, tour });
    }

    /// Replaces a member picked by reverse linear rank among those worse
    /// than the newcomer.
    pub fn replace(&mut self, cost: i64, tour: Vec<usize>, rng: &mut StdRng) {
        let first_worse = self.members.partition_point(|member| member.cost <= cost);
        debug_assert!(first_worse < self.members.len(), "newcomer must beat someone");
        let worse = self.members.len() - first_worse;
        let victim = self.members.len() - 1 - linear_selection(worse, SELECTION_BIAS, rng);
        self.members.remove(victim);
        self.add(cost, tour);
    }

    /// Draws two distinct parents by linear rank selection.
    pub fn select_parents(&self, rng: &mut StdRng) -> (usize, usize) {
        debug_assert!(self.members.len() >= 2);
        let first = linear_selection(self.members.len(), SELECTION_BIAS, rng);
        loop {
            let second = linear_selection(self.members.len(), SELECTION_BIAS, rng);
            if second != first {
                return (first, second);
            }
        }
    }
}

/// Rank-biased index in `0..size`; rank 0 (the best) is the most likely.
pub fn linear_selection(size: usize, bias: f64, rng: &mut StdRng) -> usize {
    let r: f64 = rng.random();
    let picked =
        size as f64 * (bias - (bias * bias - 4.0 * (bias - 1.0) * r).sqrt()) / (2.0 * (bias - 1.0));
    (picked.floor() as usize).min(size - 1)
}

/// Edge-recombination crossover of two parent tours.
pub fn crossover_erx(p1: &[usize], p2: &[usize], cands: &CandidateSet) -> Vec<usize> {
    let n = p1.len();
    debug_assert_eq!(n, p2.len());

    let neighbor_pairs = |parent: &[usize]| {
        let mut map = vec![[usize::MAX; 2]; n];
        for (at, &v) in parent.iter().enumerate() {
            map[v] = [parent[(at + n - 1) % n], parent[(at + 1) % n]];
        }
        map
    };
    let nb1 = neighbor_pairs(p1);
    let nb2 = neighbor_pairs(p2);

    let mut union: Vec<Vec<usize>> = vec![Vec::with_capacity(4); n];
    for v in 0..n {
        for &w in nb1[v].iter().chain(nb2[v].iter()) {
            if !union[v].contains(&w) {
                union[v].push(w);
            }
        }
        union[v].sort_unstable();
    }

    let alpha_of = |from: usize, to: usize| {
        cands
            .neighbors(from)
            .iter()
            .find(|cand| cand.to as usize == to)
            .map_or(i64::MAX, |cand| cand.alpha)
    };

    let mut visited = vec![false; n];
    let mut child = Vec::with_capacity(n);
    let mut current = p1[0];
    visited[current] = true;
    child.push(current);

    while child.len() < n {
        let open: Vec<usize> = union[current]
            .iter()
            .copied()
            .filter(|&w| !visited[w])
            .collect();

        let shared: Vec<usize> = open
            .iter()
            .copied()
            .filter(|&w| nb1[current].contains(&w) && nb2[current].contains(&w))
            .collect();
        let pool = if !shared.is_empty() { &shared } else { &open };

        let next = if pool.is_empty() {
            // No parent edge survives; fall back to the candidate lists,
            // then to the smallest unvisited id.
            cands
                .neighbors(current)
                .iter()
                .map(|cand| cand.to as usize)
                .find(|&w| !visited[w])
                .unwrap_or_else(|| {
                    (0..n)
                        .find(|&w| !visited[w])
                        .expect("an unvisited node remains")
                })
        } else {
            *pool
                .iter()
                .min_by_key(|&&w| {
                    let remaining = union[w].iter().filter(|&&x| !visited[x]).count();
                    (remaining, alpha_of(current, w), w)
                })
                .expect("pool is non-empty")
        };

        visited[next] = true;
        child.push(next);
        current = next;
    }

    child
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::super::candidates::CandidateSet;
    use super::{Population, crossover_erx, linear_selection};

    fn line(i: usize, j: usize) -> i64 {
        (i as i64 - j as i64).abs()
    }

    #[test]
    fn population_keeps_members_sorted_by_cost() {
        let mut population = Population::new(3);
        population.add(30, vec![0, 2, 1]);
        population.add(10, vec![0, 1, 2]);
        population.add(20, vec![1, 0, 2]);

        assert!(population.is_full());
        assert_eq!(population.member(0).cost, 10);
        assert_eq!(population.member(2).cost, 30);
        assert_eq!(population.worst_cost(), Some(30));
        assert!(population.has_fitness(20));
        assert!(!population.has_fitness(25));
    }

    #[test]
    fn replace_evicts_a_worse_member() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut population = Population::new(3);
        population.add(10, vec![0]);
        population.add(20, vec![1]);
        population.add(30, vec![2]);

        population.replace(15, vec![3], &mut rng);
        assert_eq!(population.len(), 3);
        assert!(population.has_fitness(15));
        assert!(population.has_fitness(10));
        assert!(!population.has_fitness(20) || !population.has_fitness(30));
    }

    #[test]
    fn linear_selection_prefers_low_ranks() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[linear_selection(4, 1.25, &mut rng)] += 1;
        }
        assert!(counts[0] > counts[3]);
        assert!(counts.iter().all(|&count| count > 0));
    }

    #[test]
    fn crossover_of_identical_parents_reproduces_the_parent_cycle() {
        let cands = CandidateSet::nearest_neighbors(6, &line, 3);
        let parent = [0usize, 1, 2, 3, 4, 5];
        let child = crossover_erx(&parent, &parent, &cands);
        // Same undirected cycle, possibly walked in the other direction.
        assert_eq!(child[0], 0);
        assert!(child == parent.to_vec() || child == vec![0, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn crossover_yields_a_permutation_preferring_parent_edges() {
        let cands = CandidateSet::nearest_neighbors(8, &line, 3);
        let p1 = [0usize, 1, 2, 3, 4, 5, 6, 7];
        let p2 = [0usize, 2, 1, 3, 5, 4, 6, 7];
        let child = crossover_erx(&p1, &p2, &cands);

        let mut sorted = child.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());

        // Every child edge should come from a parent here; none are foreign.
        let edge_in = |parent: &[usize], u: usize, v: usize| {
            parent.iter().enumerate().any(|(at, &x)| {
                let y = parent[(at + 1) % parent.len()];
                (x == u && y == v) || (x == v && y == u)
            })
        };
        for (at, &u) in child.iter().enumerate() {
            let v = child[(at + 1) % child.len()];
            assert!(
                edge_in(&p1, u, v) || edge_in(&p2, u, v),
                "edge ({u},{v}) is in neither parent"
            );
        }
    }
}
