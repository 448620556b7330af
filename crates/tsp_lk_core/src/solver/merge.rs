//! Tour merging by partial transcription.
//!
//! Two tours over the same node set decompose into maximal chains that share
//! both endpoints and visit the same set of nodes in between. Within every
//! such chain the cheaper of the two sub-paths can be transcribed
//! independently, so the merged tour is never worse than either input. The
//! scan is linear: a running multiset balance over the two aligned sequences
//! hits zero exactly at chain boundaries. Both orientations of the second
//! tour are tried, since agreeing chains may run in opposite directions.

/// Returns the best tour reachable by following edges of `t1` and `t2`.
pub fn merge_tours(
    cost: &dyn Fn(usize, usize) -> i64,
    t1: &[usize],
    t2: &[usize],
) -> Vec<usize> {
    debug_assert_eq!(t1.len(), t2.len());
    let n = t1.len();
    if n < 4 {
        return t1.to_vec();
    }

    let forward = transcribe(cost, t1, &aligned(t2, t1[0], false));
    let backward = transcribe(cost, t1, &aligned(t2, t1[0], true));

    if tour_cost(cost, &forward) <= tour_cost(cost, &backward) {
        forward
    } else {
        backward
    }
}

fn tour_cost(cost: &dyn Fn(usize, usize) -> i64, tour: &[usize]) -> i64 {
    (0..tour.len())
        .map(|k| cost(tour[k], tour[(k + 1) % tour.len()]))
        .sum()
}

/// `t2` rotated (and possibly reversed) to begin at `start`.
fn aligned(t2: &[usize], start: usize, reversed: bool) -> Vec<usize> {
    let n = t2.len();
    let at = t2
        .iter()
        .position(|&v| v == start)
        .expect("tours cover the same node set");
    (0..n)
        .map(|k| {
            if reversed {
                t2[(at + n - k % n) % n]
            } else {
                t2[(at + k) % n]
            }
        })
        .collect()
}

/// Merges two aligned sequences (same first node) chain by chain.
fn transcribe(cost: &dyn Fn(usize, usize) -> i64, t1: &[usize], t2: &[usize]) -> Vec<usize> {
    let n = t1.len();
    debug_assert_eq!(t1[0], t2[0]);

    let mut balance = vec![0i32; n];
    let mut imbalanced = 0usize;
    let mut out = Vec::with_capacity(n);
    out.push(t1[0]);
    let mut anchor = 0;

    let mut bump = |balance: &mut [i32], imbalanced: &mut usize, v: usize, delta: i32| {
        let was = balance[v];
        balance[v] += delta;
        if was == 0 && balance[v] != 0 {
            *imbalanced += 1;
        } else if was != 0 && balance[v] == 0 {
            *imbalanced -= 1;
        }
    };

    for m in 1..=n {
        let boundary = m == n || (imbalanced == 0 && t1[m] == t2[m]);
        if boundary {
            // Chain [anchor..m]: same endpoints, same interior set.
            let c1 = path_cost(cost, t1, anchor, m);
            let c2 = path_cost(cost, t2, anchor, m);
            let source = if c1 <= c2 { t1 } else { t2 };
            for k in anchor + 1..=m.min(n - 1) {
                out.push(source[k]);
            }
            anchor = m;
        } else {
            bump(&mut balance, &mut imbalanced, t1[m], 1);
            bump(&mut balance, &mut imbalanced, t2[m], -1);
        }
    }

    debug_assert_eq!(out.len(), n);
    out
}

/// Cost of `seq[a..=b]` as a path, with index `n` wrapping to `seq[0]`.
fn path_cost(cost: &dyn Fn(usize, usize) -> i64, seq: &[usize], a: usize, b: usize) -> i64 {
    let n = seq.len();
    (a..b).map(|k| cost(seq[k], seq[(k + 1) % n])).sum()
}

#[cfg(test)]
mod tests {
    use super::{merge_tours, tour_cost};

    fn line(i: usize, j: usize) -> i64 {
        (i as i64 - j as i64).abs()
    }

    #[test]
    fn merge_takes_the_cheaper_sub_path_per_chain() {
        // Both tours agree outside [1..5]; the identity interior is cheaper.
        let scrambled = [0usize, 1, 4, 3, 2, 5, 6, 7];
        let identity: Vec<usize> = (0..8).collect();

        let merged = merge_tours(&line, &scrambled, &identity);
        assert_eq!(tour_cost(&line, &merged), tour_cost(&line, &identity));
    }

    #[test]
    fn merge_is_never_worse_than_either_input() {
        let t1 = [0usize, 2, 4, 6, 7, 5, 3, 1];
        let t2 = [0usize, 1, 5, 3, 4, 2, 6, 7];
        let merged = merge_tours(&line, &t1, &t2);

        let mut sorted = merged.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());

        let best_input = tour_cost(&line, &t1).min(tour_cost(&line, &t2));
        assert!(tour_cost(&line, &merged) <= best_input);
    }

    #[test]
    fn merge_with_itself_is_identity_in_cost() {
        let t = [3usize, 0, 2, 1, 5, 4, 6, 7];
        let merged = merge_tours(&line, &t, &t);
        assert_eq!(tour_cost(&line, &merged), tour_cost(&line, &t));
    }

    #[test]
    fn merge_handles_the_reversed_orientation() {
        let t1: Vec<usize> = (0..8).collect();
        let t2: Vec<usize> = t1.iter().rev().copied().collect();
        let merged = merge_tours(&line, &t1, &t2);
        assert_eq!(tour_cost(&line, &merged), tour_cost(&line, &t1));
    }

    #[test]
    fn merge_improves_on_two_complementary_tours() {
        // t1 is bad in the first half, t2 in the second; per-chain choice wins.
        let t1 = [0usize, 3, 2, 1, 4, 5, 6, 7];
        let t2 = [0usize, 1, 2, 3, 4, 7, 5, 6];
        let merged = merge_tours(&line, &t1, &t2);
        let best_input = tour_cost(&line, &t1).min(tour_cost(&line, &t2));
        assert!(tour_cost(&line, &merged) < best_input);
    }
}
