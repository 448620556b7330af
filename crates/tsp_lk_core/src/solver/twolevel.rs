//! Two-level doubly linked tour representation.
//!
//! The tour is stored as an ordered list of segments of roughly sqrt(n) nodes
//! each. Segments carry a reversal bit, a rank in the segment order, and the
//! global index of their first node, so `succ`/`pred`/`between` are O(1) and a
//! `flip` costs O(sqrt n) amortized: it splits at most two segments, reverses
//! a span of whole segments by toggling their bits, and renumbers the segment
//! order. The structure is rebuilt into even segments after about sqrt(n)
//! flips, before splitting degrades the balance.

#[derive(Clone, Debug)]
struct Segment {
    /// Node ids in internal storage order.
    nodes: Vec<u32>,
    /// When set, the segment is traversed back-to-front.
    reversed: bool,
    /// Position of this segment in the tour order.
    rank: u32,
    /// Global tour index of the segment's first node (in tour direction).
    start: u32,
}

#[derive(Clone, Debug)]
pub struct TwoLevelTour {
    seg_of: Vec<u32>,
    pos_in: Vec<u32>,
    segments: Vec<Segment>,
    order: Vec<u32>,
    group_size: usize,
    flips: usize,
    n: usize,
}

impl TwoLevelTour {
    pub fn new(tour: &[usize]) -> Self {
        let n = tour.len();
        assert!(n > 0, "tour must be non-empty");
        let group_size = (n as f64).sqrt().ceil() as usize;
        let group_size = group_size.max(1);

        let mut list = Self {
            seg_of: vec![0; n],
            pos_in: vec![0; n],
            segments: Vec::with_capacity(n / group_size + 1),
            order: Vec::new(),
            group_size,
            flips: 0,
            n,
        };
        list.load(tour);
        list
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn succ(&self, v: usize) -> usize {
        let si = self.seg_of[v] as usize;
        let seg = &self.segments[si];
        let p = self.pos_in[v] as usize;
        if seg.reversed {
            if p > 0 {
                return seg.nodes[p - 1] as usize;
            }
        } else if p + 1 < seg.nodes.len() {
            return seg.nodes[p + 1] as usize;
        }
        self.first_node(self.next_segment(si))
    }

    pub fn pred(&self, v: usize) -> usize {
        let si = self.seg_of[v] as usize;
        let seg = &self.segments[si];
        let p = self.pos_in[v] as usize;
        if seg.reversed {
            if p + 1 < seg.nodes.len() {
                return seg.nodes[p + 1] as usize;
            }
        } else if p > 0 {
            return seg.nodes[p - 1] as usize;
        }
        self.last_node(self.prev_segment(si))
    }

    /// Global tour index of `v`; indices are only meaningful relative to each
    /// other and shift when a flip rotates the segment order.
    pub fn sequence(&self, v: usize) -> usize {
        let si = self.seg_of[v] as usize;
        let seg = &self.segments[si];
        let p = self.pos_in[v] as usize;
        let offset = if seg.reversed { seg.nodes.len() - 1 - p } else { p };
        seg.start as usize + offset
    }

    /// Is `b` met no later than `c` when walking forward from `a`?
    pub fn between(&self, a: usize, b: usize, c: usize) -> bool {
        let ka = self.sequence(a);
        let kb = self.sequence(b);
        let kc = self.sequence(c);
        if ka <= kc {
            ka <= kb && kb <= kc
        } else {
            kb >= ka || kb <= kc
        }
    }

    /// Removes tour edges `(a,b)` and `(c,d)` and reconnects `(a,c)` and
    /// `(b,d)` by reversing the shorter of the two paths. Requires that both
    /// arguments are tour edges with `b` after `a` and `d` after `c` in one
    /// common direction. `flip(a,b,c,d)` then `flip(a,c,b,d)` restores the
    /// tour.
    pub fn flip(&mut self, a: usize, b: usize, c: usize, d: usize) {
        let (a, b, c, d) = if self.succ(a) == b && self.succ(c) == d {
            (a, b, c, d)
        } else {
            debug_assert!(
                self.succ(b) == a && self.succ(d) == c,
                "flip arguments are not tour edges"
            );
            (d, c, b, a)
        };
        debug_assert!(a != c && b != d, "degenerate flip");

        let bc = (self.sequence(c) + self.n - self.sequence(b)) % self.n + 1;
        if bc * 2 <= self.n {
            self.reverse_path(b, c);
        } else {
            self.reverse_path(d, a);
        }

        self.flips += 1;
        if self.flips >= self.group_size {
            self.rebuild();
        }
    }

    /// The tour as a node sequence beginning at `start`.
    pub fn to_vec(&self, start: usize) -> Vec<usize> {
        let seq = self.collect();
        let at = seq
            .iter()
            .position(|&v| v == start)
            .expect("start node must be on the tour");
        let mut out = Vec::with_capacity(self.n);
        out.extend_from_slice(&seq[at..]);
        out.extend_from_slice(&seq[..at]);
        out
    }

    fn load(&mut self, tour: &[usize]) {
        self.segments.clear();
        self.order.clear();
        for chunk in tour.chunks(self.group_size) {
            let si = self.segments.len();
            for (p, &v) in chunk.iter().enumerate() {
                self.seg_of[v] = si as u32;
                self.pos_in[v] = p as u32;
            }
            self.segments.push(Segment {
                nodes: chunk.iter().map(|&v| v as u32).collect(),
                reversed: false,
                rank: 0,
                start: 0,
            });
            self.order.push(si as u32);
        }
        self.renumber();
        self.flips = 0;
    }

    fn rebuild(&mut self) {
        let seq = self.collect();
        self.load(&seq);
    }

    fn collect(&self) -> Vec<usize> {
        let mut seq = Vec::with_capacity(self.n);
        for &si in &self.order {
            let seg = &self.segments[si as usize];
            if seg.reversed {
                seq.extend(seg.nodes.iter().rev().map(|&v| v as usize));
            } else {
                seq.extend(seg.nodes.iter().map(|&v| v as usize));
            }
        }
        seq
    }

    fn next_segment(&self, si: usize) -> usize {
        let r = self.segments[si].rank as usize;
        self.order[(r + 1) % self.order.len()] as usize
    }

    fn prev_segment(&self, si: usize) -> usize {
        let r = self.segments[si].rank as usize;
        self.order[(r + self.order.len() - 1) % self.order.len()] as usize
    }

    fn first_node(&self, si: usize) -> usize {
        let seg = &self.segments[si];
        let node = if seg.reversed {
            *seg.nodes.last().expect("segments are non-empty")
        } else {
            seg.nodes[0]
        };
        node as usize
    }

    fn last_node(&self, si: usize) -> usize {
        let seg = &self.segments[si];
        let node = if seg.reversed {
            seg.nodes[0]
        } else {
            *seg.nodes.last().expect("segments are non-empty")
        };
        node as usize
    }

    fn forward_nodes(&self, si: usize) -> Vec<u32> {
        let seg = &self.segments[si];
        if seg.reversed {
            seg.nodes.iter().rev().copied().collect()
        } else {
            seg.nodes.clone()
        }
    }

    fn renumber(&mut self) {
        let mut start = 0u32;
        for (r, &si) in self.order.iter().enumerate() {
            let seg = &mut self.segments[si as usize];
            seg.rank = r as u32;
            seg.start = start;
            start += seg.nodes.len() as u32;
        }
    }

    fn adopt(&mut self, si: usize, nodes: Vec<u32>) {
        for (p, &v) in nodes.iter().enumerate() {
            self.seg_of[v as usize] = si as u32;
            self.pos_in[v as usize] = p as u32;
        }
        let seg = &mut self.segments[si];
        seg.nodes = nodes;
        seg.reversed = false;
    }

    /// Splits `v`'s segment so that `v` becomes a segment's first node.
    fn split_start(&mut self, v: usize) {
        let si = self.seg_of[v] as usize;
        let fwd = self.forward_nodes(si);
        let at = fwd
            .iter()
            .position(|&u| u as usize == v)
            .expect("node belongs to its segment");
        if at == 0 {
            let seg = &mut self.segments[si];
            if seg.reversed {
                // Normalize so later splits see forward storage order.
                seg.nodes.reverse();
                seg.reversed = false;
                let nodes = seg.nodes.clone();
                self.adopt(si, nodes);
            }
            return;
        }
        self.split_at(si, fwd, at);
    }

    /// Splits `v`'s segment so that `v` becomes a segment's last node.
    fn split_end(&mut self, v: usize) {
        let si = self.seg_of[v] as usize;
        let fwd = self.forward_nodes(si);
        let at = fwd
            .iter()
            .position(|&u| u as usize == v)
            .expect("node belongs to its segment");
        if at + 1 == fwd.len() {
            let seg = &mut self.segments[si];
            if seg.reversed {
                seg.nodes.reverse();
                seg.reversed = false;
                let nodes = seg.nodes.clone();
                self.adopt(si, nodes);
            }
            return;
        }
        self.split_at(si, fwd, at + 1);
    }

    fn split_at(&mut self, si: usize, fwd: Vec<u32>, at: usize) {
        let rank = self.segments[si].rank as usize;
        let pre = fwd[..at].to_vec();
        let post = fwd[at..].to_vec();

        self.adopt(si, pre);
        let ni = self.segments.len();
        self.segments.push(Segment {
            nodes: Vec::new(),
            reversed: false,
            rank: 0,
            start: 0,
        });
        self.adopt(ni, post);
        self.order.insert(rank + 1, ni as u32);
        self.renumber();
    }

    fn reverse_path(&mut self, from: usize, to: usize) {
        self.split_start(from);
        self.split_end(to);

        let r1 = self.segments[self.seg_of[from] as usize].rank as usize;
        let r2 = self.segments[self.seg_of[to] as usize].rank as usize;
        let len = self.order.len();
        let (s, e) = if r1 <= r2 {
            (r1, r2)
        } else {
            self.order.rotate_left(r1);
            (0, r2 + len - r1)
        };

        self.order[s..=e].reverse();
        for idx in s..=e {
            let si = self.order[idx] as usize;
            self.segments[si].reversed = !self.segments[si].reversed;
        }
        self.renumber();
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::TwoLevelTour;

    /// Rotation- and direction-insensitive form of a cyclic sequence.
    fn canonical(seq: &[usize]) -> Vec<usize> {
        let n = seq.len();
        let at = seq.iter().position(|&v| v == 0).expect("node 0 present");
        let forward: Vec<usize> = (0..n).map(|k| seq[(at + k) % n]).collect();
        if n <= 2 || forward[1] <= forward[n - 1] {
            forward
        } else {
            let mut backward = vec![0];
            backward.extend(forward[1..].iter().rev());
            backward
        }
    }

    /// Reference flip on a plain vector: reverse the cyclic path b..c.
    fn naive_flip(seq: &mut Vec<usize>, b: usize, c: usize) {
        let n = seq.len();
        let pb = seq.iter().position(|&v| v == b).expect("b on tour");
        let rotated: Vec<usize> = (0..n).map(|k| seq[(pb + k) % n]).collect();
        let pc = rotated.iter().position(|&v| v == c).expect("c on tour");
        let mut out = rotated.clone();
        out[..=pc].reverse();
        *seq = out;
    }

    #[test]
    fn succ_and_pred_walk_the_initial_order() {
        let tour: Vec<usize> = (0..10).collect();
        let list = TwoLevelTour::new(&tour);
        for v in 0..10 {
            assert_eq!(list.succ(v), (v + 1) % 10);
            assert_eq!(list.pred(v), (v + 9) % 10);
        }
    }

    #[test]
    fn between_answers_cyclic_order_queries() {
        let tour: Vec<usize> = (0..8).collect();
        let list = TwoLevelTour::new(&tour);
        assert!(list.between(1, 3, 6));
        assert!(!list.between(1, 7, 6));
        assert!(list.between(6, 7, 2));
        assert!(list.between(6, 1, 2));
        assert!(!list.between(6, 4, 2));
    }

    #[test]
    fn flip_reverses_the_inner_path() {
        let tour: Vec<usize> = (0..8).collect();
        let mut list = TwoLevelTour::new(&tour);
        // Remove (1,2) and (5,6), add (1,5) and (2,6).
        list.flip(1, 2, 5, 6);

        let mut expected: Vec<usize> = tour.clone();
        naive_flip(&mut expected, 2, 5);
        assert_eq!(canonical(&list.to_vec(0)), canonical(&expected));
        // New adjacencies hold regardless of orientation.
        let succ1 = list.succ(1);
        let pred1 = list.pred(1);
        assert!(succ1 == 5 || pred1 == 5);
    }

    #[test]
    fn flip_then_inverse_flip_restores_the_tour() {
        let tour: Vec<usize> = (0..16).collect();
        let mut list = TwoLevelTour::new(&tour);
        list.flip(3, 4, 11, 12);
        list.flip(3, 11, 4, 12);
        assert_eq!(canonical(&list.to_vec(0)), canonical(&tour));
    }

    #[test]
    fn random_flips_match_a_naive_model() {
        let n = 30;
        let mut rng = StdRng::seed_from_u64(7);
        let mut model: Vec<usize> = (0..n).collect();
        let mut list = TwoLevelTour::new(&model);

        for _ in 0..200 {
            // Pick two non-adjacent tour edges (a,b) and (c,d) in the model.
            let pa = rng.random_range(0..n);
            let offset = rng.random_range(2..n - 1);
            let pc = (pa + offset) % n;
            let a = model[pa];
            let b = model[(pa + 1) % n];
            let c = model[pc];
            let d = model[(pc + 1) % n];

            // The list may hold the cycle in the opposite direction.
            if list.succ(a) == b {
                list.flip(a, b, c, d);
            } else {
                list.flip(d, c, b, a);
            }
            naive_flip(&mut model, b, c);

            assert_eq!(canonical(&list.to_vec(0)), canonical(&model));
        }
    }

    #[test]
    fn single_node_tour_is_its_own_neighbor() {
        let list = TwoLevelTour::new(&[0]);
        assert_eq!(list.succ(0), 0);
        assert_eq!(list.pred(0), 0);
    }
}
