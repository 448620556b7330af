//! Duplicate-tour rejection.
//!
//! A tour is identified by a Zobrist-style signature over its edge multiset:
//! each node gets a random 64-bit key, an edge hashes to the product of its
//! endpoint keys, and the tour signature is the xor over all edges. The
//! signature is therefore independent of tour orientation and starting node.
//! Signatures of locally optimal tours are kept in a small open-addressed
//! table that is cleared on every new best tour and at run boundaries.

use rand::{Rng, SeedableRng, rngs::StdRng};

const HASH_TABLE_SIZE: usize = 1 << 16;
const MAX_PROBES: usize = 32;
/// Key-table seed; fixed so equal tours hash equally across runs.
const KEY_SEED: u64 = 0x5bd1_e995;

pub struct TourHasher {
    keys: Vec<u64>,
}

impl TourHasher {
    pub fn new(n: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(KEY_SEED);
        Self {
            keys: (0..n).map(|_| rng.random::<u64>() | 1).collect(),
        }
    }

    fn edge_key(&self, u: usize, v: usize) -> u64 {
        let (u, v) = if u < v { (u, v) } else { (v, u) };
        self.keys[u].wrapping_mul(self.keys[v])
    }

    pub fn signature(&self, tour: &[usize]) -> u64 {
        let mut signature = 0;
        for (idx, &v) in tour.iter().enumerate() {
            let w = tour[(idx + 1) % tour.len()];
            signature ^= self.edge_key(v, w);
        }
        signature
    }
}

#[derive(Clone, Copy, Default)]
struct Entry {
    generation: u32,
    signature: u64,
    cost: i64,
}

pub struct HashTable {
    entries: Vec<Entry>,
    generation: u32,
}

impl HashTable {
    pub fn new() -> Self {
        Self {
            entries: vec![Entry::default(); HASH_TABLE_SIZE],
            generation: 1,
        }
    }

    /// Forgets every stored tour.
    pub fn clear(&mut self) {
        self.generation += 1;
    }

    /// Has a tour with this signature been recorded since the last clear?
    ///
    /// A stored signature with a different cost means two improving tours of
    /// one trial sequence collided, which the search treats as unrecoverable.
    pub fn search(&self, signature: u64, cost: i64) -> bool {
        let mut at = signature as usize % HASH_TABLE_SIZE;
        for _ in 0..MAX_PROBES {
            let entry = &self.entries[at];
            if entry.generation != self.generation {
                return false;
            }
            if entry.signature == signature {
                assert!(
                    entry.cost == cost,
                    "tour signature {signature:#x} maps to costs {} and {cost}",
                    entry.cost
                );
                return true;
            }
            at = (at + 1) % HASH_TABLE_SIZE;
        }
        false
    }

    pub fn insert(&mut self, signature: u64, cost: i64) {
        let mut at = signature as usize % HASH_TABLE_SIZE;
        let mut worst = at;
        let mut worst_cost = i64::MIN;
        for _ in 0..MAX_PROBES {
            let entry = &self.entries[at];
            if entry.generation != self.generation || entry.signature == signature {
                break;
            }
            if entry.cost > worst_cost {
                worst_cost = entry.cost;
                worst = at;
            }
            at = (at + 1) % HASH_TABLE_SIZE;
        }
        let slot = if self.entries[at].generation == self.generation
            && self.entries[at].signature != signature
        {
            // Probe window exhausted: displace the costliest tour in it.
            worst
        } else {
            at
        };
        self.entries[slot] = Entry {
            generation: self.generation,
            signature,
            cost,
        };
    }
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{HashTable, TourHasher};

    #[test]
    fn signature_ignores_rotation_and_direction() {
        let hasher = TourHasher::new(6);
        let base = hasher.signature(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(hasher.signature(&[3, 4, 5, 0, 1, 2]), base);
        assert_eq!(hasher.signature(&[5, 4, 3, 2, 1, 0]), base);
    }

    #[test]
    fn signature_distinguishes_different_edge_sets() {
        let hasher = TourHasher::new(6);
        let a = hasher.signature(&[0, 1, 2, 3, 4, 5]);
        let b = hasher.signature(&[0, 2, 1, 3, 4, 5]);
        assert_ne!(a, b);
    }

    #[test]
    fn search_finds_inserted_tours_until_cleared() {
        let mut table = HashTable::new();
        table.insert(12345, 100);
        assert!(table.search(12345, 100));
        assert!(!table.search(54321, 100));

        table.clear();
        assert!(!table.search(12345, 100));
    }

    #[test]
    #[should_panic(expected = "maps to costs")]
    fn divergent_cost_for_one_signature_is_an_invariant_violation() {
        let mut table = HashTable::new();
        table.insert(777, 10);
        let _ = table.search(777, 11);
    }
}
