//! Benchmarks for `BPlusTree` using Divan.
//!
//! Run with: `cargo bench --bench tree`

use bplustree::BPlusTree;
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

const FANOUT: usize = 16;
const KEYS: i32 = 10_000;

fn filled(n: i32) -> BPlusTree {
    let tree = BPlusTree::new(FANOUT, FANOUT).unwrap();
    for k in 0..n {
        tree.insert(k, k);
    }
    tree
}

// =============================================================================
// Insert Operations
// =============================================================================

#[divan::bench_group]
mod insert {
    use super::{BPlusTree, Bencher, FANOUT, KEYS, black_box};
    use rand::SeedableRng;
    use rand::seq::SliceRandom;

    #[divan::bench]
    fn sequential_10k(bencher: Bencher) {
        bencher
            .with_inputs(|| BPlusTree::new(FANOUT, FANOUT).unwrap())
            .bench_local_values(|tree| {
                for k in 0..KEYS {
                    tree.insert(black_box(k), k);
                }
                tree
            });
    }

    #[divan::bench]
    fn shuffled_10k(bencher: Bencher) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut keys: Vec<i32> = (0..KEYS).collect();
        keys.shuffle(&mut rng);

        bencher
            .with_inputs(|| BPlusTree::new(FANOUT, FANOUT).unwrap())
            .bench_local_values(|tree| {
                for &k in &keys {
                    tree.insert(black_box(k), k);
                }
                tree
            });
    }
}

// =============================================================================
// Lookup Operations
// =============================================================================

#[divan::bench_group]
mod lookup {
    use super::{Bencher, KEYS, black_box, filled};

    #[divan::bench(threads = [1, 4, 8])]
    fn point_hit(bencher: Bencher) {
        let tree = filled(KEYS);
        bencher.bench(|| black_box(&tree).get(black_box(KEYS / 2)));
    }

    #[divan::bench]
    fn point_miss(bencher: Bencher) {
        let tree = filled(KEYS);
        bencher.bench_local(|| black_box(&tree).get(black_box(KEYS + 1)));
    }
}

// =============================================================================
// Scans
// =============================================================================

#[divan::bench_group]
mod scan {
    use super::{Bencher, KEYS, black_box, filled};

    #[divan::bench]
    fn full_forward(bencher: Bencher) {
        let tree = filled(KEYS);
        bencher.bench_local(|| {
            let mut sum = 0i64;
            let mut it = tree.begin();
            while it != tree.end() {
                sum += i64::from(it.current().1);
                it.step_forward();
            }
            black_box(sum)
        });
    }

    #[divan::bench]
    fn full_reverse(bencher: Bencher) {
        let tree = filled(KEYS);
        bencher.bench_local(|| {
            let mut sum = 0i64;
            let mut it = tree.rbegin();
            while it != tree.rend() {
                sum += i64::from(it.current().1);
                it.step_backward();
            }
            black_box(sum)
        });
    }
}

// =============================================================================
// Deletes
// =============================================================================

#[divan::bench_group]
mod delete {
    use super::{Bencher, KEYS, black_box, filled};

    #[divan::bench]
    fn delete_half(bencher: Bencher) {
        bencher
            .with_inputs(|| filled(KEYS))
            .bench_local_values(|tree| {
                for k in (0..KEYS).step_by(2) {
                    tree.delete(black_box(k));
                }
                tree
            });
    }
}
