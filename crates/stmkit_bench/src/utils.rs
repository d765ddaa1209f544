//! Benchmark utilities.

use rand::Rng;
use stmkit_core::{Stm, TRef};

/// Allocate `count` refs holding random balances.
pub fn random_refs(count: usize) -> Vec<TRef<i64>> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| TRef::new(rng.gen_range(0..1_000))).collect()
}

/// Generate random `(from, to)` index pairs over `count` refs.
pub fn random_pairs(count: usize, pairs: usize) -> Vec<(usize, usize)> {
    let mut rng = rand::thread_rng();
    (0..pairs)
        .map(|_| (rng.gen_range(0..count), rng.gen_range(0..count)))
        .collect()
}

/// Transaction moving one unit from `from` to `to`.
pub fn move_one(from: &TRef<i64>, to: &TRef<i64>) -> Stm<()> {
    from.update(|n| n - 1).zip_right(to.update(|n| n + 1))
}

/// Transaction reading and summing every ref.
pub fn sum_all(refs: &[TRef<i64>]) -> Stm<i64> {
    Stm::for_each(refs.to_vec(), |r: TRef<i64>| r.get()).map(|values| values.iter().sum())
}
