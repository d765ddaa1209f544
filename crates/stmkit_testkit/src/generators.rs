//! Property-based test generators using proptest.
//!
//! Provides strategies for generating transfers and ref operations, plus
//! a sequential model to check committed results against.

use proptest::prelude::*;
use stmkit_core::{Stm, TRef};

/// A transfer between two accounts of an [`Accounts`](crate::Accounts) fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Source account index.
    pub from: usize,
    /// Target account index.
    pub to: usize,
    /// Amount to move.
    pub amount: i64,
}

/// Strategy for generating a transfer between `accounts` accounts.
pub fn transfer_strategy(accounts: usize, max_amount: i64) -> impl Strategy<Value = Transfer> {
    (0..accounts, 0..accounts, 0..=max_amount).prop_map(|(from, to, amount)| Transfer {
        from,
        to,
        amount,
    })
}

/// Strategy for generating a batch of transfers.
pub fn transfers_strategy(
    accounts: usize,
    max_amount: i64,
    max_len: usize,
) -> impl Strategy<Value = Vec<Transfer>> {
    prop::collection::vec(transfer_strategy(accounts, max_amount), 1..=max_len)
}

/// A single operation against an integer ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefOp {
    /// Overwrite the value.
    Set(i64),
    /// Add to the value.
    Add(i64),
    /// Double the value if it is below the bound.
    DoubleBelow(i64),
    /// Read without writing.
    Read,
}

impl RefOp {
    /// Applies the operation to a plain value.
    pub fn apply(&self, value: i64) -> i64 {
        match self {
            RefOp::Set(n) => *n,
            RefOp::Add(n) => value.wrapping_add(*n),
            RefOp::DoubleBelow(bound) if value < *bound => value.wrapping_mul(2),
            RefOp::DoubleBelow(_) | RefOp::Read => value,
        }
    }

    /// Builds the transaction performing the operation on `tref`.
    pub fn to_stm(&self, tref: &TRef<i64>) -> Stm<()> {
        match self.clone() {
            RefOp::Set(n) => tref.set(n),
            RefOp::Add(n) => tref.update(move |value| value.wrapping_add(n)),
            RefOp::DoubleBelow(bound) => {
                tref.update_some(move |value| (*value < bound).then(|| value.wrapping_mul(2)))
            }
            RefOp::Read => tref.get().as_(()),
        }
    }
}

/// Strategy for generating ref operations.
pub fn ref_op_strategy() -> impl Strategy<Value = RefOp> {
    prop_oneof![
        (-1_000i64..1_000).prop_map(RefOp::Set),
        (-100i64..100).prop_map(RefOp::Add),
        (-1_000i64..1_000).prop_map(RefOp::DoubleBelow),
        Just(RefOp::Read),
    ]
}

/// Strategy for generating a sequence of ref operations.
pub fn ref_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<RefOp>> {
    prop::collection::vec(ref_op_strategy(), 0..=max_len)
}

/// Strategy for generating permit requests against a semaphore of
/// `capacity` permits.
pub fn permits_strategy(capacity: usize, max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1..=capacity.max(1), 1..=max_len)
}
