//! Semantic contract for the atomic operations a backend must lower.
//!
//! Two executors implement the same contract:
//!
//! - [`MemoryCell`] is the single-threaded reference evaluator. It is the
//!   oracle's ground truth: every operation is a plain read, a pure
//!   function, and a write, with nothing else observable in between.
//! - [`SharedCell`] executes the contract with real `std::sync::atomic`
//!   primitives and `&self` methods, so tests can race threads against one
//!   cell and check that each invocation remains indivisible.
//!
//! All operands are truncated to the operation width before use; arithmetic
//! wraps modulo 2^width. Strong CAS returns the pre-call value whether or
//! not it swapped; weak CAS returns a success flag.

mod cell;
mod shared;

pub use cell::MemoryCell;
pub use shared::SharedCell;

use lockstep_types::{RmwOp, Width};

/// The pure modify step of a read-modify-write, wrapped and masked to
/// `width`.
pub fn rmw_result(op: RmwOp, old: u64, operand: u64, width: Width) -> u64 {
    let mask = width.mask();
    let old = old & mask;
    let operand = operand & mask;
    match op {
        RmwOp::Add => old.wrapping_add(operand) & mask,
        RmwOp::Sub => old.wrapping_sub(operand) & mask,
        RmwOp::And => old & operand,
        RmwOp::Or => old | operand,
        RmwOp::Xor => old ^ operand,
        RmwOp::Xchg => operand,
    }
}
