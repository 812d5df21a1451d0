//! Umbrella crate for the atomic-operation lowering contract.
//!
//! Re-exports the three pieces most callers want together: the shared
//! types, the semantic model and the codegen verifier. The workspace-level
//! integration tests in `tests/` exercise the contract end to end the way
//! a backend test harness would.

pub use lockstep_model as model;
pub use lockstep_types as types;
pub use lockstep_verify as verify;

pub use lockstep_model::{MemoryCell, SharedCell};
pub use lockstep_types::{AtomicOp, Fencing, NativeInt, RmwOp, TargetIsa, Width};
pub use lockstep_verify::{verify_atomic, Compilation, VerifyError};
