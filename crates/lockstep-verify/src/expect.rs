use lockstep_types::{AtomicOp, Fencing, TargetIsa};

/// Instructions a correct lowering must use, per target.
///
/// - x86-64: CAS requires a `lock`-prefixed `cmpxchg`; plain exchange may
///   be a bare `xchg` (the lock signal is implicit); every other
///   read-modify-write must carry a `lock` prefix, whichever instruction
///   the backend picked.
/// - ARM64 with LSE: the single-instruction atomics. Subtraction lowers to
///   `ldaddal` of the negated operand, so it shares the add entry.
/// - ARM64 without LSE: an exclusive load/store pair; fenced forms must use
///   the acquire/release flavors.
/// - ARM32 Thumb-2: `ldrex`/`strex`, fenced or not.
pub fn expected_instructions(
    isa: TargetIsa,
    op: AtomicOp,
    fencing: Fencing,
) -> &'static [&'static str] {
    match isa {
        TargetIsa::X86_64 => match op {
            AtomicOp::WeakCas | AtomicOp::StrongCas => &["lock", "cmpxchg"],
            AtomicOp::Xchg => &["xchg"],
            AtomicOp::XchgAdd
            | AtomicOp::XchgSub
            | AtomicOp::XchgAnd
            | AtomicOp::XchgOr
            | AtomicOp::XchgXor => &["lock"],
        },
        TargetIsa::Aarch64 { lse: true } => match op {
            AtomicOp::WeakCas | AtomicOp::StrongCas => &["casal"],
            AtomicOp::XchgAdd | AtomicOp::XchgSub => &["ldaddal"],
            AtomicOp::XchgAnd => &["ldclral"],
            AtomicOp::XchgOr => &["ldsetal"],
            AtomicOp::XchgXor => &["ldeoral"],
            AtomicOp::Xchg => &["swpal"],
        },
        TargetIsa::Aarch64 { lse: false } => match fencing {
            Fencing::Fenced => &["ldax", "stlx"],
            Fencing::Unfenced => &["ldx", "stx"],
        },
        TargetIsa::Arm32Thumb2 => &["ldrex", "strex"],
    }
}
