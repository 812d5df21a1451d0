//! Byte-level verification against hand-assembled x86-64 lowerings.

use lockstep_types::{AtomicOp, Fencing, TargetIsa};
use lockstep_verify::{verify_atomic, Compilation, VerifyError};

fn x86(code: &[u8]) -> Compilation {
    Compilation::from_bytes(TargetIsa::X86_64, code)
}

// mov eax, [rdi]; lock cmpxchg [rdi], esi; ret
const CAS32: &[u8] = &[0x8b, 0x07, 0xf0, 0x0f, 0xb1, 0x37, 0xc3];
// lock cmpxchg byte [rdi], sil; ret
const CAS8: &[u8] = &[0xf0, 0x40, 0x0f, 0xb0, 0x37, 0xc3];
// lock cmpxchg word [rdi], si; ret
const CAS16: &[u8] = &[0x66, 0xf0, 0x0f, 0xb1, 0x37, 0xc3];
// lock cmpxchg qword [rdi], rsi; ret
const CAS64: &[u8] = &[0xf0, 0x48, 0x0f, 0xb1, 0x37, 0xc3];
// lock xadd [rdi], esi; ret
const XADD32: &[u8] = &[0xf0, 0x0f, 0xc1, 0x37, 0xc3];
// xchg [rdi], esi; ret  (lock is implicit for xchg with memory)
const XCHG32: &[u8] = &[0x87, 0x37, 0xc3];
// lock and [rdi], esi; ret
const AND32: &[u8] = &[0xf0, 0x21, 0x37, 0xc3];
// lock or [rdi], esi; ret
const OR32: &[u8] = &[0xf0, 0x09, 0x37, 0xc3];
// lock xor [rdi], esi; ret
const XOR32: &[u8] = &[0xf0, 0x31, 0x37, 0xc3];
// mov eax, [rdi]; ret — no atomic anywhere
const PLAIN_LOAD: &[u8] = &[0x8b, 0x07, 0xc3];

#[test]
fn cas_lowering_verifies_at_every_width() {
    for code in [CAS8, CAS16, CAS32, CAS64] {
        for op in [AtomicOp::WeakCas, AtomicOp::StrongCas] {
            for fencing in [Fencing::Fenced, Fencing::Unfenced] {
                verify_atomic(&x86(code), op, fencing).unwrap();
            }
        }
    }
}

#[test]
fn rmw_lowerings_verify() {
    verify_atomic(&x86(XADD32), AtomicOp::XchgAdd, Fencing::Fenced).unwrap();
    // Subtraction may be emitted as lock xadd of a negated operand; only the
    // lock prefix is required.
    verify_atomic(&x86(XADD32), AtomicOp::XchgSub, Fencing::Fenced).unwrap();
    verify_atomic(&x86(AND32), AtomicOp::XchgAnd, Fencing::Fenced).unwrap();
    verify_atomic(&x86(OR32), AtomicOp::XchgOr, Fencing::Fenced).unwrap();
    verify_atomic(&x86(XOR32), AtomicOp::XchgXor, Fencing::Fenced).unwrap();
    verify_atomic(&x86(XCHG32), AtomicOp::Xchg, Fencing::Fenced).unwrap();
}

#[test]
fn cas_without_lock_prefix_is_rejected() {
    // cmpxchg [rdi], esi; ret — missing the lock prefix
    let code = &[0x0f, 0xb1, 0x37, 0xc3];
    let err = verify_atomic(&x86(code), AtomicOp::StrongCas, Fencing::Fenced).unwrap_err();
    assert_eq!(
        err,
        VerifyError::MissingInstruction {
            pattern: "lock",
            isa: TargetIsa::X86_64,
            op: AtomicOp::StrongCas,
        }
    );
}

#[test]
fn non_atomic_code_is_rejected_for_every_op() {
    for op in AtomicOp::ALL {
        let err = verify_atomic(&x86(PLAIN_LOAD), op, Fencing::Fenced).unwrap_err();
        assert!(
            matches!(err, VerifyError::MissingInstruction { .. }),
            "{op}: {err}"
        );
    }
}

#[test]
fn undecodable_code_surfaces_the_offset() {
    let err = verify_atomic(&x86(&[0x06]), AtomicOp::Xchg, Fencing::Fenced).unwrap_err();
    assert_eq!(
        err,
        VerifyError::UndecodableCode {
            isa: TargetIsa::X86_64,
            offset: 0
        }
    );
}
