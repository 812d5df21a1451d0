//! Code-generation verification for lowered atomics.
//!
//! The semantic model says what an atomic must compute; this crate checks
//! that a compiled artifact actually used the atomic instructions the
//! target requires for a given `(op, fencing, ISA)` triple. The expected
//! instruction tables live in [`expected_instructions`]; matching is done
//! either by decoding x86-64 machine code (via `iced-x86`) or by scanning a
//! disassembly listing for ARM targets.
//!
//! Backends are deliberately pluggable: a new target only needs an
//! expectation table entry and, if byte-level checking is wanted, a decoder
//! wired into [`Compilation::uses_instruction`].

mod expect;
mod x86;

pub use expect::expected_instructions;

use lockstep_types::{AtomicOp, Fencing, TargetIsa};

/// A compiled atomic operation, as handed over by a backend under test.
///
/// x86-64 backends usually provide raw machine code; targets without a
/// wired-up decoder provide their disassembly listing instead.
#[derive(Clone, Debug)]
pub struct Compilation {
    isa: TargetIsa,
    listing: Listing,
}

#[derive(Clone, Debug)]
enum Listing {
    Bytes(Vec<u8>),
    Disasm(Vec<String>),
}

impl Compilation {
    pub fn from_bytes(isa: TargetIsa, code: impl Into<Vec<u8>>) -> Self {
        Compilation {
            isa,
            listing: Listing::Bytes(code.into()),
        }
    }

    pub fn from_disasm<I, S>(isa: TargetIsa, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Compilation {
            isa,
            listing: Listing::Disasm(lines.into_iter().map(Into::into).collect()),
        }
    }

    pub fn isa(&self) -> TargetIsa {
        self.isa
    }

    /// Does the compiled code use `pattern`?
    ///
    /// For disassembly listings this is a substring scan over each line.
    /// For machine code the bytes are decoded and `pattern` is matched
    /// against each instruction's mnemonic, with `"lock"` matching the lock
    /// prefix rather than a mnemonic.
    pub fn uses_instruction(&self, pattern: &str) -> Result<bool, VerifyError> {
        match &self.listing {
            Listing::Disasm(lines) => Ok(lines.iter().any(|line| line.contains(pattern))),
            Listing::Bytes(code) => match self.isa {
                TargetIsa::X86_64 => x86::bytes_use_instruction(code, pattern),
                isa => Err(VerifyError::UnsupportedByteListing { isa }),
            },
        }
    }
}

/// Checks that `compilation` used every instruction the target requires for
/// this op/fencing combination.
pub fn verify_atomic(
    compilation: &Compilation,
    op: AtomicOp,
    fencing: Fencing,
) -> Result<(), VerifyError> {
    for pattern in expected_instructions(compilation.isa(), op, fencing) {
        if !compilation.uses_instruction(pattern)? {
            return Err(VerifyError::MissingInstruction {
                pattern,
                isa: compilation.isa(),
                op,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("{isa}: `{op}` lowering does not use expected instruction `{pattern}`")]
    MissingInstruction {
        pattern: &'static str,
        isa: TargetIsa,
        op: AtomicOp,
    },
    #[error("undecodable {isa} machine code at offset {offset:#x}")]
    UndecodableCode { isa: TargetIsa, offset: usize },
    #[error("machine-code verification is only wired up for x86_64 (got {isa})")]
    UnsupportedByteListing { isa: TargetIsa },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disasm_scan_is_substring_per_line() {
        let comp = Compilation::from_disasm(
            TargetIsa::Aarch64 { lse: true },
            ["0x00: casal w8, w9, [x0]", "0x04: ret"],
        );
        assert!(comp.uses_instruction("casal").unwrap());
        assert!(!comp.uses_instruction("swpal").unwrap());
    }

    #[test]
    fn byte_listing_requires_x86() {
        let comp = Compilation::from_bytes(TargetIsa::Aarch64 { lse: false }, [0u8; 4]);
        assert_eq!(
            comp.uses_instruction("ldax"),
            Err(VerifyError::UnsupportedByteListing {
                isa: TargetIsa::Aarch64 { lse: false }
            })
        );
    }
}
