//! x86-64 byte-level instruction matching.
//!
//! Decoding is delegated to `iced-x86`; this module only maps the
//! verifier's textual patterns onto decoded instructions. `"lock"` matches
//! the lock prefix; any other pattern is a prefix match on the lowercased
//! mnemonic, so `"cmpxchg"` covers `cmpxchg8b`/`cmpxchg16b` as well.

use iced_x86::{Decoder, DecoderOptions, Instruction};

use crate::VerifyError;
use lockstep_types::TargetIsa;

pub(crate) fn bytes_use_instruction(code: &[u8], pattern: &str) -> Result<bool, VerifyError> {
    let mut decoder = Decoder::with_ip(64, code, 0, DecoderOptions::NONE);
    let mut instr = Instruction::default();
    while decoder.can_decode() {
        let offset = decoder.position();
        decoder.decode_out(&mut instr);
        if instr.is_invalid() {
            return Err(VerifyError::UndecodableCode {
                isa: TargetIsa::X86_64,
                offset,
            });
        }
        if instruction_matches(&instr, pattern) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn instruction_matches(instr: &Instruction, pattern: &str) -> bool {
    if pattern == "lock" {
        return instr.has_lock_prefix();
    }
    let mnemonic = format!("{:?}", instr.mnemonic()).to_ascii_lowercase();
    mnemonic.starts_with(pattern)
}
