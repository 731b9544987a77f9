//! Immutable bytecode view with precomputed JUMPDEST validity bitmap.

use bitvec::vec::BitVec;
use bytes::Bytes;

const PUSH0: u8 = 0x5F;
const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7F;
const JUMPDEST: u8 = 0x5B;

#[derive(Debug, Clone)]
pub struct Bytecode {
    bytes: Bytes,
    /// `jumpdest_valid[pc]` is set iff `pc` holds `0x5B` and is not covered
    /// by a PUSH immediate.
    jumpdest_valid: BitVec,
}

impl Bytecode {
    pub fn new(bytes: Bytes) -> Self {
        let jumpdest_valid = analyze(&bytes);
        Bytecode {
            bytes,
            jumpdest_valid,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn opcode_at(&self, pc: usize) -> u8 {
        self.bytes.get(pc).copied().unwrap_or(0x00)
    }

    pub fn is_valid_jumpdest(&self, pc: usize) -> bool {
        self.jumpdest_valid.get(pc).as_deref().copied().unwrap_or(false)
    }

    /// Fetch the `n`-byte immediate starting right after `pc` (which points
    /// at the PUSH opcode itself). Returns `None` if fewer than `n` bytes
    /// remain, in which case the caller fails with `InvalidPush`.
    pub fn push_immediate(&self, pc: usize, n: usize) -> Option<&[u8]> {
        let start = pc.checked_add(1)?;
        let end = start.checked_add(n)?;
        self.bytes.get(start..end)
    }
}

/// Single left-to-right scan building the JUMPDEST bitmap. PUSH1..PUSH32
/// (`0x60..=0x7F`) skip `opcode - 0x5F` bytes; PUSH0 (`0x5F`) advances by
/// one byte and sets no bit; `0x5B` sets a bit when reached directly (not
/// while skipping over a PUSH immediate).
fn analyze(code: &[u8]) -> BitVec {
    let mut bits = BitVec::repeat(false, code.len());
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        if op == JUMPDEST {
            bits.set(pc, true);
            pc += 1;
        } else if (PUSH1..=PUSH32).contains(&op) {
            let skip = usize::from(op - (PUSH1 - 1));
            pc = pc.saturating_add(1).saturating_add(skip);
        } else {
            // includes PUSH0 and every other opcode: advance by one.
            pc += 1;
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jumpdest_inside_push_immediate_is_invalid() {
        // PUSH1 0x5B, JUMPDEST
        let code = Bytecode::new(Bytes::from_static(&[0x60, 0x5B, 0x5B]));
        assert!(!code.is_valid_jumpdest(1));
        assert!(code.is_valid_jumpdest(2));
    }

    #[test]
    fn push0_does_not_skip() {
        let code = Bytecode::new(Bytes::from_static(&[0x5F, 0x5B]));
        assert!(code.is_valid_jumpdest(1));
    }

    #[test]
    fn out_of_range_is_never_valid() {
        let code = Bytecode::new(Bytes::from_static(&[0x00]));
        assert!(!code.is_valid_jumpdest(10));
    }
}
