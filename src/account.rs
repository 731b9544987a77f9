//! In-memory account representation, used both by `InMemoryDatabase` and as
//! the unit of state the orchestrator reasons about.

use crate::constants::{DELEGATION_DESIGNATOR_LEN, DELEGATION_DESIGNATOR_PREFIX};
use bytes::Bytes;
use ethereum_types::{Address, U256};

#[derive(Debug, Clone, Default)]
pub struct AccountInfo {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
}

impl AccountInfo {
    /// EIP-161 "empty account": no code, nonce zero, balance zero.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.nonce == 0 && self.balance.is_zero()
    }

    /// A CREATE/CREATE2 target collides with an existing account if it
    /// already has code or a nonzero nonce (spec §4.8).
    pub fn create_would_collide(&self) -> bool {
        !self.code.is_empty() || self.nonce != 0
    }
}

/// If `code` is exactly the 23-byte EIP-7702 delegation designator
/// (`0xEF 0x01 0x00 || address`), returns the delegated target address.
/// One level of indirection only — the returned address is never itself
/// re-resolved for further delegation.
pub fn delegation_target(code: &[u8]) -> Option<Address> {
    if code.len() != DELEGATION_DESIGNATOR_LEN {
        return None;
    }
    if code[..3] != DELEGATION_DESIGNATOR_PREFIX {
        return None;
    }
    Some(Address::from_slice(&code[3..23]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_account() {
        assert!(AccountInfo::default().is_empty());
        let mut acc = AccountInfo::default();
        acc.nonce = 1;
        assert!(!acc.is_empty());
    }

    #[test]
    fn delegation_designator_detected() {
        let target = Address::repeat_byte(0xAB);
        let mut code = vec![0xEF, 0x01, 0x00];
        code.extend_from_slice(target.as_bytes());
        assert_eq!(delegation_target(&code), Some(target));
        assert_eq!(delegation_target(&[0xEF, 0x01, 0x00]), None);
    }
}
