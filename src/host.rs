//! The pluggable state backend (§6 "Host interface") and its in-memory
//! fallback, plus the async-suspension sentinel described in §5.

use crate::account::{delegation_target, AccountInfo};
use crate::errors::DatabaseError;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::FxHashMap;

/// The single kind of outstanding request the core can be waiting on. The
/// orchestrator's `call_or_continue` entry point surfaces one of these
/// instead of a result when the host doesn't have the value yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Storage { address: Address, slot: H256 },
    Balance { address: Address },
    Code { address: Address },
    Nonce { address: Address },
}

/// A reply to a previously-issued `PendingRequest`. The EVM matches it
/// against the outstanding request token before resuming, so a reply to an
/// already-answered or mismatched request is rejected rather than silently
/// applied to the wrong slot.
#[derive(Debug, Clone)]
pub enum PendingReply {
    Storage(U256),
    Balance(U256),
    Code(Bytes),
    Nonce(u64),
}

/// Error surfaced by a `Host` call: either a hard backend failure, or a
/// signal that the value isn't available yet (see §5's suspension point).
#[derive(Debug, Clone)]
pub enum HostError {
    Pending(PendingRequest),
    Backend(DatabaseError),
}

impl From<DatabaseError> for HostError {
    fn from(err: DatabaseError) -> Self {
        HostError::Backend(err)
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// The embedder-supplied state backend. When absent, `InMemoryDatabase`
/// backs the no-host mode with plain maps and never signals `Pending`.
pub trait Host: Send + Sync {
    fn get_balance(&mut self, address: Address) -> HostResult<U256>;
    fn set_balance(&mut self, address: Address, value: U256) -> HostResult<()>;
    fn get_nonce(&mut self, address: Address) -> HostResult<u64>;
    fn set_nonce(&mut self, address: Address, nonce: u64) -> HostResult<()>;
    fn get_code(&mut self, address: Address) -> HostResult<Bytes>;
    fn set_code(&mut self, address: Address, code: Bytes) -> HostResult<()>;
    fn get_storage(&mut self, address: Address, slot: H256) -> HostResult<U256>;
    fn set_storage(&mut self, address: Address, slot: H256, value: U256) -> HostResult<()>;

    /// Whether `address` currently has any accessible account record. The
    /// in-memory backend treats any never-seen address as an implicit
    /// zero-balance/zero-nonce/empty-code account, matching Ethereum's
    /// "every address exists, most are empty" model.
    fn account_exists(&mut self, address: Address) -> HostResult<bool>;
}

/// Resolves `get_code(addr)` through one level of EIP-7702 delegation.
/// Returns `(executable_code, is_delegated, code_address)`, where
/// `code_address` is the address the code actually came from (`addr` itself
/// unless delegated).
pub fn resolve_code(host: &mut dyn Host, address: Address) -> HostResult<(Bytes, bool, Address)> {
    let code = host.get_code(address)?;
    match delegation_target(&code) {
        Some(target) => {
            let delegated_code = host.get_code(target)?;
            Ok((delegated_code, true, target))
        }
        None => Ok((code, false, address)),
    }
}

/// Default, always-synchronous backend: plain maps, no external host.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    accounts: FxHashMap<Address, AccountInfo>,
    storage: FxHashMap<(Address, H256), U256>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&mut self, address: Address, info: AccountInfo) {
        self.accounts.insert(address, info);
    }

    pub fn account(&self, address: Address) -> AccountInfo {
        self.accounts.get(&address).cloned().unwrap_or_default()
    }
}

impl Host for InMemoryDatabase {
    fn get_balance(&mut self, address: Address) -> HostResult<U256> {
        Ok(self.accounts.get(&address).map(|a| a.balance).unwrap_or_default())
    }

    fn set_balance(&mut self, address: Address, value: U256) -> HostResult<()> {
        self.accounts.entry(address).or_default().balance = value;
        Ok(())
    }

    fn get_nonce(&mut self, address: Address) -> HostResult<u64> {
        Ok(self.accounts.get(&address).map(|a| a.nonce).unwrap_or_default())
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> HostResult<()> {
        self.accounts.entry(address).or_default().nonce = nonce;
        Ok(())
    }

    fn get_code(&mut self, address: Address) -> HostResult<Bytes> {
        Ok(self
            .accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> HostResult<()> {
        self.accounts.entry(address).or_default().code = code;
        Ok(())
    }

    fn get_storage(&mut self, address: Address, slot: H256) -> HostResult<U256> {
        Ok(self
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    fn set_storage(&mut self, address: Address, slot: H256, value: U256) -> HostResult<()> {
        self.storage.insert((address, slot), value);
        Ok(())
    }

    fn account_exists(&mut self, address: Address) -> HostResult<bool> {
        Ok(self.accounts.contains_key(&address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_host_defaults_to_zero() {
        let mut db = InMemoryDatabase::new();
        let addr = Address::repeat_byte(7);
        assert_eq!(db.get_balance(addr).unwrap(), U256::zero());
        assert_eq!(db.get_nonce(addr).unwrap(), 0);
        assert!(db.get_code(addr).unwrap().is_empty());
    }

    #[test]
    fn delegation_indirection_resolves_one_level() {
        let mut db = InMemoryDatabase::new();
        let target = Address::repeat_byte(0xAA);
        let delegator = Address::repeat_byte(0xBB);
        db.set_account(
            target,
            AccountInfo {
                code: Bytes::from_static(&[0x60, 0x00]),
                ..Default::default()
            },
        );
        let mut designator = vec![0xEF, 0x01, 0x00];
        designator.extend_from_slice(target.as_bytes());
        db.set_account(
            delegator,
            AccountInfo {
                code: Bytes::from(designator),
                ..Default::default()
            },
        );
        let (code, is_delegated, code_address) = resolve_code(&mut db, delegator).unwrap();
        assert!(is_delegated);
        assert_eq!(code_address, target);
        assert_eq!(&code[..], &[0x60, 0x00]);
    }
}
