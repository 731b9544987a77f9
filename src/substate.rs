//! Per-transaction accrued state with a snapshot/revert protocol around
//! nested calls (spec §4.8): access list, transient storage, the
//! selfdestruct set, the (never-reverted) created-accounts set, logs, the
//! gas refund counter, and the host-backed mutations (balance/nonce/code/
//! persistent storage) a call or its descendants have made.
//!
//! A mutation through `Substate` is recorded into *every* backup frame
//! currently on the stack the first time that frame sees it — so a revert
//! at any nesting level restores state changed by any descendant, per the
//! "Balance snapshot stack" design note.

use crate::access_list::{AccessList, AccessListSnapshot};
use crate::host::{Host, HostError};
use crate::storage::Storage;
use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<U256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
struct CallFrameBackup {
    access_list: Option<AccessListSnapshot>,
    transient: Option<FxHashMap<(Address, H256), U256>>,
    selfdestruct: Option<FxHashSet<Address>>,
    logs_len: usize,
    refund_counter: u64,
    original_balance: FxHashMap<Address, U256>,
    original_nonce: FxHashMap<Address, u64>,
    original_code: FxHashMap<Address, Bytes>,
    original_storage: FxHashMap<(Address, H256), U256>,
}

#[derive(Debug, Clone, Default)]
pub struct Substate {
    pub access_list: AccessList,
    pub storage: Storage,
    selfdestruct: FxHashSet<Address>,
    /// EIP-6780: addresses created in the current transaction. Membership
    /// is never cleared by revert.
    created_accounts: FxHashSet<Address>,
    logs: Vec<LogRecord>,
    refund_counter: u64,
    backups: Vec<CallFrameBackup>,
}

impl Substate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warms the sender, the coinbase, precompile addresses and the
    /// EIP-2930 access list before the root frame starts executing.
    pub fn initialize(
        &mut self,
        sender: Address,
        coinbase: Address,
        precompiles: impl IntoIterator<Item = Address>,
        eip2930_access_list: impl IntoIterator<Item = (Address, Vec<H256>)>,
    ) {
        self.access_list.pre_warm_addresses([sender, coinbase]);
        self.access_list.pre_warm_addresses(precompiles);
        self.access_list.pre_warm_from_access_list(eip2930_access_list);
    }

    // ---- selfdestruct / created-accounts -------------------------------

    pub fn add_selfdestruct(&mut self, address: Address) {
        self.selfdestruct.insert(address);
    }

    pub fn is_selfdestruct(&self, address: Address) -> bool {
        self.selfdestruct.contains(&address)
    }

    pub fn add_created_account(&mut self, address: Address) {
        self.created_accounts.insert(address);
    }

    pub fn is_account_created(&self, address: Address) -> bool {
        self.created_accounts.contains(&address)
    }

    // ---- logs ------------------------------------------------------------

    pub fn add_log(&mut self, log: LogRecord) {
        self.logs.push(log);
    }

    pub fn extract_logs(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.logs)
    }

    // ---- refund counter ---------------------------------------------------

    pub fn refund_counter(&self) -> u64 {
        self.refund_counter
    }

    pub fn add_refund(&mut self, amount: u64) {
        self.refund_counter = self.refund_counter.saturating_add(amount);
    }

    pub fn sub_refund(&mut self, amount: u64) {
        self.refund_counter = self.refund_counter.saturating_sub(amount);
    }

    // ---- transient storage passthrough ------------------------------------

    pub fn tload(&self, address: Address, slot: H256) -> U256 {
        self.storage.tload(address, slot)
    }

    pub fn tstore(&mut self, address: Address, slot: H256, value: U256) {
        self.storage.tstore(address, slot, value);
    }

    pub fn clear_transient(&mut self) {
        self.storage.clear_transient();
    }

    // ---- host-backed mutations, recorded for revert -----------------------

    pub fn set_balance(
        &mut self,
        host: &mut dyn Host,
        address: Address,
        new_value: U256,
    ) -> Result<(), HostError> {
        let old = host.get_balance(address)?;
        for backup in self.backups.iter_mut() {
            backup.original_balance.entry(address).or_insert(old);
        }
        host.set_balance(address, new_value)
    }

    pub fn set_nonce(
        &mut self,
        host: &mut dyn Host,
        address: Address,
        new_nonce: u64,
    ) -> Result<(), HostError> {
        let old = host.get_nonce(address)?;
        for backup in self.backups.iter_mut() {
            backup.original_nonce.entry(address).or_insert(old);
        }
        host.set_nonce(address, new_nonce)
    }

    pub fn set_code(
        &mut self,
        host: &mut dyn Host,
        address: Address,
        new_code: Bytes,
    ) -> Result<(), HostError> {
        let old = host.get_code(address)?;
        for backup in self.backups.iter_mut() {
            backup
                .original_code
                .entry(address)
                .or_insert_with(|| old.clone());
        }
        host.set_code(address, new_code)
    }

    /// Persistent SSTORE effect: updates `original` (net-gas bookkeeping,
    /// via `Storage::sload`) and records the pre-image in every open
    /// backup frame, then writes through to the host.
    pub fn set_storage(
        &mut self,
        host: &mut dyn Host,
        address: Address,
        slot: H256,
        new_value: U256,
    ) -> Result<(), HostError> {
        let old = self.storage.sload(host, address, slot)?;
        for backup in self.backups.iter_mut() {
            backup.original_storage.entry((address, slot)).or_insert(old);
        }
        self.storage.sstore(host, address, slot, new_value)
    }

    // ---- snapshot / revert protocol (spec §4.8) ----------------------------

    /// Pushes a fresh backup frame before entering a nested call. In-memory
    /// pieces (access list, transient storage, selfdestruct set) are
    /// captured eagerly; host-backed pieces (balance/nonce/code/storage)
    /// are captured lazily, the first time each is mutated while this frame
    /// is the innermost one.
    pub fn push_backup(&mut self) {
        self.backups.push(CallFrameBackup {
            access_list: Some(self.access_list.snapshot()),
            transient: Some(self.storage.snapshot_transient()),
            selfdestruct: Some(self.selfdestruct.clone()),
            logs_len: self.logs.len(),
            refund_counter: self.refund_counter,
            ..Default::default()
        });
    }

    /// The nested call succeeded: discard this frame's backup. Host-backed
    /// deltas were already propagated into every still-open ancestor frame
    /// at mutation time, so there is nothing left to merge.
    pub fn commit_backup(&mut self) {
        self.backups.pop();
    }

    /// The nested call failed or reverted: undo every mutation recorded
    /// since `push_backup`, including everything any descendant did.
    pub fn revert_backup(&mut self, host: &mut dyn Host) -> Result<(), HostError> {
        let Some(backup) = self.backups.pop() else {
            return Ok(());
        };
        if let Some(snapshot) = backup.access_list {
            self.access_list.restore(snapshot);
        }
        if let Some(transient) = backup.transient {
            self.storage.restore_transient(transient);
        }
        if let Some(selfdestruct) = backup.selfdestruct {
            self.selfdestruct = selfdestruct;
        }
        self.logs.truncate(backup.logs_len);
        self.refund_counter = backup.refund_counter;

        for (address, balance) in backup.original_balance {
            host.set_balance(address, balance)?;
        }
        for (address, nonce) in backup.original_nonce {
            host.set_nonce(address, nonce)?;
        }
        for (address, code) in backup.original_code {
            host.set_code(address, code)?;
        }
        for ((address, slot), value) in backup.original_storage {
            host.set_storage(address, slot, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDatabase;

    #[test]
    fn revert_restores_balance_storage_and_selfdestruct_but_not_created_accounts() {
        let mut db = InMemoryDatabase::new();
        let mut sub = Substate::new();
        let addr = Address::repeat_byte(1);
        let new_addr = Address::repeat_byte(2);

        sub.set_balance(&mut db, addr, U256::from(100)).unwrap();
        sub.set_storage(&mut db, addr, H256::zero(), U256::from(100))
            .unwrap();

        sub.push_backup();
        sub.add_created_account(new_addr);
        sub.set_balance(&mut db, addr, U256::from(200)).unwrap();
        sub.set_storage(&mut db, addr, H256::zero(), U256::from(200))
            .unwrap();
        sub.add_selfdestruct(addr);
        sub.add_refund(100);

        sub.revert_backup(&mut db).unwrap();

        assert_eq!(db.get_balance(addr).unwrap(), U256::from(100));
        assert_eq!(db.get_storage(addr, H256::zero()).unwrap(), U256::from(100));
        assert!(!sub.is_selfdestruct(addr));
        assert_eq!(sub.refund_counter(), 0);
        // EIP-6780 exception: created_accounts survives revert.
        assert!(sub.is_account_created(new_addr));
    }

    #[test]
    fn nested_revert_sees_grandchild_mutation() {
        let mut db = InMemoryDatabase::new();
        let mut sub = Substate::new();
        let addr = Address::repeat_byte(3);
        sub.set_balance(&mut db, addr, U256::from(10)).unwrap();

        sub.push_backup(); // outer
        sub.push_backup(); // inner
        sub.set_balance(&mut db, addr, U256::from(999)).unwrap();
        sub.revert_backup(&mut db).unwrap(); // inner reverts
        assert_eq!(db.get_balance(addr).unwrap(), U256::from(10));

        sub.push_backup();
        sub.set_balance(&mut db, addr, U256::from(500)).unwrap();
        sub.commit_backup();
        sub.revert_backup(&mut db).unwrap(); // outer reverts, must still see 500 -> 10
        assert_eq!(db.get_balance(addr).unwrap(), U256::from(10));
    }
}
