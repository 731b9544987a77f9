//! Block Information (spec §4.6 "Block"): BLOCKHASH, COINBASE, TIMESTAMP,
//! NUMBER, PREVRANDAO, GASLIMIT, CHAINID, BASEFEE, BLOBHASH, BLOBBASEFEE.

use super::advance;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcodes::Opcode;
use crate::utils::{address_to_u256, u256_to_usize};
use crate::vm::VM;
use ethereum_types::{H256, U256};

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::BLOCKHASH => blockhash(vm),
        Opcode::COINBASE => context_push(vm, |vm| address_to_u256(vm.env.block.coinbase)),
        Opcode::TIMESTAMP => context_push(vm, |vm| vm.env.block.timestamp),
        Opcode::NUMBER => context_push(vm, |vm| vm.env.block.number),
        Opcode::PREVRANDAO => context_push(vm, |vm| vm.env.block.prev_randao_or_difficulty),
        Opcode::GASLIMIT => context_push(vm, |vm| vm.env.block.gas_limit),
        Opcode::CHAINID => context_push(vm, |vm| U256::from(vm.env.config.chain_id)),
        Opcode::BASEFEE => context_push(vm, |vm| vm.env.block.base_fee_per_gas),
        Opcode::BLOBBASEFEE => context_push(vm, |vm| vm.env.block.blob_base_fee),
        Opcode::BLOBHASH => blobhash(vm),
        _ => Err(InternalError::Conversion.into()),
    }
}

fn context_push(vm: &mut VM, value: impl FnOnce(&VM) -> U256) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::BLOCK_CONTEXT)?;
    let value = value(vm);
    vm.current_frame()?.stack.push(value)?;
    advance(vm)
}

/// Returns the hash of one of the 256 most recent complete blocks, or zero
/// if the requested number falls outside that window or isn't known to the
/// caller-supplied [`crate::environment::BlockEnv::block_hashes`] map.
fn blockhash(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::BLOCKHASH)?;
    let frame = vm.current_frame()?;
    let number = frame.stack.pop1()?;

    let hash = match u256_to_usize(number) {
        Ok(number) => {
            let number = u64::try_from(number).unwrap_or(u64::MAX);
            vm.env.block.block_hashes.get(&number).copied().unwrap_or(H256::zero())
        }
        Err(_) => H256::zero(),
    };

    vm.current_frame()?.stack.push(U256::from_big_endian(hash.as_bytes()))?;
    advance(vm)
}

/// EIP-4844: the versioned hash at `index` within the transaction's blob
/// hash list, or zero if `index` is out of range.
fn blobhash(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::BLOCK_CONTEXT)?;
    let frame = vm.current_frame()?;
    let index = frame.stack.pop1()?;

    let hash = match u256_to_usize(index) {
        Ok(index) => vm.env.block.blob_hashes.get(index).copied().unwrap_or(H256::zero()),
        Err(_) => H256::zero(),
    };

    vm.current_frame()?.stack.push(U256::from_big_endian(hash.as_bytes()))?;
    advance(vm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountInfo;
    use crate::environment::Environment;
    use crate::host::InMemoryDatabase;
    use crate::vm::CallParams;
    use bytes::Bytes;
    use ethereum_types::Address;

    #[test]
    fn blockhash_outside_window_is_zero() {
        // PUSH1 5, BLOCKHASH, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x05, 0x40, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
        let to = Address::repeat_byte(1);
        let mut db = InMemoryDatabase::new();
        db.set_account(to, AccountInfo { code: Bytes::copy_from_slice(&code), ..Default::default() });
        let mut vm = VM::new(Box::new(db), Environment::default());
        let result = vm
            .transact(CallParams::Call {
                caller: Address::repeat_byte(2),
                to,
                value: U256::zero(),
                gas: 1_000_000,
                input: Bytes::new(),
            })
            .unwrap();
        assert!(result.success);
        assert_eq!(&result.output[..], &[0u8; 32][..]);
    }

    #[test]
    fn blockhash_resolves_a_populated_entry() {
        let code = [0x60, 0x05, 0x40, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
        let to = Address::repeat_byte(1);
        let mut db = InMemoryDatabase::new();
        db.set_account(to, AccountInfo { code: Bytes::copy_from_slice(&code), ..Default::default() });
        let mut env = Environment::default();
        env.block.block_hashes.insert(5, H256::repeat_byte(0xAB));
        let mut vm = VM::new(Box::new(db), env);
        let result = vm
            .transact(CallParams::Call {
                caller: Address::repeat_byte(2),
                to,
                value: U256::zero(),
                gas: 1_000_000,
                input: Bytes::new(),
            })
            .unwrap();
        assert!(result.success);
        assert_eq!(&result.output[..], &[0xABu8; 32][..]);
    }
}
