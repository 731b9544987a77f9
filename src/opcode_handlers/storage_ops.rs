//! Storage (spec §4.6 "Storage"): SLOAD, SSTORE, TLOAD, TSTORE.

use super::advance;
use crate::environment::Fork;
use crate::errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError};
use crate::gas_cost::{self, SSTORE_SENTRY_GAS};
use crate::opcodes::Opcode;
use crate::utils::u256_to_h256;
use crate::vm::VM;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::SLOAD => sload(vm),
        Opcode::SSTORE => sstore(vm),
        Opcode::TLOAD => tload(vm),
        Opcode::TSTORE => tstore(vm),
        _ => Err(InternalError::Conversion.into()),
    }
}

fn sload(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let slot = u256_to_h256(frame.stack.pop1()?);
    let address = frame.to;

    let cold = vm.access_storage_slot(address, slot);
    vm.charge_gas(gas_cost::sload_base(vm.fork(), cold))?;

    let value = vm.sload(address, slot)?;
    vm.current_frame()?.stack.push(value)?;
    advance(vm)
}

/// EIP-2200/2929/3529 net-gas accounting: cost depends on how `new` relates
/// to both the start-of-transaction (`original`) and pre-write (`current`)
/// values; pre-Istanbul forks use the flat legacy schedule instead.
fn sstore(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;
    let fork = vm.fork();
    let frame = vm.current_frame()?;

    if fork.is_at_least(Fork::Istanbul) && frame.gas_remaining <= SSTORE_SENTRY_GAS {
        return Err(ExceptionalHalt::OutOfGas.into());
    }

    let [slot, value] = frame.stack.pop::<2>()?;
    let slot = u256_to_h256(slot);
    let address = frame.to;

    let cold = vm.access_storage_slot(address, slot);
    let current = vm.sload(address, slot)?;
    let original = vm.substate.storage.original(address, slot).unwrap_or(current);

    let cost = if fork.is_at_least(Fork::Istanbul) {
        gas_cost::sstore(original, current, value, fork, cold)?
    } else {
        gas_cost::sstore_legacy(current, value)
    };
    vm.charge_gas(cost)?;

    let refund_delta = if fork.is_at_least(Fork::Istanbul) {
        gas_cost::sstore_refund_delta(original, current, value)
    } else if !current.is_zero() && value.is_zero() {
        i64::try_from(gas_cost::SSTORE_LEGACY_CLEAR_REFUND).unwrap_or(0)
    } else {
        0
    };
    apply_refund(vm, refund_delta);

    vm.sstore(address, slot, value)?;
    advance(vm)
}

fn apply_refund(vm: &mut VM, delta: i64) {
    if delta >= 0 {
        #[allow(clippy::as_conversions)]
        vm.substate.add_refund(delta as u64);
    } else {
        #[allow(clippy::as_conversions)]
        vm.substate.sub_refund(delta.unsigned_abs());
    }
}

fn tload(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::TLOAD)?;
    let frame = vm.current_frame()?;
    let slot = u256_to_h256(frame.stack.pop1()?);
    let address = frame.to;
    let value = vm.substate.tload(address, slot);
    vm.current_frame()?.stack.push(value)?;
    advance(vm)
}

fn tstore(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;
    vm.charge_gas(gas_cost::TSTORE)?;
    let frame = vm.current_frame()?;
    let [slot, value] = frame.stack.pop::<2>()?;
    let slot = u256_to_h256(slot);
    let address = frame.to;
    vm.substate.tstore(address, slot, value);
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
    use ethereum_types::{Address, U256};

    #[test]
    fn transient_storage_does_not_survive_as_persistent() {
        // PUSH1 7, PUSH1 0, TSTORE, PUSH1 0, TLOAD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [
            0x60, 0x07, 0x60, 0x00, 0x5D, 0x60, 0x00, 0x5C, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60,
            0x00, 0xF3,
        ];
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
        let mut expected = [0u8; 32];
        expected[31] = 7;
        assert_eq!(&result.output[..], &expected[..]);
        // Transient storage never reaches the persistent host backend.
        assert!(vm.get_balance(to).is_ok());
    }
}
