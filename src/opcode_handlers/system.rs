//! System operations (spec §4.6 "System"): CREATE, CALL, CALLCODE, RETURN,
//! DELEGATECALL, CREATE2, STATICCALL, REVERT, SELFDESTRUCT.

use super::advance;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost::{self, CALL_POSITIVE_VALUE, CALL_POSITIVE_VALUE_STIPEND, CALL_TO_EMPTY_ACCOUNT};
use crate::memory::calculate_memory_size;
use crate::opcodes::Opcode;
use crate::utils::{size_offset_to_usize, u256_to_address, u256_to_usize};
use crate::vm::{CallKind, VM};
use ethereum_types::U256;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::CREATE => create(vm, None),
        Opcode::CREATE2 => create(vm, Some(())),
        Opcode::CALL => call(vm, CallKind::Call),
        Opcode::CALLCODE => call(vm, CallKind::CallCode),
        Opcode::DELEGATECALL => call(vm, CallKind::DelegateCall),
        Opcode::STATICCALL => call(vm, CallKind::StaticCall),
        Opcode::RETURN => terminate(vm, false),
        Opcode::REVERT => terminate(vm, true),
        Opcode::SELFDESTRUCT => selfdestruct(vm),
        _ => Err(InternalError::Conversion.into()),
    }
}

/// No `require_not_static` for either opcode: both are legal in a static
/// context, REVERT is in fact the vehicle static callees use to signal
/// failure.
fn terminate(vm: &mut VM, is_revert: bool) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [offset, size] = frame.stack.pop::<2>()?;
    let (offset, size) = size_offset_to_usize(offset, size)?;
    let current_size = frame.memory.len();

    let new_size = calculate_memory_size(offset, size)?;
    vm.charge_gas(gas_cost::exit_opcode(new_size, current_size)?)?;

    let frame = vm.current_frame()?;
    let output = frame.memory.load_range(offset, size)?;
    frame.output = output;
    if is_revert {
        frame.reverted = true;
    } else {
        frame.stopped = true;
    }
    Ok(OpcodeResult::Halt)
}

fn create(vm: &mut VM, is_create2: Option<()>) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;
    let fork = vm.fork();
    let frame = vm.current_frame()?;
    let (value, offset, size, salt) = if is_create2.is_some() {
        let [value, offset, size, salt] = frame.stack.pop::<4>()?;
        (value, offset, size, Some(salt))
    } else {
        let [value, offset, size] = frame.stack.pop::<3>()?;
        (value, offset, size, None)
    };
    let offset = u256_to_usize(offset)?;
    let size = u256_to_usize(size)?;
    let current_size = frame.memory.len();

    let new_size = calculate_memory_size(offset, size)?;
    let cost = gas_cost::create(fork, new_size, current_size, size, salt.is_some())?;
    vm.charge_gas(cost)?;

    vm.generic_create(value, offset, size, salt)?;
    advance(vm)
}

/// Static-context value transfer is rejected by `generic_call` itself, not
/// here.
fn call(vm: &mut VM, kind: CallKind) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let has_value = matches!(kind, CallKind::Call | CallKind::CallCode);

    let (gas_from_stack, to, value, args_offset, args_size, ret_offset, ret_size) = if has_value {
        let [gas, address, value, args_offset, args_size, ret_offset, ret_size] = frame.stack.pop::<7>()?;
        (gas, address, value, args_offset, args_size, ret_offset, ret_size)
    } else {
        let [gas, address, args_offset, args_size, ret_offset, ret_size] = frame.stack.pop::<6>()?;
        (gas, address, U256::zero(), args_offset, args_size, ret_offset, ret_size)
    };

    let to = u256_to_address(to);
    let (args_offset, args_size) = size_offset_to_usize(args_offset, args_size)?;
    let (ret_offset, ret_size) = size_offset_to_usize(ret_offset, ret_size)?;

    let current_size = frame.memory.len();
    let cold = vm.access_address(to);

    let args_new = calculate_memory_size(args_offset, args_size)?;
    let ret_new = calculate_memory_size(ret_offset, ret_size)?;
    let new_size = args_new.max(ret_new);
    let memory_cost = gas_cost::exit_opcode(new_size, current_size)?;

    let value_is_zero = value.is_zero();
    let mut call_gas_costs = gas_cost::call_base(vm.fork(), cold)
        .checked_add(memory_cost)
        .ok_or(crate::errors::ExceptionalHalt::OutOfGas)?;

    if matches!(kind, CallKind::Call | CallKind::CallCode) && !value_is_zero {
        call_gas_costs = call_gas_costs
            .checked_add(CALL_POSITIVE_VALUE)
            .ok_or(crate::errors::ExceptionalHalt::OutOfGas)?;
    }
    if kind == CallKind::Call && !value_is_zero && !vm.account_exists(to)? {
        call_gas_costs = call_gas_costs
            .checked_add(CALL_TO_EMPTY_ACCOUNT)
            .ok_or(crate::errors::ExceptionalHalt::OutOfGas)?;
    }

    let gas_left = u64::try_from(vm.current_frame()?.gas_remaining.max(0)).unwrap_or(0);
    let (total_cost, child_gas) = gas_cost::calculate_call_gas_and_cost(
        value_is_zero,
        gas_from_stack,
        gas_left,
        call_gas_costs,
        CALL_POSITIVE_VALUE_STIPEND,
    )?;
    vm.charge_gas(total_cost)?;

    vm.generic_call(kind, child_gas, to, value, args_offset, args_size, ret_offset, ret_size)?;
    advance(vm)
}

/// EIP-6780: past Cancun, SELFDESTRUCT only actually deletes the account
/// (and its balance always moves) when the account was created earlier in
/// this same transaction; otherwise it degrades to a plain balance
/// transfer and the code/storage survive.
fn selfdestruct(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;
    let frame = vm.current_frame()?;
    let beneficiary = u256_to_address(frame.stack.pop1()?);
    let address = frame.to;

    let cold = vm.access_address(beneficiary);
    let beneficiary_is_empty = !vm.account_exists(beneficiary)?;
    let balance = vm.get_balance(address)?;
    vm.charge_gas(gas_cost::selfdestruct(vm.fork(), cold, beneficiary_is_empty, balance)?)?;

    if !balance.is_zero() {
        if beneficiary == address {
            // Burns the balance rather than transferring to self; a same-
            // address `transfer` would net out to a no-op instead.
            vm.set_balance(address, U256::zero())?;
        } else {
            vm.transfer(address, beneficiary, balance)?;
        }
    }

    if vm.fork().is_at_least(crate::environment::Fork::London) {
        // EIP-3529: refund removed.
    } else {
        vm.substate.add_refund(u64::try_from(gas_cost::SELFDESTRUCT_REFUND_PRE_LONDON).unwrap_or(0));
    }

    if vm.substate.is_account_created(address) {
        vm.substate.add_selfdestruct(address);
    } else if vm.fork().is_before(crate::environment::Fork::Cancun) {
        vm.substate.add_selfdestruct(address);
    }

    vm.current_frame()?.stopped = true;
    Ok(OpcodeResult::Halt)
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
    fn create2_address_is_deterministic() {
        let sender = Address::repeat_byte(1);
        let salt = U256::from(42);
        let init = [0x60, 0x00, 0x60, 0x00, 0xF3];
        let a = crate::vm::create2_address(sender, salt, &init);
        let b = crate::vm::create2_address(sender, salt, &init);
        assert_eq!(a, b);
    }

    #[test]
    fn revert_preserves_output_but_fails() {
        // PUSH1 5, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
        let code = [0x60, 0x05, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xFD];
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
        assert!(!result.success);
        assert_eq!(&result.output[..], &[5u8][..]);
    }
}
