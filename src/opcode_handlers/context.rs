//! Environmental Information (spec §4.6 "Context"): ADDRESS, BALANCE, ORIGIN,
//! CALLER, CALLVALUE, CALLDATALOAD, CALLDATASIZE, CALLDATACOPY, CODESIZE,
//! CODECOPY, GASPRICE, EXTCODESIZE, EXTCODECOPY, RETURNDATASIZE,
//! RETURNDATACOPY, EXTCODEHASH, SELFBALANCE.

use super::advance;
use crate::errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcodes::Opcode;
use crate::utils::{address_to_u256, size_offset_to_usize, u256_to_address, u256_to_usize};
use crate::vm::{keccak256, VM};
use ethereum_types::U256;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::ADDRESS => address(vm),
        Opcode::BALANCE => balance(vm),
        Opcode::ORIGIN => origin(vm),
        Opcode::CALLER => caller(vm),
        Opcode::CALLVALUE => callvalue(vm),
        Opcode::CALLDATALOAD => calldataload(vm),
        Opcode::CALLDATASIZE => calldatasize(vm),
        Opcode::CALLDATACOPY => calldatacopy(vm),
        Opcode::CODESIZE => codesize(vm),
        Opcode::CODECOPY => codecopy(vm),
        Opcode::GASPRICE => gasprice(vm),
        Opcode::EXTCODESIZE => extcodesize(vm),
        Opcode::EXTCODECOPY => extcodecopy(vm),
        Opcode::RETURNDATASIZE => returndatasize(vm),
        Opcode::RETURNDATACOPY => returndatacopy(vm),
        Opcode::EXTCODEHASH => extcodehash(vm),
        Opcode::SELFBALANCE => selfbalance(vm),
        _ => Err(InternalError::Conversion.into()),
    }
}

fn address(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::ADDRESS)?;
    let frame = vm.current_frame()?;
    let to = frame.to;
    frame.stack.push(address_to_u256(to))?;
    advance(vm)
}

fn balance(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let address = u256_to_address(frame.stack.pop1()?);
    let cold = vm.access_address(address);
    vm.charge_gas(gas_cost::balance(vm.fork(), cold))?;
    let balance = vm.get_balance(address)?;
    vm.current_frame()?.stack.push(balance)?;
    advance(vm)
}

fn origin(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::ORIGIN)?;
    let origin = vm.env.tx.origin;
    vm.current_frame()?.stack.push(address_to_u256(origin))?;
    advance(vm)
}

fn caller(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::CALLER)?;
    let frame = vm.current_frame()?;
    let sender = frame.msg_sender;
    frame.stack.push(address_to_u256(sender))?;
    advance(vm)
}

fn callvalue(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::CALLVALUE)?;
    let frame = vm.current_frame()?;
    let value = frame.value;
    frame.stack.push(value)?;
    advance(vm)
}

fn calldataload(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::CALLDATALOAD)?;
    let frame = vm.current_frame()?;
    let offset = frame.stack.pop1()?;
    let calldata_len = frame.calldata.len();

    let offset = match u256_to_usize(offset) {
        Ok(offset) if offset <= calldata_len => offset,
        _ => {
            frame.stack.push(U256::zero())?;
            return advance(vm);
        }
    };

    let mut word = [0u8; 32];
    let available = calldata_len.checked_sub(offset).ok_or(InternalError::Underflow)?;
    let copy_len = available.min(32);
    let end = offset.checked_add(copy_len).ok_or(InternalError::Overflow)?;
    #[allow(clippy::indexing_slicing)]
    let src = &frame.calldata[offset..end];
    #[allow(clippy::indexing_slicing)]
    word[..copy_len].copy_from_slice(src);

    frame.stack.push(U256::from_big_endian(&word))?;
    advance(vm)
}

fn calldatasize(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::CALLDATASIZE)?;
    let frame = vm.current_frame()?;
    let size = frame.calldata.len();
    frame.stack.push(U256::from(size))?;
    advance(vm)
}

fn calldatacopy(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [dest_offset, data_offset, size] = frame.stack.pop::<3>()?;
    let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
    let data_offset = u256_to_usize(data_offset).unwrap_or(usize::MAX);

    let new_size = calculate_memory_size(dest_offset, size)?;
    vm.charge_gas(gas_cost::calldatacopy(new_size, frame.memory.len(), size)?)?;
    if size == 0 {
        return advance(vm);
    }

    let frame = vm.current_frame()?;
    let calldata_len = frame.calldata.len();
    if data_offset >= calldata_len {
        frame.memory.store_data_zero_padded(dest_offset, &[], size)?;
        return advance(vm);
    }
    let available = calldata_len.checked_sub(data_offset).ok_or(InternalError::Underflow)?;
    let copy_size = size.min(available);
    let end = data_offset.checked_add(copy_size).ok_or(InternalError::Overflow)?;
    #[allow(clippy::indexing_slicing)]
    let src = frame.calldata[data_offset..end].to_vec();
    frame.memory.store_data_zero_padded(dest_offset, &src, size)?;
    advance(vm)
}

fn codesize(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::CODESIZE)?;
    let frame = vm.current_frame()?;
    let size = frame.bytecode.len();
    frame.stack.push(U256::from(size))?;
    advance(vm)
}

fn codecopy(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [dest_offset, code_offset, size] = frame.stack.pop::<3>()?;
    let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
    let code_offset = u256_to_usize(code_offset).unwrap_or(usize::MAX);

    let new_size = calculate_memory_size(dest_offset, size)?;
    vm.charge_gas(gas_cost::codecopy(new_size, frame.memory.len(), size)?)?;
    if size == 0 {
        return advance(vm);
    }

    let frame = vm.current_frame()?;
    let code_len = frame.bytecode.len();
    let slice = if code_offset < code_len {
        let available = code_len.checked_sub(code_offset).ok_or(InternalError::Underflow)?;
        let copy_size = size.min(available);
        let end = code_offset.checked_add(copy_size).ok_or(InternalError::Overflow)?;
        #[allow(clippy::indexing_slicing)]
        frame.bytecode.as_bytes()[code_offset..end].to_vec()
    } else {
        Vec::new()
    };
    frame.memory.store_data_zero_padded(dest_offset, &slice, size)?;
    advance(vm)
}

fn gasprice(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::GASPRICE)?;
    let price = vm.env.tx.gas_price;
    vm.current_frame()?.stack.push(price)?;
    advance(vm)
}

fn extcodesize(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let address = u256_to_address(frame.stack.pop1()?);
    let cold = vm.access_address(address);
    vm.charge_gas(gas_cost::extcodesize(vm.fork(), cold))?;
    let code = vm.resolved_code(address)?;
    vm.current_frame()?.stack.push(U256::from(code.len()))?;
    advance(vm)
}

fn extcodecopy(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [address, dest_offset, code_offset, size] = frame.stack.pop::<4>()?;
    let address = u256_to_address(address);
    let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
    let code_offset = u256_to_usize(code_offset).unwrap_or(usize::MAX);

    let current_size = frame.memory.len();
    let cold = vm.access_address(address);
    let new_size = calculate_memory_size(dest_offset, size)?;
    vm.charge_gas(gas_cost::extcodecopy(vm.fork(), cold, new_size, current_size, size)?)?;
    if size == 0 {
        return advance(vm);
    }

    let code = vm.resolved_code(address)?;
    let code_len = code.len();
    let slice = if code_offset < code_len {
        let available = code_len.checked_sub(code_offset).ok_or(InternalError::Underflow)?;
        let copy_size = size.min(available);
        let end = code_offset.checked_add(copy_size).ok_or(InternalError::Overflow)?;
        #[allow(clippy::indexing_slicing)]
        code[code_offset..end].to_vec()
    } else {
        Vec::new()
    };
    vm.current_frame()?.memory.store_data_zero_padded(dest_offset, &slice, size)?;
    advance(vm)
}

fn returndatasize(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::RETURNDATASIZE)?;
    let frame = vm.current_frame()?;
    let size = frame.sub_return_data.len();
    frame.stack.push(U256::from(size))?;
    advance(vm)
}

fn returndatacopy(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [dest_offset, data_offset, size] = frame.stack.pop::<3>()?;
    let (dest_offset, size) = size_offset_to_usize(dest_offset, size)?;
    let data_offset = u256_to_usize(data_offset)?;

    let new_size = calculate_memory_size(dest_offset, size)?;
    vm.charge_gas(gas_cost::returndatacopy(new_size, frame.memory.len(), size)?)?;

    let frame = vm.current_frame()?;
    let return_data_len = frame.sub_return_data.len();
    let end = data_offset.checked_add(size).ok_or(ExceptionalHalt::OutOfBounds)?;
    if end > return_data_len {
        return Err(ExceptionalHalt::OutOfBounds.into());
    }
    #[allow(clippy::indexing_slicing)]
    let slice = frame.sub_return_data[data_offset..end].to_vec();
    frame.memory.store_data(dest_offset, &slice)?;
    advance(vm)
}

fn extcodehash(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let address = u256_to_address(frame.stack.pop1()?);
    let cold = vm.access_address(address);
    vm.charge_gas(gas_cost::extcodehash(vm.fork(), cold))?;

    let info = vm.account_info(address)?;
    if info.is_empty() {
        vm.current_frame()?.stack.push(U256::zero())?;
        return advance(vm);
    }
    let hash = keccak256(&info.code);
    vm.current_frame()?.stack.push(U256::from_big_endian(&hash))?;
    advance(vm)
}

fn selfbalance(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::SELFBALANCE)?;
    let to = vm.current_frame()?.to;
    let balance = vm.get_balance(to)?;
    vm.current_frame()?.stack.push(balance)?;
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
    fn calldataload_zero_pads_past_the_end() {
        // PUSH1 31, CALLDATALOAD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x1F, 0x35, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
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
                input: Bytes::from_static(&[0xFFu8; 32]),
            })
            .unwrap();
        assert!(result.success);
        // Byte 31 of calldata is the last 0xFF; bytes 1..31 of output are zero-padded.
        let mut expected = [0u8; 32];
        expected[0] = 0xFF;
        assert_eq!(&result.output[..], &expected[..]);
    }
}
