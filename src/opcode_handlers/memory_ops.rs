//! Memory opcodes (spec §4.6 "Memory"): MLOAD, MSTORE, MSTORE8, MSIZE, MCOPY.

use super::advance;
use crate::constants::WORD_SIZE;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcodes::Opcode;
use crate::utils::u256_to_usize;
use crate::vm::VM;
use ethereum_types::U256;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::MLOAD => mload(vm),
        Opcode::MSTORE => mstore(vm),
        Opcode::MSTORE8 => mstore8(vm),
        Opcode::MSIZE => msize(vm),
        Opcode::MCOPY => mcopy(vm),
        _ => Err(InternalError::Conversion.into()),
    }
}

fn mload(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let offset = u256_to_usize(frame.stack.pop1()?)?;

    let new_size = calculate_memory_size(offset, WORD_SIZE)?;
    vm.charge_gas(gas_cost::exit_opcode(new_size, frame.memory.len())?.saturating_add(gas_cost::MLOAD))?;

    let frame = vm.current_frame()?;
    let value = frame.memory.load_word(offset)?;
    frame.stack.push(value)?;
    advance(vm)
}

fn mstore(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [offset, value] = frame.stack.pop::<2>()?;
    let offset = u256_to_usize(offset)?;

    let new_size = calculate_memory_size(offset, WORD_SIZE)?;
    vm.charge_gas(gas_cost::exit_opcode(new_size, frame.memory.len())?.saturating_add(gas_cost::MSTORE))?;

    vm.current_frame()?.memory.store_word(offset, value)?;
    advance(vm)
}

fn mstore8(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [offset, value] = frame.stack.pop::<2>()?;
    let offset = u256_to_usize(offset)?;

    let new_size = calculate_memory_size(offset, 1)?;
    vm.charge_gas(gas_cost::exit_opcode(new_size, frame.memory.len())?.saturating_add(gas_cost::MSTORE8))?;

    let byte = value.byte(0);
    vm.current_frame()?.memory.store_data(offset, &[byte])?;
    advance(vm)
}

fn msize(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::MSIZE)?;
    let frame = vm.current_frame()?;
    let size = frame.memory.len();
    frame.stack.push(U256::from(size))?;
    advance(vm)
}

fn mcopy(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [dest_offset, src_offset, size] = frame.stack.pop::<3>()?;
    let dest_offset = u256_to_usize(dest_offset)?;
    let src_offset = u256_to_usize(src_offset)?;
    let size = u256_to_usize(size)?;

    let current_size = frame.memory.len();
    let highest = dest_offset.max(src_offset);
    let new_size = calculate_memory_size(highest, size)?;
    vm.charge_gas(gas_cost::mcopy(new_size, current_size, size)?)?;

    if size == 0 {
        return advance(vm);
    }
    vm.current_frame()?.memory.copy_within(src_offset, dest_offset, size)?;
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
    fn mstore8_only_writes_the_low_byte() {
        // PUSH2 0xAABB, PUSH1 0, MSTORE8, PUSH1 32, PUSH1 0, RETURN
        let code = [0x61, 0xAA, 0xBB, 0x60, 0x00, 0x53, 0x60, 0x20, 0x60, 0x00, 0xF3];
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
        expected[0] = 0xBB;
        assert_eq!(&result.output[..], &expected[..]);
    }

    #[test]
    fn mcopy_handles_forward_overlap() {
        // PUSH1 4, PUSH1 0, PUSH1 2, MCOPY, PUSH1 32, PUSH1 0, RETURN, with
        // memory pre-seeded via MSTORE of a known word at offset 0.
        let code = [
            0x7F, // PUSH32
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5,
            6, 7, 8, 0x60, 0x00, 0x52, // MSTORE at 0
            0x60, 0x04, 0x60, 0x02, 0x60, 0x00, 0x5E, // PUSH1 4, PUSH1 2, PUSH1 0, MCOPY(dest=0,src=2,size=4)
            0x60, 0x20, 0x60, 0x00, 0xF3,
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
        assert_eq!(&result.output[28..32], &[3, 4, 5, 6]);
    }
}
