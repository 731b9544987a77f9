//! KECCAK256 (spec §4.6 "Keccak").

use super::advance;
use crate::errors::{OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::utils::size_offset_to_usize;
use crate::vm::{keccak256 as hash, VM};
use ethereum_types::U256;

pub fn keccak256(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    let [offset, size] = frame.stack.pop::<2>()?;
    let (offset, size) = size_offset_to_usize(offset, size)?;

    let current_size = frame.memory.len();
    let new_size = calculate_memory_size(offset, size)?;
    vm.charge_gas(gas_cost::keccak256(new_size, current_size, size)?)?;

    let frame = vm.current_frame()?;
    let data = frame.memory.load_range(offset, size)?;
    let digest = hash(&data);
    frame.stack.push(U256::from_big_endian(&digest))?;
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
    fn keccak256_of_empty_range_matches_known_hash() {
        // PUSH1 0, PUSH1 0, KECCAK256, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x00, 0x60, 0x00, 0x20, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
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
        let expected = hash(&[]);
        assert_eq!(&result.output[..], &expected[..]);
    }
}
