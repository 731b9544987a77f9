//! Logging (spec §4.6 "Log"): LOG0..LOG4.

use super::advance;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::memory::calculate_memory_size;
use crate::opcodes::Opcode;
use crate::substate::LogRecord;
use crate::utils::size_offset_to_usize;
use crate::vm::VM;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    let topic_count = match opcode {
        Opcode::LOG0 => 0,
        Opcode::LOG1 => 1,
        Opcode::LOG2 => 2,
        Opcode::LOG3 => 3,
        Opcode::LOG4 => 4,
        _ => return Err(InternalError::Conversion.into()),
    };
    log(vm, topic_count)
}

fn log(vm: &mut VM, topic_count: usize) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;
    let frame = vm.current_frame()?;
    let [offset, size] = frame.stack.pop::<2>()?;
    let (offset, size) = size_offset_to_usize(offset, size)?;

    let mut topics = Vec::with_capacity(topic_count);
    for _ in 0..topic_count {
        topics.push(frame.stack.pop1()?);
    }

    let current_size = frame.memory.len();
    let new_size = calculate_memory_size(offset, size)?;
    vm.charge_gas(gas_cost::log(new_size, current_size, size, topic_count)?)?;

    let frame = vm.current_frame()?;
    let data = frame.memory.load_range(offset, size)?;
    let address = frame.to;
    vm.substate.add_log(LogRecord { address, topics, data });
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
    fn log0_with_empty_data_succeeds_outside_a_static_context() {
        // PUSH1 0, PUSH1 0, LOG0, STOP
        let code = [0x60, 0x00, 0x60, 0x00, 0xA0, 0x00];
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
    }
}
