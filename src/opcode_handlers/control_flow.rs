//! Control flow (spec §4.6 "Control Flow"): STOP, JUMP, JUMPI, PC, JUMPDEST,
//! GAS.

use super::advance;
use crate::errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcodes::Opcode;
use crate::utils::u256_to_usize;
use crate::vm::VM;
use ethereum_types::U256;

pub fn stop(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    let frame = vm.current_frame()?;
    frame.stopped = true;
    Ok(OpcodeResult::Halt)
}

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::JUMP => jump(vm),
        Opcode::JUMPI => jumpi(vm),
        Opcode::PC => pc(vm),
        Opcode::JUMPDEST => jumpdest(vm),
        Opcode::GAS => gas(vm),
        _ => Err(InternalError::Conversion.into()),
    }
}

fn jump(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::JUMP)?;
    let frame = vm.current_frame()?;
    let dest = frame.stack.pop1()?;
    let offset = u256_to_usize(dest).map_err(|_| ExceptionalHalt::InvalidJump)?;
    if !frame.bytecode.is_valid_jumpdest(offset) {
        return Err(ExceptionalHalt::InvalidJump.into());
    }
    frame.pc = offset;
    Ok(OpcodeResult::Continue)
}

fn jumpi(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::JUMPI)?;
    let frame = vm.current_frame()?;
    let [dest, condition] = frame.stack.pop::<2>()?;

    if condition.is_zero() {
        return advance(vm);
    }

    let offset = u256_to_usize(dest).map_err(|_| ExceptionalHalt::InvalidJump)?;
    if !frame.bytecode.is_valid_jumpdest(offset) {
        return Err(ExceptionalHalt::InvalidJump.into());
    }
    frame.pc = offset;
    Ok(OpcodeResult::Continue)
}

fn pc(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::PC)?;
    let frame = vm.current_frame()?;
    let pc = frame.pc;
    frame.stack.push(U256::from(pc))?;
    advance(vm)
}

fn jumpdest(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::JUMPDEST)?;
    advance(vm)
}

fn gas(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::GAS)?;
    let frame = vm.current_frame()?;
    let remaining = u64::try_from(frame.gas_remaining).unwrap_or(0);
    frame.stack.push(U256::from(remaining))?;
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
    fn jump_into_push_immediate_is_invalid() {
        // PUSH1 0x5B, PUSH1 1, JUMP (jumps into the immediate byte of PUSH1 0x5B)
        let code = [0x60, 0x5B, 0x60, 0x01, 0x56];
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
    }

    #[test]
    fn jumpi_skips_the_branch_when_condition_is_zero() {
        // PUSH1 0, PUSH1 6, JUMPI, STOP, JUMPDEST, PUSH1 1, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [
            0x60, 0x00, 0x60, 0x06, 0x57, 0x00, 0x5B, 0x60, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20,
            0x60, 0x00, 0xF3,
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
        // Condition is zero, so the JUMPI falls through into STOP at pc=5
        // rather than jumping to the JUMPDEST at pc=6; output is empty.
        assert!(result.success);
        assert!(result.output.is_empty());
    }
}
