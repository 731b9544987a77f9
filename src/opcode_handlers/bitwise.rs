//! Bitwise opcodes (spec §4.6 "Bitwise"): AND..SAR.

use super::advance;
use crate::constants::WORD_SIZE;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcodes::Opcode;
use crate::vm::VM;
use ethereum_types::U256;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::AND => binary(vm, gas_cost::AND, |a, b| a & b),
        Opcode::OR => binary(vm, gas_cost::OR, |a, b| a | b),
        Opcode::XOR => binary(vm, gas_cost::XOR, |a, b| a ^ b),
        Opcode::NOT => unary(vm, gas_cost::NOT, |a| !a),
        Opcode::BYTE => byte(vm),
        Opcode::SHL => binary(vm, gas_cost::SHL, shl),
        Opcode::SHR => binary(vm, gas_cost::SHR, shr),
        Opcode::SAR => binary(vm, gas_cost::SAR, sar),
        _ => Err(InternalError::Conversion.into()),
    }
}

fn binary(vm: &mut VM, cost: u64, op: impl FnOnce(U256, U256) -> U256) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(cost)?;
    let frame = vm.current_frame()?;
    let [a, b] = frame.stack.pop::<2>()?;
    frame.stack.push(op(a, b))?;
    advance(vm)
}

fn unary(vm: &mut VM, cost: u64, op: impl FnOnce(U256) -> U256) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(cost)?;
    let frame = vm.current_frame()?;
    let a = frame.stack.pop1()?;
    frame.stack.push(op(a))?;
    advance(vm)
}

fn byte(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::BYTE)?;
    let frame = vm.current_frame()?;
    let [index, value] = frame.stack.pop::<2>()?;
    frame.stack.push(byte_at(index, value)?)?;
    advance(vm)
}

/// `value`'s `index`-th byte counting from the most-significant end; 0 if
/// `index` falls outside the 32-byte word.
fn byte_at(index: U256, value: U256) -> Result<U256, VMError> {
    match usize::try_from(index) {
        Ok(index) if index < WORD_SIZE => {
            let from_msb = WORD_SIZE
                .checked_sub(index)
                .and_then(|n| n.checked_sub(1))
                .ok_or(InternalError::Underflow)?;
            Ok(U256::from(value.byte(from_msb)))
        }
        _ => Ok(U256::zero()),
    }
}

/// `value << shift`; a `shift` of 256 or more always yields zero, since
/// that's the only case the stack-order args `[shift, value]` leave `<<`
/// safe to call without panicking.
#[allow(clippy::arithmetic_side_effects)]
fn shl(shift: U256, value: U256) -> U256 {
    if shift < U256::from(256) {
        value << shift
    } else {
        U256::zero()
    }
}

#[allow(clippy::arithmetic_side_effects)]
fn shr(shift: U256, value: U256) -> U256 {
    if shift < U256::from(256) {
        value >> shift
    } else {
        U256::zero()
    }
}

/// Arithmetic (sign-preserving) shift right.
#[allow(clippy::arithmetic_side_effects)]
fn sar(shift: U256, value: U256) -> U256 {
    let is_negative = value.bit(255);
    if shift < U256::from(256) {
        if is_negative {
            (value >> shift) | (U256::MAX << (U256::from(256) - shift))
        } else {
            value >> shift
        }
    } else if is_negative {
        U256::MAX
    } else {
        U256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shl_and_shr_saturate_past_256() {
        assert_eq!(shl(U256::from(256), U256::one()), U256::zero());
        assert_eq!(shr(U256::from(300), U256::MAX), U256::zero());
    }

    #[test]
    fn sar_of_negative_one_is_always_negative_one() {
        let minus_one = U256::MAX;
        assert_eq!(sar(U256::from(1), minus_one), U256::MAX);
        assert_eq!(sar(U256::from(300), minus_one), U256::MAX);
    }

    #[test]
    fn byte_counts_from_most_significant_end() {
        let value = U256::from(0xAABBu64);
        assert_eq!(byte_at(U256::from(31), value).unwrap(), U256::from(0xBB));
        assert_eq!(byte_at(U256::from(30), value).unwrap(), U256::from(0xAA));
        assert_eq!(byte_at(U256::from(32), value).unwrap(), U256::zero());
    }
}
