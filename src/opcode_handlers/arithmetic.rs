//! Arithmetic opcodes (spec §4.6 "Arithmetic"): ADD..SIGNEXTEND.

use super::advance;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcodes::Opcode;
use crate::uint512::U512;
use crate::vm::VM;
use ethereum_types::U256;

fn is_negative(value: U256) -> bool {
    value.bit(255)
}

fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}

const MIN_SIGNED: U256 = U256([0, 0, 0, 0x8000_0000_0000_0000]);

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::ADD => binary(vm, gas_cost::ADD, |a, b| a.overflowing_add(b).0),
        Opcode::MUL => binary(vm, gas_cost::MUL, |a, b| a.overflowing_mul(b).0),
        Opcode::SUB => binary(vm, gas_cost::SUB, |a, b| a.overflowing_sub(b).0),
        Opcode::DIV => binary(vm, gas_cost::DIV, |a, b| if b.is_zero() { U256::zero() } else { a / b }),
        Opcode::SDIV => binary(vm, gas_cost::SDIV, sdiv),
        Opcode::MOD => binary(vm, gas_cost::MOD, |a, b| if b.is_zero() { U256::zero() } else { a % b }),
        Opcode::SMOD => binary(vm, gas_cost::SMOD, smod),
        Opcode::ADDMOD => ternary(vm, gas_cost::ADDMOD, addmod),
        Opcode::MULMOD => ternary(vm, gas_cost::MULMOD, mulmod),
        Opcode::EXP => exp(vm),
        Opcode::SIGNEXTEND => binary(vm, gas_cost::SIGNEXTEND, signextend),
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

fn ternary(vm: &mut VM, cost: u64, op: impl FnOnce(U256, U256, U256) -> U256) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(cost)?;
    let frame = vm.current_frame()?;
    let [a, b, n] = frame.stack.pop::<3>()?;
    frame.stack.push(op(a, b, n))?;
    advance(vm)
}

fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    if a == MIN_SIGNED && b == U256::MAX {
        return MIN_SIGNED;
    }
    let result = abs(a) / abs(b);
    if is_negative(a) != is_negative(b) {
        negate(result)
    } else {
        result
    }
}

fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    if a == MIN_SIGNED && b == U256::MAX {
        return U256::zero();
    }
    let result = abs(a) % abs(b);
    if is_negative(a) {
        negate(result)
    } else {
        result
    }
}

/// Truncates a `U512` known to be `< 2**256` (i.e. already reduced modulo a
/// `U256` modulus) down to a `U256` by dropping its zeroed high limbs.
fn u512_to_u256(value: U512) -> U256 {
    let U512(limbs) = value;
    U256([limbs[0], limbs[1], limbs[2], limbs[3]])
}

fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let wide = U512::from(a) + U512::from(b);
    u512_to_u256(wide % U512::from(n))
}

fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let wide = U512::from(a) * U512::from(b);
    u512_to_u256(wide % U512::from(n))
}

fn exp(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.charge_gas(gas_cost::EXP_STATIC)?;
    let frame = vm.current_frame()?;
    let [base, exponent] = frame.stack.pop::<2>()?;
    let dynamic = gas_cost::exp(exponent)?.saturating_sub(gas_cost::EXP_STATIC);
    vm.charge_gas(dynamic)?;
    let result = base.overflowing_pow(exponent).0;
    vm.current_frame()?.stack.push(result)?;
    advance(vm)
}

fn signextend(byte_index: U256, value: U256) -> U256 {
    if byte_index >= U256::from(32) {
        return value;
    }
    let byte_index: u64 = byte_index.try_into().unwrap_or(31);
    let byte_index = usize::try_from(byte_index).unwrap_or(31);
    let bit_index = byte_index.saturating_mul(8).saturating_add(7);
    let sign_bit = value.bit(bit_index);
    let mask = (U256::one() << bit_index.saturating_add(1)) - U256::one();
    if sign_bit {
        value | !mask
    } else {
        value & mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdiv_of_min_signed_by_negative_one_saturates() {
        assert_eq!(sdiv(MIN_SIGNED, U256::MAX), MIN_SIGNED);
    }

    #[test]
    fn smod_of_min_signed_by_negative_one_is_zero() {
        assert_eq!(smod(MIN_SIGNED, U256::MAX), U256::zero());
    }

    #[test]
    fn addmod_reduces_exactly_near_2_256() {
        let a = U256::MAX;
        let b = U256::MAX;
        let n = U256::from(7);
        let expected = u512_to_u256((U512::from(a) + U512::from(b)) % U512::from(n));
        assert_eq!(addmod(a, b, n), expected);
    }

    #[test]
    fn signextend_of_small_positive_byte_is_noop() {
        assert_eq!(signextend(U256::zero(), U256::from(0x7F)), U256::from(0x7F));
    }

    #[test]
    fn signextend_of_negative_byte_fills_high_bits() {
        assert_eq!(signextend(U256::zero(), U256::from(0xFF)), U256::MAX);
    }
}
