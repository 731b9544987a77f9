//! Comparison opcodes (spec §4.6 "Comparison"): LT..ISZERO.

use super::advance;
use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::gas_cost;
use crate::opcodes::Opcode;
use crate::vm::VM;
use ethereum_types::U256;

const fn u256_from_bool(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    match opcode {
        Opcode::LT => binary(vm, gas_cost::LT, |a, b| u256_from_bool(a < b)),
        Opcode::GT => binary(vm, gas_cost::GT, |a, b| u256_from_bool(a > b)),
        Opcode::SLT => binary(vm, gas_cost::SLT, |a, b| u256_from_bool(signed_lt(a, b))),
        Opcode::SGT => binary(vm, gas_cost::SGT, |a, b| u256_from_bool(signed_lt(b, a))),
        Opcode::EQ => binary(vm, gas_cost::EQ, |a, b| u256_from_bool(a == b)),
        Opcode::ISZERO => unary(vm, gas_cost::ISZERO, |a| u256_from_bool(a.is_zero())),
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

/// Two's-complement signed comparison: differing signs decide it outright,
/// matching signs fall back to the unsigned ordering.
fn signed_lt(a: U256, b: U256) -> bool {
    let (a_neg, b_neg) = (a.bit(255), b.bit(255));
    if a_neg == b_neg {
        a < b
    } else {
        a_neg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slt_handles_sign_mismatch() {
        let minus_one = U256::MAX;
        assert!(signed_lt(minus_one, U256::one()));
        assert!(!signed_lt(U256::one(), minus_one));
    }

    #[test]
    fn slt_same_sign_compares_magnitude() {
        assert!(signed_lt(U256::from(1), U256::from(2)));
        assert!(!signed_lt(U256::from(2), U256::from(1)));
    }
}
