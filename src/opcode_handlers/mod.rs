//! Opcode dispatcher (spec §4.9) and the twelve handler categories of §4.6.
//! Each handler follows the same contract: pop stack arguments (top first),
//! compute and charge gas before any observable side effect, perform the
//! effect, then advance the PC — except the terminal ops, which set
//! `stopped`/`reverted` on the frame and halt instead.

pub mod arithmetic;
pub mod bitwise;
pub mod block;
pub mod comparison;
pub mod context;
pub mod control_flow;
pub mod keccak;
pub mod log;
pub mod memory_ops;
pub mod stack_ops;
pub mod storage_ops;
pub mod system;

use crate::errors::{InternalError, OpcodeResult, VMError};
use crate::opcodes::Opcode;
use crate::vm::VM;

pub fn dispatch(vm: &mut VM, opcode: Opcode) -> Result<OpcodeResult, VMError> {
    use Opcode::*;
    match opcode {
        STOP => control_flow::stop(vm),

        ADD | MUL | SUB | DIV | SDIV | MOD | SMOD | ADDMOD | MULMOD | EXP | SIGNEXTEND => {
            arithmetic::dispatch(vm, opcode)
        }

        LT | GT | SLT | SGT | EQ | ISZERO => comparison::dispatch(vm, opcode),
        AND | OR | XOR | NOT | BYTE | SHL | SHR | SAR => bitwise::dispatch(vm, opcode),

        KECCAK256 => keccak::keccak256(vm),

        ADDRESS | BALANCE | ORIGIN | CALLER | CALLVALUE | CALLDATALOAD | CALLDATASIZE
        | CALLDATACOPY | CODESIZE | CODECOPY | GASPRICE | EXTCODESIZE | EXTCODECOPY
        | RETURNDATASIZE | RETURNDATACOPY | EXTCODEHASH | SELFBALANCE => context::dispatch(vm, opcode),

        BLOCKHASH | COINBASE | TIMESTAMP | NUMBER | PREVRANDAO | GASLIMIT | CHAINID | BASEFEE
        | BLOBHASH | BLOBBASEFEE => block::dispatch(vm, opcode),

        POP => stack_ops::pop(vm),
        PUSH0 | PUSH1 | PUSH2 | PUSH3 | PUSH4 | PUSH5 | PUSH6 | PUSH7 | PUSH8 | PUSH9 | PUSH10
        | PUSH11 | PUSH12 | PUSH13 | PUSH14 | PUSH15 | PUSH16 | PUSH17 | PUSH18 | PUSH19
        | PUSH20 | PUSH21 | PUSH22 | PUSH23 | PUSH24 | PUSH25 | PUSH26 | PUSH27 | PUSH28
        | PUSH29 | PUSH30 | PUSH31 | PUSH32 => stack_ops::push(vm, opcode),
        DUP1 | DUP2 | DUP3 | DUP4 | DUP5 | DUP6 | DUP7 | DUP8 | DUP9 | DUP10 | DUP11 | DUP12
        | DUP13 | DUP14 | DUP15 | DUP16 => stack_ops::dup(vm, opcode),
        SWAP1 | SWAP2 | SWAP3 | SWAP4 | SWAP5 | SWAP6 | SWAP7 | SWAP8 | SWAP9 | SWAP10
        | SWAP11 | SWAP12 | SWAP13 | SWAP14 | SWAP15 | SWAP16 => stack_ops::swap(vm, opcode),

        MLOAD | MSTORE | MSTORE8 | MSIZE | MCOPY => memory_ops::dispatch(vm, opcode),

        SLOAD | SSTORE | TLOAD | TSTORE => storage_ops::dispatch(vm, opcode),

        JUMP | JUMPI | PC | JUMPDEST | GAS => control_flow::dispatch(vm, opcode),

        LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => log::dispatch(vm, opcode),

        CREATE | CALL | CALLCODE | RETURN | DELEGATECALL | CREATE2 | STATICCALL | REVERT
        | SELFDESTRUCT => system::dispatch(vm, opcode),

        INVALID => Err(crate::errors::ExceptionalHalt::InvalidOpcode.into()),
    }
}

/// Advances `pc` by one and reports the handler continues normally. The
/// common case for every non-control-flow, non-terminal opcode.
pub(crate) fn advance(vm: &mut VM) -> Result<OpcodeResult, VMError> {
    vm.current_frame()?.pc = vm
        .current_frame_ref()?
        .pc
        .checked_add(1)
        .ok_or(InternalError::Overflow)?;
    Ok(OpcodeResult::Continue)
}
