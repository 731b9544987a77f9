//! One call/create activation record (spec §3 "Frame").

use crate::bytecode::Bytecode;
use crate::memory::Memory;
use crate::stack::Stack;
use bytes::Bytes;
use ethereum_types::{Address, U256};

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub bytecode: Bytecode,
    pub pc: usize,
    pub gas_remaining: i64,
    /// Gas this frame was entered with; used to compute `gas_used` on exit.
    pub gas_limit: u64,

    pub stack: Stack,
    pub memory: Memory,

    /// Address whose balance funded this frame's value transfer (`CALLER`).
    pub msg_sender: Address,
    /// Address this frame executes as (`ADDRESS`); the account whose
    /// storage SLOAD/SSTORE operate on.
    pub to: Address,
    /// Address the executing code was actually loaded from — differs from
    /// `to` only for CALLCODE/DELEGATECALL and EIP-7702 delegation.
    pub code_address: Address,
    pub value: U256,
    pub calldata: Bytes,

    /// Output of the most recently completed nested call, visible via
    /// RETURNDATASIZE/RETURNDATACOPY.
    pub sub_return_data: Bytes,
    /// This frame's own output, set by RETURN/REVERT and read by the
    /// parent once the frame halts.
    pub output: Bytes,

    pub is_static: bool,
    pub depth: usize,
    /// True for frames created by CREATE/CREATE2 (as opposed to a message
    /// call) — governs how the parent interprets this frame's outcome.
    pub is_create: bool,
    /// Whether a successful return should also transfer `value` from
    /// `msg_sender` to `to` (false for DELEGATECALL).
    pub should_transfer_value: bool,

    /// Where in the parent's memory to copy this frame's output once it
    /// halts (message-call frames only).
    pub ret_offset: usize,
    pub ret_size: usize,

    /// Set by STOP/RETURN/SELFDESTRUCT; tells the orchestrator this frame
    /// finished normally and `output` (if any) should be treated as success.
    pub stopped: bool,
    /// Set by REVERT; `output` holds the revert reason and every state
    /// mutation made by this frame and its descendants must be undone.
    pub reverted: bool,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytecode,
        value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        should_transfer_value: bool,
        is_create: bool,
        ret_offset: usize,
        ret_size: usize,
        stack: Stack,
        memory: Memory,
    ) -> Self {
        CallFrame {
            bytecode,
            pc: 0,
            gas_remaining: i64::try_from(gas_limit).unwrap_or(i64::MAX),
            gas_limit,
            stack,
            memory,
            msg_sender,
            to,
            code_address,
            value,
            calldata,
            sub_return_data: Bytes::new(),
            output: Bytes::new(),
            is_static,
            depth,
            is_create,
            should_transfer_value,
            ret_offset,
            ret_size,
            stopped: false,
            reverted: false,
        }
    }

    pub fn opcode_at_pc(&self) -> u8 {
        self.bytecode.opcode_at(self.pc)
    }

    /// Charges `amount` against the frame's remaining gas, failing
    /// **before** any observable side effect if insufficient.
    pub fn increase_consumed_gas(&mut self, amount: u64) -> Result<(), crate::errors::VMError> {
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        let remaining = self
            .gas_remaining
            .checked_sub(amount)
            .ok_or(crate::errors::ExceptionalHalt::OutOfGas)?;
        if remaining < 0 {
            return Err(crate::errors::ExceptionalHalt::OutOfGas.into());
        }
        self.gas_remaining = remaining;
        Ok(())
    }

    pub fn gas_used(&self) -> u64 {
        let spent = i64::try_from(self.gas_limit)
            .unwrap_or(i64::MAX)
            .saturating_sub(self.gas_remaining);
        u64::try_from(spent.max(0)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(gas: u64) -> CallFrame {
        CallFrame::new(
            Address::zero(),
            Address::zero(),
            Address::zero(),
            Bytecode::new(Bytes::new()),
            U256::zero(),
            Bytes::new(),
            false,
            gas,
            0,
            true,
            false,
            0,
            0,
            Stack::new(),
            Memory::new(),
        )
    }

    #[test]
    fn gas_charge_fails_before_going_negative() {
        let mut f = frame(10);
        assert!(f.increase_consumed_gas(5).is_ok());
        assert_eq!(f.gas_remaining, 5);
        assert!(f.increase_consumed_gas(6).is_err());
        // failed charge must not have mutated gas_remaining.
        assert_eq!(f.gas_remaining, 5);
    }

    #[test]
    fn gas_used_tracks_consumption() {
        let mut f = frame(100);
        f.increase_consumed_gas(30).unwrap();
        assert_eq!(f.gas_used(), 30);
    }
}
