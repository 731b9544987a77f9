//! The call/create orchestrator (spec §4.8): frame stack, nested-call entry
//! points, snapshot/revert wiring, and the public `transact`/`call_or_continue`
//! surface (spec §6).

use crate::account::AccountInfo;
use crate::bytecode::Bytecode;
use crate::call_frame::CallFrame;
use crate::constants::{CALL_DEPTH_LIMIT, CODE_DEPOSIT_COST_PER_BYTE, INIT_CODE_MAX_SIZE, MAX_CODE_SIZE};
use crate::environment::{Environment, Fork};
use crate::errors::{ContextResult, ExceptionalHalt, InternalError, OpcodeResult, TxResult, VMError, VMErrorSummary};
use crate::gas_cost;
use crate::host::{Host, HostError, HostResult, PendingReply, PendingRequest};
use crate::memory::Memory;
use crate::opcode_handlers;
use crate::opcodes::Opcode;
use crate::precompiles::{is_precompile, PrecompileRunner};
use crate::rlp::encode_sender_nonce_list;
use crate::stack::Stack;
use crate::substate::{LogRecord, Substate};
use crate::tracer::{NoopTracer, StepContext, Tracer};
use bytes::Bytes;
use ethereum_types::{Address, U256};
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `Host` wrapper that answers a pending request from the cached reply
/// before falling through to the real backend (spec §5, §9 "async data
/// hook"). Constructed fresh at every host-touching call site so it only
/// ever borrows the two fields it needs, not the whole `VM`.
pub struct CachingHost<'a> {
    inner: &'a mut dyn Host,
    cache: &'a mut Option<(PendingRequest, PendingReply)>,
}

impl<'a> CachingHost<'a> {
    pub fn new(inner: &'a mut dyn Host, cache: &'a mut Option<(PendingRequest, PendingReply)>) -> Self {
        CachingHost { inner, cache }
    }

    fn take(&mut self, request: PendingRequest) -> Option<PendingReply> {
        match self.cache.take() {
            Some((cached_request, reply)) if cached_request == request => Some(reply),
            other => {
                *self.cache = other;
                None
            }
        }
    }
}

impl<'a> Host for CachingHost<'a> {
    fn get_balance(&mut self, address: Address) -> HostResult<U256> {
        let request = PendingRequest::Balance { address };
        if let Some(PendingReply::Balance(value)) = self.take(request) {
            return Ok(value);
        }
        self.inner.get_balance(address)
    }

    fn set_balance(&mut self, address: Address, value: U256) -> HostResult<()> {
        self.inner.set_balance(address, value)
    }

    fn get_nonce(&mut self, address: Address) -> HostResult<u64> {
        let request = PendingRequest::Nonce { address };
        if let Some(PendingReply::Nonce(value)) = self.take(request) {
            return Ok(value);
        }
        self.inner.get_nonce(address)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> HostResult<()> {
        self.inner.set_nonce(address, nonce)
    }

    fn get_code(&mut self, address: Address) -> HostResult<Bytes> {
        let request = PendingRequest::Code { address };
        if let Some(PendingReply::Code(value)) = self.take(request) {
            return Ok(value);
        }
        self.inner.get_code(address)
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> HostResult<()> {
        self.inner.set_code(address, code)
    }

    fn get_storage(&mut self, address: Address, slot: ethereum_types::H256) -> HostResult<U256> {
        let request = PendingRequest::Storage { address, slot };
        if let Some(PendingReply::Storage(value)) = self.take(request) {
            return Ok(value);
        }
        self.inner.get_storage(address, slot)
    }

    fn set_storage(&mut self, address: Address, slot: ethereum_types::H256, value: U256) -> HostResult<()> {
        self.inner.set_storage(address, slot, value)
    }

    fn account_exists(&mut self, address: Address) -> HostResult<bool> {
        self.inner.account_exists(address)
    }
}

/// Top-level input union (spec §6 "CallParams").
#[derive(Debug, Clone)]
pub enum CallParams {
    Call { caller: Address, to: Address, value: U256, gas: u64, input: Bytes },
    CallCode { caller: Address, to: Address, value: U256, gas: u64, input: Bytes },
    DelegateCall { caller: Address, to: Address, gas: u64, input: Bytes },
    StaticCall { caller: Address, to: Address, gas: u64, input: Bytes },
    Create { caller: Address, value: U256, gas: u64, init: Bytes },
    Create2 { caller: Address, value: U256, salt: U256, gas: u64, init: Bytes },
}

/// Output (spec §6 "CallResult").
#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub gas_left: u64,
    pub output: Bytes,
    pub refund_counter: u64,
    pub created_address: Option<Address>,
    pub logs: Vec<LogRecord>,
}

/// Resumable entry point input (spec §5).
#[derive(Debug, Clone)]
pub enum ContinueInput {
    Start(CallParams),
    Reply(PendingReply),
}

/// Resumable entry point output (spec §5).
#[derive(Debug, Clone)]
pub enum VmOutcome {
    NeedStorage { address: Address, slot: ethereum_types::H256 },
    NeedBalance { address: Address },
    NeedCode { address: Address },
    NeedNonce { address: Address },
    Result(CallResult),
}

/// Which flavor of nested call/create is being entered; governs the
/// caller/self/value rules of spec §4.8 step 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

pub struct VM {
    pub call_frames: Vec<CallFrame>,
    pub substate: Substate,
    pub db: Box<dyn Host>,
    pub env: Environment,
    pub tracer: Box<dyn Tracer>,
    pub precompile_runner: Option<Box<dyn PrecompileRunner>>,
    pending_request: Option<PendingRequest>,
    pending_reply: Option<(PendingRequest, PendingReply)>,
}

impl VM {
    pub fn new(db: Box<dyn Host>, env: Environment) -> Self {
        VM {
            call_frames: Vec::new(),
            substate: Substate::new(),
            db,
            env,
            tracer: Box::new(NoopTracer),
            precompile_runner: None,
            pending_request: None,
            pending_reply: None,
        }
    }

    pub fn host(&mut self) -> CachingHost<'_> {
        CachingHost::new(&mut *self.db, &mut self.pending_reply)
    }

    pub fn fork(&self) -> Fork {
        self.env.config.fork
    }

    pub fn current_frame(&mut self) -> Result<&mut CallFrame, VMError> {
        self.call_frames
            .last_mut()
            .ok_or_else(|| InternalError::NoActiveCallFrame.into())
    }

    pub fn current_frame_ref(&self) -> Result<&CallFrame, VMError> {
        self.call_frames
            .last()
            .ok_or_else(|| InternalError::NoActiveCallFrame.into())
    }

    pub fn charge_gas(&mut self, amount: u64) -> Result<(), VMError> {
        self.current_frame()?.increase_consumed_gas(amount)
    }

    pub fn require_not_static(&self) -> Result<(), VMError> {
        if self.current_frame_ref()?.is_static {
            return Err(ExceptionalHalt::StaticCallViolation.into());
        }
        Ok(())
    }

    /// Cold/warm for an address access, marking it warm. Pure local state,
    /// never touches the host.
    pub fn access_address(&mut self, address: Address) -> bool {
        !self.substate.access_list.mark_address_warm(address)
    }

    pub fn access_storage_slot(&mut self, address: Address, slot: ethereum_types::H256) -> bool {
        !self.substate.access_list.mark_slot_warm(address, slot)
    }

    // ---- host bridges for opcode handlers ----------------------------------
    //
    // `host()` borrows all of `self`, so anything that also needs
    // `self.substate` at the same time (SLOAD/SSTORE) or just needs a
    // one-shot host read (BALANCE, EXTCODE*) goes through one of these
    // instead, each borrowing only `self.db`/`self.pending_reply` directly.

    pub fn get_balance(&mut self, address: Address) -> Result<U256, VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        Ok(host.get_balance(address)?)
    }

    pub fn get_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        Ok(host.get_nonce(address)?)
    }

    pub fn account_exists(&mut self, address: Address) -> Result<bool, VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        Ok(host.account_exists(address)?)
    }

    /// Balance/nonce/code as seen by the host, ignoring EIP-7702 delegation
    /// (BALANCE/EXTCODEHASH "is this account empty" checks want the account's
    /// own code, not a delegated target's).
    pub fn account_info(&mut self, address: Address) -> Result<AccountInfo, VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        account_info(&mut host, address)
    }

    /// EIP-7702-resolved executable code: follows one level of delegation,
    /// for EXTCODESIZE/EXTCODECOPY/EXTCODEHASH and CALL-family dispatch.
    pub fn resolved_code(&mut self, address: Address) -> Result<Bytes, VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        let (code, _, _) = crate::host::resolve_code(&mut host, address)?;
        Ok(code)
    }

    pub fn sload(&mut self, address: Address, slot: ethereum_types::H256) -> Result<U256, VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        Ok(self.substate.storage.sload(&mut host, address, slot)?)
    }

    pub fn sstore(&mut self, address: Address, slot: ethereum_types::H256, value: U256) -> Result<(), VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        Ok(self.substate.set_storage(&mut host, address, slot, value)?)
    }

    /// Direct balance overwrite, bypassing the debit/credit pairing
    /// `transfer` does. SELFDESTRUCT-to-self needs this to burn a balance
    /// rather than leave it untouched by a same-address transfer.
    pub fn set_balance(&mut self, address: Address, value: U256) -> Result<(), VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        Ok(self.substate.set_balance(&mut host, address, value)?)
    }

    // ---- top-level & resumable entry points --------------------------------

    /// Convenience wrapper over [`Self::call_or_continue`] for hosts that
    /// never return `HostError::Pending` (e.g. `InMemoryDatabase`).
    pub fn transact(&mut self, params: CallParams) -> Result<CallResult, VMError> {
        match self.call_or_continue(ContinueInput::Start(params))? {
            VmOutcome::Result(result) => Ok(result),
            _ => Err(InternalError::Conversion.into()),
        }
    }

    /// Resumable orchestrator entry (spec §5). On `Start`, initializes
    /// per-tx state and a root frame, then runs to completion or to the
    /// first host-data suspension. A suspension leaves every frame, the
    /// substate, and all backups exactly as they were — per the "no cleanup
    /// between yields" design note, scoping full mid-opcode replay as a
    /// host-side concern (see DESIGN.md): a host that returns `Pending`
    /// must itself retry `call_or_continue` after it has the data, without
    /// this crate reconstructing a coroutine across the suspension boundary
    /// for any handler that has already mutated stack/gas before pending.
    pub fn call_or_continue(&mut self, input: ContinueInput) -> Result<VmOutcome, VMError> {
        match input {
            ContinueInput::Start(params) => {
                self.call_frames.clear();
                self.substate = Substate::new();
                self.begin(params)?;
            }
            ContinueInput::Reply(reply) => {
                let request = self
                    .pending_request
                    .take()
                    .ok_or(InternalError::Conversion)?;
                self.pending_reply = Some((request, reply));
            }
        }

        match self.run_until_root_exits() {
            Ok(result) => Ok(VmOutcome::Result(result)),
            Err(VMError::Pending(request)) => {
                self.pending_request = Some(request);
                Ok(match request {
                    PendingRequest::Storage { address, slot } => VmOutcome::NeedStorage { address, slot },
                    PendingRequest::Balance { address } => VmOutcome::NeedBalance { address },
                    PendingRequest::Code { address } => VmOutcome::NeedCode { address },
                    PendingRequest::Nonce { address } => VmOutcome::NeedNonce { address },
                })
            }
            Err(other) => Err(other),
        }
    }

    fn begin(&mut self, params: CallParams) -> Result<(), VMError> {
        let sender = match &params {
            CallParams::Call { caller, .. }
            | CallParams::CallCode { caller, .. }
            | CallParams::DelegateCall { caller, .. }
            | CallParams::StaticCall { caller, .. }
            | CallParams::Create { caller, .. }
            | CallParams::Create2 { caller, .. } => *caller,
        };
        let coinbase = self.env.block.coinbase;
        self.substate.initialize(sender, coinbase, core::iter::empty(), core::iter::empty());

        match params {
            CallParams::Call { caller, to, value, gas, input } => {
                let (code, _, code_address) = crate::host::resolve_code(&mut self.host(), to)?;
                self.push_root_frame(caller, to, code_address, Bytecode::new(code), value, input, false, gas, true)?;
            }
            CallParams::CallCode { caller, to, value, gas, input } => {
                let (code, _, code_address) = crate::host::resolve_code(&mut self.host(), to)?;
                self.push_root_frame(caller, caller, code_address, Bytecode::new(code), value, input, false, gas, false)?;
            }
            CallParams::DelegateCall { caller, to, gas, input } => {
                let (code, _, code_address) = crate::host::resolve_code(&mut self.host(), to)?;
                self.push_root_frame(caller, caller, code_address, Bytecode::new(code), U256::zero(), input, false, gas, false)?;
            }
            CallParams::StaticCall { caller, to, gas, input } => {
                let (code, _, code_address) = crate::host::resolve_code(&mut self.host(), to)?;
                self.push_root_frame(caller, to, code_address, Bytecode::new(code), U256::zero(), input, true, gas, true)?;
            }
            CallParams::Create { caller, value, gas, init } => {
                self.begin_create(caller, value, gas, init, None)?;
            }
            CallParams::Create2 { caller, value, salt, gas, init } => {
                self.begin_create(caller, value, gas, init, Some(salt))?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_root_frame(
        &mut self,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytecode,
        value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        should_transfer_value: bool,
    ) -> Result<(), VMError> {
        if should_transfer_value && !value.is_zero() {
            self.transfer(msg_sender, to, value)?;
        }
        let frame = CallFrame::new(
            msg_sender, to, code_address, bytecode, value, calldata, is_static, gas_limit, 0,
            should_transfer_value, false, 0, 0, Stack::new(), Memory::new(),
        );
        self.call_frames.push(frame);
        self.tracer.on_frame_enter(0);
        Ok(())
    }

    fn begin_create(&mut self, caller: Address, value: U256, gas: u64, init: Bytes, salt: Option<U256>) -> Result<(), VMError> {
        if init.len() > INIT_CODE_MAX_SIZE {
            // Charges nothing further and fails the *caller's* context; at
            // the top level there is no parent frame to charge, so this
            // simply reports failure with the gas the caller supplied spent.
            self.call_frames.push(CallFrame::new(
                caller, caller, caller, Bytecode::new(Bytes::new()), U256::zero(), Bytes::new(),
                false, gas, 0, false, true, 0, 0, Stack::new(), Memory::new(),
            ));
            let frame = self.current_frame()?;
            frame.gas_remaining = 0;
            frame.reverted = true;
            return Ok(());
        }
        let nonce = self.host().get_nonce(caller)?;
        let new_address = match salt {
            None => create_address(caller, nonce),
            Some(salt) => create2_address(caller, salt, &init),
        };
        let existing = account_info(&mut self.host(), new_address)?;
        if existing.create_would_collide() {
            self.call_frames.push(CallFrame::new(
                caller, new_address, new_address, Bytecode::new(Bytes::new()), U256::zero(), Bytes::new(),
                false, gas, 0, false, true, 0, 0, Stack::new(), Memory::new(),
            ));
            let frame = self.current_frame()?;
            frame.gas_remaining = 0;
            frame.reverted = true;
            return Ok(());
        }
        {
            let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
            self.substate.set_nonce(&mut host, caller, nonce.saturating_add(1))?;
            self.substate.set_nonce(&mut host, new_address, 1)?;
        }
        self.substate.add_created_account(new_address);
        if !value.is_zero() {
            self.transfer(caller, new_address, value)?;
        }
        let frame = CallFrame::new(
            caller, new_address, new_address, Bytecode::new(init), value, Bytes::new(),
            false, gas, 0, false, true, 0, 0, Stack::new(), Memory::new(),
        );
        self.call_frames.push(frame);
        self.tracer.on_frame_enter(0);
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
        let from_balance = host.get_balance(from)?;
        if from_balance < value {
            return Err(ExceptionalHalt::OutOfBounds.into());
        }
        let to_balance = host.get_balance(to)?;
        self.substate.set_balance(&mut host, from, from_balance - value)?;
        self.substate.set_balance(&mut host, to, to_balance + value)?;
        Ok(())
    }

    // ---- interpreter loop ---------------------------------------------------

    /// Runs frames to completion until the root (depth 0) frame exits,
    /// returning the aggregate `CallResult`. Nested frames are popped
    /// in-loop rather than via recursive function calls, so call depth is
    /// bounded only by `CALL_DEPTH_LIMIT`, not the native stack.
    fn run_until_root_exits(&mut self) -> Result<CallResult, VMError> {
        loop {
            let outcome = self.run_current_frame();
            if self.call_frames.len() <= 1 {
                let context = self.finish_frame(outcome)?;
                let root = self.current_frame_ref()?;
                let created_address = (root.is_create && context.is_success()).then_some(root.to);
                let gas_left = u64::try_from(root.gas_remaining.max(0)).unwrap_or(0);
                let logs = self.substate.extract_logs();
                self.call_frames.pop();
                return Ok(CallResult {
                    success: context.is_success(),
                    gas_left,
                    output: context.output,
                    refund_counter: self.substate.refund_counter(),
                    created_address,
                    logs,
                });
            }
            let context = self.finish_frame(outcome)?;
            self.propagate_to_parent(context)?;
        }
    }

    fn run_current_frame(&mut self) -> Result<(), VMError> {
        loop {
            let frame_ref = self.current_frame_ref()?;
            if frame_ref.stopped || frame_ref.reverted {
                return Ok(());
            }
            let opcode_byte = frame_ref.opcode_at_pc();
            let opcode = Opcode::from(opcode_byte);
            let pc = frame_ref.pc;
            let depth = frame_ref.depth;
            let gas_remaining = frame_ref.gas_remaining;

            if !opcode.is_valid_for(self.fork()) {
                return Err(ExceptionalHalt::InvalidOpcode.into());
            }

            {
                let frame_ref = self.current_frame_ref()?;
                self.tracer.on_step(StepContext { pc, opcode, gas_remaining, depth, frame: frame_ref });
            }

            let result = opcode_handlers::dispatch(self, opcode);
            self.tracer.on_step_end(pc, &result.as_ref().map(|_| ()).map_err(Clone::clone));

            match result {
                Ok(OpcodeResult::Continue) => continue,
                Ok(OpcodeResult::Halt) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Translates the just-finished frame's outcome into a `ContextResult`,
    /// without popping it — callers decide whether to pop-and-return or
    /// pop-and-propagate.
    fn finish_frame(&mut self, outcome: Result<(), VMError>) -> Result<ContextResult, VMError> {
        let frame = self.current_frame_ref()?;
        let gas_used = frame.gas_used();
        match outcome {
            // REVERT may surface either as `frame.reverted` set directly by
            // the handler, or as `Err(RevertOpcode)` unwinding through the
            // same plumbing as an exceptional halt; either way the frame's
            // own output is the revert reason and nothing past its own gas
            // usage is charged.
            Ok(()) if frame.reverted => {
                let output = frame.output.clone();
                Ok(ContextResult { result: TxResult::Revert(VMErrorSummary { message: "execution reverted".into(), is_revert_opcode: true }), gas_used, output })
            }
            Ok(()) => {
                let output = frame.output.clone();
                Ok(ContextResult { result: TxResult::Success, gas_used, output })
            }
            Err(err) if err.is_revert_opcode() => {
                let output = frame.output.clone();
                Ok(ContextResult { result: TxResult::Revert((&err).into()), gas_used, output })
            }
            Err(err) if !err.is_internal() => {
                let summary = VMErrorSummary::from(&err);
                Ok(ContextResult { result: TxResult::Revert(summary), gas_used: frame.gas_limit, output: Bytes::new() })
            }
            Err(err) => Err(err),
        }
    }

    /// Pops the finished child frame and folds its `ContextResult` into the
    /// (now-current) parent frame: stack push, return-data buffer, and the
    /// commit/revert of the backup pushed when the child was entered.
    fn propagate_to_parent(&mut self, context: ContextResult) -> Result<(), VMError> {
        let child = self.call_frames.pop().ok_or(InternalError::NoActiveCallFrame)?;
        self.tracer.on_frame_exit(child.depth, context.is_success());

        if context.is_success() {
            self.substate.commit_backup();
        } else {
            let mut host = CachingHost::new(&mut *self.db, &mut self.pending_reply);
            self.substate.revert_backup(&mut host)?;
        }

        if child.is_create {
            self.finish_create(child, context)
        } else {
            self.finish_call(child, context)
        }
    }

    fn finish_create(&mut self, child: CallFrame, context: ContextResult) -> Result<(), VMError> {
        let parent = self.current_frame()?;
        if !context.is_success() {
            parent.stack.push(U256::zero())?;
            return Ok(());
        }
        let code = context.output;
        if code.len() > MAX_CODE_SIZE {
            self.current_frame()?.stack.push(U256::zero())?;
            return Ok(());
        }
        let deposit_cost = CODE_DEPOSIT_COST_PER_BYTE.saturating_mul(code.len() as u64);
        let remaining = child.gas_limit.saturating_sub(context.gas_used);
        if remaining < deposit_cost {
            self.current_frame()?.stack.push(U256::zero())?;
            return Ok(());
        }
        self.substate.set_code(&mut self.host(), child.to, code)?;
        let total_gas_used = context.gas_used.saturating_add(deposit_cost);
        let parent = self.current_frame()?;
        parent.increase_consumed_gas(child_gas_charge(child.gas_limit, total_gas_used))?;
        parent.stack.push(crate::utils::address_to_u256(child.to))?;
        Ok(())
    }

    fn finish_call(&mut self, child: CallFrame, context: ContextResult) -> Result<(), VMError> {
        let ret_offset = child.ret_offset;
        let ret_size = child.ret_size;
        let output = context.output.clone();
        let success = context.is_success();
        let gas_used = context.gas_used.min(child.gas_limit);

        let parent = self.current_frame()?;
        parent.sub_return_data = output.clone();
        let to_copy = output.len().min(ret_size);
        let data = output.slice(..to_copy);
        parent.memory.store_data_zero_padded(ret_offset, &data, ret_size)?;
        parent.increase_consumed_gas(gas_used)?;
        parent.stack.push(if success { U256::one() } else { U256::zero() })?;
        Ok(())
    }

    // ---- generic call / create, invoked by the `system` handlers -----------

    #[allow(clippy::too_many_arguments)]
    pub fn generic_call(
        &mut self,
        kind: CallKind,
        gas: u64,
        to: Address,
        value: U256,
        args_offset: usize,
        args_size: usize,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<(), VMError> {
        let depth = self.current_frame_ref()?.depth;
        if depth.saturating_add(1) >= CALL_DEPTH_LIMIT {
            self.current_frame()?.stack.push(U256::zero())?;
            return Ok(());
        }

        let calldata = self.current_frame()?.memory.load_range(args_offset, args_size)?;

        let (current_self, current_caller, current_value, current_is_static) = {
            let frame = self.current_frame_ref()?;
            (frame.to, frame.msg_sender, frame.value, frame.is_static)
        };

        let (msg_sender, exec_self, exec_value, should_transfer_value) = match kind {
            CallKind::Call => (current_self, to, value, true),
            CallKind::CallCode => (current_self, current_self, value, true),
            CallKind::DelegateCall => (current_caller, current_self, current_value, false),
            CallKind::StaticCall => (current_self, to, U256::zero(), false),
            CallKind::Create | CallKind::Create2 => {
                return Err(InternalError::Conversion.into());
            }
        };

        if should_transfer_value && !value.is_zero() {
            let balance = self.host().get_balance(current_self)?;
            if balance < value {
                self.current_frame()?.stack.push(U256::zero())?;
                return Ok(());
            }
        }

        let (code, _, code_address) = crate::host::resolve_code(&mut self.host(), to)?;
        let is_static = current_is_static || kind == CallKind::StaticCall;

        self.substate.push_backup();

        if code.is_empty() {
            if is_precompile(to, self.fork()) {
                if let Some(outcome) = self.try_run_precompile(to, &calldata, gas) {
                    return self.finish_precompile_call(outcome, ret_offset, ret_size);
                }
            }
            self.substate.commit_backup();
            if should_transfer_value && !value.is_zero() {
                self.transfer(current_self, to, value)?;
            }
            self.current_frame()?.sub_return_data = Bytes::new();
            self.current_frame()?.stack.push(U256::one())?;
            return Ok(());
        }

        if should_transfer_value && !value.is_zero() {
            self.transfer(current_self, to, value)?;
        }

        let frame = CallFrame::new(
            msg_sender, exec_self, code_address, Bytecode::new(code), exec_value, calldata,
            is_static, gas, depth.saturating_add(1), should_transfer_value, false, ret_offset, ret_size,
            Stack::new(), Memory::new(),
        );
        self.call_frames.push(frame);
        self.tracer.on_frame_enter(depth.saturating_add(1));

        let outcome = self.run_current_frame();
        let context = self.finish_frame(outcome)?;
        self.propagate_to_parent(context)
    }

    fn try_run_precompile(&mut self, to: Address, input: &Bytes, gas: u64) -> Option<Result<(Bytes, u64), String>> {
        let id = to.as_bytes().last().copied().unwrap_or(0);
        self.precompile_runner
            .as_mut()
            .and_then(|runner| runner.run(id, input, gas))
    }

    fn finish_precompile_call(&mut self, outcome: Result<(Bytes, u64), String>, ret_offset: usize, ret_size: usize) -> Result<(), VMError> {
        match outcome {
            Ok((output, gas_used)) => {
                self.substate.commit_backup();
                self.charge_gas(gas_used)?;
                let to_copy = output.len().min(ret_size);
                let data = output.slice(..to_copy);
                let frame = self.current_frame()?;
                frame.sub_return_data = output;
                frame.memory.store_data_zero_padded(ret_offset, &data, ret_size)?;
                frame.stack.push(U256::one())?;
                Ok(())
            }
            Err(_message) => {
                self.substate.revert_backup(&mut self.host())?;
                self.current_frame()?.stack.push(U256::zero())?;
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn generic_create(&mut self, value: U256, code_offset: usize, code_len: usize, salt: Option<U256>) -> Result<(), VMError> {
        self.require_not_static()?;
        let depth = self.current_frame_ref()?.depth;
        if depth.saturating_add(1) >= CALL_DEPTH_LIMIT {
            self.current_frame()?.stack.push(U256::zero())?;
            return Ok(());
        }

        let init = self.current_frame()?.memory.load_range(code_offset, code_len)?;
        if init.len() > INIT_CODE_MAX_SIZE {
            return Err(ExceptionalHalt::OutOfGas.into());
        }

        let caller = self.current_frame_ref()?.to;
        let caller_balance = self.host().get_balance(caller)?;
        if caller_balance < value {
            self.current_frame()?.stack.push(U256::zero())?;
            return Ok(());
        }

        let nonce = self.host().get_nonce(caller)?;
        let new_address = match salt {
            None => create_address(caller, nonce),
            Some(salt) => create2_address(caller, salt, &init),
        };
        let existing = account_info(&mut self.host(), new_address)?;
        if existing.create_would_collide() {
            self.current_frame()?.stack.push(U256::zero())?;
            return Ok(());
        }

        let child_gas = gas_cost::max_message_call_gas(self.current_frame_ref()?.gas_remaining)?;
        self.charge_gas(child_gas)?;

        self.substate.push_backup();
        self.substate.set_nonce(&mut self.host(), caller, nonce.saturating_add(1))?;
        self.substate.set_nonce(&mut self.host(), new_address, 1)?;
        self.substate.add_created_account(new_address);
        if !value.is_zero() {
            self.transfer(caller, new_address, value)?;
        }

        let frame = CallFrame::new(
            caller, new_address, new_address, Bytecode::new(init), value, Bytes::new(),
            false, child_gas, depth.saturating_add(1), false, true, 0, 0, Stack::new(), Memory::new(),
        );
        self.call_frames.push(frame);
        self.tracer.on_frame_enter(depth.saturating_add(1));

        let outcome = self.run_current_frame();
        let context = self.finish_frame(outcome)?;
        self.propagate_to_parent(context)
    }
}

fn child_gas_charge(gas_limit: u64, gas_used: u64) -> u64 {
    gas_used.min(gas_limit)
}

fn account_info(host: &mut dyn Host, address: Address) -> Result<AccountInfo, VMError> {
    Ok(AccountInfo {
        balance: host.get_balance(address)?,
        nonce: host.get_nonce(address)?,
        code: host.get_code(address)?,
    })
}

/// `keccak256(rlp([sender, nonce]))[12..]` (spec §4.7).
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let rlp = encode_sender_nonce_list(sender, nonce);
    let hash = keccak256(&rlp);
    #[allow(clippy::indexing_slicing)]
    Address::from_slice(&hash[12..32])
}

/// `keccak256(0xFF || sender || salt || keccak256(initcode))[12..]` (spec §4.7).
pub fn create2_address(sender: Address, salt: U256, init_code: &[u8]) -> Address {
    let mut salt_bytes = [0u8; 32];
    salt.to_big_endian(&mut salt_bytes);
    let init_hash = keccak256(init_code);

    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xFF);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(&salt_bytes);
    preimage.extend_from_slice(&init_hash);

    let hash = keccak256(&preimage);
    #[allow(clippy::indexing_slicing)]
    Address::from_slice(&hash[12..32])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDatabase;

    fn vm_with_code(address: Address, code: &[u8]) -> VM {
        let mut db = InMemoryDatabase::new();
        db.set_account(address, AccountInfo { balance: U256::zero(), nonce: 0, code: Bytes::copy_from_slice(code) });
        VM::new(Box::new(db), Environment::default())
    }

    #[test]
    fn basic_arithmetic_and_return() {
        // PUSH1 10, PUSH1 32, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x0A, 0x60, 0x20, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
        let to = Address::repeat_byte(1);
        let mut vm = vm_with_code(to, &code);
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
        assert_eq!(result.output.len(), 32);
        assert_eq!(U256::from_big_endian(&result.output), U256::from(42));
    }

    #[test]
    fn invalid_jump_consumes_all_gas() {
        // PUSH1 3, JUMP, STOP, JUMPDEST
        let code = [0x60, 0x03, 0x56, 0x00, 0x5B];
        let to = Address::repeat_byte(3);
        let mut vm = vm_with_code(to, &code);
        let result = vm
            .transact(CallParams::Call {
                caller: Address::repeat_byte(4),
                to,
                value: U256::zero(),
                gas: 100,
                input: Bytes::new(),
            })
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn create2_address_matches_known_formula() {
        let sender = Address::repeat_byte(0x11);
        let mut salt = [0u8; 32];
        salt[31] = 1;
        let init = [0x00u8];
        let expected_hash = {
            let mut preimage = vec![0xFFu8];
            preimage.extend_from_slice(sender.as_bytes());
            preimage.extend_from_slice(&salt);
            preimage.extend_from_slice(&keccak256(&init));
            keccak256(&preimage)
        };
        let expected = Address::from_slice(&expected_hash[12..32]);
        assert_eq!(create2_address(sender, U256::from(1), &init), expected);
    }
}
