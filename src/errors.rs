//! Error taxonomy.
//!
//! `ExceptionalHalt` holds the terminal, consensus-meaningful failure kinds.
//! `VMError` is the outer error type every handler returns; it also carries
//! `InternalError` (a programmer-invariant violation, never a consensus
//! outcome) and `DatabaseError` (host I/O failure).

use crate::host::{HostError, PendingRequest};
use ethereum_types::Address;
use thiserror::Error;

/// Terminal halt kinds. All of these consume the remaining gas of the
/// current frame and unwind via revert semantics. `REVERT` itself is *not*
/// one of these — it is a normal termination handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExceptionalHalt {
    #[error("out of gas")]
    OutOfGas,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("invalid opcode")]
    InvalidOpcode,
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("invalid push: not enough immediate bytes")]
    InvalidPush,
    #[error("state-changing opcode in a static context")]
    StaticCallViolation,
    #[error("offset/length out of bounds")]
    OutOfBounds,
}

/// Programmer-invariant violations. If one of these fires, the spec's own
/// guarantees were violated by the embedder or by a bug in this crate —
/// it is not a possible consensus outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("call frame stack is empty")]
    NoActiveCallFrame,
    #[error("division by zero")]
    DivisionByZero,
    #[error("value conversion failed")]
    Conversion,
}

/// Failure surfaced by the host (external state backend).
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("host backend error for {address:?}: {message}")]
    Backend { address: Address, message: String },
    #[error("host backend error: {0}")]
    Custom(String),
}

/// Top-level error type returned by every opcode handler and orchestrator
/// entry point.
#[derive(Debug, Clone, Error)]
pub enum VMError {
    #[error(transparent)]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// `REVERT` is a normal termination, not a consensus failure, but it
    /// needs to unwind through the same `Result` plumbing as the
    /// exceptional halts so handlers share one control-flow shape.
    #[error("execution reverted")]
    RevertOpcode,
    /// Suspension signal (spec §5): the host doesn't have the requested
    /// value yet. Not a failure — the orchestrator intercepts this before
    /// it would otherwise be treated as a revert-worthy error, and no
    /// frame/substate cleanup happens on the way out.
    #[error("awaiting host data: {0:?}")]
    Pending(PendingRequest),
}

impl From<HostError> for VMError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Pending(request) => VMError::Pending(request),
            HostError::Backend(e) => VMError::Database(e),
        }
    }
}

impl VMError {
    /// `REVERT` preserves output and refunds gas; every other error kind
    /// consumes the frame's remaining gas.
    pub fn is_revert_opcode(&self) -> bool {
        matches!(self, VMError::RevertOpcode)
    }

    /// Whether this error is one the orchestrator must treat as an
    /// unrecoverable defect rather than a possible consensus outcome.
    pub fn is_internal(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::Database(_))
    }
}

/// Outcome of a single opcode handler invocation.
pub enum OpcodeResult {
    /// Continue interpreting at the (possibly already-advanced) PC.
    Continue,
    /// The frame halted normally (STOP/RETURN/SELFDESTRUCT) or raised a
    /// terminal error; execution of the frame is over.
    Halt,
}

/// Result of a transaction, or of a nested call/create, once its frame has
/// finished running.
#[derive(Debug, Clone)]
pub enum TxResult {
    Success,
    Revert(VMErrorSummary),
}

/// A `Clone`-able summary of the error that caused a revert, since `VMError`
/// itself is kept out of long-lived result structs to avoid threading
/// lifetimes through the call stack.
#[derive(Debug, Clone)]
pub struct VMErrorSummary {
    pub message: String,
    pub is_revert_opcode: bool,
}

impl From<&VMError> for VMErrorSummary {
    fn from(err: &VMError) -> Self {
        VMErrorSummary {
            message: err.to_string(),
            is_revert_opcode: err.is_revert_opcode(),
        }
    }
}

/// Outcome of executing one call/create frame to completion, as seen by its
/// parent (or by the top-level caller for the root frame).
#[derive(Debug, Clone)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas_used: u64,
    pub output: bytes::Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
