//! EIP-3155-shaped step hooks (spec.md §2 "Tracer hooks (optional)").
//!
//! Only the hook points are in scope — any actual trace serialization or
//! sink lives with the embedder. The default `NoopTracer` costs nothing.

use crate::call_frame::CallFrame;
use crate::errors::VMError;
use crate::opcodes::Opcode;

/// A single pre-step observation, mirroring the fields an EIP-3155 struct
/// log line carries.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub pc: usize,
    pub opcode: Opcode,
    pub gas_remaining: i64,
    pub depth: usize,
    pub frame: &'a CallFrame,
}

pub trait Tracer: Send + Sync {
    /// Called right before dispatch, after the opcode has been fetched but
    /// before any gas is charged.
    fn on_step(&mut self, _ctx: StepContext<'_>) {}

    /// Called after the handler returns, successfully or not.
    fn on_step_end(&mut self, _pc: usize, _result: &Result<(), VMError>) {}

    /// Called once when a frame (call or create) is pushed.
    fn on_frame_enter(&mut self, _depth: usize) {}

    /// Called once when a frame is popped, with whether it succeeded.
    fn on_frame_exit(&mut self, _depth: usize, _success: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}
