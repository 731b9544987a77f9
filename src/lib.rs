//! # levm-core
//!
//! A frame-based Ethereum Virtual Machine execution engine: per-opcode
//! handlers, a nested call/create orchestrator with snapshot/revert
//! semantics, and a pluggable host interface for the surrounding state
//! backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            VM                                 │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────────────────┐   │
//! │  │ CallFrame  │  │   Memory   │  │        Stack          │   │
//! │  └────────────┘  └────────────┘  └──────────────────────┘   │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────────────────┐   │
//! │  │ Substate   │  │Precompiles │  │     Environment       │   │
//! │  └────────────┘  └────────────┘  └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Host                               │
//! │               (account balances, nonces, code, storage)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key components
//!
//! - [`vm::VM`]: the call/create orchestrator and resumable entry point
//! - [`call_frame::CallFrame`]: one call/create activation record
//! - [`memory::Memory`]: arena-backed, quadratic-cost byte memory
//! - [`environment::Environment`]: block/transaction/fork context
//! - [`host::Host`]: the pluggable state backend
//! - [`opcode_handlers`]: one module per opcode category
//!
//! ## Usage
//!
//! ```ignore
//! use levm_core::{VM, Environment};
//! use levm_core::host::InMemoryDatabase;
//! use levm_core::vm::CallParams;
//!
//! let mut vm = VM::new(Box::new(InMemoryDatabase::new()), Environment::default());
//! let result = vm.transact(CallParams::Call { caller, to, value, gas, input })?;
//! ```

pub mod account;
pub mod access_list;
pub mod bytecode;
pub mod call_frame;
pub mod constants;
pub mod environment;
pub mod errors;
pub mod gas_cost;
pub mod host;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod rlp;
pub mod stack;
pub mod storage;
pub mod substate;
pub mod tracer;
pub mod uint512;
pub mod utils;
pub mod vm;

pub use environment::{BlockEnv, EvmConfig, Environment, Fork, TxEnv};
pub use errors::VMError;
pub use vm::VM;
