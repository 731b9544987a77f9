//! Hardfork-independent numeric constants.

/// Maximum stack depth (items), per spec.
pub const STACK_LIMIT: usize = 1024;

/// Maximum nested call/create depth.
pub const CALL_DEPTH_LIMIT: usize = 1024;

/// EIP-170: maximum deployed contract code size.
pub const MAX_CODE_SIZE: usize = 0x6000; // 24576

/// EIP-3860: maximum initcode size.
pub const INIT_CODE_MAX_SIZE: usize = 2 * MAX_CODE_SIZE; // 49152

/// EIP-150: denominator of the "63/64ths" gas-forwarding rule.
pub const CALL_GAS_RETENTION_DIVISOR: u64 = 64;

/// Gas charged per 32-byte word of deployed code (code-deposit cost).
pub const CODE_DEPOSIT_COST_PER_BYTE: u64 = 200;

/// Gas stipend forwarded to a callee that receives a positive value transfer.
pub const CALL_VALUE_STIPEND: u64 = 2300;

/// EIP-1153 transient storage access cost (no cold/warm distinction).
pub const TLOAD_TSTORE_COST: u64 = 100;

/// Window size for BLOCKHASH: only the last 256 blocks are available.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// EIP-7702 delegation designation marker: `0xEF 0x01 0x00 || address`.
pub const DELEGATION_DESIGNATOR_PREFIX: [u8; 3] = [0xEF, 0x01, 0x00];
pub const DELEGATION_DESIGNATOR_LEN: usize = 23;

/// Word size in bytes, used throughout for memory/copy cost ceil-division.
pub const WORD_SIZE: usize = 32;

pub const SUCCESS: ethereum_types::U256 = ethereum_types::U256([1, 0, 0, 0]);
pub const FAIL: ethereum_types::U256 = ethereum_types::U256([0, 0, 0, 0]);
