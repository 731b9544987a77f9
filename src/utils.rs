//! Small stack <-> domain-type conversions shared by opcode handlers.
//!
//! The lambdaclass reference handlers reach for `unsafe { mem::transmute }`
//! to reinterpret a `U256`'s big-endian bytes as an `H256`/`Address`; we get
//! the same result safely through `ethereum_types`'s own big-endian
//! accessors instead.

use crate::errors::{ExceptionalHalt, InternalError, VMError};
use ethereum_types::{Address, H256, U256};

pub fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256(bytes)
}

pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

/// Low 20 bytes of a `U256`, the convention every address-on-the-stack
/// opcode (CALL family, EXTCODE*, BALANCE, ...) uses.
pub fn u256_to_address(value: U256) -> Address {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    #[allow(clippy::indexing_slicing)]
    Address::from_slice(&bytes[12..32])
}

pub fn address_to_u256(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Offsets and sizes popped off the stack are `U256` but every real memory
/// region fits in a `usize`; anything bigger is an out-of-gas-shaped halt
/// long before the allocation would happen, so treat overflow as
/// `VeryLargeNumber` rather than a generic internal error.
pub fn u256_to_usize(value: U256) -> Result<usize, VMError> {
    let value: u64 = value.try_into().map_err(|_| ExceptionalHalt::OutOfBounds)?;
    usize::try_from(value).map_err(|_| ExceptionalHalt::OutOfBounds.into())
}

/// A zero `size` makes `offset` irrelevant (no bytes are ever touched), so
/// an enormous offset paired with `size == 0` must not halt the opcode —
/// this mirrors the memory-expansion formula's own treatment of empty
/// ranges.
pub fn size_offset_to_usize(offset: U256, size: U256) -> Result<(usize, usize), VMError> {
    let size = u256_to_usize(size)?;
    if size == 0 {
        return Ok((0, 0));
    }
    Ok((u256_to_usize(offset)?, size))
}

pub fn u256_to_u64(value: U256) -> Result<u64, VMError> {
    u64::try_from(value).map_err(|_| InternalError::Conversion.into())
}
