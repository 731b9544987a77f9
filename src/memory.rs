//! Byte-addressable, word-aligned, quadratic-cost memory.
//!
//! A callframe-shared buffer: when a child frame is pushed it gets a clone
//! of the parent's `Rc<RefCell<Vec<u8>>>` with `current_base` set to the
//! buffer's length at that point, so nested frames never alias each other's
//! addressable range while still reusing one allocation across the whole
//! transaction (the "arena" allocation strategy `spec.md` §5/§9 describes).

use std::{cell::RefCell, rc::Rc};

use crate::constants::WORD_SIZE;
use crate::errors::{ExceptionalHalt, InternalError, VMError};
use ExceptionalHalt::OutOfBounds;
use bytes::Bytes;
use ethereum_types::U256;

#[derive(Debug, Clone)]
pub struct Memory {
    buffer: Rc<RefCell<Vec<u8>>>,
    len: usize,
    current_base: usize,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            buffer: Rc::new(RefCell::new(Vec::new())),
            len: 0,
            current_base: 0,
        }
    }

    /// Memory for the next nested callframe: shares the allocation, starts
    /// empty at the current end of the buffer.
    pub fn next_memory(&self) -> Memory {
        let mut mem = self.clone();
        mem.current_base = mem.buffer.borrow().len();
        mem.len = 0;
        mem
    }

    /// Zeroes this frame's region of the shared buffer. Called when a
    /// child frame is popped, so the allocation can be reused by a sibling
    /// without leaking data across frames.
    pub fn clean_from_base(&self) {
        let end = self.current_base.saturating_add(self.len);
        if let Some(region) = self.buffer.borrow_mut().get_mut(self.current_base..end) {
            region.fill(0);
        }
    }

    /// Length of this frame's memory region, from its own base.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grows this frame's memory to cover `new_memory_size` bytes, rounded
    /// up to the next 32-byte word. No-op if already large enough.
    pub fn resize(&mut self, new_memory_size: usize) -> Result<(), VMError> {
        if new_memory_size == 0 {
            return Ok(());
        }
        let new_memory_size = new_memory_size
            .checked_next_multiple_of(WORD_SIZE)
            .ok_or(OutOfBounds)?;

        if new_memory_size <= self.len {
            return Ok(());
        }
        self.len = new_memory_size;

        let real_new_size = new_memory_size
            .checked_add(self.current_base)
            .ok_or(OutOfBounds)?;
        let mut buffer = self.buffer.borrow_mut();
        if real_new_size > buffer.len() {
            // Avoid many tiny reallocations for a string of small expansions.
            let rounded = real_new_size.next_multiple_of(64);
            buffer.resize(rounded, 0);
        }
        Ok(())
    }

    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }
        let new_size = offset.checked_add(size).ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let start = offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let end = start.checked_add(size).ok_or(OutOfBounds)?;
        let buf = self.buffer.borrow();
        let slice = buf.get(start..end).ok_or(OutOfBounds)?;
        Ok(Bytes::copy_from_slice(slice))
    }

    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let bytes = self.load_range(offset, WORD_SIZE)?;
        Ok(U256::from_big_endian(&bytes))
    }

    fn store(&self, data: &[u8], at_offset: usize, data_size: usize) -> Result<(), VMError> {
        if data_size == 0 {
            return Ok(());
        }
        let real_offset = at_offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let real_data_size = data_size.min(data.len());
        let end = real_offset.checked_add(real_data_size).ok_or(OutOfBounds)?;

        let mut buffer = self.buffer.borrow_mut();
        let dst = buffer.get_mut(real_offset..end).ok_or(OutOfBounds)?;
        dst.copy_from_slice(data.get(..real_data_size).ok_or(OutOfBounds)?);
        Ok(())
    }

    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        let new_size = offset.checked_add(data.len()).ok_or(OutOfBounds)?;
        self.resize(new_size)?;
        self.store(data, offset, data.len())
    }

    /// Stores `data` at `offset`, then zero-pads up to `total_size` bytes —
    /// used by CALLDATACOPY/CODECOPY/RETURNDATACOPY where the source may be
    /// shorter than the requested length.
    pub fn store_data_zero_padded(
        &mut self,
        offset: usize,
        data: &[u8],
        total_size: usize,
    ) -> Result<(), VMError> {
        if total_size == 0 {
            return Ok(());
        }
        let new_size = offset.checked_add(total_size).ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let copy_size = data.len().min(total_size);
        if copy_size > 0 {
            self.store(data, offset, copy_size)?;
        }
        if copy_size < total_size {
            let zero_offset = offset.checked_add(copy_size).ok_or(OutOfBounds)?;
            let zero_size = total_size - copy_size;
            self.store_zeros(zero_offset, zero_size)?;
        }
        Ok(())
    }

    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        let new_size = offset.checked_add(WORD_SIZE).ok_or(OutOfBounds)?;
        self.resize(new_size)?;
        let mut bytes = [0u8; WORD_SIZE];
        word.to_big_endian(&mut bytes);
        self.store(&bytes, offset, WORD_SIZE)
    }

    /// Copies `size` bytes from `from_offset` to `to_offset` within this
    /// frame's region, correct for overlapping ranges (MCOPY semantics).
    pub fn copy_within(
        &mut self,
        from_offset: usize,
        to_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let needed = to_offset
            .max(from_offset)
            .checked_add(size)
            .ok_or(InternalError::Overflow)?;
        self.resize(needed)?;

        let true_from = from_offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let true_to = to_offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let from_end = true_from.checked_add(size).ok_or(InternalError::Overflow)?;

        let mut buffer = self.buffer.borrow_mut();
        if from_end > buffer.len() || true_to.checked_add(size).is_none() {
            return Err(OutOfBounds.into());
        }
        buffer.copy_within(true_from..from_end, true_to);
        Ok(())
    }

    pub fn store_zeros(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }
        let new_size = offset.checked_add(size).ok_or(OutOfBounds)?;
        self.resize(new_size)?;
        let real_offset = offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let end = real_offset.checked_add(size).ok_or(OutOfBounds)?;
        let mut buffer = self.buffer.borrow_mut();
        buffer.get_mut(real_offset..end).ok_or(OutOfBounds)?.fill(0);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Marginal cost of growing memory from `current_memory_size` to
/// `new_memory_size` bytes (0 if no growth). `spec.md` §3's quadratic
/// formula: `3W + floor(W^2/512)` where `W` is the size in 32-byte words.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    if new_memory_size <= current_memory_size {
        return Ok(0);
    }
    Ok(cost(new_memory_size)?.saturating_sub(cost(current_memory_size)?))
}

fn cost(memory_size: usize) -> Result<u64, VMError> {
    let memory_size = u64::try_from(memory_size).map_err(|_| InternalError::Conversion)?;
    let words = memory_size.div_ceil(WORD_SIZE as u64);
    let gas_cost = words
        .checked_mul(words)
        .ok_or(InternalError::Overflow)?
        .checked_div(512)
        .ok_or(InternalError::DivisionByZero)?
        .checked_add(words.checked_mul(3).ok_or(InternalError::Overflow)?)
        .ok_or(InternalError::Overflow)?;
    Ok(gas_cost)
}

/// Rounds `offset + size` up to the next word boundary; `0` if `size == 0`
/// (a zero-length access never expands memory).
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }
    offset
        .checked_add(size)
        .and_then(|sum| sum.checked_next_multiple_of(WORD_SIZE))
        .ok_or_else(|| OutOfBounds.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_rounds_up_to_word() {
        let mut mem = Memory::new();
        mem.resize(1).unwrap();
        assert_eq!(mem.len(), 32);
        assert_eq!(mem.len() % 32, 0);
    }

    #[test]
    fn expansion_cost_is_marginal() {
        let first = expansion_cost(32, 0).unwrap();
        let total = expansion_cost(64, 0).unwrap();
        let second = expansion_cost(64, 32).unwrap();
        assert_eq!(first + second, total);
    }

    #[test]
    fn store_and_load_word_roundtrip() {
        let mut mem = Memory::new();
        mem.store_word(0, U256::from(42)).unwrap();
        assert_eq!(mem.load_word(0).unwrap(), U256::from(42));
    }

    #[test]
    fn copy_within_handles_overlap() {
        let mut mem = Memory::new();
        mem.store_data(0, &[1, 2, 3, 4]).unwrap();
        mem.copy_within(0, 2, 4).unwrap();
        let result = mem.load_range(0, 6).unwrap();
        assert_eq!(&result[..], &[1, 2, 1, 2, 3, 4]);
    }

    #[test]
    fn child_frame_memory_does_not_alias_parent() {
        let mut parent = Memory::new();
        parent.store_data(0, &[9, 9, 9, 9]).unwrap();
        let mut child = parent.next_memory();
        child.store_data(0, &[1, 1, 1, 1]).unwrap();
        assert_eq!(&parent.load_range(0, 4).unwrap()[..], &[9, 9, 9, 9]);
    }
}
