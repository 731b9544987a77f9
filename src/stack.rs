//! Fixed-capacity 256-bit value stack.

use crate::constants::STACK_LIMIT;
use crate::errors::ExceptionalHalt;
use ethereum_types::U256;

#[derive(Debug, Clone, Default)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            values: Vec::with_capacity(32),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn push(&mut self, value: U256) -> Result<(), ExceptionalHalt> {
        if self.values.len() >= STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn push_zero(&mut self) -> Result<(), ExceptionalHalt> {
        self.push(U256::zero())
    }

    pub fn pop1(&mut self) -> Result<U256, ExceptionalHalt> {
        self.values.pop().ok_or(ExceptionalHalt::StackUnderflow)
    }

    /// Pop exactly `N` values, topmost first, returned in pop order
    /// (`result[0]` was on top). Fails atomically: if there are fewer than
    /// `N` items, nothing is popped.
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], ExceptionalHalt> {
        if self.values.len() < N {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        let mut out = [U256::zero(); N];
        for slot in out.iter_mut() {
            // SAFETY-free: length was checked above, `pop()` cannot fail.
            *slot = self
                .values
                .pop()
                .ok_or(ExceptionalHalt::StackUnderflow)?;
        }
        Ok(out)
    }

    /// 1-indexed from the top: `peek(1)` is the top item.
    pub fn peek(&self, n: usize) -> Result<U256, ExceptionalHalt> {
        let len = self.values.len();
        if n == 0 || n > len {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        Ok(self.values[len - n])
    }

    /// Duplicate the `n`-th item (1-indexed from the top) onto the top.
    pub fn dup(&mut self, n: usize) -> Result<(), ExceptionalHalt> {
        let value = self.peek(n)?;
        self.push(value)
    }

    /// Swap the top item with the item at depth `n + 1` (so `swap(1)` swaps
    /// the top two items), matching SWAP1..SWAP16 semantics.
    pub fn swap_top_with(&mut self, n: usize) -> Result<(), ExceptionalHalt> {
        let len = self.values.len();
        let other = n
            .checked_add(1)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        if other > len {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        self.values.swap(len - 1, len - other);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_and_underflow() {
        let mut s = Stack::new();
        assert_eq!(s.pop1(), Err(ExceptionalHalt::StackUnderflow));
        for i in 0..STACK_LIMIT {
            s.push(U256::from(i)).unwrap();
        }
        assert_eq!(s.push(U256::zero()), Err(ExceptionalHalt::StackOverflow));
    }

    #[test]
    fn pop_order_is_top_first() {
        let mut s = Stack::new();
        s.push(U256::from(1)).unwrap();
        s.push(U256::from(2)).unwrap();
        let [top, bottom] = s.pop::<2>().unwrap();
        assert_eq!(top, U256::from(2));
        assert_eq!(bottom, U256::from(1));
    }

    #[test]
    fn pop_n_is_atomic_on_underflow() {
        let mut s = Stack::new();
        s.push(U256::from(1)).unwrap();
        assert_eq!(s.pop::<2>(), Err(ExceptionalHalt::StackUnderflow));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn dup_and_swap() {
        let mut s = Stack::new();
        s.push(U256::from(1)).unwrap();
        s.push(U256::from(2)).unwrap();
        s.push(U256::from(3)).unwrap();
        s.dup(3).unwrap();
        assert_eq!(s.peek(1).unwrap(), U256::from(1));
        s.swap_top_with(1).unwrap();
        assert_eq!(s.peek(1).unwrap(), s.peek(3).unwrap());
    }
}
