pub const STACK_SIZE: usize = 64;

/// Fixed-depth return address stack.
///
/// The pointer is pre-incremented on push and post-decremented on pop. Both
/// wrap circularly instead of failing, so overflow silently overwrites the
/// oldest slots and underflow reads from the top slot.
pub struct Stack {
    slots: [u16; STACK_SIZE],
    pointer: usize,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            slots: [0; STACK_SIZE],
            pointer: 0,
        }
    }

    pub fn push(&mut self, address: u16) {
        self.pointer = (self.pointer + 1) % STACK_SIZE;
        self.slots[self.pointer] = address;
    }

    pub fn pop(&mut self) -> u16 {
        let address = self.slots[self.pointer];
        self.pointer = self.pointer.checked_sub(1).unwrap_or(STACK_SIZE - 1);
        address
    }

    /// Current stack pointer.
    pub fn depth(&self) -> usize {
        self.pointer
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = Stack::new();
        stack.push(0x200);
        stack.push(0x300);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), 0x300);
        assert_eq!(stack.pop(), 0x200);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn full_stack_round_trips_in_reverse_order() {
        let mut stack = Stack::new();
        for addr in 0..STACK_SIZE as u16 {
            stack.push(0x200 + addr);
        }
        // the 64th push lands in slot 0
        assert_eq!(stack.depth(), 0);

        for addr in (0..STACK_SIZE as u16).rev() {
            assert_eq!(stack.pop(), 0x200 + addr);
        }
    }

    #[test]
    fn overflow_wraps_without_panicking() {
        let mut stack = Stack::new();
        for addr in 0..=STACK_SIZE as u16 {
            stack.push(addr);
        }
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop(), STACK_SIZE as u16);
    }

    #[test]
    fn underflow_wraps_to_top_slot() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop(), 0);
        assert_eq!(stack.depth(), STACK_SIZE - 1);
    }
}
