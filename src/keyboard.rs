use parking_lot::Mutex;

use crate::u4;

pub const KEY_COUNT: usize = 16;

/// The 16-key hex keypad, shared between the input thread and the VM thread.
///
/// Key arguments are masked to their low four bits, so any `u8` is a valid key.
/// Every method takes the lock exactly once.
#[derive(Default)]
pub struct Keyboard {
    keys: Mutex<[bool; KEY_COUNT]>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: u8) {
        self.keys.lock()[u4::from_low_bits(key)] = true;
    }

    pub fn unset(&self, key: u8) {
        self.keys.lock()[u4::from_low_bits(key)] = false;
    }

    pub fn toggle(&self, key: u8) {
        let key = u4::from_low_bits(key);
        let mut keys = self.keys.lock();
        keys[key] = !keys[key];
    }

    pub fn is_down(&self, key: u8) -> bool {
        self.keys.lock()[u4::from_low_bits(key)]
    }

    /// Lowest pressed key, or `None` when nothing is held.
    pub fn next_pressed_key(&self) -> Option<u4> {
        self.keys
            .lock()
            .iter()
            .position(|&down| down)
            .map(|key| u4::new(key as u8))
    }

    /// Copy of all key states, indexed by key code.
    pub fn snapshot(&self) -> [bool; KEY_COUNT] {
        *self.keys.lock()
    }

    /// Releases all 16 keys.
    pub fn reset(&self) {
        *self.keys.lock() = [false; KEY_COUNT];
    }
}
