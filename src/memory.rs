use crate::font::{FONT, FONT_START_ADDRESS};

pub const MEMORY_SIZE: usize = 4096;

/// Flat 4KB byte store with the hexadecimal font preloaded.
///
/// Every address is reduced modulo [`MEMORY_SIZE`], so reads and writes never fail.
pub struct Memory {
    bytes: Box<[u8; MEMORY_SIZE]>,
    font_offset: u16,
}

impl Memory {
    pub fn new() -> Self {
        Self::with_font_offset(FONT_START_ADDRESS)
    }

    /// Creates a memory whose glyph table starts at `font_offset`.
    pub fn with_font_offset(font_offset: u16) -> Self {
        let mut memory = Self {
            bytes: Box::new([0; MEMORY_SIZE]),
            font_offset,
        };
        memory.write_font();
        memory
    }

    pub fn fetch(&self, address: u16) -> u8 {
        self.bytes[Self::wrap(address)]
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.bytes[Self::wrap(address)] = value;
    }

    /// Copies `data` starting at `origin`, wrapping past the end of memory.
    pub fn load(&mut self, origin: u16, data: &[u8]) {
        let mut address = origin;
        for &byte in data {
            self.write(address, byte);
            address = address.wrapping_add(1);
        }
    }

    /// Base address of the glyph table.
    pub fn font(&self) -> u16 {
        self.font_offset
    }

    /// Zeroes the store and rewrites the glyph table.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.write_font();
    }

    fn write_font(&mut self) {
        for (i, &byte) in FONT.iter().enumerate() {
            self.write(self.font_offset.wrapping_add(i as u16), byte);
        }
    }

    fn wrap(address: u16) -> usize {
        address as usize % MEMORY_SIZE
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_fetch() {
        let mut memory = Memory::new();
        memory.write(0x300, 0xAB);
        assert_eq!(memory.fetch(0x300), 0xAB);
    }

    #[test]
    fn addresses_wrap_around_memory_size() {
        let mut memory = Memory::new();
        memory.write(0x1123, 0x42);
        assert_eq!(memory.fetch(0x123), 0x42);
        assert_eq!(memory.fetch(0x3123), 0x42);
        assert_eq!(memory.fetch(0xF123), 0x42);

        memory.write(0x0FFF, 0x17);
        assert_eq!(memory.fetch(0xFFFF), 0x17);
    }

    #[test]
    fn font_is_preloaded_at_default_offset() {
        let memory = Memory::new();
        assert_eq!(memory.font(), 0x50);
        assert_eq!(memory.fetch(0x50), 0xF0);
        // 'A' glyph
        assert_eq!(memory.fetch(0x82), 0xF0);
        assert_eq!(memory.fetch(0x83), 0x90);
    }

    #[test]
    fn custom_font_offset() {
        let memory = Memory::with_font_offset(0x000);
        assert_eq!(memory.font(), 0);
        assert_eq!(memory.fetch(0x05), 0x20);
        assert_eq!(memory.fetch(0x50), 0x00);
    }

    #[test]
    fn reset_restores_font_and_clears_the_rest() {
        let mut memory = Memory::new();
        memory.write(0x50, 0x00);
        memory.write(0x200, 0xFF);
        memory.reset();
        assert_eq!(memory.fetch(0x50), 0xF0);
        assert_eq!(memory.fetch(0x200), 0x00);
    }

    #[test]
    fn load_wraps_past_the_end() {
        let mut memory = Memory::new();
        memory.load(0xFFE, &[1, 2, 3]);
        assert_eq!(memory.fetch(0xFFE), 1);
        assert_eq!(memory.fetch(0xFFF), 2);
        assert_eq!(memory.fetch(0x000), 3);
    }
}
