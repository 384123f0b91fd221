use crate::font::FONT_START_ADDRESS;

/// Instruction clock used when nothing else is requested.
pub const DEFAULT_CLOCK_SPEED: u32 = 500;

/// Countdown timer cadence, fixed by the platform.
pub const TIMER_HZ: u32 = 60;

/// Tunables of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chip8Config {
    /// Instructions executed per second.
    pub clock_speed: u32,
    /// Memory address of the hexadecimal glyph table.
    pub font_offset: u16,
}

impl Default for Chip8Config {
    fn default() -> Self {
        Self {
            clock_speed: DEFAULT_CLOCK_SPEED,
            font_offset: FONT_START_ADDRESS,
        }
    }
}
