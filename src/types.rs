use std::path::PathBuf;

/// Result type for CHIP-8 CPU cycle execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions.
    Continue,
    /// Too many consecutive empty instructions were fetched, the program has run off into
    /// unused memory and the VM must stop.
    Halted,
}

/// Error types that can occur while setting up or driving the CHIP-8 VM
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("Failed to read ROM file {path:?}")]
    RomRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Clock speed must be at least 1 cycle per second, got {clock_speed}")]
    InvalidClockSpeed { clock_speed: u32 },

    #[error("The VM has already stopped and cannot be resumed")]
    AlreadyStopped,

    #[error("Failed to spawn the VM thread")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("The VM thread panicked")]
    ThreadPanicked,
}
