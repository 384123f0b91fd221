//! CHIP-8 virtual machine: instruction decoding and execution, memory, call
//! stack, and the thread-shared keypad and frame buffer a front-end talks to.

mod chip8;
mod config;
mod execute;
mod font;
mod frame_buffer;
mod keyboard;
mod nibble;
mod opcode;
mod program;
mod runner;
mod types;

pub mod memory;
pub mod stack;

pub use chip8::*;
pub use config::*;
pub use font::*;
pub use frame_buffer::*;
pub use keyboard::*;
pub use nibble::u4;
pub use opcode::*;
pub use program::*;
pub use runner::*;
pub use types::*;
