use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use log::{debug, info};

use crate::{
    Chip8Config, Chip8Result, FrameBuffer, Keyboard, Opcode, Program, u4,
    memory::{MEMORY_SIZE, Memory},
    stack::Stack,
};

// The constants are specified by the CHIP-8 specification
pub const ROM_START_ADDRESS: u16 = 0x200;

/// Consecutive empty instructions after which the VM gives up.
pub const EMPTY_INSTRUCTION_LIMIT: u8 = 5;

/// Read-only view of the sound timer for the audio collaborator.
#[derive(Clone)]
pub struct SoundSignal(Arc<AtomicU8>);

impl SoundSignal {
    /// True while the sound timer is above zero.
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Relaxed) > 0
    }
}

/// CHIP-8 virtual machine state
///
/// Memory, stack and registers are owned exclusively and only touched from the
/// thread that drives [`Chip8::cpu_cycle`]. The frame buffer and keyboard are
/// shared with the renderer and the input collaborator.
pub struct Chip8 {
    /// 4KB memory with the font preloaded
    pub(crate) memory: Memory,
    /// Call stack for subroutine returns
    pub(crate) stack: Stack,
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) frame_buffer: Arc<FrameBuffer>,
    /// Keypad state: 16 keys
    pub(crate) keyboard: Arc<Keyboard>,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: Arc<AtomicU8>,

    /// Number of 0000 instructions fetched in a row
    pub(crate) empty_count: u8,
    /// Set when the VM has been asked to stop, checked while blocked on FX0A
    pub(crate) stop_requested: Arc<AtomicBool>,
}

impl Chip8 {
    pub fn new(
        config: &Chip8Config,
        frame_buffer: Arc<FrameBuffer>,
        keyboard: Arc<Keyboard>,
    ) -> Self {
        Chip8 {
            memory: Memory::with_font_offset(config.font_offset),
            stack: Stack::new(),
            frame_buffer,
            keyboard,
            pc: ROM_START_ADDRESS,
            i: 0,
            v: [0; 16],
            delay_timer: 0,
            sound_timer: Arc::new(AtomicU8::new(0)),
            empty_count: 0,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copies the program into memory at the program origin. Bytes that do not fit
    /// wrap around to the start of memory.
    pub fn load(&mut self, program: &Program) {
        self.memory.load(ROM_START_ADDRESS, program.bytes());
        self.pc = ROM_START_ADDRESS;
        info!("Loaded {} byte program at {ROM_START_ADDRESS:#05X}", program.len());
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    pub fn cpu_cycle(&mut self) -> Chip8Result {
        let address = self.pc;
        let opcode = self.fetch();
        self.execute(Opcode::decode(opcode), address)
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    pub fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        // only this thread writes the sound timer
        let sound = self.sound_timer.load(Ordering::Relaxed);
        self.sound_timer.store(sound.saturating_sub(1), Ordering::Relaxed);
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn is_sound_active(&self) -> bool {
        self.sound_timer.load(Ordering::Relaxed) > 0
    }

    /// Handle for polling the sound state from another thread.
    pub fn sound_signal(&self) -> SoundSignal {
        SoundSignal(self.sound_timer.clone())
    }

    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.frame_buffer
    }

    pub fn keyboard(&self) -> &Arc<Keyboard> {
        &self.keyboard
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self, x: u4) -> u8 {
        self.v[x]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer.load(Ordering::Relaxed)
    }

    pub fn stack_pointer(&self) -> usize {
        self.stack.depth()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Fetches the next 16-bit opcode and moves the program counter past it.
    fn fetch(&mut self) -> u16 {
        let high = self.memory.fetch(self.pc);
        self.advance_pc();
        let low = self.memory.fetch(self.pc);
        self.advance_pc();

        u16::from_be_bytes([high, low])
    }

    pub(crate) fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(1) % MEMORY_SIZE as u16;
    }

    /// Skips one full instruction.
    pub(crate) fn skip(&mut self) {
        self.advance_pc();
        self.advance_pc();
    }

    pub(crate) fn count_empty(&mut self, address: u16) -> Chip8Result {
        self.empty_count += 1;
        debug!("Empty instruction at {address:#05X} ({} in a row)", self.empty_count);

        if self.empty_count >= EMPTY_INSTRUCTION_LIMIT {
            Chip8Result::Halted
        } else {
            Chip8Result::Continue
        }
    }
}

impl fmt::Display for Chip8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registers:")?;
        for (idx, value) in self.v.iter().enumerate() {
            writeln!(f, "V{idx:X}: {value:02X}")?;
        }
        writeln!(f, "PC: {:03X}", self.pc)?;
        writeln!(f, "SP: {:02}", self.stack.depth())?;
        writeln!(f, "I:  {:03X}", self.i)?;
        writeln!(f, "DT: {:02X}", self.delay_timer)?;
        write!(f, "ST: {:02X}", self.sound_timer())
    }
}
