use std::sync::atomic::Ordering;

use log::warn;

use crate::{
    Chip8, Chip8Result, Opcode, OpcodeALU,
    font::FONT_GLYPH_SIZE,
    memory::MEMORY_SIZE,
    u4,
};

impl Chip8 {
    /// Applies a decoded instruction. `address` is where it was fetched from;
    /// the program counter already points past it.
    pub(crate) fn execute(&mut self, opcode: Opcode, address: u16) -> Chip8Result {
        if opcode != Opcode::Empty {
            self.empty_count = 0;
        }

        match opcode {
            Opcode::Empty => {
                return self.count_empty(address);
            }
            Opcode::ClearDisplay => {
                self.frame_buffer.clear();
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = (nnn + u16::from(self.v[0])) % MEMORY_SIZE as u16;
            }
            Opcode::Call { nnn } => {
                self.stack.push(self.pc);
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop();
            }
            Opcode::SkipRegEqualImm { x, kk } => {
                if self.v[x] == kk {
                    self.skip();
                }
            }
            Opcode::SkipRegNotEqualImm { x, kk } => {
                if self.v[x] != kk {
                    self.skip();
                }
            }
            Opcode::SkipRegEqualReg { x, y } => {
                if self.v[x] == self.v[y] {
                    self.skip();
                }
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                if self.v[x] != self.v[y] {
                    self.skip();
                }
            }
            Opcode::SetRegImm { x, kk } => {
                self.v[x] = kk;
            }
            Opcode::AddRegImm { x, kk } => {
                self.v[x] = self.v[x].wrapping_add(kk);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, kk } => {
                let rand_byte: u8 = rand::random();
                self.v[x] = rand_byte & kk;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                if self.keyboard.is_down(self.v[x]) {
                    self.skip();
                }
            }
            Opcode::SkipIfNotPressed { x } => {
                if !self.keyboard.is_down(self.v[x]) {
                    self.skip();
                }
            }
            Opcode::WaitForKey { x } => {
                self.execute_wait_for_key(x);
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer.store(self.v[x], Ordering::Relaxed);
            }
            Opcode::FontChar { x } => {
                let offset = u16::from(self.v[x]) * FONT_GLYPH_SIZE;
                self.i = self.memory.font().wrapping_add(offset);
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                self.memory.write(self.i, value / 100);
                self.memory.write(self.i.wrapping_add(1), (value / 10) % 10);
                self.memory.write(self.i.wrapping_add(2), value % 10);
            }
            Opcode::StoreRegs { x } => {
                for reg_index in 0..=usize::from(x) {
                    let address = self.i.wrapping_add(reg_index as u16);
                    self.memory.write(address, self.v[reg_index]);
                }
            }
            Opcode::LoadRegs { x } => {
                for reg_index in 0..=usize::from(x) {
                    let address = self.i.wrapping_add(reg_index as u16);
                    self.v[reg_index] = self.memory.fetch(address);
                }
            }
            Opcode::Unknown(opcode) => {
                warn!("Unknown instruction {opcode:04X} at {address:#05X}, skipping");
            }
        };

        Chip8Result::Continue
    }

    /// VF is written after Vx, so the flag wins when x is F.
    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = u8::from(overflow);
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow); // Notice that borrow is inverted
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow);
            }
            OpcodeALU::ShiftRight => {
                let lsb = self.v[x] & 1;
                self.v[x] >>= 1;
                self.v[0xF] = lsb;
            }
            OpcodeALU::ShiftLeft => {
                let msb = self.v[x] >> 7;
                self.v[x] <<= 1;
                self.v[0xF] = msb;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let sprite: Vec<u8> = (0..u16::from(n.get()))
            .map(|row| self.memory.fetch(self.i.wrapping_add(row)))
            .collect();

        let collision = self.frame_buffer.draw_sprite(&sprite, self.v[x], self.v[y]);
        self.v[0xF] = u8::from(collision);
    }

    /// Spins on the keyboard until a key is held. Only this thread is blocked; the
    /// wait is abandoned if the VM is asked to stop.
    fn execute_wait_for_key(&mut self, x: u4) {
        loop {
            if let Some(key) = self.keyboard.next_pressed_key() {
                self.v[x] = key.get();
                return;
            }

            if self.stop_requested.load(Ordering::Relaxed) {
                return;
            }

            std::thread::yield_now();
        }
    }
}
