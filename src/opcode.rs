use crate::u4;

/// CHIP-8 instruction opcodes.
///
/// The fields (x, y, n, kk, nnn) correspond to the operands encoded in the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 0000 - Empty memory. Counts towards the halt heuristic.
    Empty,

    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3xkk - Skip next instruction if Vx == kk.
    SkipRegEqualImm { x: u4, kk: u8 },
    /// 4xkk - Skip next instruction if Vx != kk.
    SkipRegNotEqualImm { x: u4, kk: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xkk - Set Vx = kk.
    SetRegImm { x: u4, kk: u8 },
    /// 7xkk - Set Vx = Vx + kk.
    AddRegImm { x: u4, kk: u8 },
    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx.
    AddIndexReg { x: u4 },

    /// 8xyN - ALU operations
    ALU { x: u4, y: u4, op: OpcodeALU },
    /// Cxkk - Set Vx = random byte AND kk.
    Random { x: u4, kk: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// Dxyn - Display n-byte sprite starting at I at (Vx, Vy).
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key with the value of Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key with the value of Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Wait for a key press, store the value of the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of sprite for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    BCD { x: u4 },

    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },

    /// Any pattern not listed above.
    Unknown(u16),
}

/// ALU operations for the 8xyN instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeALU {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy, VF = carry
    Add,
    /// 8xy5 - Vx = Vx - Vy, VF = NOT borrow
    Sub,
    /// 8xy6 - Vx = Vx SHR 1, VF = shifted out bit
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx, VF = NOT borrow
    SubReverse,
    /// 8xyE - Vx = Vx SHL 1, VF = shifted out bit
    ShiftLeft,
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an `Opcode` enum variant.
    pub fn decode(opcode: u16) -> Self {
        let nibble = (
            ((opcode & 0xF000) >> 12) as u8,
            ((opcode & 0x0F00) >> 8) as u8,
            ((opcode & 0x00F0) >> 4) as u8,
            (opcode & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let kk = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        match nibble {
            (0x0, 0x0, 0x0, 0x0) => Opcode::Empty,
            (0x0, 0x0, 0xE, 0x0) => Opcode::ClearDisplay,
            (0x0, 0x0, 0xE, 0xE) => Opcode::Return,
            (0x1, _, _, _) => Opcode::Jump { nnn },
            (0x2, _, _, _) => Opcode::Call { nnn },
            (0x3, _, _, _) => Opcode::SkipRegEqualImm { x, kk },
            (0x4, _, _, _) => Opcode::SkipRegNotEqualImm { x, kk },
            (0x5, _, _, 0x0) => Opcode::SkipRegEqualReg { x, y },
            (0x6, _, _, _) => Opcode::SetRegImm { x, kk },
            (0x7, _, _, _) => Opcode::AddRegImm { x, kk },
            (0x8, _, _, _) => Opcode::ALU {
                x,
                y,
                op: match nibble.3 {
                    0x0 => OpcodeALU::Set,
                    0x1 => OpcodeALU::Or,
                    0x2 => OpcodeALU::And,
                    0x3 => OpcodeALU::Xor,
                    0x4 => OpcodeALU::Add,
                    0x5 => OpcodeALU::Sub,
                    0x6 => OpcodeALU::ShiftRight,
                    0x7 => OpcodeALU::SubReverse,
                    0xE => OpcodeALU::ShiftLeft,
                    _ => return Opcode::Unknown(opcode),
                },
            },
            (0x9, _, _, 0x0) => Opcode::SkipRegNotEqualReg { x, y },
            (0xA, _, _, _) => Opcode::SetIndexImm { nnn },
            (0xB, _, _, _) => Opcode::JumpWithOffset { nnn },
            (0xC, _, _, _) => Opcode::Random { x, kk },
            (0xD, _, _, _) => Opcode::Draw { x, y, n },
            (0xE, _, 0x9, 0xE) => Opcode::SkipIfPressed { x },
            (0xE, _, 0xA, 0x1) => Opcode::SkipIfNotPressed { x },
            (0xF, _, 0x0, 0x7) => Opcode::ReadDelayTimer { x },
            (0xF, _, 0x0, 0xA) => Opcode::WaitForKey { x },
            (0xF, _, 0x1, 0x5) => Opcode::SetDelayTimer { x },
            (0xF, _, 0x1, 0x8) => Opcode::SetSoundTimer { x },
            (0xF, _, 0x1, 0xE) => Opcode::AddIndexReg { x },
            (0xF, _, 0x2, 0x9) => Opcode::FontChar { x },
            (0xF, _, 0x3, 0x3) => Opcode::BCD { x },
            (0xF, _, 0x5, 0x5) => Opcode::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Opcode::LoadRegs { x },

            _ => Opcode::Unknown(opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operand_fields() {
        assert_eq!(
            Opcode::decode(0x6A42),
            Opcode::SetRegImm {
                x: u4::new(0xA),
                kk: 0x42
            }
        );
        assert_eq!(Opcode::decode(0x1234), Opcode::Jump { nnn: 0x234 });
        assert_eq!(
            Opcode::decode(0xD125),
            Opcode::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(5)
            }
        );
    }

    #[test]
    fn decodes_zero_page() {
        assert_eq!(Opcode::decode(0x0000), Opcode::Empty);
        assert_eq!(Opcode::decode(0x00E0), Opcode::ClearDisplay);
        assert_eq!(Opcode::decode(0x00EE), Opcode::Return);
        // machine code routines are not supported
        assert_eq!(Opcode::decode(0x0123), Opcode::Unknown(0x0123));
    }

    #[test]
    fn decodes_alu_by_low_nibble() {
        let x = u4::new(3);
        let y = u4::new(4);
        assert_eq!(
            Opcode::decode(0x834E),
            Opcode::ALU {
                x,
                y,
                op: OpcodeALU::ShiftLeft
            }
        );
        assert_eq!(Opcode::decode(0x8348), Opcode::Unknown(0x8348));
    }

    #[test]
    fn rejects_bad_sub_patterns() {
        assert_eq!(Opcode::decode(0x5121), Opcode::Unknown(0x5121));
        assert_eq!(Opcode::decode(0x9121), Opcode::Unknown(0x9121));
        assert_eq!(Opcode::decode(0xE1FF), Opcode::Unknown(0xE1FF));
        assert_eq!(Opcode::decode(0xF1FF), Opcode::Unknown(0xF1FF));
    }

    #[test]
    fn decodes_f_family() {
        let x = u4::new(7);
        assert_eq!(Opcode::decode(0xF70A), Opcode::WaitForKey { x });
        assert_eq!(Opcode::decode(0xF729), Opcode::FontChar { x });
        assert_eq!(Opcode::decode(0xF733), Opcode::BCD { x });
        assert_eq!(Opcode::decode(0xF755), Opcode::StoreRegs { x });
        assert_eq!(Opcode::decode(0xF765), Opcode::LoadRegs { x });
    }
}
