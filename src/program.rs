use std::path::Path;

use crate::Chip8Error;

/// Raw program bytes, loaded verbatim at the program origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    /// Reads a ROM image from disk. No header or format validation is done, an empty
    /// file is a valid (if short-lived) program.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Chip8Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Chip8Error::RomRead {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Program {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for Program {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Program::from_file("/definitely/not/a/rom.ch8").unwrap_err();
        assert!(matches!(err, Chip8Error::RomRead { .. }));
    }

    #[test]
    fn reads_file_verbatim() {
        let path = std::env::temp_dir().join(format!("chip8-vm-rom-{}.ch8", std::process::id()));
        std::fs::write(&path, [0x00, 0xE0, 0x12, 0x00]).unwrap();

        let program = Program::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(program.len(), 4);
        assert_eq!(program.bytes(), &[0x00, 0xE0, 0x12, 0x00]);
    }

    #[test]
    fn empty_file_loads_and_halts_the_vm() {
        use std::sync::Arc;

        use crate::{Chip8, Chip8Config, Chip8Runner, FrameBuffer, Keyboard};

        let path = std::env::temp_dir().join(format!("chip8-vm-empty-{}.ch8", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let program = Program::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(program.is_empty());

        let mut chip8 = Chip8::new(
            &Chip8Config::default(),
            Arc::new(FrameBuffer::new()),
            Arc::new(Keyboard::new()),
        );
        chip8.load(&program);

        let summary = Chip8Runner::new(chip8, 5000).unwrap().start().unwrap();
        assert!(summary.halted);
        assert_eq!(summary.cycles, 5);
    }
}
