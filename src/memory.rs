use crate::processor::{FaultKind, Instruction};

pub mod parse;

pub type Byte = u8; // 1 byte
pub type Word = u16; // 2 bytes, wide enough to address one past the end of memory

/// Size of the LS-8 memory bank
pub const MEMORY_SIZE: usize = 256;

/// Default memory
pub type StdMem = Memory<MEMORY_SIZE>;

/// Program loaded when no other program is available: prints 8 * 9.
pub const DEFAULT_PROGRAM: [Byte; 12] = [
    Instruction::LDI as Byte, // LDI R0,8
    0,
    8,
    Instruction::LDI as Byte, // LDI R1,9
    1,
    9,
    Instruction::MUL as Byte, // MUL R0,R1
    0,
    1,
    Instruction::PRN as Byte, // PRN R0
    0,
    Instruction::HLT as Byte,
];

/// Emulates memory for use with the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Memory holding [`DEFAULT_PROGRAM`] at address 0
    pub fn with_default_program() -> Result<Self, FaultKind> {
        let mut memory = Self::default();
        memory.load_program(&DEFAULT_PROGRAM)?;
        Ok(memory)
    }

    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Word) -> Result<Byte, FaultKind> {
        self.data
            .get(position as usize)
            .copied()
            .ok_or(FaultKind::OutOfRangeMemory {
                address: position as usize,
            })
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Word, value: Byte) -> Result<(), FaultKind> {
        let cell = self
            .data
            .get_mut(position as usize)
            .ok_or(FaultKind::OutOfRangeMemory {
                address: position as usize,
            })?;
        *cell = value;
        Ok(())
    }

    /// Writes an array of bytes to the memory. Nothing is written unless the
    /// whole array fits.
    pub fn write_array(&mut self, position: Word, data: &[Byte]) -> Result<(), FaultKind> {
        let start = position as usize;
        let end = start + data.len();
        if end > S {
            return Err(FaultKind::OutOfRangeMemory {
                address: start.max(S),
            });
        }

        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Places a program at address 0
    pub fn load_program(&mut self, program: &[Byte]) -> Result<(), FaultKind> {
        self.write_array(0, program)
    }

    /// Logs every non-empty row of the memory
    pub fn dump(&self) {
        for (row, chunk) in self.data.chunks(16).enumerate() {
            if chunk.iter().all(|&byte| byte == 0) {
                continue;
            }

            let bytes = chunk
                .iter()
                .map(|byte| format!("{:02X}", byte))
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!("{:02X}: {}", row * 16, bytes);
        }
    }
}

/// Writes a block of instructions directly into the memory
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as $crate::memory::Byte,
            )+
        ])
    };
}
