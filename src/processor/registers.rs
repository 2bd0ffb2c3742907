use crate::memory::Byte;

use super::FaultKind;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;
/// Register reserved for the stack pointer
pub const SP: usize = 7;
/// Initial stack pointer. The stack grows downwards from the top of memory.
pub const STACK_TOP: Byte = 0xFF;

/// The register file of the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registers {
    data: [Byte; REGISTER_COUNT],
}

impl Default for Registers {
    fn default() -> Self {
        let mut registers = Self {
            data: [0; REGISTER_COUNT],
        };
        registers.reset();
        registers
    }
}

impl Registers {
    /// Zeroes R0-R6 and points the stack pointer at the top of memory
    pub fn reset(&mut self) {
        self.data = [0; REGISTER_COUNT];
        self.data[SP] = STACK_TOP;
    }

    /// Validates a register index
    pub fn check(index: usize) -> Result<usize, FaultKind> {
        if index < REGISTER_COUNT {
            Ok(index)
        } else {
            Err(FaultKind::OutOfRangeRegister { index })
        }
    }

    pub fn get(&self, index: usize) -> Result<Byte, FaultKind> {
        Self::check(index).map(|index| self.data[index])
    }

    pub fn set(&mut self, index: usize, value: Byte) -> Result<(), FaultKind> {
        let index = Self::check(index)?;
        self.data[index] = value;
        Ok(())
    }

    pub fn sp(&self) -> Byte {
        self.data[SP]
    }

    pub fn set_sp(&mut self, value: Byte) {
        self.data[SP] = value;
    }

    pub fn as_slice(&self) -> &[Byte] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_reset() -> Result<()> {
        let mut registers = Registers::default();
        registers.set(0, 12)?;
        registers.set(6, 34)?;
        registers.set_sp(0x80);

        registers.reset();

        assert_eq!(registers.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 0xFF]);

        Ok(())
    }

    #[test]
    fn test_get_set() -> Result<()> {
        let mut registers = Registers::default();
        for index in 0..REGISTER_COUNT {
            registers.set(index, index as Byte * 3)?;
            assert_eq!(registers.get(index)?, index as Byte * 3);
        }
        assert_eq!(registers.sp(), SP as Byte * 3);

        Ok(())
    }

    #[test]
    fn test_out_of_range() -> Result<()> {
        let mut registers = Registers::default();

        assert_eq!(
            registers.get(8),
            Err(FaultKind::OutOfRangeRegister { index: 8 })
        );
        assert_eq!(
            registers.set(200, 1),
            Err(FaultKind::OutOfRangeRegister { index: 200 })
        );
        assert_eq!(registers, Registers::default());

        Ok(())
    }
}
