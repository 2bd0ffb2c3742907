use std::{error, fmt, io};

use crate::memory::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Memory access outside of the memory bank
    OutOfRangeMemory { address: usize },
    /// Register index outside of the register file
    OutOfRangeRegister { index: usize },
    /// The fetched byte is not an instruction
    UnknownOpcode { opcode: u8 },
    /// Division or modulo by a zero register
    ArithmeticFault { register: u8 },
    /// Pop or return without a pushed value
    StackUnderflow { sp: u8 },
    /// Push or call with the stack pointer at the bottom of memory
    StackOverflow { sp: u8 },
    /// The configured step budget ran out
    StepLimitExceeded { limit: usize },
    /// Program output could not be written
    Output { kind: io::ErrorKind },
}

impl error::Error for FaultKind {}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::OutOfRangeMemory { address } => {
                write!(f, "memory address `0x{:x}` is outside of memory", address)
            }
            FaultKind::OutOfRangeRegister { index } => {
                write!(f, "there is no register `{}`", index)
            }
            FaultKind::UnknownOpcode { opcode } => {
                write!(f, "unknown opcode `0x{:02X}`", opcode)
            }
            FaultKind::ArithmeticFault { register } => {
                write!(f, "division by zero, register `{}` is zero", register)
            }
            FaultKind::StackUnderflow { sp } => {
                write!(f, "no values left on the stack (sp: 0x{:02X})", sp)
            }
            FaultKind::StackOverflow { sp } => {
                write!(f, "stack grew past the start of memory (sp: 0x{:02X})", sp)
            }
            FaultKind::StepLimitExceeded { limit } => {
                write!(f, "step limit of {} instructions exceeded", limit)
            }
            FaultKind::Output { kind } => write!(f, "failed to write output: {:?}", kind),
        }
    }
}

/// A fault raised while executing a program. Faults always halt the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    kind: FaultKind,
    pc: Word,
}

impl Fault {
    pub fn new(kind: FaultKind, pc: Word) -> Self {
        Self { kind, pc }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Address of the instruction that faulted
    pub fn pc(&self) -> Word {
        self.pc
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault [pc: 0x{:02X}]: {}", self.pc, self.kind)
    }
}

impl error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn display_includes_pc_and_context() -> Result<()> {
        let fault = Fault::new(FaultKind::OutOfRangeMemory { address: 0x100 }, 0xFE);
        assert_eq!(
            fault.to_string(),
            "fault [pc: 0xFE]: memory address `0x100` is outside of memory"
        );

        let fault = Fault::new(FaultKind::UnknownOpcode { opcode: 0xFF }, 3);
        assert_eq!(fault.to_string(), "fault [pc: 0x03]: unknown opcode `0xFF`");

        let fault = Fault::new(FaultKind::StackUnderflow { sp: 0xFF }, 0x10);
        assert_eq!(fault.kind(), FaultKind::StackUnderflow { sp: 0xFF });
        assert_eq!(fault.pc(), 0x10);
        assert_eq!(
            fault.to_string(),
            "fault [pc: 0x10]: no values left on the stack (sp: 0xFF)"
        );

        Ok(())
    }

    #[test]
    fn converts_into_report() -> Result<()> {
        let fault = Fault::new(FaultKind::ArithmeticFault { register: 1 }, 7);
        let report: color_eyre::Report = fault.into();

        assert_eq!(report.downcast_ref::<Fault>(), Some(&fault));

        Ok(())
    }
}
