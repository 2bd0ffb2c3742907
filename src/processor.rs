use std::cmp::Ordering;
use std::convert::TryFrom;
use std::io::Write;

use crate::memory::{Byte, Memory, Word};
use log::*;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

mod fault;
mod registers;

pub use fault::{Fault, FaultKind};
pub use registers::{Registers, REGISTER_COUNT, SP, STACK_TOP};

/// Flag set by CMP when both registers are equal
pub const FLAG_E: Byte = 0b0000_0001;
/// Flag set by CMP when the first register is greater
pub const FLAG_G: Byte = 0b0000_0010;
/// Flag set by CMP when the first register is less
pub const FLAG_L: Byte = 0b0000_0100;

/// What the fetch loop does after an instruction handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Move on to the instruction following the current one
    Advance,
    /// The handler picked the next instruction itself
    Jump(Word),
    Halt,
}

/// Emulates the LS-8 CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor {
    /// Program counter
    pub pc: Word,
    /// General purpose registers, R7 is the stack pointer
    pub registers: Registers,
    /// Flags register, `00000LGE`
    pub fl: Byte,
    /// Cleared on halt and on every fault
    pub running: bool,
    /// Instructions executed since the last reset
    steps: usize,
    step_limit: Option<usize>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Initializes a new CPU
    pub fn new() -> Self {
        Self {
            pc: 0,
            registers: Registers::default(),
            fl: 0,
            running: false,
            steps: 0,
            step_limit: None,
        }
    }

    /// Faults with [`FaultKind::StepLimitExceeded`] once `limit` instructions have executed
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Resets registers, flags and program counter. Memory is left untouched.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.fl = 0;
        self.pc = 0;
        self.steps = 0;
    }

    /// Formats the current state as `TRACE: PC | OP A B | R0 .. R7`
    pub fn trace<const S: usize>(&self, memory: &Memory<S>) -> String {
        let window = (0..3)
            .map(|offset| match memory.read_byte(self.pc.saturating_add(offset)) {
                Ok(byte) => format!("{:02X}", byte),
                Err(_) => "--".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        let registers = self
            .registers
            .as_slice()
            .iter()
            .map(|value| format!(" {:02X}", value))
            .collect::<String>();

        format!("TRACE: {:02X} | {} |{}", self.pc, window, registers)
    }

    /// Fetches the instruction at the program counter together with its operands.
    /// Operand bytes past the end of memory only fault if the instruction uses them.
    fn fetch<const S: usize>(
        &self,
        memory: &Memory<S>,
    ) -> Result<(Instruction, [Byte; 2]), FaultKind> {
        let opcode = memory.read_byte(self.pc)?;
        let window = [memory.read_byte(self.pc + 1), memory.read_byte(self.pc + 2)];
        let instruction =
            Instruction::try_from(opcode).map_err(|_| FaultKind::UnknownOpcode { opcode })?;

        let mut operands = [0; 2];
        for (operand, byte) in operands
            .iter_mut()
            .zip(window.iter())
            .take(instruction.operands())
        {
            *operand = (*byte)?;
        }

        Ok((instruction, operands))
    }

    fn register(&self, index: Byte) -> Result<Byte, FaultKind> {
        self.registers.get(index as usize)
    }

    fn set_register(&mut self, index: Byte, value: Byte) -> Result<(), FaultKind> {
        self.registers.set(index as usize, value)
    }

    fn push<const S: usize>(
        &mut self,
        memory: &mut Memory<S>,
        value: Byte,
    ) -> Result<(), FaultKind> {
        let sp = self.registers.sp();
        let next = sp.checked_sub(1).ok_or(FaultKind::StackOverflow { sp })?;
        memory.write_byte(sp as Word, value)?;
        self.registers.set_sp(next);
        Ok(())
    }

    fn pop<const S: usize>(&mut self, memory: &Memory<S>) -> Result<Byte, FaultKind> {
        let sp = self.registers.sp();
        let top = sp.checked_add(1).ok_or(FaultKind::StackUnderflow { sp })?;
        let value = memory.read_byte(top as Word)?;
        self.registers.set_sp(top);
        Ok(value)
    }

    /// Executes a single non-ALU instruction
    fn execute_instruction<W: Write, const S: usize>(
        &mut self,
        instruction: Instruction,
        [a, b]: [Byte; 2],
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<Flow, FaultKind> {
        let flow = match instruction {
            Instruction::NOP => Flow::Advance,
            Instruction::HLT => {
                debug!("HLT");
                Flow::Halt
            }
            Instruction::LDI => {
                self.set_register(a, b)?;

                debug!("LDI R{} {}", a, b);
                Flow::Advance
            }
            Instruction::LD => {
                let value = self.register(b)?;
                self.set_register(a, value)?;

                debug!("LD R{} R{}: {}", a, b, value);
                Flow::Advance
            }
            Instruction::PRN => {
                let value = self.register(a)?;
                writeln!(out, "{}", value)
                    .map_err(|err| FaultKind::Output { kind: err.kind() })?;

                debug!("PRN R{}: {}", a, value);
                Flow::Advance
            }
            Instruction::PUSH => {
                let value = self.register(a)?;
                self.push(memory, value)?;

                debug!("PUSH R{}: {}", a, value);
                Flow::Advance
            }
            Instruction::POP => {
                Registers::check(a as usize)?;
                let value = self.pop(memory)?;
                self.set_register(a, value)?;

                debug!("POP R{}: {}", a, value);
                Flow::Advance
            }
            Instruction::CALL => {
                let target = self.register(a)?;
                let ret = self.pc + instruction.len() as Word;
                let ret = Byte::try_from(ret).map_err(|_| FaultKind::OutOfRangeMemory {
                    address: ret as usize,
                })?;
                self.push(memory, ret)?;

                debug!("CALL R{}: 0x{:02X}, returning to 0x{:02X}", a, target, ret);
                Flow::Jump(target as Word)
            }
            Instruction::RET => {
                let ret = self.pop(memory)?;

                debug!("RET 0x{:02X}", ret);
                Flow::Jump(ret as Word)
            }
            Instruction::JMP
            | Instruction::JEQ
            | Instruction::JNE
            | Instruction::JGT
            | Instruction::JLT
            | Instruction::JLE
            | Instruction::JGE => {
                let target = self.register(a)?;
                let taken = match instruction {
                    Instruction::JEQ => self.fl & FLAG_E != 0,
                    Instruction::JNE => self.fl & FLAG_E == 0,
                    Instruction::JGT => self.fl & FLAG_G != 0,
                    Instruction::JLT => self.fl & FLAG_L != 0,
                    Instruction::JLE => self.fl & (FLAG_L | FLAG_E) != 0,
                    Instruction::JGE => self.fl & (FLAG_G | FLAG_E) != 0,
                    _ => true,
                };

                debug!("{} R{}: 0x{:02X} (taken: {})", instruction, a, target, taken);
                if taken {
                    Flow::Jump(target as Word)
                } else {
                    Flow::Advance
                }
            }
            _ => {
                return Err(FaultKind::UnknownOpcode {
                    opcode: instruction.into(),
                })
            }
        };

        Ok(flow)
    }

    /// Executes an arithmetic or logic instruction. The result replaces register `a`.
    fn alu(&mut self, instruction: Instruction, a: Byte, b: Byte) -> Result<(), FaultKind> {
        let x = self.register(a)?;
        let y = if instruction.operands() == 2 {
            self.register(b)?
        } else {
            0
        };

        let result = match instruction {
            Instruction::ADD => x.wrapping_add(y),
            Instruction::SUB => x.wrapping_sub(y),
            Instruction::MUL => x.wrapping_mul(y),
            Instruction::DIV => x.checked_div(y).ok_or(FaultKind::ArithmeticFault { register: b })?,
            Instruction::MOD => x.checked_rem(y).ok_or(FaultKind::ArithmeticFault { register: b })?,
            Instruction::INC => x.wrapping_add(1),
            Instruction::DEC => x.wrapping_sub(1),
            Instruction::AND => x & y,
            Instruction::OR => x | y,
            Instruction::XOR => x ^ y,
            Instruction::NOT => !x,
            // shifting out every bit leaves nothing behind
            Instruction::SHL => x.checked_shl(y as u32).unwrap_or(0),
            Instruction::SHR => x.checked_shr(y as u32).unwrap_or(0),
            Instruction::CMP => {
                self.fl = match x.cmp(&y) {
                    Ordering::Equal => FLAG_E,
                    Ordering::Greater => FLAG_G,
                    Ordering::Less => FLAG_L,
                };

                debug!("CMP R{} R{}: {:03b}", a, b, self.fl);
                return Ok(());
            }
            _ => {
                return Err(FaultKind::UnknownOpcode {
                    opcode: instruction.into(),
                })
            }
        };
        self.set_register(a, result)?;

        debug!("{} R{} {}: {}", instruction, a, y, result);
        Ok(())
    }

    fn try_execute<W: Write, const S: usize>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<(), FaultKind> {
        if let Some(limit) = self.step_limit {
            if self.steps >= limit {
                return Err(FaultKind::StepLimitExceeded { limit });
            }
        }

        let (instruction, operands) = self.fetch(memory)?;
        trace!("{}", self.trace(memory));
        self.steps += 1;

        let flow = if instruction.is_alu() {
            self.alu(instruction, operands[0], operands[1])?;
            Flow::Advance
        } else {
            self.execute_instruction(instruction, operands, memory, out)?
        };

        match flow {
            Flow::Advance => self.pc += instruction.len() as Word,
            Flow::Jump(target) => self.pc = target,
            Flow::Halt => self.running = false,
        }

        Ok(())
    }

    /// Runs one execution step. A fault clears the running flag.
    pub fn execute<W: Write, const S: usize>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<(), Fault> {
        let pc = self.pc;
        self.try_execute(memory, out).map_err(|kind| {
            self.running = false;
            Fault::new(kind, pc)
        })
    }

    /// Resets the CPU and runs the program in `memory` until it halts or faults.
    /// Program output is written to `out`.
    pub fn run<W: Write, const S: usize>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<(), Fault> {
        self.reset();
        self.running = true;

        while self.running {
            if let Err(fault) = self.execute(memory, out) {
                error!("{}", fault);
                info!("Halting...");
                return Err(fault);
            }
        }

        info!("Halting...");
        Ok(())
    }
}

macro_rules! instructions {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal , )+ ) => {
        /// Defines the instructions.
        ///
        /// Opcodes follow the layout `AABCDDDD`: `AA` is the number of operands,
        /// `B` marks ALU operations and `C` instructions that set the program counter.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Instruction {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Instruction {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl ::std::fmt::Display for Instruction {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

instructions! {
    /// No operation
    NOP = 0b0000_0000,
    /// Stop the execution of the program
    HLT = 0b0000_0001,
    /// Pop the return address off the stack and jump to it
    RET = 0b0001_0001,
    /// Push a register onto the stack
    /// @param reg
    PUSH = 0b0100_0101,
    /// Pop the top of the stack into a register
    /// @param reg
    POP = 0b0100_0110,
    /// Print the decimal value of a register
    /// @param reg
    PRN = 0b0100_0111,
    /// Push the address of the next instruction and jump to the address in a register
    /// @param reg
    CALL = 0b0101_0000,
    /// Jump to the address in a register
    /// @param reg
    JMP = 0b0101_0100,
    /// Jump if the equal flag is set
    /// @param reg
    JEQ = 0b0101_0101,
    /// Jump if the equal flag is clear
    /// @param reg
    JNE = 0b0101_0110,
    /// Jump if the greater flag is set
    /// @param reg
    JGT = 0b0101_0111,
    /// Jump if the less flag is set
    /// @param reg
    JLT = 0b0101_1000,
    /// Jump if the less or equal flag is set
    /// @param reg
    JLE = 0b0101_1001,
    /// Jump if the greater or equal flag is set
    /// @param reg
    JGE = 0b0101_1010,
    /// Increment a register
    /// @param reg
    INC = 0b0110_0101,
    /// Decrement a register
    /// @param reg
    DEC = 0b0110_0110,
    /// Bitwise not of a register
    /// @param reg
    NOT = 0b0110_1001,
    /// Load an immediate value into a register
    /// @param reg
    /// @param value
    LDI = 0b1000_0010,
    /// Copy register b into register a
    /// @param reg_a
    /// @param reg_b
    LD = 0b1000_0011,
    /// reg_a += reg_b
    ADD = 0b1010_0000,
    /// reg_a -= reg_b
    SUB = 0b1010_0001,
    /// reg_a *= reg_b
    MUL = 0b1010_0010,
    /// reg_a /= reg_b
    DIV = 0b1010_0011,
    /// reg_a %= reg_b
    MOD = 0b1010_0100,
    /// Compare two registers and set the flags register
    CMP = 0b1010_0111,
    /// reg_a &= reg_b
    AND = 0b1010_1000,
    /// reg_a |= reg_b
    OR = 0b1010_1010,
    /// reg_a ^= reg_b
    XOR = 0b1010_1011,
    /// Shift reg_a left by reg_b bits
    SHL = 0b1010_1100,
    /// Shift reg_a right by reg_b bits
    SHR = 0b1010_1101,
}

impl Instruction {
    /// Number of operand bytes following the opcode
    pub fn operands(&self) -> usize {
        (u8::from(*self) >> 6) as usize
    }

    /// Length of the instruction in bytes
    pub fn len(&self) -> usize {
        self.operands() + 1
    }

    /// Whether the instruction is dispatched to the ALU
    pub fn is_alu(&self) -> bool {
        u8::from(*self) & 0b0010_0000 != 0
    }
}
