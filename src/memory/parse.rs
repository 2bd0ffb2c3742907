//! Loader for LS-8 program text. Each line holds one byte, bare numbers are
//! binary and everything after `#` is a comment:
//!
//! ```text
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 0x40:    # continue loading at 0x40
//! 0x01     # HLT
//! ```

use std::borrow::Cow;
use std::error;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::{fmt, str::Lines};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};

use super::{Byte, Memory, Word};

macro_rules! propagate {
    ( $res:expr ) => {
        match $res {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidAddress { address: usize },
    InvalidNumber { radix: u32 },
    InvalidAddressLabel,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidAddress { address } => {
                write!(f, "memory has no address `0x{:x}`", address)
            }
            ParseErrorKind::InvalidNumber { radix } => {
                write!(f, "failed to parse number with radix `{}`", radix)
            }
            ParseErrorKind::InvalidAddressLabel => f.write_str("invalid address label"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseError {}

/// All errors of one program, in line order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut errors = self.0.iter();
        if let Some(first) = errors.next() {
            write!(f, "{}", first)?;
        }
        for err in errors {
            write!(f, "\n{}", err)?;
        }
        Ok(())
    }
}

impl error::Error for ParseErrors {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Parses a number, binary unless prefixed with `0b`, `0o`, `0d` or `0x`.
/// Evaluates to `None` for blank input and `Some(Err(radix))` if parsing fails.
macro_rules! parse_number {
    ( $ty:ty: $s:expr ) => {{
        let line = $s.trim();

        if line.is_empty() {
            None
        } else {
            let (radix, offset) = match line.as_bytes() {
                [b'0', b'b', ..] => (2, 2),
                [b'0', b'o', ..] => (8, 2),
                [b'0', b'd', ..] => (10, 2),
                [b'0', b'x', ..] => (16, 2),
                _ => (2, 0),
            };

            Some(<$ty>::from_str_radix(&line[offset..], radix).map_err(|_| radix))
        }
    }};
}

#[derive(Debug, Clone)]
pub struct Parser<'a, const S: usize> {
    lines: Lines<'a>,
    line_nr: usize,
    /// Address the next byte is written to
    address: Word,
    memory: Memory<S>,
}

impl<'a, const S: usize> Parser<'a, S> {
    /// Creates a new parse for `data` which will try to populate `memory`.
    pub fn new(data: &'a str, memory: Memory<S>) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            address: 0,
            memory,
        }
    }

    /// Consumes `self` and tries to parse all `self.data` into memory.
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(mut self) -> Result<Memory<S>, ParseErrors> {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(self.memory)
        } else {
            Err(ParseErrors(errors))
        }
    }

    /// Tries to parse the next line. Each byte should be located on it's own line.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?;
        self.line_nr += 1;

        let line = line.split('#').next().unwrap_or_default().trim();

        if line.is_empty() {
            // Comment or empty line; skip
            Some(Ok(()))
        } else if line.ends_with(':') {
            self.parse_address_label(line)
        } else {
            self.parse_byte(line)
        }
    }

    /// Tries to parse line as an address label.
    ///
    /// # Examples
    ///
    /// - `0x22:`
    /// - `01000000:`
    fn parse_address_label(&mut self, line: &str) -> Option<Result<()>> {
        let line = line
            .strip_suffix(':')
            .expect("Line is not an address label");

        log::debug!("[{}] Found address label", self.line_nr);

        let address = propagate!(propagate!(parse_number!(u16: line)
            .ok_or_else(|| ParseError::new(
                ParseErrorKind::InvalidAddressLabel,
                "an address label needs to have an address set",
                self.line_nr
            )))
        .map_err(|radix| {
            ParseError::new(
                ParseErrorKind::InvalidNumber { radix },
                format!("failed to parse the address `{}`", line),
                self.line_nr,
            )
        }));

        if address as usize >= S {
            return Some(Err(ParseError::new(
                ParseErrorKind::InvalidAddress {
                    address: address as usize,
                },
                "address label is outside of memory",
                self.line_nr,
            )));
        }

        log::debug!("[{}] Address label `0x{:x}`", self.line_nr, address);

        self.address = address;

        Some(Ok(()))
    }

    /// Tries to parse line as a single byte.
    ///
    /// # Examples
    ///
    /// - `10000010`
    /// - `0x82`
    fn parse_byte(&mut self, line: &str) -> Option<Result<()>> {
        let byte = propagate!(parse_number!(Byte: line)?.map_err(|radix| {
            ParseError::new(
                ParseErrorKind::InvalidNumber { radix },
                format!("`{}` is not a byte", line),
                self.line_nr,
            )
        }));

        Some(self.write_byte(byte))
    }

    /// Writes `byte` into memory at [`Parser::address`] and moves on to the
    /// next address.
    ///
    /// # Errors
    ///
    /// This will return an error if the program does not fit into memory.
    fn write_byte(&mut self, byte: Byte) -> Result<()> {
        self.memory
            .write_byte(self.address, byte)
            .map_err(|_| {
                ParseError::new(
                    ParseErrorKind::InvalidAddress {
                        address: self.address as usize,
                    },
                    "program does not fit into memory",
                    self.line_nr,
                )
            })?;
        self.address = self.address.saturating_add(1);
        Ok(())
    }
}

impl<const S: usize> FromStr for Memory<S> {
    type Err = ParseErrors;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Parser::new(data, Self::default()).parse()
    }
}

impl<const S: usize> Memory<S> {
    /// Reads and parses a program file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EyreResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read program `{}`", path.display()))?;

        data.parse::<Self>()
            .wrap_err_with(|| format!("Failed to parse program `{}`", path.display()))
    }

    /// Like [`Memory::from_file`], but falls back to the default program
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> EyreResult<Self> {
        match Self::from_file(path) {
            Ok(memory) => Ok(memory),
            Err(err) => {
                log::warn!("{:?}", err);
                log::warn!("Loading the default program instead");
                Self::with_default_program().map_err(|kind| eyre!(kind))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::{StdMem, DEFAULT_PROGRAM};
    use crate::processor::Instruction;

    use super::*;
    use color_eyre::Result;

    const PRINT8: &str = r#"
        # print8.ls8
        10000010 # LDI R0,8
        00000000
        00001000
        01000111 # PRN R0
        00000000
        00000001 # HLT
    "#;

    #[test]
    fn parse_print8() -> Result<()> {
        let mem = StdMem::from_str(PRINT8)?;

        assert_eq!(mem.read_byte(0)?, Instruction::LDI.into());
        assert_eq!(mem.read_byte(1)?, 0);
        assert_eq!(mem.read_byte(2)?, 8);
        assert_eq!(mem.read_byte(3)?, Instruction::PRN.into());
        assert_eq!(mem.read_byte(4)?, 0);
        assert_eq!(mem.read_byte(5)?, Instruction::HLT.into());
        assert_eq!(mem.read_byte(6)?, 0);

        Ok(())
    }

    #[test]
    fn parse_radix_prefixes() -> Result<()> {
        let data = r#"
            0x82
            0o0
            0d8
            0b01000111
            0
            1
        "#;

        let mem = StdMem::from_str(data)?;
        let expected = StdMem::from_str(PRINT8)?;

        assert_eq!(mem, expected);

        Ok(())
    }

    #[test]
    fn parse_address_labels() -> Result<()> {
        let data = r#"
            0x40:
                0x01
            00010000:   # binary label
                0x47
        "#;

        let mem = StdMem::from_str(data)?;

        assert_eq!(mem.read_byte(0x40)?, Instruction::HLT.into());
        assert_eq!(mem.read_byte(0x10)?, Instruction::PRN.into());
        assert_eq!(mem.read_byte(0)?, 0);

        Ok(())
    }

    #[test]
    fn parse_collects_errors() -> Result<()> {
        let data = "10000010\n00000002 # not binary\nxyz\n0x100:\n:\n";

        let errors = StdMem::from_str(data).unwrap_err().0;

        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].line_nr(), 2);
        assert_eq!(errors[0].kind(), ParseErrorKind::InvalidNumber { radix: 2 });
        assert_eq!(errors[1].line_nr(), 3);
        assert_eq!(
            errors[2],
            ParseError::new(
                ParseErrorKind::InvalidAddress { address: 0x100 },
                "address label is outside of memory",
                4,
            )
        );
        assert_eq!(errors[3].kind(), ParseErrorKind::InvalidAddressLabel);

        Ok(())
    }

    #[test]
    fn parse_program_too_large() -> Result<()> {
        let data = "0xFF:\n1\n1\n";

        let errors = StdMem::from_str(data).unwrap_err().0;

        assert_eq!(
            errors,
            vec![ParseError::new(
                ParseErrorKind::InvalidAddress { address: 0x100 },
                "program does not fit into memory",
                3,
            )]
        );

        Ok(())
    }

    #[test]
    fn missing_file_falls_back_to_default_program() -> Result<()> {
        let path = "this/program/does/not/exist.ls8";

        assert!(StdMem::from_file(path).is_err());

        let mem = StdMem::from_file_or_default(path)?;
        assert_eq!(&mem.data[..DEFAULT_PROGRAM.len()], &DEFAULT_PROGRAM);

        Ok(())
    }

    #[test]
    fn load_program_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("ls8-print8-{}.ls8", std::process::id()));
        fs::write(&path, PRINT8)?;

        let mem = StdMem::from_file(&path);
        fs::remove_file(&path)?;

        assert_eq!(mem?, StdMem::from_str(PRINT8)?);

        Ok(())
    }
}
