use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Result, WrapErr};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use ls8::memory::StdMem;
use ls8::processor::Processor;

#[derive(Parser, Debug)]
#[command(name = "ls8")]
#[command(about = "Runs an LS-8 program", long_about = None)]
struct Options {
    /// Program to run, one byte per line. Runs the built-in demo program if omitted
    program: Option<PathBuf>,

    /// Log executed instructions, twice to also trace every step
    #[arg(short, action = ArgAction::Count)]
    verbose: u8,

    /// Fault once this many instructions have executed
    #[arg(long)]
    steps: Option<usize>,
}

impl Options {
    fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling

    let options = Options::parse();
    SimpleLogger::new().with_level(options.level()).init()?; // logging

    let mut mem = match &options.program {
        Some(path) => StdMem::from_file_or_default(path)?,
        None => StdMem::with_default_program()?,
    };
    mem.dump();

    let mut cpu = Processor::new();
    if let Some(steps) = options.steps {
        cpu = cpu.with_step_limit(steps);
    }

    let stdout = io::stdout();
    cpu.run(&mut mem, &mut stdout.lock())
        .wrap_err("Program terminated with a fault")?;

    Ok(())
}
