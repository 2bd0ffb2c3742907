use color_eyre::eyre::Result;

use ls8::memory::StdMem;
use ls8::processor::Processor;
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Debug)
        .init()?; // logging

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/programs/call.ls8".to_string());
    let mut mem = StdMem::from_file_or_default(path)?;
    let mut cpu = Processor::new().with_step_limit(10_000);

    cpu.run(&mut mem, &mut std::io::stdout())?;

    Ok(())
}
