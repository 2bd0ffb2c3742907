use color_eyre::eyre::Result;

use ls8::memory::StdMem;
use ls8::processor::Processor;
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Trace)
        .init()?; // logging

    let mut mem = StdMem::from_file("demos/programs/stack.ls8")?;
    mem.dump();
    let mut cpu = Processor::new();

    cpu.run(&mut mem, &mut std::io::stdout())?;
    println!("SP back at 0x{:02X}", cpu.registers.sp());

    Ok(())
}
