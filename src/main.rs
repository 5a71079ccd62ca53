mod emulator;
mod settings;

use clap::Parser;

use crate::emulator::Emulator;
use crate::settings::{Args, Settings};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Off)
        .filter_module("chip8", log::LevelFilter::Warn)
        .filter_module("chip8_core", log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let mut emulator = Emulator::new(Settings::from(args));

    emulator.run()?;

    Ok(())
}
