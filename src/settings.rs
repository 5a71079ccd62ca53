use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_FRAME_RATE: u64 = 60;
pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u64 = 700;

/// Run a CHIP-8 program in the terminal.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to the program image
    pub rom: PathBuf,

    /// Frames per second; timers tick once per frame
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: u64,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    pub ips: u64,

    /// Stop on an unknown instruction instead of skipping it
    #[arg(long)]
    pub halt_on_noop: bool,
}

pub struct Settings {
    pub frame_rate: u64,
    pub ips: u64,
    pub rom: PathBuf,
    pub halt_on_noop: bool,
}
impl Settings {
    pub fn new(frame_rate: u64, ips: u64, rom: PathBuf) -> Self {
        Settings {
            frame_rate: frame_rate.max(1),
            ips,
            rom,
            halt_on_noop: false,
        }
    }

    pub fn instructions_per_frame(&self) -> usize {
        (self.ips / self.frame_rate).max(1) as usize
    }
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Settings {
            halt_on_noop: args.halt_on_noop,
            ..Settings::new(args.frame_rate, args.ips, args.rom)
        }
    }
}
