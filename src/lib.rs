//! Logical core of a CHIP-8 interpreter.
//!
//! The core owns memory, registers, timers, the call stack and the keypad
//! state, and runs fetch-decode-execute cycles on demand. Pacing, rendering,
//! ROM files and key events belong to the host.

pub mod cpu;
pub mod display;
pub mod error;
pub mod input;
pub mod instruction;
pub mod state;

pub use cpu::ExecOutcome;
pub use error::Chip8Error;
pub use input::InputGate;
pub use instruction::{AluOp, Instruction, decode};
pub use state::{Chip8State, Key, Register};
