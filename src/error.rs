use crate::state::Address;

/// Conditions surfaced by loading and executing programs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Chip8Error {
    #[error("Program too large ({size} bytes), program memory holds {capacity} bytes")]
    LoadOverflow { size: usize, capacity: usize },

    #[error("Stack overflow: no room to push return address {address:#05X}")]
    StackOverflow { address: Address },

    #[error("Invalid memory address: {address:#06X}")]
    InvalidAddress { address: usize },

    #[error("Cannot write {len} byte(s) into reserved memory at {address:#06X}")]
    MemWrite { address: usize, len: usize },

    #[error("Execution halted waiting for a key press")]
    InputHalt,

    #[error("Unknown instruction: {:02X}{:02X}", .raw[0], .raw[1])]
    NoOp { raw: [u8; 2] },
}

impl Chip8Error {
    /// Whether the condition stops a batch for good. `InputHalt` stops it
    /// too, but resumes once a key is pressed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Chip8Error::InputHalt | Chip8Error::NoOp { .. })
    }
}
