use std::fmt;

use crate::error::Chip8Error;
use crate::state::{ADDR_FONT, Address, Chip8State, FONT_HEIGHT, Key, MEM_SIZE, Register};

/// A decoded instruction of the base CHIP-8 set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `00E0`
    ClearScreen,
    /// `00EE`
    Return,
    /// `1nnn`
    Jump(Address),
    /// `2nnn`
    Call(Address),
    /// `3xkk`
    SkipEqImmediate(Register, u8),
    /// `4xkk`
    SkipNeqImmediate(Register, u8),
    /// `5xy0`
    SkipEqRegister(Register, Register),
    /// `6xkk`
    LoadImmediate(Register, u8),
    /// `7xkk`
    AddImmediate(Register, u8),
    /// `8xy0`..`8xyE`
    Alu(AluOp, Register, Register),
    /// `9xy0`
    SkipNeqRegister(Register, Register),
    /// `Annn`
    LoadIndex(Address),
    /// `Bnnn`
    JumpWithOffset(Address),
    /// `Cxkk`
    Random(Register, u8),
    /// `Dxyn`
    Draw(Register, Register, u8),
    /// `Ex9E`
    SkipIfKeyPressed(Register),
    /// `ExA1`
    SkipIfKeyNotPressed(Register),
    /// `Fx07`
    ReadDelayTimer(Register),
    /// `Fx0A`
    AwaitKey(Register),
    /// `Fx15`
    SetDelayTimer(Register),
    /// `Fx18`
    SetSoundTimer(Register),
    /// `Fx1E`
    AddToIndex(Register),
    /// `Fx29`
    FontChar(Register),
    /// `Fx33`
    BinaryCodedDecimal(Register),
    /// `Fx55`
    StoreRegisters(Register),
    /// `Fx65`
    LoadRegisters(Register),
}

/// Register-to-register operations of the `8xyN` group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AluOp {
    Copy,
    Or,
    And,
    Xor,
    Add,
    Sub,
    ShiftRight,
    SubReversed,
    ShiftLeft,
}

impl AluOp {
    fn from_nibble(n: u8) -> Option<Self> {
        match n {
            0x0 => Some(AluOp::Copy),
            0x1 => Some(AluOp::Or),
            0x2 => Some(AluOp::And),
            0x3 => Some(AluOp::Xor),
            0x4 => Some(AluOp::Add),
            0x5 => Some(AluOp::Sub),
            0x6 => Some(AluOp::ShiftRight),
            0x7 => Some(AluOp::SubReversed),
            0xE => Some(AluOp::ShiftLeft),
            _ => None,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Copy => "LD",
            AluOp::Or => "OR",
            AluOp::And => "AND",
            AluOp::Xor => "XOR",
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::ShiftRight => "SHR",
            AluOp::SubReversed => "SUBN",
            AluOp::ShiftLeft => "SHL",
        }
    }
}

struct DecodedInstruction {
    /// First nibble. Represents the operation code.
    opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    x: Register,
    /// Third nibble. Used to look up one of the 16 registers.
    y: Register,
    /// Fourth nibble. A 4-bit number.
    n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    nn: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    nnn: Address,
}
impl DecodedInstruction {
    fn new([high, low]: [u8; 2]) -> Self {
        DecodedInstruction {
            opcode: high >> 4,
            x: Register::from_nibble(high),
            y: Register::from_nibble(low >> 4),
            n: low & 0x0F,
            nn: low,
            nnn: u16::from_be_bytes([high & 0x0F, low]),
        }
    }
}

/// Classifies the two instruction bytes. Bit patterns outside the base set
/// come back as `Chip8Error::NoOp`.
pub fn decode(raw: [u8; 2]) -> Result<Instruction, Chip8Error> {
    let d = DecodedInstruction::new(raw);
    let unknown = Chip8Error::NoOp { raw };

    let instruction = match d.opcode {
        0x0 => match d.nnn {
            0x0E0 => Instruction::ClearScreen,
            0x0EE => Instruction::Return,
            _ => return Err(unknown),
        },
        0x1 => Instruction::Jump(d.nnn),
        0x2 => Instruction::Call(d.nnn),
        0x3 => Instruction::SkipEqImmediate(d.x, d.nn),
        0x4 => Instruction::SkipNeqImmediate(d.x, d.nn),
        0x5 if d.n == 0 => Instruction::SkipEqRegister(d.x, d.y),
        0x6 => Instruction::LoadImmediate(d.x, d.nn),
        0x7 => Instruction::AddImmediate(d.x, d.nn),
        0x8 => match AluOp::from_nibble(d.n) {
            Some(op) => Instruction::Alu(op, d.x, d.y),
            None => return Err(unknown),
        },
        0x9 if d.n == 0 => Instruction::SkipNeqRegister(d.x, d.y),
        0xA => Instruction::LoadIndex(d.nnn),
        0xB => Instruction::JumpWithOffset(d.nnn),
        0xC => Instruction::Random(d.x, d.nn),
        0xD => Instruction::Draw(d.x, d.y, d.n),
        0xE => match d.nn {
            0x9E => Instruction::SkipIfKeyPressed(d.x),
            0xA1 => Instruction::SkipIfKeyNotPressed(d.x),
            _ => return Err(unknown),
        },
        0xF => match d.nn {
            0x07 => Instruction::ReadDelayTimer(d.x),
            0x0A => Instruction::AwaitKey(d.x),
            0x15 => Instruction::SetDelayTimer(d.x),
            0x18 => Instruction::SetSoundTimer(d.x),
            0x1E => Instruction::AddToIndex(d.x),
            0x29 => Instruction::FontChar(d.x),
            0x33 => Instruction::BinaryCodedDecimal(d.x),
            0x55 => Instruction::StoreRegisters(d.x),
            0x65 => Instruction::LoadRegisters(d.x),
            _ => return Err(unknown),
        },
        _ => return Err(unknown),
    };
    Ok(instruction)
}

/// Checks that a whole two-byte instruction can be fetched at `target`.
fn jump_target(target: usize) -> Result<Address, Chip8Error> {
    if target + 1 >= MEM_SIZE {
        return Err(Chip8Error::InvalidAddress { address: target });
    }
    // MEM_SIZE fits in 16 bits
    Ok(target as Address)
}

impl Instruction {
    /// Applies the instruction to `state`. The program counter has already
    /// been moved past the instruction.
    pub fn execute(self, state: &mut Chip8State) -> Result<(), Chip8Error> {
        match self {
            Instruction::ClearScreen => state.clear_display(),
            Instruction::Return => {
                if let Some(return_address) = state.stack.pop() {
                    state.pc = return_address;
                }
            }
            Instruction::Jump(nnn) => state.pc = jump_target(usize::from(nnn))?,
            Instruction::Call(nnn) => {
                let target = jump_target(usize::from(nnn))?;
                state.stack.push(state.pc)?;
                log::debug!("CALL {:#05X}, stack depth {}", target, state.stack.len());
                state.pc = target;
            }
            Instruction::SkipEqImmediate(x, nn) => {
                let taken = state.registers.read(x) == nn;
                skip_if(state, taken);
            }
            Instruction::SkipNeqImmediate(x, nn) => {
                let taken = state.registers.read(x) != nn;
                skip_if(state, taken);
            }
            Instruction::SkipEqRegister(x, y) => {
                let taken = state.registers.read(x) == state.registers.read(y);
                skip_if(state, taken);
            }
            Instruction::SkipNeqRegister(x, y) => {
                let taken = state.registers.read(x) != state.registers.read(y);
                skip_if(state, taken);
            }
            Instruction::LoadImmediate(x, nn) => state.registers.write(x, nn),
            Instruction::AddImmediate(x, nn) => {
                let value_x = state.registers.read(x);
                state.registers.write(x, value_x.wrapping_add(nn));
            }
            Instruction::Alu(op, x, y) => alu(state, op, x, y),
            Instruction::LoadIndex(nnn) => state.index = nnn,
            Instruction::JumpWithOffset(nnn) => {
                let target = usize::from(nnn) + usize::from(state.registers.read(Register::V0));
                state.pc = jump_target(target)?;
            }
            Instruction::Random(x, nn) => {
                let random_value = rand::random::<u8>() & nn;
                state.registers.write(x, random_value);
            }
            Instruction::Draw(x, y, n) => state.draw_sprite(x, y, n)?,
            Instruction::SkipIfKeyPressed(x) => {
                let taken = key_pressed(state, x);
                skip_if(state, taken);
            }
            Instruction::SkipIfKeyNotPressed(x) => {
                let taken = !key_pressed(state, x);
                skip_if(state, taken);
            }
            Instruction::ReadDelayTimer(x) => state.registers.write(x, state.delay_timer),
            Instruction::AwaitKey(x) => {
                state.gate.await_key(x, &state.keypad, &mut state.registers)?;
            }
            Instruction::SetDelayTimer(x) => state.delay_timer = state.registers.read(x),
            Instruction::SetSoundTimer(x) => state.sound_timer = state.registers.read(x),
            Instruction::AddToIndex(x) => {
                let value_x = state.registers.read(x);
                state.index = state.index.wrapping_add(u16::from(value_x));
            }
            Instruction::FontChar(x) => {
                let digit = state.registers.read(x) & 0x0F;
                state.index = ADDR_FONT + u16::from(digit) * FONT_HEIGHT as u16;
            }
            Instruction::BinaryCodedDecimal(x) => {
                let value_x = state.registers.read(x);
                let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
                state
                    .memory
                    .store_slice(usize::from(state.index), bcd.len())?
                    .copy_from_slice(&bcd);
            }
            Instruction::StoreRegisters(x) => {
                let count = x.index() + 1;
                let values = &state.registers.as_slice()[..count];
                state
                    .memory
                    .store_slice(usize::from(state.index), count)?
                    .copy_from_slice(values);
            }
            Instruction::LoadRegisters(x) => {
                let count = x.index() + 1;
                let values = state.memory.slice(usize::from(state.index), count)?;
                state.registers.as_mut_slice()[..count].copy_from_slice(values);
            }
        }
        Ok(())
    }
}

fn skip_if(state: &mut Chip8State, condition: bool) {
    if condition {
        state.pc = state.pc.wrapping_add(2);
    }
}

fn key_pressed(state: &Chip8State, x: Register) -> bool {
    Key::from_index(state.registers.read(x)).is_some_and(|key| state.keypad.is_key_pressed(key))
}

fn alu(state: &mut Chip8State, op: AluOp, x: Register, y: Register) {
    let value_x = state.registers.read(x);
    let value_y = state.registers.read(y);

    let (result, flag) = match op {
        AluOp::Copy => (value_y, None),
        AluOp::Or => (value_x | value_y, None),
        AluOp::And => (value_x & value_y, None),
        AluOp::Xor => (value_x ^ value_y, None),
        AluOp::Add => {
            let (sum, carry) = value_x.overflowing_add(value_y);
            (sum, Some(carry))
        }
        AluOp::Sub => (value_x.wrapping_sub(value_y), Some(value_x >= value_y)),
        AluOp::SubReversed => (value_y.wrapping_sub(value_x), Some(value_y >= value_x)),
        AluOp::ShiftRight => (value_y >> 1, Some(value_y & 0x01 == 1)),
        AluOp::ShiftLeft => (value_y << 1, Some(value_y & 0x80 != 0)),
    };

    state.registers.write(x, result);
    // VF is written last so the flag survives when x is VF
    if let Some(flag) = flag {
        state.registers.set_flag(flag);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::ClearScreen => write!(f, "CLS"),
            Instruction::Return => write!(f, "RET"),
            Instruction::Jump(nnn) => write!(f, "JP {nnn:#05X}"),
            Instruction::Call(nnn) => write!(f, "CALL {nnn:#05X}"),
            Instruction::SkipEqImmediate(x, nn) => write!(f, "SE {x}, {nn:#04X}"),
            Instruction::SkipNeqImmediate(x, nn) => write!(f, "SNE {x}, {nn:#04X}"),
            Instruction::SkipEqRegister(x, y) => write!(f, "SE {x}, {y}"),
            Instruction::LoadImmediate(x, nn) => write!(f, "LD {x}, {nn:#04X}"),
            Instruction::AddImmediate(x, nn) => write!(f, "ADD {x}, {nn:#04X}"),
            Instruction::Alu(op, x, y) => write!(f, "{} {x}, {y}", op.mnemonic()),
            Instruction::SkipNeqRegister(x, y) => write!(f, "SNE {x}, {y}"),
            Instruction::LoadIndex(nnn) => write!(f, "LD I, {nnn:#05X}"),
            Instruction::JumpWithOffset(nnn) => write!(f, "JP V0, {nnn:#05X}"),
            Instruction::Random(x, nn) => write!(f, "RND {x}, {nn:#04X}"),
            Instruction::Draw(x, y, n) => write!(f, "DRW {x}, {y}, {n}"),
            Instruction::SkipIfKeyPressed(x) => write!(f, "SKP {x}"),
            Instruction::SkipIfKeyNotPressed(x) => write!(f, "SKNP {x}"),
            Instruction::ReadDelayTimer(x) => write!(f, "LD {x}, DT"),
            Instruction::AwaitKey(x) => write!(f, "LD {x}, K"),
            Instruction::SetDelayTimer(x) => write!(f, "LD DT, {x}"),
            Instruction::SetSoundTimer(x) => write!(f, "LD ST, {x}"),
            Instruction::AddToIndex(x) => write!(f, "ADD I, {x}"),
            Instruction::FontChar(x) => write!(f, "LD F, {x}"),
            Instruction::BinaryCodedDecimal(x) => write!(f, "LD B, {x}"),
            Instruction::StoreRegisters(x) => write!(f, "LD [I], {x}"),
            Instruction::LoadRegisters(x) => write!(f, "LD {x}, [I]"),
        }
    }
}
