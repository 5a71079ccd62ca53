use std::ops::{Index, IndexMut, Range};

use crate::error::Chip8Error;
use crate::input::InputGate;

pub type Timer = u8;
pub type Address = u16;

pub const MEM_SIZE: usize = 4096;
pub const ADDR_VIDEO: Address = 0x000;
pub const ADDR_FONT: Address = 0x100;
pub const ADDR_START: Address = 0x200;
pub const FONT_HEIGHT: usize = 5;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_SIZE: usize = 16;
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
/// Bytes taken by the packed 1-bit-per-pixel framebuffer.
pub const VIDEO_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT / 8;
/// Bytes available to a loaded program.
pub const PROGRAM_CAPACITY: usize = MEM_SIZE - ADDR_START as usize;

pub const FONT_DATA: [u8; 16 * FONT_HEIGHT] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Flat 4 KiB address space: framebuffer, font glyphs, then program memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let mut memory = Memory {
            data: [0; MEM_SIZE],
        };
        memory.reset();
        memory
    }

    /// Zeroes everything and rewrites the font table.
    pub fn reset(&mut self) {
        self.data.fill(0);
        let font = usize::from(ADDR_FONT);
        self.data[font..font + FONT_DATA.len()].copy_from_slice(&FONT_DATA);
    }

    /// Borrows `len` bytes starting at `addr`.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], Chip8Error> {
        let range = checked_range(addr, len)?;
        Ok(&self.data[range])
    }

    /// Mutably borrows `len` bytes starting at `addr` for an instruction
    /// store. The whole range must sit inside program memory.
    pub fn store_slice(&mut self, addr: usize, len: usize) -> Result<&mut [u8], Chip8Error> {
        let range = addr..addr.saturating_add(len);
        if range.start < usize::from(ADDR_START) || range.end > MEM_SIZE {
            return Err(Chip8Error::MemWrite { address: addr, len });
        }
        Ok(&mut self.data[range])
    }

    /// Copies as much of `program` as fits at `ADDR_START`. Bytes that fit
    /// stay in memory even when the program overflows.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        let start = usize::from(ADDR_START);
        let fitting = program.len().min(PROGRAM_CAPACITY);
        self.data[start..start + fitting].copy_from_slice(&program[..fitting]);

        if program.len() > PROGRAM_CAPACITY {
            return Err(Chip8Error::LoadOverflow {
                size: program.len(),
                capacity: PROGRAM_CAPACITY,
            });
        }
        Ok(())
    }

    /// The packed display zone, 8 pixels per byte, row-major.
    pub fn framebuffer(&self) -> &[u8] {
        let video = usize::from(ADDR_VIDEO);
        &self.data[video..video + VIDEO_SIZE]
    }

    pub fn framebuffer_mut(&mut self) -> &mut [u8] {
        let video = usize::from(ADDR_VIDEO);
        &mut self.data[video..video + VIDEO_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; MEM_SIZE] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; MEM_SIZE] {
        &mut self.data
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Memory {
    type Output = u8;

    fn index(&self, addr: usize) -> &u8 {
        &self.data[addr]
    }
}

impl IndexMut<usize> for Memory {
    fn index_mut(&mut self, addr: usize) -> &mut u8 {
        &mut self.data[addr]
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory").field("size", &MEM_SIZE).finish()
    }
}

fn checked_range(addr: usize, len: usize) -> Result<Range<usize>, Chip8Error> {
    match addr.checked_add(len) {
        Some(end) if end <= MEM_SIZE => Ok(addr..end),
        _ => Err(Chip8Error::InvalidAddress {
            address: addr.saturating_add(len),
        }),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    pub fn from_index(value: usize) -> Option<Self> {
        Self::ALL.get(value).copied()
    }

    /// Register named by the low four bits of `nibble`.
    pub fn from_nibble(nibble: u8) -> Self {
        Self::ALL[usize::from(nibble & 0x0F)]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{:X}", self.index())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    /// Writes the carry/borrow/collision flag into VF.
    pub fn set_flag(&mut self, flag: bool) {
        self.write(Register::VF, u8::from(flag));
    }

    pub fn as_slice(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8; NUM_REGISTERS] {
        &mut self.registers
    }
}

/// Fixed-depth return address stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallStack {
    pub slots: [Address; STACK_SIZE],
    /// Next free slot; 0 means empty.
    pub pointer: usize,
}
impl CallStack {
    pub fn push(&mut self, address: Address) -> Result<(), Chip8Error> {
        let slot = self
            .slots
            .get_mut(self.pointer)
            .ok_or(Chip8Error::StackOverflow { address })?;
        *slot = address;
        self.pointer += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Address> {
        if self.pointer == 0 || self.pointer > STACK_SIZE {
            return None;
        }
        self.pointer -= 1;
        Some(self.slots[self.pointer])
    }

    pub fn len(&self) -> usize {
        self.pointer
    }

    pub fn is_empty(&self) -> bool {
        self.pointer == 0
    }

    pub fn clear(&mut self) {
        self.slots = [0; STACK_SIZE];
        self.pointer = 0;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}
impl Key {
    pub const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
    ];

    pub fn from_index(index: u8) -> Option<Key> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keypad {
    keys: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [false; NUM_KEYS],
        }
    }

    pub fn press_key(&mut self, key: Key) {
        self.keys[usize::from(key.index())] = true;
    }

    pub fn release_key(&mut self, key: Key) {
        self.keys[usize::from(key.index())] = false;
    }

    pub fn release_all(&mut self) {
        self.keys = [false; NUM_KEYS];
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.keys[usize::from(key.index())]
    }

    /// Lowest-numbered key currently held down.
    pub fn first_pressed(&self) -> Option<Key> {
        Key::ALL.into_iter().find(|&key| self.is_key_pressed(key))
    }
}

/// The whole machine. Every field is public so hosts and debuggers can
/// inspect or patch state between steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip8State {
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub delay_timer: Timer,
    pub sound_timer: Timer,
    pub keypad: Keypad,
    pub gate: InputGate,
}
impl Chip8State {
    pub fn new() -> Self {
        Chip8State {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: ADDR_START,
            index: 0,
            stack: CallStack::default(),
            delay_timer: 0,
            sound_timer: 0,
            keypad: Keypad::new(),
            gate: InputGate::Running,
        }
    }

    /// Returns the machine to its power-on baseline. The keypad belongs to
    /// the host and is left alone.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.registers = RegisterBank::new();
        self.stack.clear();
        self.index = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.pc = ADDR_START;
        self.gate = InputGate::Running;
    }

    /// Resets the machine and copies `program` into program memory.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        self.reset();
        self.memory.load_program(program)?;
        log::debug!("Loaded {} byte program at {:#05X}", program.len(), ADDR_START);
        Ok(())
    }

    /// Decrements both timers if non-zero. Meant to be driven at 60 Hz.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    /// Marks key `id` as held. Ids outside 0..=15 are ignored.
    pub fn press_key(&mut self, id: u8) {
        if let Some(key) = Key::from_index(id) {
            self.keypad.press_key(key);
        }
    }

    /// Marks key `id` as released. Ids outside 0..=15 are ignored.
    pub fn release_key(&mut self, id: u8) {
        if let Some(key) = Key::from_index(id) {
            self.keypad.release_key(key);
        }
    }

    pub fn release_all_keys(&mut self) {
        self.keypad.release_all();
    }

    pub fn input_gate(&self) -> InputGate {
        self.gate
    }

    pub fn clear_display(&mut self) {
        self.memory.framebuffer_mut().fill(0);
    }
}

impl Default for Chip8State {
    fn default() -> Self {
        Self::new()
    }
}
