use crate::error::Chip8Error;
use crate::state::{Keypad, Register, RegisterBank};

/// Whether the machine is executing or parked on an `LD Vx, K`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InputGate {
    #[default]
    Running,
    /// Waiting for any key; the key's value lands in the register.
    AwaitingKey(Register),
}

impl InputGate {
    pub fn is_blocked(&self) -> bool {
        matches!(self, InputGate::AwaitingKey(_))
    }

    /// Tries to satisfy a key wait into `target`. Writes the lowest pressed
    /// key and returns to `Running`, or parks the gate and reports
    /// `InputHalt`.
    pub fn await_key(
        &mut self,
        target: Register,
        keypad: &Keypad,
        registers: &mut RegisterBank,
    ) -> Result<(), Chip8Error> {
        match keypad.first_pressed() {
            Some(key) => {
                registers.write(target, key.index());
                if self.is_blocked() {
                    log::debug!("Key {:X} released the wait on {}", key.index(), target);
                }
                *self = InputGate::Running;
                Ok(())
            }
            None => {
                if !self.is_blocked() {
                    log::debug!("Halting until a key is pressed for {}", target);
                }
                *self = InputGate::AwaitingKey(target);
                Err(Chip8Error::InputHalt)
            }
        }
    }

    /// Re-checks the keypad if the gate is blocked. `Ok(true)` means a
    /// pending wait just completed; `Ok(false)` means nothing was pending.
    pub fn poll(&mut self, keypad: &Keypad, registers: &mut RegisterBank) -> Result<bool, Chip8Error> {
        match *self {
            InputGate::Running => Ok(false),
            InputGate::AwaitingKey(target) => {
                self.await_key(target, keypad, registers)?;
                Ok(true)
            }
        }
    }
}
