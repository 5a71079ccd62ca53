use crate::error::Chip8Error;
use crate::instruction::decode;
use crate::state::{Chip8State, MEM_SIZE};

/// What a batch of cycles achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Cycles that ran to completion, unknown instructions included.
    pub executed: usize,
    /// The condition that stopped the batch, or the first `NoOp` met by an
    /// otherwise clean batch.
    pub condition: Option<Chip8Error>,
}

impl ExecOutcome {
    pub fn is_clean(&self) -> bool {
        self.condition.is_none()
    }

    pub fn into_result(self) -> Result<usize, Chip8Error> {
        match self.condition {
            Some(err) => Err(err),
            None => Ok(self.executed),
        }
    }
}

impl Chip8State {
    fn fetch(&mut self) -> Result<[u8; 2], Chip8Error> {
        let pc = usize::from(self.pc);
        if pc + 1 >= MEM_SIZE {
            return Err(Chip8Error::InvalidAddress { address: pc });
        }
        let raw = [self.memory[pc], self.memory[pc + 1]];

        // Move the program counter to next instruction
        self.pc += 2;
        Ok(raw)
    }

    /// Runs one fetch-decode-execute cycle.
    ///
    /// `Ok(())` and `Err(NoOp)` both consume the cycle. While the input gate
    /// is blocked nothing is fetched: the call either completes the pending
    /// key wait (which counts as the cycle) or reports `InputHalt`.
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        if self.gate.poll(&self.keypad, &mut self.registers)? {
            return Ok(());
        }

        let raw = self.fetch()?;
        let instruction = decode(raw)?;
        log::trace!("{:#05X}: {}", self.pc - 2, instruction);
        instruction.execute(self)
    }

    /// Runs up to `cycles` cycles. Unknown instructions are counted and the
    /// batch carries on; any other condition stops it without counting the
    /// failed cycle.
    pub fn execute(&mut self, cycles: usize) -> ExecOutcome {
        let mut executed = 0;
        let mut noop = None;

        for _ in 0..cycles {
            match self.step() {
                Ok(()) => executed += 1,
                Err(err @ Chip8Error::NoOp { .. }) => {
                    executed += 1;
                    noop.get_or_insert(err);
                }
                Err(err) => {
                    return ExecOutcome {
                        executed,
                        condition: Some(err),
                    };
                }
            }
        }

        ExecOutcome {
            executed,
            condition: noop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputGate;
    use crate::state::{ADDR_START, Register};

    fn loaded(program: &[u8]) -> Chip8State {
        let mut state = Chip8State::new();
        state.load_program(program).unwrap();
        state
    }

    #[test]
    fn step_advances_pc_before_dispatch() {
        let mut state = loaded(&[0x60, 0x2A, 0x12, 0x00]);
        state.step().unwrap();
        assert_eq!(state.pc, 0x202);
        assert_eq!(state.registers.read(Register::V0), 0x2A);

        state.step().unwrap();
        assert_eq!(state.pc, ADDR_START);
    }

    #[test]
    fn noop_counts_and_batch_continues() {
        let mut state = loaded(&[0x01, 0x23, 0x61, 0x05, 0x8F, 0xF8, 0x62, 0x06]);
        let outcome = state.execute(4);

        assert_eq!(outcome.executed, 4);
        assert_eq!(outcome.condition, Some(Chip8Error::NoOp { raw: [0x01, 0x23] }));
        assert_eq!(state.registers.read(Register::V1), 5);
        assert_eq!(state.registers.read(Register::V2), 6);
        assert_eq!(state.pc, 0x208);
    }

    #[test]
    fn fatal_condition_stops_batch_uncounted() {
        let mut state = loaded(&[0x60, 0x01, 0x1F, 0xFF, 0x61, 0x01]);
        let outcome = state.execute(10);

        assert_eq!(outcome.executed, 1);
        assert_eq!(
            outcome.condition,
            Some(Chip8Error::InvalidAddress { address: 0xFFF })
        );
        assert_eq!(state.registers.read(Register::V1), 0);
    }

    #[test]
    fn fetch_past_end_of_memory_fails() {
        let mut state = Chip8State::new();
        state.pc = 0xFFF;
        assert_eq!(
            state.step(),
            Err(Chip8Error::InvalidAddress { address: 0xFFF })
        );
        assert_eq!(state.pc, 0xFFF);
    }

    #[test]
    fn blocked_gate_mutates_nothing() {
        let mut state = loaded(&[0xF0, 0x0A, 0x61, 0x01]);
        let outcome = state.execute(5);
        assert_eq!(outcome.executed, 0);
        assert_eq!(outcome.condition, Some(Chip8Error::InputHalt));
        assert_eq!(state.input_gate(), InputGate::AwaitingKey(Register::V0));

        let snapshot = state.clone();
        for _ in 0..3 {
            assert_eq!(state.step(), Err(Chip8Error::InputHalt));
        }
        assert_eq!(state, snapshot);
    }

    #[test]
    fn resume_consumes_one_cycle_without_fetching() {
        let mut state = loaded(&[0xF0, 0x0A, 0x61, 0x01]);
        state.execute(1);

        state.press_key(0xC);
        let outcome = state.execute(1);
        assert_eq!(outcome, ExecOutcome { executed: 1, condition: None });
        assert_eq!(state.registers.read(Register::V0), 0xC);
        assert_eq!(state.registers.read(Register::V1), 0);
        assert_eq!(state.pc, 0x202);

        assert_eq!(state.execute(1).into_result(), Ok(1));
        assert_eq!(state.registers.read(Register::V1), 1);
    }

    #[test]
    fn zero_cycles_do_nothing() {
        let mut state = loaded(&[0x60, 0x01]);
        let outcome = state.execute(0);
        assert!(outcome.is_clean());
        assert_eq!(outcome.executed, 0);
        assert_eq!(state.pc, ADDR_START);
    }
}
