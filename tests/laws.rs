use chip8_core::state::{ADDR_START, MEM_SIZE, PROGRAM_CAPACITY, STACK_SIZE};
use chip8_core::{Chip8Error, Chip8State, Instruction, Register};
use proptest::prelude::*;

fn corrupt(state: &mut Chip8State, writes: &[(usize, u8)], registers: &[u8; 16]) {
    for &(addr, value) in writes {
        state.memory[addr % MEM_SIZE] = value;
    }
    state.registers.as_mut_slice().copy_from_slice(registers);
    state.index = 0x123;
    state.pc = 0x456;
    state.delay_timer = 7;
    state.sound_timer = 9;
    state.stack.slots = [0xABC; STACK_SIZE];
    state.stack.pointer = 5;
}

/// `LD I, 0x300; V0 = x; V1 = y; DRW V0, V1, n` twice, sprite at 0x300.
fn draw_twice_program(x: u8, y: u8, sprite: &[u8]) -> Chip8State {
    let rows = sprite.len() as u8;
    let mut state = Chip8State::new();
    state
        .load_program(&[0xA3, 0x00, 0x60, x, 0x61, y, 0xD0, 0x10 | rows, 0xD0, 0x10 | rows])
        .unwrap();
    state.memory.as_bytes_mut()[0x300..0x300 + sprite.len()].copy_from_slice(sprite);
    state
}

proptest! {
    #[test]
    fn reset_twice_equals_reset_once(
        writes in prop::collection::vec((0usize..MEM_SIZE, any::<u8>()), 0..64),
        registers in any::<[u8; 16]>(),
    ) {
        let mut once = Chip8State::new();
        corrupt(&mut once, &writes, &registers);
        once.reset();

        let mut twice = once.clone();
        twice.reset();

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once, Chip8State::new());
    }

    #[test]
    fn loaded_program_reads_back(program in prop::collection::vec(any::<u8>(), 0..=PROGRAM_CAPACITY)) {
        let mut state = Chip8State::new();
        state.load_program(&program).unwrap();

        let start = usize::from(ADDR_START);
        prop_assert_eq!(&state.memory.as_bytes()[start..start + program.len()], &program[..]);
        prop_assert_eq!(state.pc, ADDR_START);
    }

    #[test]
    fn add_sets_carry_iff_sum_overflows(x in 0u8..15, y in 0u8..15, a in any::<u8>(), b in any::<u8>()) {
        prop_assume!(x != y);

        let mut state = Chip8State::new();
        state
            .load_program(&[0x60 + x, a, 0x60 + y, b, 0x80 + x, (y << 4) | 0x4])
            .unwrap();
        prop_assert_eq!(state.execute(3).into_result(), Ok(3));

        let sum = u16::from(a) + u16::from(b);
        prop_assert_eq!(state.registers.read(Register::from_nibble(x)), (sum % 256) as u8);
        prop_assert_eq!(state.registers.read(Register::VF), u8::from(sum >= 256));
    }

    #[test]
    fn drawing_twice_restores_framebuffer(
        x in 0u8..64,
        y in 0u8..32,
        sprite in prop::collection::vec(any::<u8>(), 1..=15),
        video in prop::collection::vec(any::<u8>(), 256),
    ) {
        let mut state = draw_twice_program(x, y, &sprite);
        state.memory.framebuffer_mut().copy_from_slice(&video);

        prop_assert_eq!(state.execute(5).into_result(), Ok(5));
        prop_assert_eq!(state.memory.framebuffer(), &video[..]);
    }

    #[test]
    fn second_draw_on_blank_screen_collides(
        x in 0u8..=56,
        y in 0u8..32,
        sprite in prop::collection::vec(1u8..=255, 1..=15),
    ) {
        let mut state = draw_twice_program(x, y, &sprite);

        prop_assert_eq!(state.execute(4).into_result(), Ok(4));
        prop_assert_eq!(state.registers.read(Register::VF), 0);
        prop_assert_eq!(state.execute(1).into_result(), Ok(1));
        prop_assert_eq!(state.registers.read(Register::VF), 1);
        prop_assert!(state.memory.framebuffer().iter().all(|&b| b == 0));
    }

    #[test]
    fn calls_then_returns_restore_pc(
        start in 0x200u16..0xFFE,
        targets in prop::collection::vec(0u16..=0xFFE, 0..=STACK_SIZE),
    ) {
        let mut state = Chip8State::new();
        state.pc = start;

        for &target in &targets {
            Instruction::Call(target).execute(&mut state).unwrap();
            prop_assert_eq!(state.pc, target);
        }
        prop_assert_eq!(state.stack.len(), targets.len());

        for _ in &targets {
            Instruction::Return.execute(&mut state).unwrap();
        }
        prop_assert_eq!(state.pc, start);
        prop_assert_eq!(state.stack.pointer, 0);
    }
}

#[test]
fn seventeenth_call_overflows() {
    let mut state = Chip8State::new();
    for _ in 0..STACK_SIZE {
        Instruction::Call(0x300).execute(&mut state).unwrap();
    }
    assert_eq!(
        Instruction::Call(0x300).execute(&mut state),
        Err(Chip8Error::StackOverflow { address: 0x300 })
    );
}
