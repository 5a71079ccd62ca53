use bitvec::prelude::*;

use crate::error::Chip8Error;
use crate::state::{Chip8State, DISPLAY_HEIGHT, DISPLAY_WIDTH, Register};

/// Framebuffer bytes per display row.
const ROW_BYTES: usize = DISPLAY_WIDTH / 8;
/// Tallest sprite a single `DRW` can name.
const MAX_SPRITE_ROWS: usize = 15;

/// XORs `sprite` into the packed framebuffer with its top-left corner at
/// `(x, y)`. Returns whether any lit pixel was turned off.
///
/// An origin off the screen draws nothing. Rows below the last display row
/// are clipped, and so are columns right of the last display column.
pub fn blit(framebuffer: &mut [u8], x: usize, y: usize, sprite: &[u8]) -> bool {
    if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
        return false;
    }

    let column = x / 8;
    let shift = x % 8;
    let mut collision = false;

    for (row, &bits) in sprite.iter().enumerate() {
        let pixel_y = y + row;
        if pixel_y >= DISPLAY_HEIGHT {
            break;
        }
        let offset = pixel_y * ROW_BYTES + column;

        if shift == 0 {
            collision |= xor_byte(&mut framebuffer[offset], bits);
            continue;
        }

        collision |= xor_byte(&mut framebuffer[offset], bits >> shift);
        // the spill into the next byte only exists inside the same row
        if column + 1 < ROW_BYTES {
            collision |= xor_byte(&mut framebuffer[offset + 1], bits << (8 - shift));
        }
    }

    collision
}

fn xor_byte(target: &mut u8, bits: u8) -> bool {
    let before = *target;
    let after = before ^ bits;
    *target = after;
    before & after != before
}

/// Bit-level view of the framebuffer, one bit per pixel, row-major.
pub fn pixels(framebuffer: &[u8]) -> &BitSlice<u8, Msb0> {
    framebuffer.view_bits::<Msb0>()
}

impl Chip8State {
    /// Draws `rows` bytes of sprite data from `[I, I + rows)` at the
    /// position held in `vx`/`vy` and sets VF to the collision flag.
    pub fn draw_sprite(&mut self, vx: Register, vy: Register, rows: u8) -> Result<(), Chip8Error> {
        let x = usize::from(self.registers.read(vx));
        let y = usize::from(self.registers.read(vy));
        let rows = usize::from(rows).min(MAX_SPRITE_ROWS);

        // nothing to draw, so sprite memory is never read
        if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            self.registers.set_flag(false);
            return Ok(());
        }

        let mut sprite = [0u8; MAX_SPRITE_ROWS];
        sprite[..rows].copy_from_slice(self.memory.slice(usize::from(self.index), rows)?);

        let collision = blit(self.memory.framebuffer_mut(), x, y, &sprite[..rows]);
        self.registers.set_flag(collision);
        Ok(())
    }

    /// Whether the pixel at `(x, y)` is lit. Off-screen coordinates read as
    /// unlit.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return false;
        }
        pixels(self.memory.framebuffer())[y * DISPLAY_WIDTH + x]
    }

    pub fn pixels(&self) -> &BitSlice<u8, Msb0> {
        pixels(self.memory.framebuffer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VIDEO_SIZE;

    /// Three rows of 16 lit pixels in the top-left corner.
    fn seeded_framebuffer() -> [u8; VIDEO_SIZE] {
        let mut fb = [0u8; VIDEO_SIZE];
        for row in 0..3 {
            fb[row * ROW_BYTES] = 0xFF;
            fb[row * ROW_BYTES + 1] = 0xFF;
        }
        fb
    }

    fn assert_bytes(fb: &[u8], expected: &[(usize, u8)]) {
        for &(offset, value) in expected {
            assert_eq!(
                fb[offset], value,
                "framebuffer byte {offset} should be {value:#04X}, was {:#04X}",
                fb[offset]
            );
        }
    }

    const SOLID: [u8; 4] = [0xFF, 0xFF, 0xC3, 0xC3];

    #[test]
    fn aligned_draw_over_lit_pixels_collides() {
        let mut fb = seeded_framebuffer();
        assert!(blit(&mut fb, 0, 0, &SOLID[..2]));
        assert_bytes(&fb, &[(0, 0), (1, 0xFF), (8, 0), (9, 0xFF), (16, 0xFF), (17, 0xFF)]);
    }

    #[test]
    fn aligned_draw_at_right_edge() {
        let mut fb = seeded_framebuffer();
        assert!(!blit(&mut fb, 56, 0, &SOLID[..2]));
        assert_bytes(&fb, &[(0, 0xFF), (7, 0xFF), (15, 0xFF), (16, 0xFF)]);
    }

    #[test]
    fn rows_below_screen_are_clipped() {
        let mut fb = seeded_framebuffer();
        assert!(!blit(&mut fb, 24, 30, &SOLID[..2]));
        assert_bytes(&fb, &[(243, 0xFF), (251, 0xFF)]);

        let mut fb = seeded_framebuffer();
        assert!(!blit(&mut fb, 4, 29, &SOLID));
        assert_bytes(
            &fb,
            &[(232, 0x0F), (233, 0xF0), (240, 0x0F), (241, 0xF0), (248, 0x0C), (249, 0x30)],
        );
    }

    #[test]
    fn misaligned_draw_spans_two_bytes() {
        let mut fb = seeded_framebuffer();
        assert!(!blit(&mut fb, 43, 9, &SOLID[..2]));
        assert_bytes(&fb, &[(77, 0x1F), (78, 0xE0), (85, 0x1F), (86, 0xE0)]);
    }

    #[test]
    fn misaligned_draw_preserves_untouched_bits() {
        let mut fb = seeded_framebuffer();
        assert!(blit(&mut fb, 4, 1, &SOLID[2..]));
        assert_bytes(&fb, &[(0, 0xFF), (1, 0xFF), (8, 0xF3), (9, 0xCF), (16, 0xF3), (17, 0xCF)]);
    }

    #[test]
    fn misaligned_draw_clips_at_right_edge() {
        let mut fb = seeded_framebuffer();
        assert!(!blit(&mut fb, 60, 8, &SOLID[2..]));
        assert_bytes(&fb, &[(71, 0x0C), (72, 0x00), (79, 0x0C), (80, 0x00)]);
    }

    #[test]
    fn off_screen_origin_draws_nothing() {
        let mut fb = seeded_framebuffer();
        assert!(!blit(&mut fb, 250, 0, &SOLID));
        assert!(!blit(&mut fb, 0, 32, &SOLID));
        assert_eq!(fb, seeded_framebuffer());
    }

    #[test]
    fn drawing_twice_restores_and_collides() {
        let mut fb = seeded_framebuffer();
        let before = fb;
        blit(&mut fb, 13, 2, &SOLID);
        assert!(blit(&mut fb, 13, 2, &SOLID));
        assert_eq!(fb, before);
    }

    #[test]
    fn pixel_view_is_row_major_msb_first() {
        let mut state = Chip8State::new();
        state.memory[0] = 0b1000_0001;
        state.memory[ROW_BYTES * 2 + 7] = 0b0000_0001;

        assert!(state.pixel(0, 0));
        assert!(!state.pixel(1, 0));
        assert!(state.pixel(7, 0));
        assert!(state.pixel(63, 2));
        assert!(!state.pixel(64, 2));
        assert_eq!(state.pixels().count_ones(), 3);
    }

    #[test]
    fn draw_sprite_reads_index_and_sets_flag() {
        let mut state = Chip8State::new();
        state.index = 0x100; // glyph "0"
        state.registers.write(Register::V0, 8);
        state.registers.write(Register::V1, 1);

        state.draw_sprite(Register::V0, Register::V1, 5).unwrap();
        assert_eq!(state.registers.read(Register::VF), 0);
        assert_eq!(state.memory[ROW_BYTES + 1], 0xF0);
        assert_eq!(state.memory[ROW_BYTES * 2 + 1], 0x90);

        state.draw_sprite(Register::V0, Register::V1, 5).unwrap();
        assert_eq!(state.registers.read(Register::VF), 1);
        assert!(state.memory.framebuffer().iter().all(|&b| b == 0));
    }

    #[test]
    fn draw_sprite_past_end_of_memory_fails() {
        let mut state = Chip8State::new();
        state.index = 0xFFE;
        assert!(matches!(
            state.draw_sprite(Register::V0, Register::V0, 4),
            Err(Chip8Error::InvalidAddress { .. })
        ));
    }

    #[test]
    fn off_screen_draw_ignores_sprite_address() {
        let mut state = Chip8State::new();
        state.memory.framebuffer_mut()[0] = 0xAA;
        state.index = 0xFFF;
        state.registers.write(Register::V0, 200);
        state.registers.write(Register::VF, 1);

        state.draw_sprite(Register::V0, Register::V1, 2).unwrap();
        assert_eq!(state.registers.read(Register::VF), 0);
        assert_eq!(state.memory.framebuffer()[0], 0xAA);
    }
}
