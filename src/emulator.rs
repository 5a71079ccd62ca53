use std::time::{Duration, Instant};

use anyhow::anyhow;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::Alignment,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use chip8_core::state::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use chip8_core::{Chip8Error, Chip8State};

use crate::settings::Settings;

pub struct Emulator {
    state: Chip8State,
    settings: Settings,
}

impl Emulator {
    fn draw(&self, frame: &mut ratatui::Frame, area: ratatui::layout::Rect, rom_name: &str) {
        use ratatui::layout::{Constraint, Direction, Layout};

        // Calculate the exact size needed for 64x32 display plus borders
        let game_width = (DISPLAY_WIDTH as u16) + 2;
        let game_height = (DISPLAY_HEIGHT as u16) + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(game_height),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(area);

        let game_area = if chunks[0].width > game_width {
            let horizontal_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Min(0),
                    Constraint::Length(game_width),
                    Constraint::Min(0),
                ])
                .split(chunks[0]);
            horizontal_chunks[1]
        } else {
            chunks[0]
        };

        let mut screen = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
        for row in self.state.pixels().chunks(DISPLAY_WIDTH) {
            screen.extend(row.iter().map(|pixel| if *pixel { '█' } else { ' ' }));
            screen.push('\n');
        }
        let title = if self.state.input_gate().is_blocked() {
            format!("{rom_name} (press a key)")
        } else {
            rom_name.to_string()
        };
        let game_paragraph = Paragraph::new(screen)
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(Color::White));
        frame.render_widget(game_paragraph, game_area);

        let key_mapping = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";
        let key_paragraph = Paragraph::new(key_mapping)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Keypad"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(key_paragraph, chunks[1]);
    }

    pub fn new(settings: Settings) -> Self {
        Emulator {
            state: Chip8State::new(),
            settings,
        }
    }

    /// Runs one frame's worth of cycles. A pending key wait ends the frame
    /// early; unknown instructions are logged unless configured to halt.
    fn run_frame(&mut self) -> anyhow::Result<()> {
        self.state.tick_timers();

        let outcome = self.state.execute(self.settings.instructions_per_frame());
        match outcome.condition {
            None | Some(Chip8Error::InputHalt) => Ok(()),
            Some(noop @ Chip8Error::NoOp { .. }) => {
                if self.settings.halt_on_noop {
                    return Err(noop.into());
                }
                log::warn!("{noop}, skipped");
                Ok(())
            }
            Some(err) => Err(anyhow!(err).context(format!(
                "execution stopped after {} cycle(s) at pc {:#05X}",
                outcome.executed, self.state.pc
            ))),
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.frame_rate as f64);
        let rom_stem: String = self
            .settings
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());
        let rom_data = std::fs::read(&self.settings.rom)?;
        self.state.load_program(&rom_data)?;
        log::info!("Loaded {} ({} bytes)", rom_stem, rom_data.len());

        enable_raw_mode()?;
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.main_loop(&mut terminal, frame_duration, &rom_stem);

        disable_raw_mode()?;
        terminal.clear()?;
        result
    }

    fn main_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
        frame_duration: Duration,
        rom_stem: &str,
    ) -> anyhow::Result<()> {
        loop {
            let frame_start = Instant::now();

            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    if key.code == KeyCode::Esc {
                        return Ok(());
                    }
                    if let Some(id) = keypad_id(key.code) {
                        self.state.press_key(id);
                    }
                }
            }

            self.run_frame()?;
            terminal.draw(|frame| {
                let area = frame.area();
                self.draw(frame, area, rom_stem);
            })?;

            // Terminals report no key-up, so a press lasts one frame
            self.state.release_all_keys();

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }
}

/// Maps the left-hand QWERTY block onto the hexadecimal keypad.
fn keypad_id(code: KeyCode) -> Option<u8> {
    let KeyCode::Char(c) = code else {
        return None;
    };
    let id = match c.to_ascii_lowercase() {
        '1' => 0x1,
        '2' => 0x2,
        '3' => 0x3,
        '4' => 0xC,
        'q' => 0x4,
        'w' => 0x5,
        'e' => 0x6,
        'r' => 0xD,
        'a' => 0x7,
        's' => 0x8,
        'd' => 0x9,
        'f' => 0xE,
        'z' => 0xA,
        'x' => 0x0,
        'c' => 0xB,
        'v' => 0xF,
        _ => return None,
    };
    Some(id)
}
