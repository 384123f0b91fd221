use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use clap_num::maybe_hex;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Paragraph, Widget},
};

use chip8_vm::{
    Chip8, Chip8Config, Chip8Runner, DEFAULT_CLOCK_SPEED, DISPLAY_X, DISPLAY_Y, FONT_START_ADDRESS,
    FrameBuffer, KEY_COUNT, Keyboard, Program, RunnerHandle, State,
};

const KEY_MAP: [KeyCode; 16] = [
    KeyCode::Char('x'), // 0x0
    KeyCode::Char('1'), // 0x1
    KeyCode::Char('2'), // 0x2
    KeyCode::Char('3'), // 0x3
    KeyCode::Char('q'), // 0x4
    KeyCode::Char('w'), // 0x5
    KeyCode::Char('e'), // 0x6
    KeyCode::Char('a'), // 0x7
    KeyCode::Char('s'), // 0x8
    KeyCode::Char('d'), // 0x9
    KeyCode::Char('z'), // 0xA
    KeyCode::Char('c'), // 0xB
    KeyCode::Char('4'), // 0xC
    KeyCode::Char('r'), // 0xD
    KeyCode::Char('f'), // 0xE
    KeyCode::Char('v'), // 0xF
];

// Key release events are not fired in terminals on Linux.
// To handle this, we implement a timeout after which we consider a key released.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(50);

/// Target redraw period.
const FRAME_TIME: Duration = Duration::from_millis(16);

struct App {
    frame_buffer: Arc<FrameBuffer>,
    keyboard: Arc<Keyboard>,
    runner: Option<RunnerHandle>,
    should_quit: bool,
    key_press_times: [Option<Instant>; KEY_COUNT],
}

impl App {
    fn new(program: &Program, config: Chip8Config) -> anyhow::Result<Self> {
        let frame_buffer = Arc::new(FrameBuffer::new());
        let keyboard = Arc::new(Keyboard::new());
        let mut chip8 = Chip8::new(&config, frame_buffer.clone(), keyboard.clone());
        chip8.load(program);

        let runner = Chip8Runner::new(chip8, config.clock_speed)
            .context("Failed to set up CHIP-8 runner")?
            .spawn()
            .context("Failed to start CHIP-8 thread")?;

        Ok(Self {
            frame_buffer,
            keyboard,
            runner: Some(runner),
            should_quit: false,
            key_press_times: [None; KEY_COUNT],
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;

            self.check_key_timeout();

            if event::poll(FRAME_TIME)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key);
                }
            }
        }

        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn check_key_timeout(&mut self) {
        let now = Instant::now();

        for (idx, press_time) in self.key_press_times.iter_mut().enumerate() {
            if let Some(time) = press_time
                && now.duration_since(*time) > KEY_RELEASE_TIMEOUT
            {
                *press_time = None;
                self.keyboard.unset(idx as u8);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        // Handle Ctrl+C globally
        if key.code == KeyCode::Char('c') && key.modifiers.contains(event::KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Esc if key.kind == KeyEventKind::Press => {
                self.should_quit = true;
            }
            _ => {
                if let Some(idx) = KEY_MAP.iter().position(|&k| k == key.code) {
                    self.keyboard.set(idx as u8);
                    self.key_press_times[idx] = Some(Instant::now());
                }
            }
        }
    }

    fn state(&self) -> State {
        self.runner
            .as_ref()
            .map_or(State::Stopped, |runner| runner.state())
    }

    fn is_sound_active(&self) -> bool {
        self.runner
            .as_ref()
            .is_some_and(|runner| runner.is_sound_active())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(runner) = self.runner.take() {
            runner.stop();
            runner.join().context("CHIP-8 execution error")?;
        }
        Ok(())
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Check if we have enough space
        const MIN_WIDTH: u16 = DISPLAY_X as u16 + 2 + 15 + 2;
        const MIN_HEIGHT: u16 = DISPLAY_Y as u16 + 2;
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            let center = area.centered(Constraint::Length(45), Constraint::Length(3));

            Paragraph::new(format!(
                "Terminal is too small ({}x{} min)",
                MIN_WIDTH, MIN_HEIGHT
            ))
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .block(Block::bordered())
            .render(center, buf);

            return;
        }

        let [display, right] = Layout::horizontal([
            Constraint::Min(DISPLAY_X as u16 + 2),
            Constraint::Length(15 + 2),
        ])
        .areas(area);

        let [state, sound, keypad] = Layout::vertical([
            Constraint::Length(1 + 2),
            Constraint::Length(1 + 2),
            Constraint::Length(4 + 2),
        ])
        .areas(right);

        self.render_display(display, buf);
        self.render_state(state, buf);
        self.render_sound(sound, buf);
        self.render_keypad(keypad, buf);
    }
}

impl App {
    fn render_display(&self, area: Rect, buf: &mut Buffer) {
        let text: Vec<Line> = self
            .frame_buffer
            .snapshot()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|pixel| {
                        Span::styled(if *pixel { "█" } else { " " }, Style::default().green())
                    })
                    .collect()
            })
            .collect();

        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Display "))
            .render(area, buf);
    }

    fn render_state(&self, area: Rect, buf: &mut Buffer) {
        let (text, color) = match self.state() {
            State::Running => ("RUNNING", Color::Green),
            State::Stopped => ("STOPPED", Color::Red),
        };

        Paragraph::new(Text::styled(text, Style::default().fg(color)))
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" State "))
            .render(area, buf);
    }

    fn render_sound(&self, area: Rect, buf: &mut Buffer) {
        let (text, color) = if self.is_sound_active() {
            ("BEEP", Color::Yellow)
        } else {
            ("-", Color::DarkGray)
        };

        Paragraph::new(Text::styled(text, Style::default().fg(color)))
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Sound "))
            .render(area, buf);
    }

    fn render_keypad(&self, area: Rect, buf: &mut Buffer) {
        let keypad = self.keyboard.snapshot();
        let layout = [
            [0x1, 0x2, 0x3, 0xC],
            [0x4, 0x5, 0x6, 0xD],
            [0x7, 0x8, 0x9, 0xE],
            [0xA, 0x0, 0xB, 0xF],
        ];

        let lines = layout
            .iter()
            .map(|row| {
                row.iter()
                    .map(|key| {
                        let key_str = format!("{:X}", key);

                        Span::styled(
                            key_str,
                            if keypad[*key] {
                                Style::default().fg(Color::Black).bg(Color::White)
                            } else {
                                Style::default()
                            },
                        )
                    })
                    .flat_map(|s| [s, Span::raw(" ")])
                    .take(row.len() * 2 - 1)
                    .collect()
            })
            .collect::<Vec<Line>>();

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Keypad "))
            .render(area, buf);
    }
}

/// Terminal front-end for the CHIP-8 VM
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape or Ctrl+C exits.
#[derive(Parser)]
struct Args {
    /// Path to the ROM file to load
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(short, long, default_value_t = DEFAULT_CLOCK_SPEED)]
    clock_speed: u32,

    /// Memory address of the built-in font (decimal or 0x-prefixed hex)
    #[arg(long, default_value_t = FONT_START_ADDRESS, value_parser = maybe_hex::<u16>)]
    font_offset: u16,
}

fn main() -> anyhow::Result<()> {
    // Anything chattier than warnings would scribble over the TUI
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let program = Program::from_file(&args.rom_path).context("Failed to load ROM")?;
    let config = Chip8Config {
        clock_speed: args.clock_speed,
        font_offset: args.font_offset,
    };
    let mut app = App::new(&program, config).context("Failed to initialize application")?;

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    app.shutdown()?;
    app_result
}
