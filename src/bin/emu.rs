use std::{
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use clap_num::maybe_hex;
use log::info;
use pixels::{Pixels, SurfaceTexture};
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source, source::SquareWave};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use chip8_vm::{
    Chip8, Chip8Config, Chip8Runner, DEFAULT_CLOCK_SPEED, DISPLAY_X, DISPLAY_Y, Display,
    FONT_START_ADDRESS, FrameBuffer, Keyboard, Program, RunnerControl, RunnerHandle, SoundSignal,
    State,
};

/// The rate at which pixels fade out (phosphor decay).
const DISPLAY_PHOSPHOR_RATE: f32 = 10.0;

/// How often the audio thread looks at the sound timer.
const AUDIO_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Mapping from physical keyboard keys to CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,
    /// Stores the brightness of each pixel (0.0 to 1.0) to implement phosphor decay.
    display_float: Display<f32>,

    /// Audio output stream (must be kept alive).
    _audio_stream: OutputStream,
    audio_thread: Option<JoinHandle<()>>,

    frame_buffer: Arc<FrameBuffer>,
    keyboard: Arc<Keyboard>,
    runner: Option<RunnerHandle>,
    /// Used for delta time calculation.
    last_frame_instant: Instant,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(program: &Program, config: Chip8Config) -> anyhow::Result<Self> {
        // Initialize audio
        let mut _audio_stream = OutputStreamBuilder::open_default_stream()
            .context("Failed to open audio output stream")?;
        _audio_stream.log_on_drop(false);

        let audio_sink = Sink::connect_new(_audio_stream.mixer());
        audio_sink.pause();
        audio_sink.append(SquareWave::new(440.0).amplify(0.5));

        // Initialize CHIP-8
        let frame_buffer = Arc::new(FrameBuffer::new());
        let keyboard = Arc::new(Keyboard::new());
        let mut chip8 = Chip8::new(&config, frame_buffer.clone(), keyboard.clone());
        chip8.load(program);

        let runner = Chip8Runner::new(chip8, config.clock_speed)
            .context("Failed to set up CHIP-8 runner")?
            .spawn()
            .context("Failed to start CHIP-8 thread")?;

        let audio_thread = spawn_audio(audio_sink, runner.sound_signal(), runner.control())?;

        Ok(Self {
            pixels: None,
            window: None,
            display_float: [[0.0; DISPLAY_X]; DISPLAY_Y],

            _audio_stream,
            audio_thread: Some(audio_thread),

            frame_buffer,
            keyboard,
            runner: Some(runner),
            last_frame_instant: Instant::now(),
            exit_result: Ok(()),
        })
    }

    fn process_display(&mut self, dt: f32) {
        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };
        let display = self.frame_buffer.snapshot();

        for (i, pxl) in pixels.frame_mut().chunks_exact_mut(4).enumerate() {
            let x = i % DISPLAY_X;
            let y = i / DISPLAY_X;

            // Lit pixels jump to full brightness, unlit ones fade out over a few frames.
            self.display_float[y][x] = if display[y][x] {
                1.0
            } else {
                (self.display_float[y][x] - DISPLAY_PHOSPHOR_RATE * dt).max(0.0)
            };

            let rgba = [0, 0xff, 0, (self.display_float[y][x] * 255.0) as u8];
            pxl.copy_from_slice(&rgba);
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(DISPLAY_X as u32 * 10, DISPLAY_Y as u32 * 10);
            let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title("chip8-vm")
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.process_display(dt);

                if let Some(pixels) = self.pixels.as_ref() {
                    pixels.render().context("Pixels render error")?;
                }

                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    match event.state {
                        ElementState::Pressed => self.keyboard.set(key as u8),
                        ElementState::Released => self.keyboard.unset(key as u8),
                    }
                }
            }

            _ => (),
        }
        Ok(())
    }

    /// Stops the VM and the audio thread, logging the final state if the program halted.
    fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(runner) = self.runner.take() {
            runner.stop();
            let (chip8, summary) = runner.join().context("CHIP-8 execution error")?;
            if summary.halted {
                info!("Final machine state:\n{chip8}");
            }
        }

        if let Some(audio_thread) = self.audio_thread.take() {
            audio_thread
                .join()
                .map_err(|_| anyhow::anyhow!("Audio thread panicked"))?;
        }

        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// Plays the tone while the sound timer runs. Exits once the VM has stopped.
fn spawn_audio(
    sink: Sink,
    sound: SoundSignal,
    control: RunnerControl,
) -> anyhow::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chip8-audio".to_string())
        .spawn(move || {
            while control.state() == State::Running {
                if sound.is_active() {
                    sink.play();
                } else {
                    sink.pause();
                }
                thread::sleep(AUDIO_POLL_INTERVAL);
            }
            sink.pause();
        })
        .context("Failed to spawn audio thread")
}

/// CHIP-8 emulator written in Rust.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(short, long, default_value_t = DEFAULT_CLOCK_SPEED)]
    clock_speed: u32,

    /// Memory address of the built-in font (decimal or 0x-prefixed hex)
    #[arg(long, default_value_t = FONT_START_ADDRESS, value_parser = maybe_hex::<u16>)]
    font_offset: u16,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let program = Program::from_file(&args.rom_path).context("Failed to load ROM")?;
    let config = Chip8Config {
        clock_speed: args.clock_speed,
        font_offset: args.font_offset,
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&program, config).context("Failed to initialize application")?;
    let run_result = event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution");
    let shutdown_result = app.shutdown();

    // Return the result captured during the event loop
    run_result?;
    shutdown_result?;
    app.exit_result
}
