use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info};

use crate::{
    Chip8, Chip8Error, Chip8Result, SoundSignal, chip8::EMPTY_INSTRUCTION_LIMIT, config::TIMER_HZ,
};

const TIMER_TIME_STEP: Duration = Duration::from_nanos(1_000_000_000 / TIMER_HZ as u64);

/// Run state of the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Running,
}

/// What happened during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Instruction cycles executed.
    pub cycles: u64,
    /// Wall time spent in the loop.
    pub elapsed: Duration,
    /// True if the run ended on the empty-instruction heuristic rather than a stop request.
    pub halted: bool,
}

/// Cross-thread controls of a runner: query the state, request a stop.
#[derive(Clone)]
pub struct RunnerControl {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl RunnerControl {
    /// Asks the loop to exit. Takes effect within one loop iteration.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> State {
        if self.running.load(Ordering::Acquire) {
            State::Running
        } else {
            State::Stopped
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Relaxed)
    }
}

/// Drives a [`Chip8`] with a busy-polling loop.
///
/// Two independent periodic actions share the loop: an instruction cycle every
/// `1 / clock_speed` seconds and a timer tick every `1 / 60` seconds. A runner
/// executes one run only; once stopped it cannot be started again.
pub struct Chip8Runner {
    chip8: Chip8,
    clock_speed: u32,
    cpu_time_step: Duration,
    control: RunnerControl,
    finished: bool,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8, clock_speed: u32) -> Result<Self, Chip8Error> {
        if clock_speed == 0 {
            return Err(Chip8Error::InvalidClockSpeed { clock_speed });
        }

        let control = RunnerControl {
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: chip8.stop_requested.clone(),
        };

        Ok(Self {
            chip8,
            clock_speed,
            cpu_time_step: Duration::from_secs_f64(1.0 / f64::from(clock_speed)),
            control,
            finished: false,
        })
    }

    pub fn control(&self) -> RunnerControl {
        self.control.clone()
    }

    pub fn state(&self) -> State {
        self.control.state()
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn is_sound_active(&self) -> bool {
        self.chip8.is_sound_active()
    }

    pub fn sound_signal(&self) -> SoundSignal {
        self.chip8.sound_signal()
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn into_inner(self) -> Chip8 {
        self.chip8
    }

    /// Runs the VM on the calling thread until it halts or a stop is requested.
    pub fn start(&mut self) -> Result<RunSummary, Chip8Error> {
        if self.finished {
            return Err(Chip8Error::AlreadyStopped);
        }

        self.control.running.store(true, Ordering::Release);
        info!("Starting VM at {} Hz", self.clock_speed);

        let summary = self.run_loop();

        self.finished = true;
        self.control.running.store(false, Ordering::Release);
        info!(
            "Program ran {} milliseconds, executed {} cycles",
            summary.elapsed.as_millis(),
            summary.cycles
        );

        Ok(summary)
    }

    /// Moves the runner onto its own thread and starts it.
    pub fn spawn(mut self) -> Result<RunnerHandle, Chip8Error> {
        if self.finished {
            return Err(Chip8Error::AlreadyStopped);
        }

        let control = self.control();
        let sound = self.sound_signal();

        // Report running from the moment the handle exists
        control.running.store(true, Ordering::Release);

        let thread = thread::Builder::new()
            .name("chip8-vm".to_string())
            .spawn(move || {
                let summary = self.start();
                (self.into_inner(), summary)
            })
            .map_err(|e| {
                control.running.store(false, Ordering::Release);
                Chip8Error::ThreadSpawn(e)
            })?;

        Ok(RunnerHandle {
            control,
            sound,
            thread,
        })
    }

    fn run_loop(&mut self) -> RunSummary {
        let started = Instant::now();
        let mut last_cycle = started;
        let mut last_timer_update = started;
        let mut cycles = 0;
        let mut halted = false;

        while !self.control.stop_requested() {
            let now = Instant::now();

            if now - last_cycle >= self.cpu_time_step {
                last_cycle = now;
                cycles += 1;

                if self.chip8.cpu_cycle() == Chip8Result::Halted {
                    error!("Abort process because of {EMPTY_INSTRUCTION_LIMIT} empty instructions in a row");
                    debug!("{}", self.chip8);
                    halted = true;
                    break;
                }
            }

            if now - last_timer_update >= TIMER_TIME_STEP {
                last_timer_update = now;
                self.chip8.timers_cycle();
            }

            std::hint::spin_loop();
        }

        RunSummary {
            cycles,
            elapsed: started.elapsed(),
            halted,
        }
    }
}

/// Owner side of a VM running on its own thread.
pub struct RunnerHandle {
    control: RunnerControl,
    sound: SoundSignal,
    thread: JoinHandle<(Chip8, Result<RunSummary, Chip8Error>)>,
}

impl RunnerHandle {
    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn state(&self) -> State {
        self.control.state()
    }

    pub fn control(&self) -> RunnerControl {
        self.control.clone()
    }

    pub fn is_sound_active(&self) -> bool {
        self.sound.is_active()
    }

    pub fn sound_signal(&self) -> SoundSignal {
        self.sound.clone()
    }

    /// True once the VM thread has exited, whether halted or stopped.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the run to end and hands back the final machine state.
    pub fn join(self) -> Result<(Chip8, RunSummary), Chip8Error> {
        let (chip8, summary) = self.thread.join().map_err(|_| Chip8Error::ThreadPanicked)?;
        Ok((chip8, summary?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chip8Config, FrameBuffer, Keyboard, Program};

    fn runner_with(rom: &[u8], clock_speed: u32) -> Chip8Runner {
        let mut chip8 = Chip8::new(
            &Chip8Config::default(),
            Arc::new(FrameBuffer::new()),
            Arc::new(Keyboard::new()),
        );
        chip8.load(&Program::from(rom));
        Chip8Runner::new(chip8, clock_speed).unwrap()
    }

    #[test]
    fn zero_clock_speed_is_rejected() {
        let chip8 = Chip8::new(
            &Chip8Config::default(),
            Arc::new(FrameBuffer::new()),
            Arc::new(Keyboard::new()),
        );
        assert!(matches!(
            Chip8Runner::new(chip8, 0),
            Err(Chip8Error::InvalidClockSpeed { clock_speed: 0 })
        ));
    }

    #[test]
    fn empty_rom_halts_after_five_cycles() {
        let mut runner = runner_with(&[0x00; 10], 5000);
        assert_eq!(runner.state(), State::Stopped);

        let summary = runner.start().unwrap();
        assert!(summary.halted);
        assert_eq!(summary.cycles, 5);
        assert_eq!(runner.chip8_ref().pc(), 0x20A);
        assert_eq!(runner.state(), State::Stopped);
    }

    #[test]
    fn sound_stays_active_after_a_run_that_set_it() {
        // V0 = 30; LD ST, V0; then empty memory halts the run
        let mut runner = runner_with(&[0x60, 30, 0xF0, 0x18], 5000);
        assert!(!runner.is_sound_active());

        runner.start().unwrap();
        assert!(runner.is_sound_active());
        assert!(runner.sound_signal().is_active());
    }

    #[test]
    fn runs_cannot_be_resumed() {
        let mut runner = runner_with(&[0x00; 10], 5000);
        runner.start().unwrap();
        assert!(matches!(runner.start(), Err(Chip8Error::AlreadyStopped)));
        assert!(matches!(runner.spawn(), Err(Chip8Error::AlreadyStopped)));
    }

    #[test]
    fn stop_before_start_ends_immediately() {
        let mut runner = runner_with(&[0x12, 0x00], 500);
        runner.control().stop();
        assert!(!runner.is_sound_active());
        let summary = runner.start().unwrap();
        assert_eq!(summary.cycles, 0);
        assert!(!summary.halted);
    }
}
