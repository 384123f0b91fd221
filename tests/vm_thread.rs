use std::{sync::Arc, thread, time::Duration};

use chip8_vm::{
    Chip8, Chip8Config, Chip8Result, Chip8Runner, FrameBuffer, Keyboard, Program, State, u4,
};

struct Vm {
    chip8: Chip8,
    frame_buffer: Arc<FrameBuffer>,
    keyboard: Arc<Keyboard>,
}

fn vm_with(rom: &[u8]) -> Vm {
    let frame_buffer = Arc::new(FrameBuffer::new());
    let keyboard = Arc::new(Keyboard::new());
    let mut chip8 = Chip8::new(
        &Chip8Config::default(),
        frame_buffer.clone(),
        keyboard.clone(),
    );
    chip8.load(&Program::from(rom));

    Vm {
        chip8,
        frame_buffer,
        keyboard,
    }
}

#[test]
fn key_wait_blocks_until_another_thread_presses() {
    // LD V3, K
    let Vm {
        mut chip8, keyboard, ..
    } = vm_with(&[0xF3, 0x0A]);

    let presser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        keyboard.set(0xC);
        keyboard.set(0x9);
    });

    assert_eq!(chip8.cpu_cycle(), Chip8Result::Continue);
    presser.join().unwrap();

    assert_eq!(chip8.v(u4::new(3)), 0x9);
    assert_eq!(chip8.pc(), 0x202);
}

#[test]
fn key_wait_inside_running_vm() {
    // LD V3, K; JP 0x202
    let vm = vm_with(&[0xF3, 0x0A, 0x12, 0x02]);
    let keyboard = vm.keyboard.clone();
    let handle = Chip8Runner::new(vm.chip8, 1000).unwrap().spawn().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(handle.state(), State::Running);

    keyboard.set(0x4);
    thread::sleep(Duration::from_millis(50));
    handle.stop();

    let (chip8, summary) = handle.join().unwrap();
    assert_eq!(chip8.v(u4::new(3)), 0x4);
    assert_eq!(chip8.pc(), 0x202);
    assert!(!summary.halted);
}

#[test]
fn stop_interrupts_a_pending_key_wait() {
    let vm = vm_with(&[0xF3, 0x0A]);
    let handle = Chip8Runner::new(vm.chip8, 500).unwrap().spawn().unwrap();

    thread::sleep(Duration::from_millis(30));
    handle.stop();

    let (chip8, _) = handle.join().unwrap();
    assert_eq!(chip8.v(u4::new(3)), 0);
}

#[test]
fn stop_ends_an_endless_loop() {
    // JP 0x200
    let vm = vm_with(&[0x12, 0x00]);
    let handle = Chip8Runner::new(vm.chip8, 2000).unwrap().spawn().unwrap();
    let control = handle.control();
    assert_eq!(control.state(), State::Running);

    thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished());
    handle.stop();

    let (_, summary) = handle.join().unwrap();
    assert!(!summary.halted);
    assert!(summary.cycles > 0);
    assert_eq!(control.state(), State::Stopped);
}

#[test]
fn empty_program_halts_on_its_own() {
    let vm = vm_with(&[0x00; 10]);
    let handle = Chip8Runner::new(vm.chip8, 1000).unwrap().spawn().unwrap();

    let (chip8, summary) = handle.join().unwrap();
    assert!(summary.halted);
    assert_eq!(summary.cycles, 5);
    assert_eq!(chip8.pc(), 0x20A);
}

#[test]
fn timers_tick_at_60hz_regardless_of_clock_speed() {
    // V0 = 120; LD DT, V0; JP 0x204
    let vm = vm_with(&[0x60, 120, 0xF0, 0x15, 0x12, 0x04]);
    let handle = Chip8Runner::new(vm.chip8, 2000).unwrap().spawn().unwrap();

    thread::sleep(Duration::from_millis(500));
    handle.stop();

    let (chip8, summary) = handle.join().unwrap();
    // ~30 ticks in half a second; at the clock rate it would have hit zero long ago
    assert!(summary.cycles > 200);
    let remaining = chip8.delay_timer();
    assert!(
        (60..=115).contains(&remaining),
        "delay timer at {remaining}"
    );
}

#[test]
fn sound_is_active_while_sound_timer_runs() {
    // V0 = 6; LD ST, V0; JP 0x204
    let vm = vm_with(&[0x60, 6, 0xF0, 0x18, 0x12, 0x04]);
    let handle = Chip8Runner::new(vm.chip8, 1000).unwrap().spawn().unwrap();
    let sound = handle.sound_signal();

    thread::sleep(Duration::from_millis(20));
    assert!(handle.is_sound_active());

    thread::sleep(Duration::from_millis(250));
    assert!(!sound.is_active());

    handle.stop();
    handle.join().unwrap();
}

#[test]
fn renderer_never_sees_a_torn_sprite() {
    // LD I, 0x050; DRW V0, V1, 5; CLS; JP 0x202
    let vm = vm_with(&[0xA0, 0x50, 0xD0, 0x15, 0x00, 0xE0, 0x12, 0x02]);
    let frame_buffer = vm.frame_buffer.clone();
    let handle = Chip8Runner::new(vm.chip8, 20_000).unwrap().spawn().unwrap();

    let mut saw_sprite = false;
    for _ in 0..5_000 {
        let lit = frame_buffer
            .snapshot()
            .iter()
            .flatten()
            .filter(|&&pixel| pixel)
            .count();
        // glyph "0" has 14 pixels
        assert!(lit == 0 || lit == 14, "torn frame with {lit} pixels");
        saw_sprite |= lit == 14;
        thread::sleep(Duration::from_micros(20));
    }

    handle.stop();
    handle.join().unwrap();
    assert!(saw_sprite);
}
