use std::thread;
use std::time::Duration;

use chip8::display::{DummyDisplay, Pixel, SharedDisplay};
use chip8::input::{DummyInput, NullInput};
use chip8::memory::{MemoryMap, CHIP8_FONT};
use chip8::sound::{AudioFlag, Mute};
use chip8::{key_channel, Chip8Config, Chip8Interpreter, Halt, Scheduler};

fn config() -> Chip8Config {
    Chip8Config {
        cpu_hz: 2000,
        timer_hz: 240,
        seed: Some(42),
    }
}

fn run(program: &[u8]) -> (Chip8Interpreter, Halt) {
    let mut c8 = Chip8Interpreter::new(Box::new(NullInput), &config());
    let (_tx, rx) = key_channel();
    let halt = Scheduler::new(config())
        .run_program(
            &mut c8,
            program,
            &rx,
            &mut DummyDisplay::new(),
            &mut Mute::new(),
        )
        .unwrap();
    (c8, halt)
}

#[test]
fn test_draw_glyph_no_collision() {
    let (c8, halt) = run(&[
        0x60, 0x0e, // V0 = 0xE
        0xf0, 0x29, // I = glyph(V0)
        0x61, 0x08, // V1 = 8
        0x62, 0x08, // V2 = 8
        0xd1, 0x25, // draw 5 rows at (V1, V2)
    ]);
    // falls through into zeroed memory, which is 0x0000
    assert!(matches!(halt, Halt::UnimplementedOpcode(op) if op.word() == 0x0000));

    let lit: Vec<u8> = c8.framebuffer().iter().copied().filter(|b| *b != 0).collect();
    assert_eq!(lit, CHIP8_FONT[0x0e * 5..0x0e * 5 + 5].to_vec());
    assert_eq!(c8.v(0xf), 0);
}

#[test]
fn test_draw_overlap_collision() {
    let (c8, _) = run(&[
        0x60, 0x0e, // V0 = 0xE
        0xf0, 0x29, // I = glyph(V0)
        0x61, 0x08, // V1 = 8
        0x62, 0x08, // V2 = 8
        0xd1, 0x25, // draw
        0x60, 0x00, // V0 = 0
        0xf0, 0x29, // I = glyph(V0)
        0xd1, 0x25, // draw over the top
        0x12, 0x10, // jump to self
    ]);
    let rows: Vec<u8> = (0..5).map(|r| c8.framebuffer()[(8 + r) * 8 + 1]).collect();
    let want: Vec<u8> = (0..5)
        .map(|r| CHIP8_FONT[0x0e * 5 + r] ^ CHIP8_FONT[r])
        .collect();
    assert_eq!(rows, want);
    assert_eq!(c8.v(0xf), 1);
}

#[test]
fn test_subroutine_and_bcd() {
    let program = [
        0x60, 0x7b, // V0 = 123
        0xa3, 0x00, // I = 0x300
        0x22, 0x08, // call 0x208
        0x12, 0x06, // jump to self
        0xf0, 0x33, // 0x208: BCD of V0 at I
        0xf2, 0x65, // V0..V2 = digits
        0x00, 0xee, // return
    ];
    let (c8, halt) = run(&program);
    assert_eq!(halt, Halt::InfiniteLoop { addr: 0x206 });
    assert_eq!(c8.memory().get_ro_slice(0x300, 3), &[1, 2, 3]);
    assert_eq!((c8.v(0), c8.v(1), c8.v(2)), (1, 2, 3));
    assert_eq!(c8.sp(), 0xefe);
    assert_eq!(c8.i(), 0x300);
}

#[test]
fn test_legacy_call_halts() {
    let (c8, halt) = run(&[0x03, 0x45]);
    assert_eq!(halt, Halt::UnsupportedLegacyCall { addr: 0x345 });
    assert_eq!(c8.pc(), 0x200);
}

#[test]
fn test_indexed_jump() {
    let (c8, halt) = run(&[
        0x60, 0x06, // V0 = 6
        0xb2, 0x00, // jump to 0x200 + V0
        0x61, 0x01, // skipped
        0x12, 0x06, // 0x206: jump to self
    ]);
    assert_eq!(halt, Halt::InfiniteLoop { addr: 0x206 });
    assert_eq!(c8.v(1), 0);
}

#[test]
fn test_frames_from_another_thread() {
    let (tx, rx) = key_channel();
    let screen = SharedDisplay::new();
    let audio = AudioFlag::new();

    let worker = {
        let mut screen = screen.clone();
        let mut audio = audio.clone();
        thread::spawn(move || {
            let mut c8 = Chip8Interpreter::new(Box::new(DummyInput::new(&[0x1])), &config());
            Scheduler::new(config()).run_program(
                &mut c8,
                &[
                    0x60, 0x0f, // V0 = 0xF
                    0xf0, 0x29, // I = glyph(V0)
                    0xd1, 0x15, // draw at (0, 0)
                    0xf3, 0x0a, // V3 = key
                    0x00, 0xe0, // clear
                    0x12, 0x0a, // jump to self
                ],
                &rx,
                &mut screen,
                &mut audio,
            )
        })
    };

    // wait for the glyph to show up
    let mut frame = screen.frame(128, 64);
    for _ in 0..200 {
        if frame.get(0, 0) == Some(Pixel::White) {
            break;
        }
        thread::sleep(Duration::from_millis(5));
        frame = screen.frame(128, 64);
    }
    // F is 0xF0 on its top row: four lit pixels, doubled
    assert_eq!(frame.get(7, 1), Some(Pixel::White));
    assert_eq!(frame.get(8, 0), Some(Pixel::Black));
    assert!(!audio.is_beeping());

    // FX0A only listens once it is reached, so keep pressing until it returns
    for _ in 0..100 {
        if worker.is_finished() {
            break;
        }
        let _ = tx.send(0x1, true);
        thread::sleep(Duration::from_millis(20));
    }
    let halt = worker.join().unwrap().unwrap();
    assert_eq!(halt, Halt::InfiniteLoop { addr: 0x20a });
    assert!(screen.snapshot().iter().all(|b| *b == 0));
}
