//! A CHIP-8 virtual machine core.
//!
//! ## Design
//!
//! * one owned machine state (`Chip8Interpreter`); opcode handlers are
//!   methods on it, so there is no global state to fight over
//! * a run loop (`Scheduler`) interleaves the 500 Hz CPU clock, the 60 Hz
//!   timer clock and key events, each clock on its own cadence
//! * the host plugs in through traits: `Input` for the keypad, `Display` for
//!   the screen, `Sound` for the beeper
//! * keys cross threads through a single-slot queue (`key_channel`) that
//!   pushes back on the producer instead of dropping events
//! * frames are nearest-neighbour scaled snapshots of the packed display
//!   memory (`Frame`)
//!
//! Model
//!
//! host
//!  |-- key_channel() -> (KeySender, KeyReceiver)
//!  |-- Chip8Interpreter::new(input, config)
//!  |    |-- memory map, font at 0x000
//!  |    `-- load_program() at 0x200
//!  `-- Scheduler::run(interpreter, keys, display, sound)
//!       |-- sleep until the next CPU or timer deadline
//!       |-- drain key events into the keyboard latch
//!       |-- timer tick: count down, finish a parked DXYN
//!       `-- CPU tick: stop if halted, otherwise fetch/decode/execute
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod memory;
pub mod scheduler;
pub mod sound;

pub use config::Chip8Config;
pub use error::{Chip8Error, Halt};
pub use input::{key_channel, Input, KeyEvent, KeyReceiver, KeySender};
pub use instruction::Instruction;
pub use interpreter::{Chip8Interpreter, Step};
pub use scheduler::Scheduler;
