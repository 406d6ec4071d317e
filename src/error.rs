use std::io;

use crate::instruction::Instruction;

/// why the machine stopped; every terminal condition ends up here
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Halt {
    #[error("opcode not implemented: {0}")]
    UnimplementedOpcode(Instruction),

    #[error("call RCA 1802 program at {addr:#05x} (not supported)")]
    UnsupportedLegacyCall { addr: u16 },

    #[error("infinite loop at {addr:#05x}")]
    InfiniteLoop { addr: u16 },

    #[error("program counter ran off the end of memory at {pc:#05x}")]
    EndOfMemory { pc: u16 },
}

/// errors surfaced to the host; the machine itself never fails, it halts
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("program is too large ({len} bytes), at most {max} bytes fit")]
    ProgramTooLarge { len: usize, max: usize },

    #[error("key {0:#x} is outside the 16-key keypad")]
    InvalidKey(u8),

    #[error("key channel closed")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("sound device failed: {0}")]
    Sound(String),
}
