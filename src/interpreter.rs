/// # interpreter
///
/// machine state and the opcode handlers. the run loop (see `scheduler`) owns
/// one of these and feeds it instructions; nothing else mutates it.
///
///  V0-VF  8-bit general registers; VF doubles as carry/borrow/collision flag
///  I      address register, kept to 12 bits by the one opcode that can overflow it
///  SP     stack pointer, 0xefe at reset, 2-byte big-endian frames growing down
///  PC     program counter, 0x200 at reset
///  DT/ST  delay and sound timers, counted down by the timer clock
///
/// two opcodes cannot finish on the CPU clock alone: DXYN waits for the next
/// timer tick and FX0A waits for a key event. `execute` hands those back as a
/// `Step` and the caller finishes them with `complete_draw`/`complete_key_wait`.
use log::{trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Chip8Config;
use crate::display::Frame;
use crate::error::{Chip8Error, Halt};
use crate::input::{Input, KeyEvent, NullInput, KEY_COUNT};
use crate::instruction::Instruction;
use crate::memory::{
    glyph_addr, Chip8MemoryMap, MemoryMap, ADDR_MASK, DISPLAY_ADDR, PROGRAM_ADDR,
    RAM_SIZE_BYTES, STACK_ADDR,
};

/// flag register
const VF: usize = 0xf;

/// PC at or past this is off the end of memory
const PC_LIMIT: u16 = (RAM_SIZE_BYTES - 1) as u16;

/// what happened when an instruction was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// done; nothing visible changed
    Done,
    /// done; the display memory changed
    Redraw,
    /// sprite draw parked until the next timer tick
    AwaitVsync(Instruction),
    /// key read parked until a key event has been consumed
    AwaitKey(Instruction),
}

pub struct Chip8Interpreter {
    memory: Chip8MemoryMap,
    v: [u8; 16],
    i: u16,
    stack_pointer: u16,
    program_counter: u16,
    delay_timer: u8,
    sound_timer: u8,
    keyboard: [bool; KEY_COUNT],
    halt: Option<Halt>,
    rng: StdRng,
    input: Box<dyn Input + Send>,
}

impl Chip8Interpreter {
    pub fn new(input: Box<dyn Input + Send>, config: &Chip8Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Chip8Interpreter {
            memory: Chip8MemoryMap::new(),
            v: [0; 16],
            i: 0,
            stack_pointer: STACK_ADDR,
            program_counter: PROGRAM_ADDR,
            delay_timer: 0,
            sound_timer: 0,
            keyboard: [false; KEY_COUNT],
            halt: None,
            rng,
            input,
        }
    }

    /// a machine with no keyboard attached, for running programs headless
    pub fn headless(config: &Chip8Config) -> Self {
        Self::new(Box::new(NullInput), config)
    }

    /// load a chip8 program at 0x200
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load_program(program)
    }

    pub fn memory(&self) -> &Chip8MemoryMap {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Chip8MemoryMap {
        &mut self.memory
    }

    /// register VX; anything past VF reads as 0
    pub fn v(&self, reg: usize) -> u8 {
        self.v.get(reg).copied().unwrap_or(0)
    }

    /// set VX; anything past VF is ignored
    pub fn set_v(&mut self, reg: usize, value: u8) {
        if let Some(r) = self.v.get_mut(reg) {
            *r = value;
        }
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn set_i(&mut self, addr: u16) {
        self.i = addr;
    }

    pub fn pc(&self) -> u16 {
        self.program_counter
    }

    pub fn sp(&self) -> u16 {
        self.stack_pointer
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn key(&self, key: u8) -> bool {
        self.keyboard.get(key as usize).copied().unwrap_or(false)
    }

    pub fn halted(&self) -> Option<&Halt> {
        self.halt.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    /// should the host be beeping?
    pub fn is_beeping(&self) -> bool {
        self.sound_timer > 0
    }

    /// packed 64x32 display memory
    pub fn framebuffer(&self) -> &[u8] {
        self.memory.display()
    }

    /// the display scaled to `width` x `height`
    pub fn frame(&self, width: usize, height: usize) -> Frame {
        Frame::from_framebuffer(self.framebuffer(), width, height)
    }

    /// the timer clock: count both timers down, stopping at zero
    ///
    /// a halted machine's timers stay where they are
    pub fn tick_timers(&mut self) {
        if self.halt.is_some() {
            return;
        }
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// latch a key event into the keyboard state
    pub fn apply_key(&mut self, event: KeyEvent) {
        trace!("key {:#x} {}", event.key, if event.pressed { "down" } else { "up" });
        if let Some(k) = self.keyboard.get_mut(event.key as usize) {
            *k = event.pressed;
        }
    }

    /// halt if PC has left memory; returns why the machine stopped, if it has
    pub fn check_halt(&mut self) -> Option<&Halt> {
        if self.halt.is_none() && self.program_counter >= PC_LIMIT {
            self.stop(Halt::EndOfMemory {
                pc: self.program_counter,
            });
        }
        self.halt.as_ref()
    }

    /// the instruction at PC
    pub fn fetch(&self) -> Instruction {
        Instruction::from_word(self.memory.get_word(self.program_counter))
    }

    /// fetch and execute one instruction, resolving any wait on the spot
    ///
    /// for hosts and tests that don't want a clocked run loop: draws happen
    /// immediately and FX0A asks the `Input` straight away
    pub fn step(&mut self) -> Step {
        if self.check_halt().is_some() {
            return Step::Done;
        }
        match self.execute(self.fetch()) {
            Step::AwaitVsync(op) => self.complete_draw(op),
            Step::AwaitKey(op) => self.complete_key_wait(op),
            s => s,
        }
    }

    /// run one decoded instruction
    pub fn execute(&mut self, op: Instruction) -> Step {
        trace!("{:#05x}: {}", self.program_counter, op);
        match op.op {
            0x0 => self.op_0(op),
            0x1 => self.op_1(op),
            0x2 => self.op_2(op),
            0x3 => self.op_3(op),
            0x4 => self.op_4(op),
            0x5 => self.op_5(op),
            0x6 => self.op_6(op),
            0x7 => self.op_7(op),
            0x8 => self.op_8(op),
            0x9 => self.op_9(op),
            0xa => self.op_a(op),
            0xb => self.op_b(op),
            0xc => self.op_c(op),
            0xd => Step::AwaitVsync(op),
            0xe => self.op_e(op),
            0xf => self.op_f(op),
            _ => self.not_implemented(op),
        }
    }

    fn next(&mut self) {
        self.program_counter = self.program_counter.wrapping_add(2);
    }

    fn skip_if(&mut self, cond: bool) -> Step {
        if cond {
            self.next();
        }
        self.next();
        Step::Done
    }

    fn stop(&mut self, reason: Halt) {
        warn!("{}", reason);
        self.halt = Some(reason);
    }

    fn not_implemented(&mut self, op: Instruction) -> Step {
        self.stop(Halt::UnimplementedOpcode(op));
        Step::Done
    }

    /// 00E0 clear, 00EE return, 0NNN machine code call
    fn op_0(&mut self, op: Instruction) -> Step {
        if op.x != 0 {
            self.stop(Halt::UnsupportedLegacyCall { addr: op.addr() });
            return Step::Done;
        }
        match op.b1 {
            0xe0 => {
                self.memory.display_mut().fill(0);
                self.next();
                Step::Redraw
            }
            0xee => {
                // return lands on the call itself; step past it
                self.program_counter = self.memory.get_word(self.stack_pointer);
                self.stack_pointer = self.stack_pointer.wrapping_add(2);
                self.next();
                Step::Done
            }
            _ => self.not_implemented(op),
        }
    }

    /// 1NNN jump
    fn op_1(&mut self, op: Instruction) -> Step {
        if op.addr() == self.program_counter {
            self.stop(Halt::InfiniteLoop { addr: op.addr() });
        }
        self.program_counter = op.addr();
        Step::Done
    }

    /// 2NNN call
    fn op_2(&mut self, op: Instruction) -> Step {
        self.stack_pointer = self.stack_pointer.wrapping_sub(2);
        self.memory
            .set_word(self.stack_pointer, self.program_counter);
        self.program_counter = op.addr();
        Step::Done
    }

    /// 3XNN skip if VX == NN
    fn op_3(&mut self, op: Instruction) -> Step {
        self.skip_if(self.v[op.x as usize] == op.b1)
    }

    /// 4XNN skip if VX != NN
    fn op_4(&mut self, op: Instruction) -> Step {
        self.skip_if(self.v[op.x as usize] != op.b1)
    }

    /// 5XY0 skip if VX == VY
    fn op_5(&mut self, op: Instruction) -> Step {
        self.skip_if(self.v[op.x as usize] == self.v[op.y as usize])
    }

    /// 6XNN VX = NN
    fn op_6(&mut self, op: Instruction) -> Step {
        self.v[op.x as usize] = op.b1;
        self.next();
        Step::Done
    }

    /// 7XNN VX += NN, no carry
    fn op_7(&mut self, op: Instruction) -> Step {
        let x = op.x as usize;
        self.v[x] = self.v[x].wrapping_add(op.b1);
        self.next();
        Step::Done
    }

    /// 8XYN register arithmetic
    ///
    /// the flag is written before the result, so with X = F the result wins
    fn op_8(&mut self, op: Instruction) -> Step {
        let x = op.x as usize;
        let vx = self.v[x];
        let vy = self.v[op.y as usize];

        let (result, flag) = match op.n {
            0x0 => (vy, None),
            0x1 => (vx | vy, None),
            0x2 => (vx & vy, None),
            0x3 => (vx ^ vy, None),
            0x4 => {
                let (sum, carry) = vx.overflowing_add(vy);
                (sum, Some(carry as u8))
            }
            // NB. VF is 0 on borrow and 1 otherwise
            0x5 => (vx.wrapping_sub(vy), Some((vx >= vy) as u8)),
            0x6 => (vx >> 1, Some(vx & 0x01)),
            0x7 => (vy.wrapping_sub(vx), Some((vy >= vx) as u8)),
            0xe => (vx << 1, Some(vx >> 7)),
            _ => return self.not_implemented(op),
        };

        if let Some(f) = flag {
            self.v[VF] = f;
        }
        self.v[x] = result;
        self.next();
        Step::Done
    }

    /// 9XY0 skip if VX != VY
    fn op_9(&mut self, op: Instruction) -> Step {
        self.skip_if(self.v[op.x as usize] != self.v[op.y as usize])
    }

    /// ANNN I = NNN
    fn op_a(&mut self, op: Instruction) -> Step {
        self.i = op.addr();
        self.next();
        Step::Done
    }

    /// BNNN jump to V0 + NNN
    fn op_b(&mut self, op: Instruction) -> Step {
        self.program_counter = self.v[0] as u16 + op.addr();
        Step::Done
    }

    /// CXNN VX = random & NN
    fn op_c(&mut self, op: Instruction) -> Step {
        self.v[op.x as usize] = self.rng.gen::<u8>() & op.b1;
        self.next();
        Step::Done
    }

    /// DXYN draw the N-row sprite at I to (VX, VY), XORed, clipped at the
    /// edges; VF = 1 if any lit pixel was switched off
    pub fn complete_draw(&mut self, op: Instruction) -> Step {
        let x = self.v[op.x as usize] as usize;
        let y = self.v[op.y as usize] as usize;
        let n = op.n as usize;

        self.v[VF] = 0;

        for row in 0..n {
            let py = row + y;
            if py >= 32 {
                break;
            }
            let sprite = self.memory.get_byte(self.i.wrapping_add(row as u16));

            for px in x..(x + 8).min(64) {
                let bit = (sprite >> (x + 7 - px)) & 0x01;
                if bit == 0 {
                    continue;
                }

                let addr = DISPLAY_ADDR + (py * 8 + px / 8) as u16;
                let target = self.memory.get_byte(addr);
                let mask = 0x80 >> (px % 8);

                if target & mask != 0 {
                    self.v[VF] = 1;
                }
                self.memory.set_byte(addr, target ^ mask);
            }
        }

        self.next();
        Step::Redraw
    }

    /// EX9E / EXA1 skip if the key in VX is / isn't down
    fn op_e(&mut self, op: Instruction) -> Step {
        let down = self.key(self.v[op.x as usize]);
        match op.b1 {
            0x9e => self.skip_if(down),
            0xa1 => self.skip_if(!down),
            _ => self.not_implemented(op),
        }
    }

    /// FX0A, once a key event has been consumed: ask the host for the key
    pub fn complete_key_wait(&mut self, op: Instruction) -> Step {
        self.v[op.x as usize] = self.input.wait_for_key_press();
        self.next();
        Step::Done
    }

    /// FXNN timers, I arithmetic, BCD, register block moves
    fn op_f(&mut self, op: Instruction) -> Step {
        let x = op.x as usize;
        match op.b1 {
            0x07 => self.v[x] = self.delay_timer,
            0x0a => {
                self.input.begin_key_wait();
                return Step::AwaitKey(op);
            }
            0x15 => self.delay_timer = self.v[x],
            0x18 => self.sound_timer = self.v[x],
            0x1e => {
                let sum = self.i.wrapping_add(self.v[x] as u16);
                self.v[VF] = (sum > ADDR_MASK) as u8;
                self.i = sum & ADDR_MASK;
            }
            0x29 => self.i = glyph_addr(self.v[x]),
            0x33 => {
                let value = self.v[x];
                self.memory.set_byte(self.i, value / 100);
                self.memory.set_byte(self.i.wrapping_add(1), value / 10 % 10);
                self.memory.set_byte(self.i.wrapping_add(2), value % 10);
            }
            0x55 => {
                for r in 0..=x {
                    self.memory.set_byte(self.i.wrapping_add(r as u16), self.v[r]);
                }
            }
            0x65 => {
                for r in 0..=x {
                    self.v[r] = self.memory.get_byte(self.i.wrapping_add(r as u16));
                }
            }
            _ => return self.not_implemented(op),
        }
        self.next();
        Step::Done
    }
}
