/// # scheduler
///
/// the run loop. three sources feed one machine:
///
///  * the CPU clock, one instruction per tick
///  * the timer clock, counting the delay and sound timers down
///  * the key queue, latching key events into the keyboard state
///
/// each clock keeps its own deadline and cadence. the loop sleeps until the
/// earlier of the two, drains whatever keys have arrived, then services the
/// clocks that are due. only this loop touches the machine, so nothing needs
/// locking.
///
/// DXYN parks until the next timer tick before drawing, which holds the CPU
/// back to the display rate. FX0A parks until a key event has been consumed
/// and then asks the `Input` for the key; the timers keep running meanwhile.
use log::{debug, info};
use std::time::{Duration, Instant};

use crate::config::Chip8Config;
use crate::display::Display;
use crate::error::{Chip8Error, Halt};
use crate::input::KeyReceiver;
use crate::instruction::Instruction;
use crate::interpreter::{Chip8Interpreter, Step};
use crate::sound::Sound;

/// an instruction that couldn't finish on its own CPU tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parked {
    Running,
    Vsync(Instruction),
    Key(Instruction),
}

pub struct Scheduler {
    config: Chip8Config,
    instructions: u64,
    timer_ticks: u64,
}

impl Scheduler {
    pub fn new(config: Chip8Config) -> Self {
        Scheduler {
            config,
            instructions: 0,
            timer_ticks: 0,
        }
    }

    /// instructions executed so far
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// timer ticks serviced so far
    pub fn timer_ticks(&self) -> u64 {
        self.timer_ticks
    }

    /// load a program at 0x200 and run it until the machine halts
    pub fn run_program(
        &mut self,
        machine: &mut Chip8Interpreter,
        program: &[u8],
        keys: &KeyReceiver,
        display: &mut dyn Display,
        sound: &mut dyn Sound,
    ) -> Result<Halt, Chip8Error> {
        machine.load_program(program)?;
        self.run(machine, keys, display, sound)
    }

    /// run until the machine halts
    ///
    /// returns why it halted. `Err` means the host side failed: the display or
    /// sound device errored, or the key queue closed while FX0A was waiting on it
    pub fn run(
        &mut self,
        machine: &mut Chip8Interpreter,
        keys: &KeyReceiver,
        display: &mut dyn Display,
        sound: &mut dyn Sound,
    ) -> Result<Halt, Chip8Error> {
        let cpu_period = self.config.cpu_period();
        let timer_period = self.config.timer_period();
        info!(
            "running from {:#05x}: cpu {} Hz, timers {} Hz",
            machine.pc(),
            self.config.cpu_hz,
            self.config.timer_hz
        );

        let start = Instant::now();
        let mut next_cpu = start + cpu_period;
        let mut next_timer = start + timer_period;
        let mut parked = Parked::Running;
        let mut keys_open = true;
        let mut beeping = false;

        loop {
            let deadline = next_cpu.min(next_timer);
            let now = Instant::now();
            if deadline > now {
                spin_sleep::sleep(deadline - now);
            }

            while keys_open {
                match keys.try_next() {
                    Ok(Some(event)) => {
                        machine.apply_key(event);
                        if let Parked::Key(op) = parked {
                            debug!("{} resumed by key {:#x}", op, event.key);
                            parked = Parked::Running;
                            machine.complete_key_wait(op);
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        debug!("key queue closed");
                        keys_open = false;
                    }
                }
            }
            if !keys_open {
                if let Parked::Key(op) = parked {
                    info!("{} waiting on a closed key queue", op);
                    self.silence(sound, beeping)?;
                    return Err(Chip8Error::Disconnected);
                }
            }

            let now = Instant::now();
            if now >= next_timer && !machine.is_halted() {
                next_timer = advance(next_timer, timer_period, now);
                self.timer_ticks += 1;
                machine.tick_timers();
                if let Parked::Vsync(op) = parked {
                    parked = Parked::Running;
                    machine.complete_draw(op);
                    display.draw(machine.framebuffer())?;
                }
                beeping = sync_sound(machine, sound, beeping)?;
            }

            if now >= next_cpu {
                next_cpu = advance(next_cpu, cpu_period, now);
                if parked != Parked::Running {
                    continue;
                }
                if let Some(reason) = machine.check_halt() {
                    let reason = reason.clone();
                    return self.finish(reason, sound, beeping);
                }

                let op = machine.fetch();
                self.instructions += 1;
                match machine.execute(op) {
                    Step::Done => (),
                    Step::Redraw => display.draw(machine.framebuffer())?,
                    Step::AwaitVsync(op) => parked = Parked::Vsync(op),
                    Step::AwaitKey(op) => parked = Parked::Key(op),
                }
                // no more ticks of either clock once the machine has halted
                if let Some(reason) = machine.check_halt() {
                    let reason = reason.clone();
                    return self.finish(reason, sound, beeping);
                }
                beeping = sync_sound(machine, sound, beeping)?;
            }
        }
    }

    fn finish(
        &self,
        reason: Halt,
        sound: &mut dyn Sound,
        beeping: bool,
    ) -> Result<Halt, Chip8Error> {
        info!(
            "halted after {} instructions, {} timer ticks: {}",
            self.instructions, self.timer_ticks, reason
        );
        self.silence(sound, beeping)?;
        Ok(reason)
    }

    fn silence(&self, sound: &mut dyn Sound, beeping: bool) -> Result<(), Chip8Error> {
        if beeping {
            sound
                .stop()
                .map_err(|e| Chip8Error::Sound(e.to_string()))?;
        }
        Ok(())
    }
}

/// next deadline for a clock; if we've fallen more than a period behind,
/// restart the cadence from now rather than bursting to catch up
fn advance(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let next = deadline + period;
    if next < now {
        now + period
    } else {
        next
    }
}

/// start or stop the beeper when the sound timer crosses zero
fn sync_sound(
    machine: &Chip8Interpreter,
    sound: &mut dyn Sound,
    beeping: bool,
) -> Result<bool, Chip8Error> {
    let want = machine.is_beeping();
    if want != beeping {
        let r = if want { sound.beep() } else { sound.stop() };
        r.map_err(|e| Chip8Error::Sound(e.to_string()))?;
    }
    Ok(want)
}
