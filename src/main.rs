use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::TrySendError;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};

use chip8::display::{MonoTermDisplay, SharedDisplay, SCREEN_HEIGHT, SCREEN_WIDTH};
use chip8::input::{Keypad, TerminalKeyboard};
use chip8::sound::{AudioFlag, Mute, SimpleBeep, Sound};
use chip8::{key_channel, Chip8Config, Chip8Interpreter, KeyEvent, Scheduler};

/// CHIP-8 runner for the terminal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ROM to load and execute
    rom: PathBuf,

    /// Instruction clock in Hz
    #[arg(long, default_value_t = chip8::config::DEFAULT_CPU_HZ)]
    cpu_hz: u32,

    /// Delay/sound timer clock in Hz
    #[arg(long, default_value_t = chip8::config::DEFAULT_TIMER_HZ)]
    timer_hz: u32,

    /// Seed for the random-number opcode
    #[arg(long)]
    seed: Option<u64>,

    /// Don't use the PC speaker
    #[arg(long)]
    mute: bool,
}

/// how often the terminal is redrawn and polled
const FRAME: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("CHIP8_LOG", "warn")
        .write_style_or("CHIP8_LOG", "always");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let rom = std::fs::read(&args.rom).with_context(|| format!("failed to read {:?}", args.rom))?;
    let config = Chip8Config {
        cpu_hz: args.cpu_hz,
        timer_hz: args.timer_hz,
        seed: args.seed,
    };

    // the machine thread owns the interpreter; we keep the other ends
    let keypad = Keypad::new();
    let screen = SharedDisplay::new();
    let audio = AudioFlag::new();
    let (keys_tx, keys_rx) = key_channel();

    let mut machine = Chip8Interpreter::new(Box::new(keypad.clone()), &config);
    machine.load_program(&rom).context("failed to load program")?;
    info!("loaded {} bytes from {:?}", rom.len(), args.rom);

    let worker = {
        let mut screen = screen.clone();
        let mut audio = audio.clone();
        thread::spawn(move || {
            Scheduler::new(config).run(&mut machine, &keys_rx, &mut screen, &mut audio)
        })
    };

    let mut beeper: Box<dyn Sound> = if args.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let mut beeping = false;

    let mut display = MonoTermDisplay::new(SCREEN_WIDTH, SCREEN_HEIGHT)?;
    let mut keyboard = TerminalKeyboard::new();
    // events the machine hasn't taken yet; the queue only holds one
    let mut pending: VecDeque<KeyEvent> = VecDeque::new();

    while !worker.is_finished() {
        let poll = keyboard.poll(FRAME)?;
        if poll.quit {
            break;
        }
        for event in poll.events {
            keypad.apply(event);
            pending.push_back(event);
        }
        while let Some(event) = pending.pop_front() {
            match keys_tx.try_send(event) {
                Ok(()) => (),
                Err(TrySendError::Full(event)) => {
                    pending.push_front(event);
                    break;
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }

        display.draw_frame(&screen.frame(SCREEN_WIDTH, SCREEN_HEIGHT))?;

        if audio.is_beeping() != beeping {
            beeping = audio.is_beeping();
            let r = if beeping { beeper.beep() } else { beeper.stop() };
            if let Err(e) = r {
                warn!("beeper failed: {}", e);
            }
        }
    }

    if beeping {
        if let Err(e) = beeper.stop() {
            warn!("beeper failed: {}", e);
        }
    }
    // hand the terminal back before printing anything
    drop(display);

    if worker.is_finished() {
        let halt = worker
            .join()
            .map_err(|_| anyhow!("machine thread panicked"))??;
        println!("halted: {}", halt);
    }
    Ok(())
}
