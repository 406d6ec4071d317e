use beep::beep;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// told by the run loop when the sound timer starts and stops
pub trait Sound {
    fn beep(&mut self) -> Result<(), Box<dyn Error>>;
    fn stop(&mut self) -> Result<(), Box<dyn Error>>;
}

const SIMPLEBEEP_PITCH: u16 = 2093; // C

/// PC speaker beep via the `beep` crate
pub struct SimpleBeep {}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep {}
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new()
    }
}

impl Sound for SimpleBeep {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        beep(SIMPLEBEEP_PITCH)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        beep(0)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct Mute {}
impl Mute {
    pub fn new() -> Self {
        Mute {}
    }
}
impl Sound for Mute {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// a beep flag another thread can poll
#[derive(Clone, Default)]
pub struct AudioFlag {
    beeping: Arc<AtomicBool>,
}

impl AudioFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_beeping(&self) -> bool {
        self.beeping.load(Ordering::Relaxed)
    }
}

impl Sound for AudioFlag {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        self.beeping.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        self.beeping.store(false, Ordering::Relaxed);
        Ok(())
    }
}
