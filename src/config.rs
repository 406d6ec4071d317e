use std::time::Duration;

/// default instruction clock
pub const DEFAULT_CPU_HZ: u32 = 500;

/// default delay/sound timer clock
pub const DEFAULT_TIMER_HZ: u32 = 60;

/// knobs for a machine and its run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chip8Config {
    /// instructions per second
    pub cpu_hz: u32,
    /// timer decrements per second; also the draw rate limit
    pub timer_hz: u32,
    /// fixed seed for the random opcode, otherwise seeded from the OS
    pub seed: Option<u64>,
}

impl Default for Chip8Config {
    fn default() -> Self {
        Chip8Config {
            cpu_hz: DEFAULT_CPU_HZ,
            timer_hz: DEFAULT_TIMER_HZ,
            seed: None,
        }
    }
}

impl Chip8Config {
    pub fn cpu_period(&self) -> Duration {
        period(self.cpu_hz)
    }

    pub fn timer_period(&self) -> Duration {
        period(self.timer_hz)
    }
}

fn period(hz: u32) -> Duration {
    Duration::from_secs(1) / hz.max(1)
}
