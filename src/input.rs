use crossterm::event::{poll, read, Event, KeyCode};
use log::{debug, warn};
use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Chip8Error;

/// how many keys the keypad has
pub const KEY_COUNT: usize = 16;

/// map from the left-hand side of a qwerty keyboard to the COSMAC keypad
///
///   1 2 3 4        1 2 3 C
///   q w e r   =>   4 5 6 D
///   a s d f        7 8 9 E
///   z x c v        A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// a key going down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: u8,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn new(key: u8, pressed: bool) -> Result<Self, Chip8Error> {
        if key as usize >= KEY_COUNT {
            return Err(Chip8Error::InvalidKey(key));
        }
        Ok(KeyEvent { key, pressed })
    }

    pub fn press(key: u8) -> Result<Self, Chip8Error> {
        Self::new(key, true)
    }

    pub fn release(key: u8) -> Result<Self, Chip8Error> {
        Self::new(key, false)
    }
}

/// producer half of the key queue; holds at most one event in flight
#[derive(Clone)]
pub struct KeySender {
    tx: SyncSender<KeyEvent>,
}

/// consumer half of the key queue, owned by the run loop
pub struct KeyReceiver {
    rx: Receiver<KeyEvent>,
}

/// a single-slot key queue; a second event waits for the first to be drained
pub fn key_channel() -> (KeySender, KeyReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (KeySender { tx }, KeyReceiver { rx })
}

impl KeySender {
    /// queue a key event, blocking while the slot is full
    pub fn send(&self, key: u8, pressed: bool) -> Result<(), Chip8Error> {
        let event = KeyEvent::new(key, pressed)?;
        self.tx.send(event).map_err(|_| Chip8Error::Disconnected)
    }

    /// queue a key event without blocking; a full slot hands the event back
    pub fn try_send(&self, event: KeyEvent) -> Result<(), TrySendError<KeyEvent>> {
        self.tx.try_send(event)
    }
}

impl KeyReceiver {
    /// next queued event, if there is one; `Err` once every sender is gone
    pub fn try_next(&self) -> Result<Option<KeyEvent>, Chip8Error> {
        match self.rx.try_recv() {
            Ok(e) => Ok(Some(e)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Chip8Error::Disconnected),
        }
    }
}

/// host capability for reading the keypad
pub trait Input {
    /// is this key currently down?
    fn get_key_at(&self, key: u8) -> bool;

    /// block until a key is pressed and return it
    fn wait_for_key_press(&mut self) -> u8;

    /// FX0A has started waiting; presses from before now don't count
    fn begin_key_wait(&mut self) {}
}

/// no keys, ever; for running programs that never wait on input
pub struct NullInput;

impl Input for NullInput {
    fn get_key_at(&self, _key: u8) -> bool {
        false
    }

    fn wait_for_key_press(&mut self) -> u8 {
        warn!("waiting for a key with no input attached; returning key 0");
        0
    }
}

/// dummy Input implementation for testing
pub struct DummyInput {
    keys: Vec<u8>,
}

impl DummyInput {
    /// keys are handed out in order by `wait_for_key_press`
    pub fn new(keys: &[u8]) -> Self {
        DummyInput {
            keys: keys.iter().rev().copied().collect(),
        }
    }
}

impl Input for DummyInput {
    fn get_key_at(&self, key: u8) -> bool {
        self.keys.contains(&key)
    }

    fn wait_for_key_press(&mut self) -> u8 {
        self.keys.pop().unwrap_or(0)
    }
}

#[derive(Default)]
struct KeypadState {
    keys: [bool; KEY_COUNT],
    last_press: Option<u8>,
}

/// key latch shared between the host's event loop and the machine thread
///
/// the host feeds it every key event; the machine asks it for presses
#[derive(Clone, Default)]
pub struct Keypad {
    inner: Arc<(Mutex<KeypadState>, Condvar)>,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: KeyEvent) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
        match state.keys.get_mut(event.key as usize) {
            Some(k) => *k = event.pressed,
            None => return,
        }
        if event.pressed {
            state.last_press = Some(event.key);
            cvar.notify_all();
        }
    }
}

impl Input for Keypad {
    fn get_key_at(&self, key: u8) -> bool {
        let (lock, _) = &*self.inner;
        let state = lock.lock().unwrap_or_else(|e| e.into_inner());
        state.keys.get(key as usize).copied().unwrap_or(false)
    }

    /// returns the most recent press since `begin_key_wait` not yet handed
    /// out, or waits for one
    fn wait_for_key_press(&mut self) -> u8 {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(key) = state.last_press.take() {
                return key;
            }
            state = cvar.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn begin_key_wait(&mut self) {
        let (lock, _) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
        state.last_press = None;
    }
}

/// what a poll of the terminal turned up
#[derive(Debug, Default)]
pub struct TerminalPoll {
    pub events: Vec<KeyEvent>,
    pub quit: bool,
}

/// how long a terminal key counts as held; terminals only report presses
const KEY_HOLD: Duration = Duration::from_millis(150);

/// reads keypresses from the terminal with crossterm
///
/// the terminal never says when a key goes up, so each press is followed by a
/// synthetic release once it has been quiet for `KEY_HOLD`
pub struct TerminalKeyboard {
    keymap: HashMap<char, u8>,
    held: HashMap<u8, Instant>,
}

impl TerminalKeyboard {
    pub fn new() -> Self {
        TerminalKeyboard {
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            held: HashMap::new(),
        }
    }

    /// collect whatever arrived within `timeout`
    pub fn poll(&mut self, timeout: Duration) -> Result<TerminalPoll, io::Error> {
        let mut out = TerminalPoll::default();
        let mut wait = timeout;
        while poll(wait)? {
            wait = Duration::ZERO;
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Char(c) => match self.map_key(c) {
                        Some(key) => {
                            if self.held.insert(key, Instant::now()).is_none() {
                                out.events.push(KeyEvent { key, pressed: true });
                            }
                        }
                        None => debug!("can't map {:?} to a COSMAC key", c),
                    },
                    KeyCode::Esc => out.quit = true,
                    _ => debug!("unknown key event received"),
                },
                _ => debug!("unknown event received"),
            }
        }

        let now = Instant::now();
        let mut released: Vec<u8> = self
            .held
            .iter()
            .filter(|(_, t)| now.duration_since(**t) >= KEY_HOLD)
            .map(|(k, _)| *k)
            .collect();
        released.sort_unstable();
        for key in released {
            self.held.remove(&key);
            out.events.push(KeyEvent {
                key,
                pressed: false,
            });
        }
        Ok(out)
    }

    fn map_key(&self, c: char) -> Option<u8> {
        self.keymap.get(&c.to_ascii_lowercase()).copied()
    }
}

impl Default for TerminalKeyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_key_event_range() {
        assert!(KeyEvent::press(0xf).is_ok());
        assert!(matches!(
            KeyEvent::press(0x10),
            Err(Chip8Error::InvalidKey(0x10))
        ));
    }

    #[test]
    fn test_channel_holds_one() {
        let (tx, rx) = key_channel();
        tx.send(0x1, true).unwrap();
        let second = KeyEvent::release(0x1).unwrap();
        match tx.try_send(second) {
            Err(TrySendError::Full(e)) => assert_eq!(e, second),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rx.try_next().unwrap(), Some(KeyEvent::press(0x1).unwrap()));
        assert_eq!(rx.try_next().unwrap(), None);
        tx.try_send(second).unwrap();
        assert_eq!(rx.try_next().unwrap(), Some(second));
    }

    #[test]
    fn test_channel_rejects_bad_key() {
        let (tx, _rx) = key_channel();
        assert!(matches!(tx.send(0x20, true), Err(Chip8Error::InvalidKey(0x20))));
    }

    #[test]
    fn test_channel_disconnect() {
        let (tx, rx) = key_channel();
        drop(tx);
        assert!(matches!(rx.try_next(), Err(Chip8Error::Disconnected)));
    }

    #[test]
    fn test_send_blocks_until_drained() {
        let (tx, rx) = key_channel();
        tx.send(0x2, true).unwrap();
        let producer = thread::spawn(move || tx.send(0x2, false));
        // the producer is stuck until we make room
        let mut seen = vec![];
        while seen.len() < 2 {
            if let Some(e) = rx.try_next().unwrap() {
                seen.push(e);
            }
            thread::yield_now();
        }
        producer.join().unwrap().unwrap();
        assert_eq!(
            seen,
            vec![KeyEvent::press(0x2).unwrap(), KeyEvent::release(0x2).unwrap()]
        );
    }

    #[test]
    fn test_null_input() {
        let mut i = NullInput;
        assert!(!i.get_key_at(0x5));
        assert_eq!(i.wait_for_key_press(), 0);
    }

    #[test]
    fn test_dummy_input_in_order() {
        let mut i = DummyInput::new(&[0x3, 0xa]);
        assert!(i.get_key_at(0xa));
        assert!(!i.get_key_at(0xb));
        assert_eq!(i.wait_for_key_press(), 0x3);
        assert_eq!(i.wait_for_key_press(), 0xa);
        assert_eq!(i.wait_for_key_press(), 0);
    }

    #[test]
    fn test_keypad_latch() {
        let pad = Keypad::new();
        pad.apply(KeyEvent::press(0x7).unwrap());
        assert!(pad.get_key_at(0x7));
        pad.apply(KeyEvent::release(0x7).unwrap());
        assert!(!pad.get_key_at(0x7));
        assert!(!pad.get_key_at(0x42));
    }

    #[test]
    fn test_keypad_wait_takes_pending_press() {
        let pad = Keypad::new();
        pad.apply(KeyEvent::press(0xc).unwrap());
        let mut waiter = pad.clone();
        assert_eq!(waiter.wait_for_key_press(), 0xc);
    }

    #[test]
    fn test_keypad_wait_blocks_for_press() {
        let pad = Keypad::new();
        let mut waiter = pad.clone();
        let t = thread::spawn(move || waiter.wait_for_key_press());
        thread::sleep(Duration::from_millis(20));
        pad.apply(KeyEvent::press(0x9).unwrap());
        assert_eq!(t.join().unwrap(), 0x9);
    }

    #[test]
    fn test_keypad_wait_ignores_earlier_press() {
        let pad = Keypad::new();
        pad.apply(KeyEvent::press(0x5).unwrap());
        let mut waiter = pad.clone();
        waiter.begin_key_wait();
        let t = thread::spawn(move || waiter.wait_for_key_press());
        thread::sleep(Duration::from_millis(20));
        // letting go of the old key isn't a new press
        pad.apply(KeyEvent::release(0x5).unwrap());
        thread::sleep(Duration::from_millis(20));
        assert!(!t.is_finished());
        pad.apply(KeyEvent::press(0x4).unwrap());
        assert_eq!(t.join().unwrap(), 0x4);
    }

    #[test]
    fn test_conventional_keymap() {
        let kb = TerminalKeyboard::new();
        assert_eq!(kb.map_key('x'), Some(0x0));
        assert_eq!(kb.map_key('V'), Some(0xf));
        assert_eq!(kb.map_key('p'), None);
    }
}
