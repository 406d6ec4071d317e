use crossterm::{execute, terminal};
use std::io;
use std::sync::{Arc, Mutex};
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

use crate::memory::DISPLAY_SIZE_BYTES;

/// native resolution of the display memory
pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// bytes per row of packed display memory
const ROW_BYTES: usize = SCREEN_WIDTH / 8;

/// Display is used by the run loop to show the display memory. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work.
pub trait Display {
    /// draw the packed 64x32 display memory
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pixel {
    Black,
    White,
}

/// a rendered snapshot of the display, scaled to whatever size was asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl Frame {
    /// expand each bit of the packed display memory into a pixel, then
    /// nearest-neighbour resample to `width` x `height`
    pub fn from_framebuffer(data: &[u8], width: usize, height: usize) -> Frame {
        let mut pixels = Vec::with_capacity(width * height);
        for dy in 0..height {
            // sample at the centre of each destination pixel
            let sy = (2 * dy + 1) * SCREEN_HEIGHT / (2 * height);
            for dx in 0..width {
                let sx = (2 * dx + 1) * SCREEN_WIDTH / (2 * width);
                pixels.push(native_pixel(data, sx, sy));
            }
        }
        Frame {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }

    /// (x, y) coords of every pixel of the given colour, with y pointing up
    /// the way the tui canvas wants it
    fn points(&self, colour: Pixel) -> Vec<(f64, f64)> {
        self.pixels
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == colour)
            .map(|(i, _)| {
                (
                    (i % self.width) as f64,        // x
                    -1.0 * (i / self.width) as f64, // y
                )
            })
            .collect()
    }
}

fn native_pixel(data: &[u8], x: usize, y: usize) -> Pixel {
    let byte = data.get(y * ROW_BYTES + x / 8).copied().unwrap_or(0);
    if (byte >> (7 - x % 8)) & 1 == 1 {
        Pixel::White
    } else {
        Pixel::Black
    }
}

/// keeps the latest display memory behind a lock so any thread can ask for a
/// frame; every clone sees the same screen
#[derive(Clone)]
pub struct SharedDisplay {
    data: Arc<Mutex<[u8; DISPLAY_SIZE_BYTES]>>,
}

impl SharedDisplay {
    pub fn new() -> Self {
        SharedDisplay {
            data: Arc::new(Mutex::new([0; DISPLAY_SIZE_BYTES])),
        }
    }

    /// copy of the display memory as of the last draw
    pub fn snapshot(&self) -> [u8; DISPLAY_SIZE_BYTES] {
        *self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn frame(&self, width: usize, height: usize) -> Frame {
        Frame::from_framebuffer(&self.snapshot(), width, height)
    }
}

impl Default for SharedDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SharedDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        let mut fb = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let len = data.len().min(DISPLAY_SIZE_BYTES);
        fb[..len].copy_from_slice(&data[..len]);
        Ok(())
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    width: usize,
    height: usize,
}

impl MonoTermDisplay {
    /// takes over the terminal until dropped
    pub fn new(width: usize, height: usize) -> Result<MonoTermDisplay, io::Error> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        Ok(MonoTermDisplay {
            terminal,
            width,
            height,
        })
    }

    /// draw an already-scaled frame
    pub fn draw_frame(&mut self, frame: &Frame) -> Result<(), io::Error> {
        let x_bounds = [0.0, (frame.width().max(1) - 1) as f64];
        let y_bounds = [-1.0 * (frame.height().max(1) - 1) as f64, 0.0];
        let white = frame.points(Pixel::White);
        let (w, h) = (frame.width() as u16, frame.height() as u16);

        self.terminal.draw(|f| {
            let size = Rect::new(0, 0, 2 + w, 2 + h).intersection(f.size());
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("CHIP-8")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(x_bounds)
                .y_bounds(y_bounds)
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &white,
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(())
    }
}

impl Display for MonoTermDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        // make sure we're given exactly the right amount of data to draw
        assert_eq!(
            data.len(),
            DISPLAY_SIZE_BYTES,
            "MonoTermDisplay must have correct-sized data to draw"
        );
        let frame = Frame::from_framebuffer(data, self.width, self.height);
        self.draw_frame(&frame)
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// useful for testing non-display routines; remembers what it was last shown
#[derive(Default)]
pub struct DummyDisplay {
    pub draws: usize,
    pub last: Vec<u8>,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn draw(&mut self, data: &[u8]) -> Result<(), io::Error> {
        self.draws += 1;
        self.last = data.to_vec();
        Ok(())
    }
}
