use std::io;

use crate::error::Chip8Error;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the addressable memory of the machine
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) {
        self.get_rw_slice(addr, data.len()).copy_from_slice(data);
    }

    /// get a big-endian two-byte word (stack, instruction fetch)
    fn get_word(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.get_byte(addr), self.get_byte(addr.wrapping_add(1))])
    }

    /// put a big-endian two-byte word (stack)
    fn set_word(&mut self, addr: u16, word: u16) {
        let [hi, lo] = word.to_be_bytes();
        self.set_byte(addr, hi);
        self.set_byte(addr.wrapping_add(1), lo);
    }

    /// read one byte; the address wraps inside the address space
    fn get_byte(&self, addr: u16) -> u8;

    /// write one byte; the address wraps inside the address space
    fn set_byte(&mut self, addr: u16, value: u8);

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8];

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8];
}

/// how much RAM we have
pub const RAM_SIZE_BYTES: usize = 4096;

/// mask applied to every computed address
pub const ADDR_MASK: u16 = 0x0fff;

/// where the font lives
pub const FONT_ADDR: u16 = 0x000;

/// bytes per font glyph
pub const FONT_GLYPH_BYTES: u16 = 5;

/// where the program is loaded
pub const PROGRAM_ADDR: u16 = 0x0200;

/// initial stack pointer; the stack grows downward from here
pub const STACK_ADDR: u16 = 0x0efe;

/// start of the packed 1-bit-per-pixel display
pub const DISPLAY_ADDR: u16 = 0x0f00;

/// 64 x 32 pixels at one bit each
pub const DISPLAY_SIZE_BYTES: usize = 0x100;

/// Defines the memory map:
///
///   0x0000-0x004f  font, 16 glyphs of 5 bytes
///   0x0200-0x0efd  program (and anything it writes)
///   ....  -0x0efd  stack, growing down from 0x0efe in 2-byte frames
///   0x0f00-0x0fff  display
///
/// nothing stops the stack from growing into the program
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_byte(&self, addr: u16) -> u8 {
        self.bytes[(addr & ADDR_MASK) as usize]
    }
    fn set_byte(&mut self, addr: u16, value: u8) {
        self.bytes[(addr & ADDR_MASK) as usize] = value;
    }
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let a = addr as usize;
        &mut self.bytes[a..(a + len)]
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = addr as usize;
        &self.bytes[a..(a + len)]
    }
}

impl Chip8MemoryMap {
    /// zeroed memory with the font baked in
    pub fn new() -> Self {
        let mut mm = Chip8MemoryMap {
            bytes: vec![0u8; RAM_SIZE_BYTES].into_boxed_slice(),
        };
        mm.write(&CHIP8_FONT, FONT_ADDR);
        mm
    }

    /// largest program that fits between 0x200 and the top of memory
    pub fn max_program_len() -> usize {
        RAM_SIZE_BYTES - PROGRAM_ADDR as usize
    }

    /// copy a CHIP-8 program verbatim to 0x200
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Chip8Error> {
        let max = Self::max_program_len();
        if program.len() > max {
            return Err(Chip8Error::ProgramTooLarge {
                len: program.len(),
                max,
            });
        }
        self.write(program, PROGRAM_ADDR);
        Ok(())
    }

    /// read a whole program from somewhere and load it at 0x200
    pub fn load_program_from(&mut self, reader: &mut impl io::Read) -> Result<(), Chip8Error> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.load_program(&buf)
    }

    pub fn display(&self) -> &[u8] {
        self.get_ro_slice(DISPLAY_ADDR, DISPLAY_SIZE_BYTES)
    }

    pub fn display_mut(&mut self) -> &mut [u8] {
        self.get_rw_slice(DISPLAY_ADDR, DISPLAY_SIZE_BYTES)
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

/// address of the glyph for the low nibble-ish value `v`; not masked, so
/// values above 0xf point past the font like they always have
pub fn glyph_addr(v: u8) -> u16 {
    FONT_ADDR + v as u16 * FONT_GLYPH_BYTES
}

pub const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_zeroed() {
        let m = Chip8MemoryMap::new();
        // NB. memory is zeroed from 0x50 because before that we bake in the font
        assert_eq!(m.bytes[0x50..], [0; 0xfb0]);
    }

    #[test]
    fn test_font_loaded() {
        let m = Chip8MemoryMap::new();
        assert_eq!(m.get_ro_slice(0, 80), &CHIP8_FONT);
        assert_eq!(m.get_ro_slice(glyph_addr(0xe), 5), &[0xf0, 0x80, 0xf0, 0x80, 0xf0]);
    }

    #[test]
    fn test_write_slice_ok() {
        let mut dst = Chip8MemoryMap::new();
        dst.write(&[0, 1, 2, 3, 4, 5, 6, 7], 0x308);
        assert_eq!(
            dst.bytes[0x300..0x310],
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_read_word() {
        let mut m = Chip8MemoryMap::new();
        m.write(&[0, 1, 2, 3, 4, 5, 6, 7], 0x300);
        assert_eq!(m.get_word(0x304), 0x0405);
    }

    #[test]
    fn test_write_word() {
        let mut m = Chip8MemoryMap::new();
        m.set_word(0xefc, 0x0202);
        assert_eq!(m.get_ro_slice(0xefc, 2), &[0x02, 0x02]);
    }

    #[test]
    fn test_byte_access_wraps() {
        let mut m = Chip8MemoryMap::new();
        m.set_byte(0x1300, 0xaa);
        assert_eq!(m.get_byte(0x300), 0xaa);
        m.set_word(0xfff, 0xbbcc);
        assert_eq!(m.get_byte(0xfff), 0xbb);
        assert_eq!(m.get_byte(0x000), 0xcc);
    }

    #[test]
    #[should_panic]
    fn test_write_too_much_panic() {
        let mut dst = Chip8MemoryMap::new();
        dst.write(&[0; 8], 4089);
    }

    #[test]
    fn test_program_load_ok() -> Result<(), Chip8Error> {
        let mut dst = Chip8MemoryMap::new();
        let mut prog: &[u8] = &[0x00, 0xe0]; // clear screen
        dst.load_program_from(&mut prog)?;
        assert_eq!(dst.get_ro_slice(0x200, 2), &[0x00, 0xe0]);
        Ok(())
    }

    #[test]
    fn test_program_fills_memory() {
        let mut dst = Chip8MemoryMap::new();
        let prog = vec![0x11; 0xe00];
        assert!(dst.load_program(&prog).is_ok());
        assert_eq!(dst.get_byte(0xfff), 0x11);
    }

    #[test]
    fn test_program_too_large() {
        let mut dst = Chip8MemoryMap::new();
        let prog = vec![0; 0xe01];
        match dst.load_program(&prog) {
            Err(Chip8Error::ProgramTooLarge { len, max }) => {
                assert_eq!(len, 0xe01);
                assert_eq!(max, 0xe00);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_display_region() {
        let mut m = Chip8MemoryMap::new();
        m.display_mut()[0] = 0x80;
        assert_eq!(m.display().len(), 256);
        assert_eq!(m.get_byte(DISPLAY_ADDR), 0x80);
    }
}
