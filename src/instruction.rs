use std::fmt;

/// a decoded two-byte instruction word, big-endian as stored in memory
///
/// `0xDXYN` splits into `op = 0xD`, `x = 0xX`, `y = 0xY`, `n = 0xN`; the low byte
/// is also kept whole as `b1` (the `NN` immediate) and the low twelve bits are
/// available via [`Instruction::addr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// full high byte
    pub b0: u8,
    /// high nibble of the high byte; the dispatch key
    pub op: u8,
    /// low nibble of the high byte; usually a register index
    pub x: u8,
    /// full low byte; the 8-bit immediate
    pub b1: u8,
    /// high nibble of the low byte; usually a register index
    pub y: u8,
    /// low nibble of the low byte
    pub n: u8,
}

impl Instruction {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Instruction {
            b0: bytes[0],
            op: bytes[0] >> 4,
            x: bytes[0] & 0x0f,
            b1: bytes[1],
            y: bytes[1] >> 4,
            n: bytes[1] & 0x0f,
        }
    }

    pub fn from_word(word: u16) -> Self {
        Self::from_bytes(word.to_be_bytes())
    }

    /// the raw instruction word
    pub fn word(&self) -> u16 {
        u16::from_be_bytes([self.b0, self.b1])
    }

    /// 12-bit address `NNN`
    pub fn addr(&self) -> u16 {
        ((self.x as u16) << 8) | self.b1 as u16
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}", self.b0, self.b1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fields() {
        let op = Instruction::from_bytes([0xd1, 0x25]);
        assert_eq!(op.b0, 0xd1);
        assert_eq!(op.op, 0xd);
        assert_eq!(op.x, 0x1);
        assert_eq!(op.b1, 0x25);
        assert_eq!(op.y, 0x2);
        assert_eq!(op.n, 0x5);
    }

    #[test]
    fn test_addr() {
        assert_eq!(Instruction::from_bytes([0x1a, 0xbc]).addr(), 0xabc);
        assert_eq!(Instruction::from_bytes([0x20, 0x00]).addr(), 0x000);
    }

    #[test]
    fn test_word() {
        let op = Instruction::from_word(0x8f1e);
        assert_eq!(op.word(), 0x8f1e);
        assert_eq!(op, Instruction::from_bytes([0x8f, 0x1e]));
    }

    #[test]
    fn test_display_is_hex_word() {
        assert_eq!(Instruction::from_bytes([0x00, 0xe0]).to_string(), "0x00e0");
        assert_eq!(Instruction::from_bytes([0xf3, 0x65]).to_string(), "0xf365");
    }
}
