use core::fmt;

/// Operand size tag attached to mnemonics and registers.
///
/// The discriminant is the encoded size field of the instruction formats:
/// `2^exponent` bytes per operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter, strum::EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Size {
    /// 8-bit operands, written `h`.
    #[strum(serialize = "h")]
    Byte = 0,
    /// 16-bit operands, written `x`.
    #[strum(serialize = "x")]
    Word = 1,
    /// 32-bit operands, written `d`.
    #[strum(serialize = "d")]
    DoubleWord = 2,
    /// 64-bit operands, written `q`.
    #[strum(serialize = "q")]
    QuadWord = 3,
}

impl Size {
    /// The encoded size field: `log2` of the operand width in bytes.
    pub const fn exponent(self) -> u8 {
        self as u8
    }

    /// Operand width in bytes.
    pub const fn bytes(self) -> usize {
        1 << self.exponent()
    }

    /// The source-level tag character.
    pub const fn tag(self) -> char {
        match self {
            Size::Byte => 'h',
            Size::Word => 'x',
            Size::DoubleWord => 'd',
            Size::QuadWord => 'q',
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn tags_round_trip() {
        for size in Size::iter() {
            assert_eq!(Size::from_str(&size.to_string()).unwrap(), size);
        }
    }

    #[test]
    fn widths_follow_exponents() {
        for size in Size::iter() {
            assert_eq!(size.bytes(), 1usize << size.exponent());
        }
        assert_eq!(Size::Word.bytes(), 2);
        assert_eq!(Size::QuadWord.bytes(), 8);
    }
}
