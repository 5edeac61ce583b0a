/*******************************************************************************
*   (c) 2021 Zondax GmbH
*
*  Licensed under the Apache License, Version 2.0 (the "License");
*  you may not use this file except in compliance with the License.
*  You may obtain a copy of the License at
*
*      http://www.apache.org/licenses/LICENSE-2.0
*
*  Unless required by applicable law or agreed to in writing, software
*  distributed under the License is distributed on an "AS IS" BASIS,
*  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
*  See the License for the specific language governing permissions and
*  limitations under the License.
********************************************************************************/
//! Character framing for the ISO/IEC 7816-3 asynchronous half-duplex line
//!
//! A character on the line is 10 bit periods long: one start bit (always low),
//! 8 data bits and one parity bit. Which level means a logical 1 and the order
//! of the data bits depend on the [`Convention`] announced by the card in TS.

/// Number of bit periods in a character, start and parity bits included
pub const FRAME_BITS: usize = 10;

/// Number of bit periods sampled after the start bit
pub const SAMPLED_BITS: usize = FRAME_BITS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn is_low(self) -> bool {
        matches!(self, Self::Low)
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

impl std::ops::Not for Level {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// High is a logical 1, least significant bit first
    Direct,
    /// Low is a logical 1, most significant bit first
    Inverse,
}

impl Default for Convention {
    fn default() -> Self {
        Self::Direct
    }
}

impl Convention {
    /// TS announcing the direct convention
    pub const TS_DIRECT: u8 = 0x3B;

    /// TS announcing the inverse convention, as sent by the card
    pub const TS_INVERSE: u8 = 0x3F;

    /// What [`Self::TS_INVERSE`] looks like when sampled with the direct convention
    pub const TS_INVERSE_AS_DIRECT: u8 = 0x03;

    /// Detect the convention from a TS character read with the direct convention
    pub const fn from_ts(ts: u8) -> Option<Self> {
        match ts {
            Self::TS_DIRECT => Some(Self::Direct),
            Self::TS_INVERSE_AS_DIRECT => Some(Self::Inverse),
            _ => None,
        }
    }

    /// TS to send in order to announce this convention
    pub const fn ts(self) -> u8 {
        match self {
            Self::Direct => Self::TS_DIRECT,
            Self::Inverse => Self::TS_INVERSE,
        }
    }

    pub const fn is_inverse(self) -> bool {
        matches!(self, Self::Inverse)
    }

    /// Line level carrying the given logical bit
    pub const fn level(self, bit: bool) -> Level {
        match (self, bit) {
            (Self::Direct, true) | (Self::Inverse, false) => Level::High,
            _ => Level::Low,
        }
    }

    /// Logical bit carried by the given line level
    pub const fn bit(self, level: Level) -> bool {
        match self {
            Self::Direct => level.is_high(),
            Self::Inverse => level.is_low(),
        }
    }

    /// Mask of the `index`-th data bit on the line
    const fn mask(self, index: usize) -> u8 {
        match self {
            Self::Direct => 1 << index,
            Self::Inverse => 0x80 >> index,
        }
    }
}

/// Parity bit that makes the number of ones in data + parity even
pub const fn parity(byte: u8) -> bool {
    byte.count_ones() % 2 == 1
}

/// Levels to drive for each bit period of the character carrying `byte`
pub fn encode(byte: u8, convention: Convention) -> [Level; FRAME_BITS] {
    let mut frame = [Level::Low; FRAME_BITS];

    for (i, slot) in frame[1..9].iter_mut().enumerate() {
        *slot = convention.level(byte & convention.mask(i) != 0);
    }
    frame[9] = convention.level(parity(byte));

    frame
}

/// Rebuild a byte from the levels sampled after the start bit
///
/// Returns the byte and whether its parity bit was consistent
pub fn decode(bits: &[Level; SAMPLED_BITS], convention: Convention) -> (u8, bool) {
    let byte = bits[..8]
        .iter()
        .enumerate()
        .filter(|&(_, &level)| convention.bit(level))
        .fold(0u8, |acc, (i, _)| acc | convention.mask(i));

    let parity_ok = convention.bit(bits[8]) == parity(byte);

    (byte, parity_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(frame: [Level; FRAME_BITS]) -> [Level; SAMPLED_BITS] {
        let mut bits = [Level::High; SAMPLED_BITS];
        bits.copy_from_slice(&frame[1..]);
        bits
    }

    #[test]
    fn direct_is_lsb_first_high_one() {
        use Level::*;

        let frame = encode(0x3B, Convention::Direct);
        assert_eq!(
            frame,
            [Low, High, High, Low, High, High, High, Low, Low, High]
        );
    }

    #[test]
    fn inverse_is_msb_first_low_one() {
        use Level::*;

        let frame = encode(0x3F, Convention::Inverse);
        // 0011_1111, six ones so the parity bit is 0
        assert_eq!(frame, [Low, High, High, Low, Low, Low, Low, Low, Low, High]);
    }

    #[test]
    fn inverse_ts_reads_as_03_in_direct() {
        let frame = encode(Convention::TS_INVERSE, Convention::Inverse);
        let (byte, _) = decode(&sampled(frame), Convention::Direct);

        assert_eq!(byte, Convention::TS_INVERSE_AS_DIRECT);
        assert_eq!(Convention::from_ts(byte), Some(Convention::Inverse));
        assert_eq!(
            Convention::from_ts(Convention::TS_DIRECT),
            Some(Convention::Direct)
        );
        assert_eq!(Convention::from_ts(0x3F), None);
    }

    #[test]
    fn parity_is_even() {
        assert!(!parity(0x00));
        assert!(parity(0x01));
        assert!(parity(0xA4));
        assert!(!parity(0x3F));
    }

    #[test]
    fn decode_flags_parity_error() {
        for convention in [Convention::Direct, Convention::Inverse] {
            let mut frame = encode(0xA4, convention);
            frame[9] = !frame[9];

            let (byte, parity_ok) = decode(&sampled(frame), convention);
            assert_eq!(byte, 0xA4);
            assert!(!parity_ok);
        }
    }

    #[test]
    fn every_byte_survives_both_conventions() {
        for convention in [Convention::Direct, Convention::Inverse] {
            for byte in 0..=255u8 {
                let frame = encode(byte, convention);
                assert_eq!(frame[0], Level::Low, "start bit");
                assert_eq!(decode(&sampled(frame), convention), (byte, true));
            }
        }
    }
}
