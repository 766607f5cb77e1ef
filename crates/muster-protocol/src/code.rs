//! Room codes and their display-string codec.
//!
//! A room code is a 32-bit integer that maps reversibly onto the 4- or
//! 6-letter string players type into their client. Positive codes are
//! the legacy 4-letter form (the letters' bytes packed little-endian);
//! negative codes are the 6-letter form, which scrambles a fixed
//! alphabet and packs two letters into the low 10 bits and four more
//! into the next 20, with the sign bit marking the width.
//!
//! Both directions are total and mutually inverse for every code that
//! came from a well-formed string.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::CodeError;

/// Scrambled alphabet for 6-letter codes. Index order is the encoding;
/// the decoder inverts it by position lookup.
const V2_ALPHABET: &[u8; 26] = b"QWXRTYLPESDFGHUJKZOCVBINMA";

/// A room's code.
///
/// `GameCode::default()` is `0`, meaning "no code assigned yet"; the
/// factory assigns a real code when it reserves one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameCode(pub i32);

impl GameCode {
    /// Returns `true` once a real code has been assigned.
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    /// Parses a display string, normalizing case. Accepts both the
    /// 4-letter and 6-letter forms.
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        let upper = s.to_ascii_uppercase();
        let bytes = upper.as_bytes();

        for &b in bytes {
            if !b.is_ascii_uppercase() {
                return Err(CodeError::InvalidChar(b as char));
            }
        }

        match bytes.len() {
            4 => Ok(Self(i32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))),
            6 => {
                let letters: [u8; 6] = bytes.try_into().expect("length checked above");
                decode_v2(&letters).map(Self)
            }
            len => Err(CodeError::InvalidLength(len)),
        }
    }

    /// Draws a fresh 6-letter code.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut letters = [0u8; 6];
        for letter in &mut letters {
            *letter = V2_ALPHABET[rng.random_range(0..V2_ALPHABET.len())];
        }
        Self(decode_v2(&letters).expect("alphabet letters always form a valid code"))
    }
}

impl From<i32> for GameCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl FromStr for GameCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("------")
        } else if self.0 < 0 {
            f.write_str(&encode_v2(self.0))
        } else {
            match encode_v1(self.0) {
                Some(code) => f.write_str(&code),
                // Not a packed-letter code; show the raw integer.
                None => write!(f, "{}", self.0),
            }
        }
    }
}

/// 4-letter form: the code's little-endian bytes, when they are all
/// letters.
fn encode_v1(code: i32) -> Option<String> {
    let bytes = code.to_le_bytes();
    if bytes.iter().all(|b| b.is_ascii_uppercase()) {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

fn alphabet_index(letter: u8) -> Result<i32, CodeError> {
    V2_ALPHABET
        .iter()
        .position(|&c| c == letter)
        .map(|i| i as i32)
        .ok_or(CodeError::InvalidChar(letter as char))
}

fn decode_v2(letters: &[u8; 6]) -> Result<i32, CodeError> {
    let mut idx = [0i32; 6];
    for (slot, &letter) in idx.iter_mut().zip(letters) {
        *slot = alphabet_index(letter)?;
    }

    let one = (idx[0] + 26 * idx[1]) & 0x3ff;
    let two = idx[2] + 26 * (idx[3] + 26 * (idx[4] + 26 * idx[5]));

    Ok(one | ((two << 10) & 0x3fff_fc00) | i32::MIN)
}

fn encode_v2(code: i32) -> String {
    let a = code & 0x3ff;
    let b = (code >> 10) & 0xfffff;

    [
        V2_ALPHABET[(a % 26) as usize],
        V2_ALPHABET[((a / 26) % 26) as usize],
        V2_ALPHABET[(b % 26) as usize],
        V2_ALPHABET[((b / 26) % 26) as usize],
        V2_ALPHABET[((b / 676) % 26) as usize],
        V2_ALPHABET[((b / 17576) % 26) as usize],
    ]
    .iter()
    .map(|&c| c as char)
    .collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Known vectors
    // =====================================================================

    #[test]
    fn test_parse_four_letter_code_packs_bytes() {
        // 'A'=0x41 .. 'D'=0x44, little-endian → 0x44434241.
        assert_eq!(GameCode::parse("ABCD").unwrap(), GameCode(1145258561));
    }

    #[test]
    fn test_six_letter_all_q_is_min_int() {
        // 'Q' is index 0 everywhere, so only the sign bit survives.
        assert_eq!(GameCode::parse("QQQQQQ").unwrap(), GameCode(i32::MIN));
        assert_eq!(GameCode(i32::MIN).to_string(), "QQQQQQ");
    }

    #[test]
    fn test_four_letter_code_displays_back() {
        assert_eq!(GameCode(1145258561).to_string(), "ABCD");
    }

    // =====================================================================
    // Bijection
    // =====================================================================

    #[test]
    fn test_six_letter_codes_round_trip() {
        for code in ["MUSTER", "REDSUS", "QWXRTY", "AAAAAA", "ZZZZZZ"] {
            let parsed = GameCode::parse(code).unwrap();
            assert!(parsed.0 < 0, "six-letter codes carry the sign bit");
            assert_eq!(parsed.to_string(), code, "display must invert parse");
            assert_eq!(GameCode::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_four_letter_codes_round_trip() {
        for code in ["ABCD", "WXYZ", "GAME", "ROOM"] {
            let parsed = GameCode::parse(code).unwrap();
            assert!(parsed.0 > 0);
            assert_eq!(parsed.to_string(), code);
        }
    }

    #[test]
    fn test_parse_normalizes_case() {
        assert_eq!(
            GameCode::parse("muster").unwrap(),
            GameCode::parse("MUSTER").unwrap()
        );
    }

    #[test]
    fn test_random_codes_round_trip() {
        let mut rng = rand::rng();
        for _ in 0..32 {
            let code = GameCode::random(&mut rng);
            let display = code.to_string();
            assert_eq!(display.len(), 6);
            assert_eq!(GameCode::parse(&display).unwrap(), code);
        }
    }

    // =====================================================================
    // Rejection
    // =====================================================================

    #[test]
    fn test_parse_rejects_bad_lengths() {
        assert_eq!(GameCode::parse("ABCDE"), Err(CodeError::InvalidLength(5)));
        assert_eq!(GameCode::parse(""), Err(CodeError::InvalidLength(0)));
        assert_eq!(
            GameCode::parse("ABCDEFG"),
            Err(CodeError::InvalidLength(7))
        );
    }

    #[test]
    fn test_parse_rejects_non_letters() {
        assert_eq!(GameCode::parse("AB1D"), Err(CodeError::InvalidChar('1')));
        assert_eq!(GameCode::parse("MUST3R"), Err(CodeError::InvalidChar('3')));
    }

    // =====================================================================
    // Unassigned codes
    // =====================================================================

    #[test]
    fn test_default_code_is_unset() {
        let code = GameCode::default();
        assert!(!code.is_set());
        assert_eq!(code.to_string(), "------");
    }

    #[test]
    fn test_from_str_via_parse() {
        let code: GameCode = "MUSTER".parse().unwrap();
        assert!(code.is_set());
    }
}
