//! Camelot wheel keys and harmonic adjacency.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid Camelot key: {0:?}")]
    Invalid(String),
}

/// A key on the Camelot wheel: number 1-12, letter A (minor) or B (major).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    number: u8,
    letter: char,
}

// Index 0 = C, chromatic upwards
const CAMELOT_MINOR: [(u8, char); 12] = [
    (5, 'A'), (12, 'A'), (7, 'A'), (2, 'A'), (9, 'A'), (4, 'A'),
    (11, 'A'), (6, 'A'), (1, 'A'), (8, 'A'), (3, 'A'), (10, 'A'),
];
const CAMELOT_MAJOR: [(u8, char); 12] = [
    (8, 'B'), (3, 'B'), (10, 'B'), (5, 'B'), (12, 'B'), (7, 'B'),
    (2, 'B'), (9, 'B'), (4, 'B'), (11, 'B'), (6, 'B'), (1, 'B'),
];

impl CamelotKey {
    pub fn new(number: u8, letter: char) -> Option<Self> {
        let letter = letter.to_ascii_uppercase();
        if !(1..=12).contains(&number) || (letter != 'A' && letter != 'B') {
            return None;
        }
        Some(Self { number, letter })
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn is_minor(&self) -> bool {
        self.letter == 'A'
    }

    /// Wheel adjacency: same key, relative major/minor, or ±1 on the same ring
    /// (12 and 1 are adjacent).
    pub fn is_neighbor(&self, other: &CamelotKey) -> bool {
        if self == other {
            return true;
        }
        if self.number == other.number {
            return true;
        }
        if self.letter == other.letter {
            let diff = self.number.abs_diff(other.number);
            return diff == 1 || diff == 11;
        }
        false
    }
}

impl FromStr for CamelotKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let letter = trimmed
            .chars()
            .last()
            .ok_or_else(|| KeyError::Invalid(s.to_string()))?;
        let number: u8 = trimmed[..trimmed.len() - letter.len_utf8()]
            .parse()
            .map_err(|_| KeyError::Invalid(s.to_string()))?;
        CamelotKey::new(number, letter).ok_or_else(|| KeyError::Invalid(s.to_string()))
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter)
    }
}

/// Harmonic-neighbor test on raw key strings.
///
/// Identical strings are always neighbors. Anything that does not parse as a
/// Camelot key is never a neighbor of a different string.
pub fn is_harmonic_neighbor(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    match (a.parse::<CamelotKey>(), b.parse::<CamelotKey>()) {
        (Ok(ka), Ok(kb)) => ka.is_neighbor(&kb),
        _ => false,
    }
}

/// Map a 12-bin chromagram (index 0 = C) to a Camelot key.
///
/// The strongest bin is the root; the mode is minor when the minor third
/// outweighs the major third.
pub fn camelot_from_chroma(chroma: &[f64; 12]) -> CamelotKey {
    let mut root = 0;
    for (i, &v) in chroma.iter().enumerate() {
        if v > chroma[root] {
            root = i;
        }
    }
    let minor_third = chroma[(root + 3) % 12];
    let major_third = chroma[(root + 4) % 12];

    let (number, letter) = if minor_third > major_third {
        CAMELOT_MINOR[root]
    } else {
        CAMELOT_MAJOR[root]
    };
    CamelotKey { number, letter }
}
