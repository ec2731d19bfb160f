//! A simple binary pattern matching library
//!
//! Basic usage looks like this:
//! ```
//! # use binmatch::Pattern;
//! let pattern = Pattern::new("00 __ 00 ??").unwrap();
//! let data = vec![0x12, 0x13, 0x00, 0x14, 0x00, 0x42, 0x15];
//! let matches = pattern.find_matches(data); // Or Pattern::find_matches_with_index if you need the index
//! assert_eq!(matches, vec![0x42]);
//! ```
//!
//! A pattern is a string of hex byte pairs separated by optional spaces:
//!
//! - `4F` matches exactly the byte `0x4F` (case-insensitive)
//! - `??` matches any byte and reports it as a match
//! - `__` matches any byte without reporting it
//!
//! All needed functions can be found in [Pattern].
//!
//! # Usage with `#![no_std]`
//! Disable the default feature `std`:
//! `cargo add binmatch --no-default-features`
//!
//! [Pattern::new] is not available without `std`. Create patterns with
//! [Pattern::new_unchecked] instead, which panics on invalid input.

#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

/// Characters accepted in a pattern string (after upper-casing and removing spaces)
pub const ALLOWED_ALPHABET: [char; 18] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F',
    '?', // placeholder, the byte is reported
    '_', // ignored byte
];

/// Errors returned by [Pattern::new]
#[cfg(feature = "std")]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinmatchError {
    #[error("Invalid character passed to binmatch::Pattern::new [{0}]")]
    PatternParse(char),
    #[error("Patterns should always be an even number of characters long")]
    PatternLength,
    #[error("Pattern element [{0}{1}] mixes a wildcard with a hex digit")]
    MixedElement(char, char),
}

/// Parse failure shared by the checked and unchecked constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseError {
    Character(char),
    Length,
    Mixed(char, char),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Character(c) => write!(f, "invalid character in pattern: {}", c),
            ParseError::Length => write!(f, "pattern length must be even"),
            ParseError::Mixed(hi, lo) => write!(f, "invalid pattern element: {}{}", hi, lo),
        }
    }
}

#[cfg(feature = "std")]
impl From<ParseError> for BinmatchError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Character(c) => BinmatchError::PatternParse(c),
            ParseError::Length => BinmatchError::PatternLength,
            ParseError::Mixed(hi, lo) => BinmatchError::MixedElement(hi, lo),
        }
    }
}

/// A compiled binary pattern
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Pattern {
    data: Vec<PatternElement>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
enum PatternElement {
    Literal(u8),
    Placeholder,
    Ignore,
}

impl PatternElement {
    fn accepts(&self, byte: u8) -> bool {
        match self {
            PatternElement::Literal(expected) => *expected == byte,
            PatternElement::Placeholder | PatternElement::Ignore => true,
        }
    }
}

/// The length check runs on the UTF-8 length before the alphabet check, so
/// `"é0"` reports a length error rather than an invalid character.
fn parse(pattern: &str) -> Result<Vec<PatternElement>, ParseError> {
    let upper: String = pattern
        .chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_uppercase)
        .collect();

    if upper.len() % 2 != 0 {
        return Err(ParseError::Length);
    }
    let chars: Vec<char> = upper.chars().collect();
    if let Some(&invalid) = chars.iter().find(|c| !ALLOWED_ALPHABET.contains(c)) {
        return Err(ParseError::Character(invalid));
    }

    chars
        .chunks(2)
        .map(|pair| match (pair[0], pair[1]) {
            ('?', '?') => Ok(PatternElement::Placeholder),
            ('_', '_') => Ok(PatternElement::Ignore),
            (hi, lo) => match (hi.to_digit(16), lo.to_digit(16)) {
                (Some(hi), Some(lo)) => Ok(PatternElement::Literal((hi * 16 + lo) as u8)),
                _ => Err(ParseError::Mixed(hi, lo)),
            },
        })
        .collect()
}

impl Pattern {
    /// <div class="warning"> Only available using the <code>std</code> feature </div>
    ///
    /// Create a new `Pattern`
    ///
    /// # Returns an Error when:
    ///
    /// - The input contains characters not contained in [ALLOWED_ALPHABET]
    /// - The input's length (spaces excluded) is not divisible by 2
    /// - A byte pair mixes a wildcard with a hex digit, like `?A`
    ///
    /// # Example:
    /// ```
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new("00 __ 00 ??").unwrap();
    /// assert_eq!(pattern.len(), 4);
    /// ```
    #[cfg(feature = "std")]
    pub fn new(pattern: &str) -> Result<Pattern, BinmatchError> {
        Ok(Self {
            data: parse(pattern)?,
        })
    }

    /// Create a new `Pattern`
    ///
    /// # Panics when:
    /// - The input contains characters not contained in [ALLOWED_ALPHABET]
    /// - The input's length (spaces excluded) is not divisible by 2
    /// - A byte pair mixes a wildcard with a hex digit
    ///
    /// # Example:
    /// ```
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new_unchecked("00 __ 00 ??");
    /// ```
    ///
    /// ```should_panic
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new_unchecked("00 __ 0");
    /// ```
    pub fn new_unchecked(pattern: &str) -> Pattern {
        match parse(pattern) {
            Ok(data) => Self { data },
            Err(err) => panic!("{}", err),
        }
    }

    /// Finds all matches in the `haystack`
    ///
    /// Every window of the haystack that matches the pattern contributes
    /// one `(value, index)` pair per placeholder, where `index` is the
    /// position of the byte in the haystack.
    ///
    /// Use [Pattern::find_matches] if you don't need the index
    ///
    /// # Example:
    /// ```
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new("34 __ 00 ??").unwrap();
    /// let data = vec![0xFF, 0x12, 0x34, 0x12, 0x00, 0x42, 0x56, 0x78];
    /// let matches = pattern.find_matches_with_index(data);
    /// assert_eq!(matches, vec![(0x42, 5)]);
    /// ```
    pub fn find_matches_with_index(&self, haystack: impl AsRef<[u8]>) -> Vec<(u8, usize)> {
        let haystack = haystack.as_ref();
        if self.is_empty() {
            return Vec::new();
        }

        haystack
            .windows(self.len())
            .enumerate()
            .filter_map(|(offset, window)| self.match_chunk(window).map(|found| (offset, found)))
            .flat_map(|(offset, found)| {
                found
                    .into_iter()
                    .map(move |(value, index)| (value, index + offset))
            })
            .collect()
    }

    /// Convenience method for cases where the index is not needed
    ///
    /// # Example:
    /// ```
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new("00 __ 00 ??").unwrap();
    /// let data = vec![0xFF, 0x12, 0x34, 0x00, 0x32, 0x00, 0x42, 0x56, 0x78];
    /// let matches = pattern.find_matches(data);
    /// assert_eq!(matches, vec![0x42]);
    /// ```
    pub fn find_matches(&self, haystack: impl AsRef<[u8]>) -> Vec<u8> {
        self.find_matches_with_index(haystack)
            .into_iter()
            .map(|(value, _)| value)
            .collect()
    }

    /// Convenience method for when only the presence of a match matters
    ///
    /// # Example:
    /// ```
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new("00 __ 00 __").unwrap();
    /// let data = vec![0xFF, 0x12, 0x34, 0x00, 0x32, 0x00, 0x42, 0x56, 0x78];
    /// assert_eq!(pattern.has_match(data), true);
    /// ```
    pub fn has_match(&self, haystack: impl AsRef<[u8]>) -> bool {
        if self.is_empty() {
            return false;
        }
        haystack
            .as_ref()
            .windows(self.len())
            .any(|window| self.window_matches(window))
    }

    /// Matches a single chunk
    ///
    /// Called by [Pattern::find_matches]. You normally don't need to use this.
    ///
    /// `chunk.len()` **MUST** be equal to [Pattern::len].
    ///
    /// Returns `None` if the chunk doesn't match, otherwise the placeholder
    /// values with their index inside the chunk.
    ///
    /// # Examples:
    /// ```
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new("00 __ 00 ??").unwrap();
    /// let matches = pattern.match_chunk(&[0x00, 0x32, 0x00, 0x42]);
    /// assert_eq!(matches, Some(vec![(0x42, 3)]));
    /// ```
    ///
    /// ```should_panic
    /// # use binmatch::Pattern;
    /// let pattern = Pattern::new("00 __ 00 ??").unwrap();
    /// let matches = pattern.match_chunk(&[0x00, 0x32, 0x42, 0x00, 0x00]);
    /// unreachable!();
    /// ```
    pub fn match_chunk(&self, chunk: &[u8]) -> Option<Vec<(u8, usize)>> {
        assert_eq!(self.len(), chunk.len());
        if self.is_empty() || !self.window_matches(chunk) {
            return None;
        }

        Some(
            self.data
                .iter()
                .zip(chunk)
                .enumerate()
                .filter(|(_, (element, _))| **element == PatternElement::Placeholder)
                .map(|(index, (_, actual))| (*actual, index))
                .collect(),
        )
    }

    fn window_matches(&self, window: &[u8]) -> bool {
        self.data
            .iter()
            .zip(window)
            .all(|(element, actual)| element.accepts(*actual))
    }

    /// Number of bytes the pattern spans
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match element {
                PatternElement::Literal(byte) => write!(f, "{:02X}", byte)?,
                PatternElement::Placeholder => f.write_str("??")?,
                PatternElement::Ignore => f.write_str("__")?,
            }
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::str::FromStr for Pattern {
    type Err = BinmatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::new(s)
    }
}
