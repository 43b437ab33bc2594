//! Audio bitrates in bits per second.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positive audio bitrate.
///
/// Parsed from ffmpeg-style strings such as `"192k"` or `"2M"` (integers
/// only). A bare integer is read as kilobits so that `-q 192` means the same
/// thing as `-q 192k`. Rendered back as `"<n>k"` whenever the value is a
/// whole number of kilobits.
///
/// ```
/// use audex_common::Bitrate;
///
/// let rate: Bitrate = "320k".parse().unwrap();
/// assert_eq!(rate, Bitrate::from_kbps(320));
/// assert_eq!(rate.to_string(), "320k");
/// assert_eq!(Bitrate::from_bps(96_500).to_string(), "96500");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bitrate(u64);

impl Bitrate {
    /// Construct from bits per second.
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    /// Construct from kilobits per second.
    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps * 1000)
    }

    /// Value in bits per second.
    pub const fn bits_per_sec(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}k", self.0 / 1000)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl std::str::FromStr for Bitrate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ParseError::InvalidBitrate(s.to_string());

        let (digits, multiplier) = match trimmed.char_indices().last() {
            Some((idx, 'k' | 'K')) => (&trimmed[..idx], 1_000),
            Some((idx, 'm' | 'M')) => (&trimmed[..idx], 1_000_000),
            Some(_) => (trimmed, 1_000),
            None => return Err(invalid()),
        };

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        if value == 0 {
            return Err(invalid());
        }

        value
            .checked_mul(multiplier)
            .map(Bitrate)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for Bitrate {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bitrate> for String {
    fn from(value: Bitrate) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!("192k".parse::<Bitrate>().unwrap().bits_per_sec(), 192_000);
        assert_eq!("64K".parse::<Bitrate>().unwrap().bits_per_sec(), 64_000);
        assert_eq!("1M".parse::<Bitrate>().unwrap().bits_per_sec(), 1_000_000);
    }

    #[test]
    fn test_bare_number_is_kilobits() {
        assert_eq!("128".parse::<Bitrate>().unwrap(), Bitrate::from_kbps(128));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "k", "0k", "abc", "-64k", "12.5k", "192kb"] {
            assert!(input.parse::<Bitrate>().is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Bitrate::from_kbps(256).to_string(), "256k");
        assert_eq!(Bitrate::from_bps(96_500).to_string(), "96500");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Bitrate::from_kbps(96)).unwrap();
        assert_eq!(json, r#""96k""#);
        let back: Bitrate = serde_json::from_str(r#""320k""#).unwrap();
        assert_eq!(back, Bitrate::from_kbps(320));
        assert!(serde_json::from_str::<Bitrate>(r#""loud""#).is_err());
    }
}
