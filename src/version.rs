//! Report version tokens

use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::Error;

/// Totally ordered report version, rendered as a two-digit token (`00`, `01`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(u32);

impl Version {
    pub const FIRST: Version = Version(0);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// The following version; the largest token has none
    pub fn next(&self) -> Result<Version, Error> {
        self.0
            .checked_add(1)
            .map(Version)
            .ok_or_else(|| Error::Version(format!("{} has no next version", self)))
    }

    pub fn is_first(&self) -> bool {
        *self == Self::FIRST
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Version(s.to_string()));
        }
        trimmed
            .parse::<u32>()
            .map(Version)
            .map_err(|_| Error::Version(s.to_string()))
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// The version right before `current` among `known`.
///
/// `known` is sorted newest first and the element after `current` is
/// returned; `None` when `current` is unknown or the oldest.
pub fn previous_version(current: Version, known: &[Version]) -> Option<Version> {
    let mut sorted = known.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));
    sorted.dedup();
    let position = sorted.iter().position(|v| *v == current)?;
    sorted.get(position + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_next() {
        assert_eq!(Version::FIRST.to_string(), "00");
        assert_eq!(Version::FIRST.next().unwrap().to_string(), "01");
        assert_eq!(Version::new(9).next().unwrap().to_string(), "10");
        assert!(Version::new(3) > Version::new(2));
        assert!(Version::FIRST.is_first());
        assert!(!Version::new(1).is_first());
    }

    #[test]
    fn test_largest_token_has_no_next() {
        let last = "4294967295".parse::<Version>().unwrap();
        assert!(matches!(last.next(), Err(Error::Version(_))));
    }

    #[test]
    fn test_parse() {
        assert_eq!("07".parse::<Version>().unwrap(), Version::new(7));
        assert_eq!(" 12 ".parse::<Version>().unwrap(), Version::new(12));
        assert!("".parse::<Version>().is_err());
        assert!("1a".parse::<Version>().is_err());
        assert!("-1".parse::<Version>().is_err());
    }

    #[test]
    fn test_previous_version() {
        let known = [Version::new(0), Version::new(2), Version::new(1), Version::new(4)];
        assert_eq!(previous_version(Version::new(4), &known), Some(Version::new(2)));
        assert_eq!(previous_version(Version::new(1), &known), Some(Version::new(0)));
        assert_eq!(previous_version(Version::new(0), &known), None);
        assert_eq!(previous_version(Version::new(3), &known), None);
    }
}
