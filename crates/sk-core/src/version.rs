use std::fmt;
use std::str::FromStr;

use crate::result::SkError;

/// Semantic `major.minor.patch` version of a driver or layer implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const MAX_MAJOR: u32 = (1 << 10) - 1;
    pub const MAX_MINOR: u32 = (1 << 10) - 1;
    pub const MAX_PATCH: u32 = (1 << 12) - 1;

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict `X.Y.Z` string, each component fitting its packed field.
    pub fn parse(text: &str) -> Result<Self, SkError> {
        let mut parts = text.split('.');
        let major = component(parts.next(), Self::MAX_MAJOR)?;
        let minor = component(parts.next(), Self::MAX_MINOR)?;
        let patch = component(parts.next(), Self::MAX_PATCH)?;
        if parts.next().is_some() {
            return Err(SkError::Invalid);
        }
        Ok(Self::new(major, minor, patch))
    }

    /// Packed `major << 22 | minor << 12 | patch` form used by the C ABI.
    pub fn to_packed(self) -> u32 {
        (self.major << 22) | (self.minor << 12) | self.patch
    }

    pub fn from_packed(packed: u32) -> Self {
        Self::new(packed >> 22, (packed >> 12) & Self::MAX_MINOR, packed & Self::MAX_PATCH)
    }
}

fn component(part: Option<&str>, max: u32) -> Result<u32, SkError> {
    let part = part.ok_or(SkError::Invalid)?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SkError::Invalid);
    }
    let value: u32 = part.parse().map_err(|_| SkError::Invalid)?;
    if value > max {
        return Err(SkError::Invalid);
    }
    Ok(value)
}

impl FromStr for Version {
    type Err = SkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
