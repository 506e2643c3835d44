use std::fmt;
use std::str::FromStr;

use crate::result::SkError;

/// Length of the hyphenated form; the only form accepted.
const CANONICAL_LEN: usize = 36;

/// 16-byte token identifying one specific driver or layer implementation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Uuid(uuid::Uuid);

impl Uuid {
    pub const NIL: Uuid = Uuid(uuid::Uuid::nil());

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    ///
    /// Braced, URN and simple forms are rejected, as is any trailing input.
    pub fn parse(text: &str) -> Result<Self, SkError> {
        if text.len() != CANONICAL_LEN {
            return Err(SkError::Invalid);
        }
        uuid::Uuid::try_parse(text)
            .map(Self)
            .map_err(|_| SkError::Invalid)
    }
}

impl FromStr for Uuid {
    type Err = SkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse(s)
    }
}

impl From<uuid::Uuid> for Uuid {
    fn from(value: uuid::Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({})", self.0.hyphenated())
    }
}
