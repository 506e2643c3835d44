use crate::identity::Uuid;
use crate::version::Version;

/// Byte limit of names, terminator included.
pub const SK_MAX_NAME_SIZE: usize = 64;
/// Byte limit of descriptions, terminator included.
pub const SK_MAX_DESCRIPTION_SIZE: usize = 256;

/// Which entries an enumeration reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumerateFlags {
    #[default]
    All,
    /// Only entries loaded without being requested.
    ImplicitOnly,
}

impl EnumerateFlags {
    pub fn admits(self, implicit: bool) -> bool {
        match self {
            EnumerateFlags::All => true,
            EnumerateFlags::ImplicitOnly => implicit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriverProperties {
    pub identity: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub implementation_version: Version,
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayerProperties {
    pub identity: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub implementation_version: Version,
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceProperties {
    pub identity: Uuid,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointDirection {
    #[default]
    Playback,
    Capture,
    Duplex,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointProperties {
    pub identity: Uuid,
    pub name: String,
    pub direction: EndpointDirection,
    pub channels: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_only_filters() {
        assert!(EnumerateFlags::All.admits(false));
        assert!(EnumerateFlags::ImplicitOnly.admits(true));
        assert!(!EnumerateFlags::ImplicitOnly.admits(false));
    }
}
