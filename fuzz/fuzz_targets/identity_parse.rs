#![no_main]

use libfuzzer_sys::fuzz_target;
use sk_core::{Uuid, Version};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(identity) = Uuid::parse(text) {
        assert_eq!(Uuid::parse(&identity.to_string()), Ok(identity));
    }
    if let Ok(version) = Version::parse(text) {
        assert_eq!(Version::from_packed(version.to_packed()), version);
    }
});
