#![no_main]

use libfuzzer_sys::fuzz_target;
use sk_loader::fuzz_parse_descriptor;

fuzz_target!(|data: &[u8]| {
    fuzz_parse_descriptor(data);
});
