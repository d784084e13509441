#![no_main]

use genozip_core::section::SectionHeader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The header parser must never panic on arbitrary bytes, only return
    // Err for anything that isn't a well-formed 28-byte header.
    let _ = SectionHeader::from_bytes(data, 0, None);
});
