#![no_main]

use genozip_core::datatype::Generic;
use genozip_core::{piz_from_bytes, PizOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10_000_000 {
        return;
    }
    // The container-reconstruction engine must either produce output or
    // return Err, never panic, on arbitrary (likely malformed) input.
    let _ = piz_from_bytes(data, &Generic, &PizOptions::default());
});
