#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate pe_verify;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = pe_verify::image::parse_image(data, &Default::default());
});
