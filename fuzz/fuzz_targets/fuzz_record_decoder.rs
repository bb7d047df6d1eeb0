#![no_main]
use libfuzzer_sys::fuzz_target;

use ftcal_core::FrameLayout;

// Raw serial lines and reference frames come straight off the wire.
fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data)
        && let Ok(rec) = ftcal_core::decode_raw_line(line)
    {
        assert_eq!(rec.raw.len(), 8);
    }
    let _ = FrameLayout::default().decode(data);
});
