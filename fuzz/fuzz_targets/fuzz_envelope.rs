#![no_main]

use libfuzzer_sys::fuzz_target;
use ssp_protocol::core::envelope;
use ssp_protocol::protocol::keys::SessionKey;

fuzz_target!(|data: &[u8]| {
    // Garbage after STEX must fail cleanly, never panic
    let cipher = SessionKey::new(0x1122_3344).cipher();
    let _ = envelope::open(&cipher, data);
});
