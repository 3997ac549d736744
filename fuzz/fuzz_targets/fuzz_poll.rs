#![no_main]

use libfuzzer_sys::fuzz_target;
use ssp_protocol::protocol::events::{parse_poll, PollEffects};

fuzz_target!(|data: &[u8]| {
    if let Ok(events) = parse_poll(data) {
        let _ = PollEffects::from_events(&events);
        for event in &events {
            let _ = event.to_string();
        }
    }
});
