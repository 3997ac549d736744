#![no_main]

use libfuzzer_sys::fuzz_target;
use ssp_protocol::core::codec::{Inbound, SspCodec};
use ssp_protocol::core::packet::{unstuff, Frame};

fuzz_target!(|data: &[u8]| {
    // Arbitrary line bytes through the reassembler and the one-shot parser
    let mut codec = SspCodec::new(0);
    for &b in data {
        if let Some(Inbound::Frame(frame)) = codec.push(b) {
            let wire = frame.to_wire().expect("reassembled frame fits");
            assert_eq!(Frame::from_bytes(&unstuff(&wire)).ok(), Some(frame));
        }
    }
    let _ = Frame::from_bytes(data);
});
