//! Property-based tests using proptest
//!
//! These tests check the framing, encryption and parsing layers against
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use proptest::prelude::*;
use ssp_protocol::core::codec::{Inbound, SspCodec};
use ssp_protocol::core::envelope::{self, MAX_SEALED_PAYLOAD};
use ssp_protocol::core::packet::{stuff, unstuff, Frame, MAX_DATA_LEN, STX};
use ssp_protocol::protocol::codes::event as ev;
use ssp_protocol::protocol::command::ResponseStatus;
use ssp_protocol::protocol::events::parse_poll;
use ssp_protocol::protocol::keys::SessionKey;
use ssp_protocol::utils::crypto::Crypto;
use ssp_protocol::utils::prime::{generate_prime, pow_mod, MAX_RANDOM_INTEGER};
use tokio_util::codec::Decoder;

fn naive_pow_mod(base: u64, exponent: u64, modulus: u64) -> u64 {
    let m = u128::from(modulus);
    let mut acc = 1u128 % m;
    for _ in 0..exponent {
        acc = acc * u128::from(base) % m;
    }
    acc as u64
}

// Property: stuffing adds exactly one byte per STX after the first and is undone by unstuffing
proptest! {
    #[test]
    fn prop_stuffing_is_reversible(raw in prop::collection::vec(any::<u8>(), 0..300)) {
        let wire = stuff(&raw);
        let stx_after_first = raw.iter().skip(1).filter(|&&b| b == STX).count();

        prop_assert_eq!(wire.len(), raw.len() + stx_after_first);
        prop_assert_eq!(unstuff(&wire), raw);
    }
}

// Property: any data block up to 255 bytes survives the wire
proptest! {
    #[test]
    fn prop_frame_survives_wire(
        address in 0u8..0x80,
        seq in prop::sample::select(vec![0x00u8, 0x80]),
        data in prop::collection::vec(any::<u8>(), 0..=MAX_DATA_LEN),
    ) {
        let frame = Frame::new(address, seq, data);
        let wire = frame.to_wire().unwrap();

        prop_assert_eq!(wire[0], STX);
        prop_assert_eq!(wire[1..].iter().filter(|&&b| b == STX).count() % 2, 0);

        let decoded = Frame::from_bytes(&unstuff(&wire)).unwrap();
        prop_assert_eq!(decoded, frame);
    }
}

// Property: flipping any single bit after STX makes the frame unacceptable
proptest! {
    #[test]
    fn prop_single_bit_corruption_detected(
        data in prop::collection::vec(any::<u8>(), 1..64),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut raw = Frame::new(0, 0x80, data).to_bytes().unwrap();
        let i = 1 + index.index(raw.len() - 1);
        raw[i] ^= 1 << bit;

        prop_assert!(Frame::from_bytes(&raw).is_err());
    }
}

// Property: the codec finds a frame behind line noise, however the bytes are chunked
proptest! {
    #[test]
    fn prop_codec_reassembles_chunked_frame(
        noise in prop::collection::vec(any::<u8>().prop_filter("no STX", |b| *b != STX), 0..16),
        data in prop::collection::vec(any::<u8>(), 0..128),
        split in any::<prop::sample::Index>(),
    ) {
        let frame = Frame::new(0, 0x80, data);
        let mut bytes = noise;
        bytes.extend(frame.to_wire().unwrap());
        let at = split.index(bytes.len() + 1);

        let mut codec = SspCodec::new(0);
        let mut first = BytesMut::from(&bytes[..at]);
        let mut second = BytesMut::from(&bytes[at..]);

        let mut found = codec.decode(&mut first).unwrap();
        if found.is_none() {
            found = codec.decode(&mut second).unwrap();
        }
        prop_assert_eq!(found, Some(Inbound::Frame(frame)));
    }
}

// Property: square-and-multiply agrees with repeated multiplication
proptest! {
    #[test]
    fn prop_pow_mod_matches_naive(
        base in any::<u64>(),
        exponent in 0u64..200,
        modulus in 1u64..u64::MAX,
    ) {
        prop_assert_eq!(pow_mod(base, exponent, modulus), naive_pow_mod(base, exponent, modulus));
    }
}

// Property: generated primes are odd, in range and pass trial division
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_generated_prime_is_prime(_round in any::<u8>()) {
        let p = generate_prime();
        prop_assert!(p % 2 == 1);
        prop_assert!(p < MAX_RANDOM_INTEGER);

        let mut d = 3u64;
        while d * d <= p {
            prop_assert!(p % d != 0, "{} divisible by {}", p, d);
            d += 2;
        }
    }
}

// Property: AES-128-ECB decrypts what it encrypted, block by block
proptest! {
    #[test]
    fn prop_aes_block_round_trip(
        key in prop::array::uniform16(any::<u8>()),
        blocks in prop::collection::vec(prop::array::uniform16(any::<u8>()), 1..8),
    ) {
        let crypto = Crypto::new(&key);
        let plain: Vec<u8> = blocks.concat();
        let cipher = crypto.encrypt(&plain).unwrap();

        prop_assert_eq!(cipher.len(), plain.len());
        // ECB: equal plaintext blocks give equal ciphertext blocks
        prop_assert_eq!(crypto.encrypt(&plain[..16]).unwrap(), cipher[..16].to_vec());
        prop_assert_eq!(crypto.decrypt(&cipher).unwrap(), plain);
    }
}

// Property: a sealed envelope opens to the same counter and data under the same key
proptest! {
    #[test]
    fn prop_envelope_opens_with_same_key(
        variable in any::<u64>(),
        counter in any::<u32>(),
        data in prop::collection::vec(any::<u8>(), 0..=MAX_SEALED_PAYLOAD),
    ) {
        let cipher = SessionKey::new(variable).cipher();
        let sealed = envelope::seal(&cipher, counter, &data).unwrap();

        prop_assert!(sealed.len() <= MAX_DATA_LEN);
        prop_assert_eq!((sealed.len() - 1) % 16, 0);

        let opened = envelope::open(&cipher, &sealed).unwrap();
        prop_assert_eq!(opened.counter, counter);
        prop_assert_eq!(opened.data, data);
    }
}

// Property: parsing never panics on arbitrary replies
proptest! {
    #[test]
    fn prop_parse_poll_total(data in prop::collection::vec(any::<u8>(), 0..200)) {
        let _ = parse_poll(&data);
        let _ = ResponseStatus::from_response(&data);
    }
}

// Property: a reply of known events followed by nothing parses to one event per code
proptest! {
    #[test]
    fn prop_simple_events_counted(codes in prop::collection::vec(
        prop::sample::select(vec![
            ev::SLAVE_RESET,
            ev::NOTE_REJECTING,
            ev::NOTE_REJECTED,
            ev::NOTE_STACKING,
            ev::NOTE_STACKED,
            ev::DISABLED,
            ev::STACKER_FULL,
            ev::CASHBOX_REMOVED,
            ev::CASHBOX_REPLACED,
            ev::NOTE_STORED_IN_PAYOUT,
            ev::EMPTYING,
            ev::EMPTIED,
        ]),
        0..32,
    )) {
        let mut data = vec![0xF0];
        data.extend(&codes);
        let events = parse_poll(&data).unwrap();
        prop_assert_eq!(events.len(), codes.len());
        for (event, code) in events.iter().zip(&codes) {
            prop_assert_eq!(event.code(), *code);
        }
    }
}
