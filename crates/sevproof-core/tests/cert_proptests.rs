#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the binary RSA certificate record codec.

use proptest::prelude::*;
use sevproof_core::{KeyUsage, RsaCertRecord, SevError};

/// Assemble a record from generated parts.
fn build_record(
    key_id: &[u8; 16],
    certifying_id: &[u8; 16],
    usage: u32,
    bits: u32,
    modulus: &[u8],
    signature: Option<&[u8]>,
) -> Vec<u8> {
    let field_len = (bits as usize) / 8;
    let mut buf = Vec::new();
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(key_id);
    buf.extend_from_slice(certifying_id);
    buf.extend_from_slice(&usage.to_le_bytes());
    buf.extend_from_slice(&[0u8; 0x10]);
    buf.extend_from_slice(&bits.to_le_bytes());
    buf.extend_from_slice(&bits.to_le_bytes());
    let mut pubexp = 0x0001_0001u32.to_le_bytes().to_vec();
    pubexp.resize(field_len, 0);
    buf.extend_from_slice(&pubexp);
    buf.extend_from_slice(modulus);
    if let Some(sig) = signature {
        buf.extend_from_slice(sig);
    }
    buf
}

fn record_strategy() -> impl Strategy<Value = (Vec<u8>, u32, bool)> {
    (
        proptest::array::uniform16(any::<u8>()),
        proptest::array::uniform16(any::<u8>()),
        prop_oneof![Just(0u32), Just(0x13u32)],
        prop_oneof![Just(2048u32), Just(4096u32)],
        any::<u8>(),
        any::<bool>(),
    )
        .prop_map(|(key_id, other_id, usage, bits, fill, signed)| {
            // A root record must be self-referencing.
            let certifying_id = if usage == 0 { key_id } else { other_id };
            let field_len = (bits as usize) / 8;
            let modulus = vec![fill | 0x01; field_len]; // odd modulus
            let signature = vec![fill.wrapping_add(1); field_len];
            let buf = build_record(
                &key_id,
                &certifying_id,
                usage,
                bits,
                &modulus,
                signed.then_some(signature.as_slice()),
            );
            (buf, bits, signed)
        })
}

proptest! {
    /// Parse → serialize reproduces the wire bytes exactly.
    #[test]
    fn roundtrip_reproduces_wire_bytes((buf, bits, signed) in record_strategy()) {
        let record = RsaCertRecord::parse(&buf).expect("generated record should parse");
        prop_assert_eq!(record.modulus_bits(), bits);
        prop_assert_eq!(record.signature().is_some(), signed);
        prop_assert_eq!(record.to_bytes(), buf.clone());

        let reparsed = RsaCertRecord::parse(&record.to_bytes())
            .expect("serialized record should reparse");
        prop_assert_eq!(reparsed, record);
    }

    /// The declared size always matches the consumed wire length.
    #[test]
    fn size_matches_wire_length((buf, _bits, _signed) in record_strategy()) {
        let record = RsaCertRecord::parse(&buf).expect("generated record should parse");
        prop_assert_eq!(record.size(), buf.len());
    }

    /// Trailing garbage after a complete record never changes the parse.
    #[test]
    fn trailing_bytes_do_not_leak_into_the_record(
        (buf, _bits, signed) in record_strategy(),
        garbage in proptest::collection::vec(any::<u8>(), 512..1024),
    ) {
        // Only meaningful for signed records: unsigned ones absorb trailing
        // bytes as a signature once enough arrive.
        prop_assume!(signed);
        let record = RsaCertRecord::parse(&buf).expect("generated record should parse");

        let mut extended = buf.clone();
        extended.extend_from_slice(&garbage);
        let reparsed = RsaCertRecord::parse(&extended).expect("extended buffer should parse");
        prop_assert_eq!(reparsed, record);
    }

    /// Any declared bit length outside {2048, 4096} is rejected as an
    /// unsupported key size.
    #[test]
    fn unsupported_bit_lengths_are_rejected(bits in any::<u32>()) {
        prop_assume!(bits != 2048 && bits != 4096);
        let key_id = [0u8; 16];
        let mut buf = build_record(&key_id, &key_id, 0, 2048, &[0x01; 256], None);
        buf[0x38..0x3c].copy_from_slice(&bits.to_le_bytes());
        prop_assert!(matches!(
            RsaCertRecord::parse(&buf),
            Err(SevError::UnsupportedKeySize(b)) if b == bits
        ));
    }

    /// Usage values outside the two defined roles are rejected.
    #[test]
    fn unknown_usage_values_are_rejected(usage in any::<u32>()) {
        prop_assume!(usage != 0 && usage != 0x13);
        let key_id = [0u8; 16];
        let buf = build_record(&key_id, &key_id, usage, 2048, &[0x01; 256], None);
        prop_assert!(matches!(
            RsaCertRecord::parse(&buf),
            Err(SevError::MalformedCertificate(_))
        ));
    }
}

#[test]
fn usage_accessor_reflects_the_wire_role() {
    let key_id = [0x22u8; 16];
    let root = build_record(&key_id, &key_id, 0, 2048, &[0x01; 256], None);
    assert_eq!(
        RsaCertRecord::parse(&root).unwrap().usage(),
        KeyUsage::Root
    );
    let signing = build_record(&key_id, &[0x33u8; 16], 0x13, 2048, &[0x01; 256], None);
    assert_eq!(
        RsaCertRecord::parse(&signing).unwrap().usage(),
        KeyUsage::Signing
    );
}
