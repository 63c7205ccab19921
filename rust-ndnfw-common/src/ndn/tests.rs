//! Unit tests for the NDN packet implementation

use super::*;

#[test]
fn name_creation() {
    let name = Name::from_uri("/test/data/1");

    assert_eq!(name.len(), 3);
    assert_eq!(name.components()[0].as_bytes().as_ref(), b"test");
    assert_eq!(name.components()[1].as_bytes().as_ref(), b"data");
    assert_eq!(name.components()[2].as_bytes().as_ref(), b"1");

    // double slashes and trailing slashes collapse
    assert_eq!(Name::from_uri("//test//data/1/"), name);

    assert_eq!(name.to_string(), "/test/data/1");
    assert_eq!(Name::new().to_string(), "/");
}

#[test]
fn name_compare_and_prefix() {
    let name1 = Name::from_uri("/a/b/c");
    let name2 = Name::from_uri("/a/b/c");
    let name3 = Name::from_uri("/a/b/d");
    let name4 = Name::from_uri("/a/b");

    assert_eq!(name1, name2);
    assert_ne!(name1, name3);
    assert_ne!(name1, name4);

    assert!(name4.is_prefix_of(&name1));
    assert!(name1.is_prefix_of(&name1));
    assert!(!name1.is_prefix_of(&name4));
    assert!(!name3.is_prefix_of(&name1));
    assert!(Name::new().is_prefix_of(&name1));

    assert_eq!(name1.prefix(2), name4);
}

#[test]
fn name_tlv_round_trip() {
    let mut name = Name::from_uri("/test");
    name.push(NameComponent::new(vec![0x00, 0xFF, 0x7F]));

    let decoded = Name::from_tlv(&name.to_tlv()).unwrap();
    assert_eq!(decoded, name);

    // non-printable component renders as hex
    assert_eq!(name.to_string(), "/test/0x00ff7f");
}

#[test]
fn interest_round_trip() {
    let name = Name::from_uri("/test/interest");
    let interest = Interest::new(name.clone())
        .with_can_be_prefix(true)
        .with_must_be_fresh(true)
        .with_nonce(42)
        .with_lifetime(4000)
        .with_hop_limit(16);

    let wire = interest.to_bytes();
    let parsed = Interest::decode(&wire).unwrap();

    assert_eq!(parsed.name, name);
    assert!(parsed.can_be_prefix);
    assert!(parsed.must_be_fresh);
    assert_eq!(parsed.nonce, 42);
    assert_eq!(parsed.lifetime_ms, 4000);
    assert_eq!(parsed.hop_limit, Some(16));
}

#[test]
fn interest_defaults_survive_decode() {
    let interest = Interest::new(Name::from_uri("/plain")).with_nonce(7);
    let parsed = Interest::decode(&interest.to_bytes()).unwrap();

    assert!(!parsed.can_be_prefix);
    assert!(!parsed.must_be_fresh);
    assert_eq!(parsed.hop_limit, None);
    assert_eq!(parsed.lifetime_ms, DEFAULT_INTEREST_LIFETIME_MS);
}

#[test]
fn interest_without_name_rejected() {
    // an Interest TLV whose body is just a nonce
    let mut inner = BytesMut::new();
    TlvElement::new(tlv::TLV_NONCE, vec![0u8, 0, 0, 1]).encode(&mut inner);
    let mut wire = BytesMut::new();
    TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(&mut wire);

    assert!(Interest::decode(&wire).is_err());
}

#[test]
fn data_round_trip() {
    let name = Name::from_uri("/test/data");
    let data = Data::new(name.clone(), &b"Hello, NDN!"[..]).with_freshness(10_000);

    let parsed = Data::decode(&data.to_bytes()).unwrap();
    assert_eq!(parsed.name, name);
    assert_eq!(parsed.content.as_ref(), b"Hello, NDN!");
    assert_eq!(parsed.freshness_ms, 10_000);
}

#[test]
fn nack_round_trip() {
    let interest = Interest::new(Name::from_uri("/nowhere")).with_nonce(99);
    let nack = Nack::new(interest, NackReason::NoRoute);

    let parsed = Nack::decode(&nack.to_bytes()).unwrap();
    assert_eq!(parsed.reason, NackReason::NoRoute);
    assert_eq!(parsed.interest.name, Name::from_uri("/nowhere"));
    assert_eq!(parsed.interest.nonce, 99);
}

#[test]
fn nack_reason_codes() {
    for reason in [NackReason::Congestion, NackReason::Duplicate, NackReason::NoRoute] {
        assert_eq!(NackReason::from_code(reason.code()), Some(reason));
    }
    assert_eq!(NackReason::from_code(0), None);
}
