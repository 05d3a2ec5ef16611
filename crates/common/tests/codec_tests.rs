//! Wire profiles: round trips, malformed input and decode-time validation.

use bytes::Bytes;
use ethbal_common::{
    Address, BalError, BlockAccessListBuilder, H256, Profile,
    codec::{BalCodec, RlpCodec, SszCodec},
    constants::{MAX_CODE_SIZE, MAX_TXS},
    types::{AccountChanges, BlockAccessList, CodeChange, NonceChange, balance_from_u128},
};
use hex_literal::hex;

const TOKEN: Address = Address::repeat_byte(0x70);
const SENDER: Address = Address::repeat_byte(0x05);
const MINER: Address = Address::repeat_byte(0xfe);
const DEPLOYED: Address = Address::repeat_byte(0xff);

fn sample_bal() -> BlockAccessList {
    let mut builder = BlockAccessListBuilder::new();
    for tx in 0..4u16 {
        builder.add_storage_write(
            TOKEN,
            H256::from_low_u64_be(u64::from(tx % 2)),
            tx,
            H256::from_low_u64_be(1_000 + u64::from(tx)),
        );
        builder
            .add_balance_change(SENDER, tx, balance_from_u128(1_000_000 - u128::from(tx)).as_bytes())
            .unwrap();
        builder.add_nonce_change(SENDER, tx, u64::from(tx) + 1);
    }
    builder.add_storage_read(TOKEN, H256::from_low_u64_be(42));
    builder
        .add_balance_change(MINER, 3, balance_from_u128(u128::MAX).as_bytes())
        .unwrap();
    builder
        .add_code_change(TOKEN, 0, Bytes::from_static(&hex!("6080604052")))
        .unwrap();
    builder.build(false)
}

#[test]
fn round_trip_both_profiles() {
    let bal = sample_bal();
    for profile in Profile::ALL {
        let encoded = profile.encode(&bal);
        assert_eq!(profile.decode(&encoded).unwrap(), bal, "profile {profile}");
    }
}

#[test]
fn round_trip_preserves_non_canonical_order() {
    let bal = BlockAccessList::from_accounts(vec![
        AccountChanges::new(Address::repeat_byte(2))
            .with_nonce_changes(vec![NonceChange::new(3, 1), NonceChange::new(1, 2)]),
        AccountChanges::new(Address::repeat_byte(1)),
    ]);
    for profile in Profile::ALL {
        assert_eq!(profile.decode(&profile.encode(&bal)).unwrap(), bal);
    }
}

#[test]
fn codec_types_agree_with_profile() {
    let bal = sample_bal();
    assert_eq!(SszCodec::PROFILE, Profile::Ssz);
    assert_eq!(RlpCodec::PROFILE, Profile::Rlp);
    assert_eq!(SszCodec::encode(&bal), Profile::Ssz.encode(&bal));
    assert_eq!(RlpCodec::encode(&bal), Profile::Rlp.encode(&bal));
}

#[test]
fn profiles_produce_different_bytes() {
    let bal = sample_bal();
    assert_ne!(Profile::Ssz.encode(&bal), Profile::Rlp.encode(&bal));
}

/// The highest address carries a code change, so in account order the last
/// bytes of either encoding belong to a code blob.
fn bal_ending_in_code() -> BlockAccessList {
    let mut builder = BlockAccessListBuilder::new();
    builder.add_nonce_change(SENDER, 0, 1);
    builder.add_storage_write(TOKEN, H256::from_low_u64_be(1), 0, H256::from_low_u64_be(7));
    builder
        .add_balance_change(MINER, 0, balance_from_u128(21_000).as_bytes())
        .unwrap();
    builder
        .add_code_change(DEPLOYED, 0, Bytes::from_static(&hex!("6080604052")))
        .unwrap();
    builder.build(false)
}

#[test]
fn every_truncation_is_malformed() {
    let bal = bal_ending_in_code();
    assert_eq!(bal.accounts().last().unwrap().address, DEPLOYED);
    for profile in Profile::ALL {
        let encoded = profile.encode(&bal);
        for cut in 0..encoded.len() {
            assert!(
                matches!(
                    profile.decode(&encoded[..cut]),
                    Err(BalError::MalformedEncoding { .. })
                ),
                "profile {profile}, cut at {cut}"
            );
        }
    }
}

#[test]
fn trailing_byte_is_malformed() {
    for bal in [bal_ending_in_code(), sample_bal()] {
        for profile in Profile::ALL {
            let mut encoded = profile.encode(&bal);
            encoded.push(0x00);
            assert!(
                matches!(
                    profile.decode(&encoded),
                    Err(BalError::MalformedEncoding { .. })
                ),
                "profile {profile}"
            );
        }
    }
}

#[test]
fn empty_input_is_malformed() {
    for profile in Profile::ALL {
        assert!(matches!(
            profile.decode(&[]),
            Err(BalError::MalformedEncoding { offset: 0, .. })
        ));
    }
}

#[test]
fn ssz_rejects_bad_container_offset() {
    let mut encoded = Profile::Ssz.encode(&sample_bal());
    encoded[0..4].copy_from_slice(&8u32.to_le_bytes());
    assert!(matches!(
        Profile::Ssz.decode(&encoded),
        Err(BalError::MalformedEncoding { offset: 0, .. })
    ));
}

#[test]
fn rlp_rejects_string_at_top_level() {
    assert!(matches!(
        Profile::Rlp.decode(&hex!("83010203")),
        Err(BalError::MalformedEncoding { offset: 0, .. })
    ));
}

fn bal_with_code(len: usize) -> BlockAccessList {
    BlockAccessList::from_accounts(vec![
        AccountChanges::new(TOKEN)
            .with_code_changes(vec![CodeChange::new(2, Bytes::from(vec![0x5b; len]))]),
    ])
}

#[test]
fn decode_enforces_code_size() {
    for profile in Profile::ALL {
        let at_limit = bal_with_code(MAX_CODE_SIZE);
        assert_eq!(profile.decode(&profile.encode(&at_limit)).unwrap(), at_limit);

        let oversized = profile.encode(&bal_with_code(MAX_CODE_SIZE + 1));
        assert!(matches!(
            profile.decode(&oversized),
            Err(BalError::CodeTooLarge {
                tx_index: 2,
                actual: 24_577,
                ..
            })
        ));
    }
}

#[test]
fn both_profiles_enforce_list_limits() {
    let at_limit: Vec<NonceChange> = (0..MAX_TXS as u16).map(|i| NonceChange::new(i, 1)).collect();
    let mut over_limit = at_limit.clone();
    over_limit.push(NonceChange::new(MAX_TXS as u16, 1));

    for profile in Profile::ALL {
        let fits = BlockAccessList::from_accounts(vec![
            AccountChanges::new(SENDER).with_nonce_changes(at_limit.clone()),
        ]);
        assert_eq!(profile.decode(&profile.encode(&fits)).unwrap(), fits);

        let too_long = BlockAccessList::from_accounts(vec![
            AccountChanges::new(SENDER).with_nonce_changes(over_limit.clone()),
        ]);
        assert!(
            matches!(
                profile.decode(&profile.encode(&too_long)),
                Err(BalError::MalformedEncoding { .. })
            ),
            "profile {profile}"
        );
    }
}

#[test]
fn decode_rejects_duplicate_accounts() {
    let bal = BlockAccessList::from_accounts(vec![
        AccountChanges::new(TOKEN).with_nonce_changes(vec![NonceChange::new(0, 1)]),
        AccountChanges::new(TOKEN).with_nonce_changes(vec![NonceChange::new(1, 2)]),
    ]);
    for profile in Profile::ALL {
        assert!(matches!(
            profile.decode(&profile.encode(&bal)),
            Err(BalError::DuplicateKey { address }) if address == TOKEN
        ));
    }
}

#[test]
fn rlp_rejects_short_address() {
    // [[19-byte address, [], [], [], [], []]]
    let mut account = vec![0x93];
    account.extend_from_slice(&[0xaa; 19]);
    account.extend_from_slice(&hex!("c0c0c0c0c0"));
    let mut encoded = vec![0xc0 + account.len() as u8 + 1, 0xc0 + account.len() as u8];
    encoded.extend_from_slice(&account);
    assert!(matches!(
        Profile::Rlp.decode(&encoded),
        Err(BalError::MalformedEncoding { offset: 1, .. })
    ));
}
