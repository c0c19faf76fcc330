use mprom::block::{decode_block, encode_block, BLOCK_HEADER_SIZE};
use mprom::codec::{get_codec, CompType};
use mprom::segref::{join_address, split_address};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn comp_type() -> impl Strategy<Value = CompType> {
    prop_oneof![
        Just(CompType::None),
        Just(CompType::Lz),
        Just(CompType::Slide2),
        Just(CompType::Slide3),
        Just(CompType::Slide4),
        Just(CompType::Rle),
    ]
}

/// Mixes random bytes with long runs and repeated phrases so every codec
/// exercises both its literal and its back-reference paths.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..4096),
        (any::<u8>(), 0usize..3000).prop_map(|(b, n)| vec![b; n]),
        (prop::collection::vec(any::<u8>(), 1..40), 1usize..120).prop_map(|(p, n)| p.repeat(n)),
        prop::collection::vec(0u8..4, 0..4096),
    ]
}

proptest! {
    #[test]
    fn codec_round_trip(data in payload(), comp in comp_type()) {
        let codec = get_codec(comp);
        let decoded = codec.decode(&codec.encode(&data), data.len());
        prop_assert_eq!(decoded.data, data);
    }

    #[test]
    fn block_round_trip(data in payload(), comp in comp_type()) {
        let block = encode_block(&data, comp).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(block.len() % 2, 0);
        prop_assert!(block.len() >= BLOCK_HEADER_SIZE);

        let decoded = decode_block(&block).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded.comp_type, comp);
        prop_assert_eq!(decoded.block_len, block.len());
        prop_assert_eq!(decoded.data, data);
    }

    #[test]
    fn blocks_decode_from_a_longer_stream(data in payload(), tail in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut stream = encode_block(&data, CompType::Lz).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let len = stream.len();
        stream.extend_from_slice(&tail);
        let decoded = decode_block(&stream).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded.block_len, len);
        prop_assert_eq!(decoded.data, data);
    }

    #[test]
    fn address_split_rejoins(value in any::<u32>()) {
        let (hi, lo) = split_address(value);
        prop_assert_eq!(join_address(hi, lo), value);
    }
}

#[test]
fn boundary_lengths() {
    // One RLE run, one slide match and one LZ ring wrap at their limits.
    let cases: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0x5A],
        vec![0xAA; 127],
        vec![0xAA; 128],
        vec![0x11; 0x12],
        vec![0x11; 0x111 + 1],
        (0..=255u8).collect(),
        (0..2048u32).map(|i| (i % 251) as u8).collect(),
        vec![0; 1024 + 66],
    ];
    for data in &cases {
        for comp in [CompType::None, CompType::Lz, CompType::Slide3, CompType::Rle] {
            let block = encode_block(data, comp).unwrap();
            assert_eq!(&decode_block(&block).unwrap().data, data, "{comp:?} len {}", data.len());
        }
    }
}

#[test]
fn unknown_tag_is_rejected() {
    let mut block = encode_block(b"abc", CompType::None).unwrap();
    block[7] = 6;
    assert!(decode_block(&block).is_err());
}
