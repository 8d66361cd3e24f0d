use linkframe_codec::redundancy::{crc, CRC10_POLY, CRC16_POLY, CRC32_POLY, CRC8_POLY};
use linkframe_codec::*;
use proptest::prelude::*;

fn bit_vec(max: usize) -> impl Strategy<Value = Bits> {
    proptest::collection::vec(any::<bool>(), 0..max).prop_map(Bits::from)
}

fn scheme() -> impl Strategy<Value = Scheme> {
    proptest::sample::select(Scheme::SUPPORTED.to_vec())
}

fn polynomial() -> impl Strategy<Value = Polynomial> {
    proptest::sample::select(vec![CRC8_POLY, CRC10_POLY, CRC16_POLY, CRC32_POLY])
}

fn model() -> impl Strategy<Value = ErrorModel> {
    prop_oneof![
        Just(ErrorModel::Single),
        Just(ErrorModel::TwoIsolated),
        Just(ErrorModel::odd()),
        Just(ErrorModel::burst()),
        proptest::collection::vec(0usize..400, 0..8).prop_map(ErrorModel::Custom),
    ]
}

fn with_code(data: &Bits, scheme: Scheme) -> Bits {
    let mut framed = data.clone();
    framed.extend_from_slice(&redundancy::generate(scheme, data).unwrap());
    framed
}

proptest! {
    #[test]
    fn bytes_roundtrip(data in any::<Vec<u8>>()) {
        prop_assert_eq!(bits_to_bytes(&bytes_to_bits(&data)), data);
    }

    #[test]
    fn hex_roundtrip(nibbles in proptest::collection::vec(0u64..16, 0..64)) {
        let mut bits = Bits::new();
        for n in &nibbles {
            bits.push_uint(*n, 4);
        }
        prop_assert_eq!(hex_to_bits(&bits_to_hex(&bits)).unwrap(), bits);
    }

    #[test]
    fn text_roundtrip(text in ".{0,40}") {
        prop_assert_eq!(bits_to_text(&text_to_bits(&text)), text);
    }

    #[test]
    fn code_soundness(data in bit_vec(400), scheme in scheme()) {
        let framed = with_code(&data, scheme);
        prop_assert_eq!(framed.len(), data.len() + scheme.redundancy_bits().unwrap());
        prop_assert!(redundancy::verify(scheme, &framed).unwrap());
    }

    #[test]
    fn crc_detects_single_bit_flips(
        data in bit_vec(400),
        poly in polynomial(),
        at in any::<proptest::sample::Index>(),
    ) {
        let mut framed = data.clone();
        framed.extend_from_slice(&crc::generate(&data, &poly));
        framed.flip(at.index(framed.len()));
        prop_assert!(!crc::verify(&framed, &poly));
    }

    #[test]
    fn crc_detects_short_bursts(
        data in bit_vec(400),
        poly in polynomial(),
        len_seed in any::<proptest::sample::Index>(),
        start_seed in any::<proptest::sample::Index>(),
    ) {
        let mut framed = data.clone();
        framed.extend_from_slice(&crc::generate(&data, &poly));

        let max = poly.degree().min(framed.len());
        let run = 1 + len_seed.index(max);
        let start = start_seed.index(framed.len() - run + 1);
        for i in start..start + run {
            framed.flip(i);
        }
        prop_assert!(!crc::verify(&framed, &poly));
    }

    #[test]
    fn segmentation_is_complete(
        payload in bit_vec(2000),
        scheme in scheme(),
        frame_size in 20usize..64,
    ) {
        let frames: Vec<Frame> = segment(
            &payload,
            Address::default(),
            Address::default(),
            scheme,
            frame_size,
        )
        .unwrap()
        .collect();

        prop_assert!(!frames.is_empty());
        let joined: Bits = frames.iter().flat_map(|f| f.data().iter().copied()).collect();
        prop_assert_eq!(&joined, &payload);

        let width = frame_size * 8;
        prop_assert!(frames.iter().all(|f| f.bit_len() == width));
        prop_assert!(frames.iter().all(|f| f.validate() == Validity::Valid));

        let last: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_last())
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(last, vec![frames.len() - 1]);
    }

    #[test]
    fn frames_parse_back(payload in bit_vec(600), scheme in scheme()) {
        let frames = segment(&payload, Address::default(), Address::default(), scheme, 40).unwrap();
        for frame in frames {
            let parsed = Frame::parse(frame.as_bits().clone()).unwrap();
            prop_assert_eq!(parsed.header(), frame.header());
            prop_assert_eq!(parsed.fields().pack().unwrap(), frame.into_bits());
        }
    }

    #[test]
    fn corruption_reports_exact_changes(
        data in proptest::collection::vec(any::<bool>(), 8..300),
        model in model(),
        seed in any::<u64>(),
    ) {
        let out = ErrorInjector::seeded(seed).inject(&data, &model).unwrap();
        let changed: Vec<usize> = data
            .iter()
            .zip(out.bits.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(out.bits.len(), data.len());
        prop_assert_eq!(changed, out.flipped);
    }

    #[test]
    fn reassembly_recovers_payload(payload in bit_vec(1500), scheme in scheme()) {
        let mut reassembler = Reassembler::default();
        let frames = segment(&payload, Address::default(), Address::default(), scheme, 32).unwrap();
        for frame in frames {
            reassembler.push(&frame);
        }
        prop_assert!(reassembler.is_complete());
        prop_assert_eq!(reassembler.payload(), &payload);
    }
}

#[test]
fn single_character_crc8_frame() {
    let sender: Address = "10.0.0.1:5000".parse().unwrap();
    let receiver: Address = "10.0.0.2:12345".parse().unwrap();
    let payload = text_to_bits("A");

    let frames: Vec<Frame> = segment(&payload, sender, receiver, Scheme::Crc8, 32)
        .unwrap()
        .collect();
    assert_eq!(frames.len(), 1);

    let frame = &frames[0];
    assert_eq!(frame.payload_len(), 8);
    assert!(frame.is_last());
    assert_eq!(frame.sender(), sender);
    assert_eq!(frame.receiver(), receiver);
    assert_eq!(validate(frame), Validity::Valid);

    let mut bits = frame.as_bits().clone();
    bits.flip(0);
    let (_, validity) = validator::validate_bits(bits).unwrap();
    assert_eq!(validity, Validity::Invalid);
}

#[test]
fn custom_corruption_of_byte() {
    let original: Bits = "11110000".parse().unwrap();
    let out = ErrorInjector::seeded(1)
        .inject(&original, &ErrorModel::Custom(vec![0, 7]))
        .unwrap();
    assert_eq!(out.bits.to_string(), "01110001");
    assert_eq!(out.flipped, vec![0, 7]);
}

#[test]
fn wire_string_roundtrip() {
    let payload = text_to_bits("over the wire");
    let frames = segment(
        &payload,
        Address::default(),
        Address::default(),
        Scheme::Crc32,
        24,
    )
    .unwrap();
    for frame in frames {
        let line = frame.to_string();
        assert!(line.chars().all(|c| c == '0' || c == '1'));
        let parsed: Frame = line.parse().unwrap();
        assert_eq!(parsed, frame);
    }
}
