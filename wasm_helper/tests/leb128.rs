use proptest::prelude::*;
use wasm_helper::{BinaryReader, BinaryWriter, ReadError, Serializer};

proptest! {
    #[test]
    fn unsigned_round_trip_consumes_exact_length(value in any::<u32>(), trailing in prop::collection::vec(any::<u8>(), 0..4)) {
        let encoded = value.to_bytes();
        let mut buffer = encoded.clone();
        buffer.extend(&trailing);

        let mut reader = BinaryReader::new(&buffer);
        prop_assert_eq!(reader.read_unsigned_leb128().unwrap(), value as u64);
        prop_assert_eq!(reader.offset(), encoded.len());
        prop_assert_eq!(reader.remaining(), trailing.len());
    }

    #[test]
    fn signed_round_trip(value in any::<i64>()) {
        let mut writer = BinaryWriter::new();
        writer.write_signed_leb128(value);
        let bytes = writer.into_bytes();

        let mut reader = BinaryReader::new(&bytes);
        prop_assert_eq!(reader.read_signed_leb128().unwrap(), value);
        prop_assert!(reader.is_empty());
    }
}

#[test]
fn truncated_value_reports_offset() {
    let mut reader = BinaryReader::new(&[0x01, 0xe5, 0x8e]);
    reader.skip(1).unwrap();
    assert_eq!(
        reader.read_unsigned_leb128(),
        Err(ReadError::UnexpectedEnd {
            offset: 3,
            needed: 1
        })
    );
    assert_eq!(reader.offset(), 1);
}
