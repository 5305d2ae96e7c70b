#[cfg(test)]
mod tests {
    use crate::codec::{
        self, CodecError, decode_data_record, decode_keyed_offset, encode_data_record,
        encode_keyed_offset,
    };

    #[test]
    fn test_u64_big_endian_layout() {
        let mut buf = Vec::new();
        codec::put_u64(&mut buf, 0x0102_0304_0506_0708);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);

        let mut pos = 0;
        assert_eq!(codec::read_u64(&buf, &mut pos).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(pos, 8);
    }

    #[test]
    fn test_sized_bytes_round_trip() {
        let mut buf = Vec::new();
        codec::put_sized_bytes(&mut buf, b"hello");
        codec::put_sized_bytes(&mut buf, b"");

        let mut pos = 0;
        assert_eq!(codec::read_sized_bytes(&buf, &mut pos).unwrap(), b"hello");
        assert_eq!(codec::read_sized_bytes(&buf, &mut pos).unwrap(), b"");
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_data_record_round_trip() {
        let encoded = encode_data_record("user:1", "alice");
        let mut pos = 0;
        let (key, value) = decode_data_record(&encoded, &mut pos).unwrap();
        assert_eq!(key, "user:1");
        assert_eq!(value, "alice");
        assert_eq!(pos, encoded.len());
    }

    #[test]
    fn test_keyed_offset_round_trip() {
        let encoded = encode_keyed_offset("user:1", 42);
        let mut pos = 0;
        let (key, block) = decode_keyed_offset(&encoded, &mut pos).unwrap();
        assert_eq!(key, "user:1");
        assert_eq!(block, 42);
    }

    #[test]
    fn test_truncated_buffer_is_an_error() {
        let mut buf = Vec::new();
        codec::put_sized_bytes(&mut buf, b"hello");
        buf.truncate(buf.len() - 2);

        let mut pos = 0;
        let err = codec::read_sized_bytes(&buf, &mut pos).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_length_bomb_rejected() {
        let mut buf = Vec::new();
        codec::put_u64(&mut buf, u64::MAX);
        let mut pos = 0;
        let err = codec::read_sized_bytes(&buf, &mut pos).unwrap_err();
        assert!(matches!(err, CodecError::LengthOverflow(_)));
    }

    #[test]
    fn test_little_endian_helpers() {
        let mut buf = Vec::new();
        codec::put_u32_le(&mut buf, 0xAABBCCDD);
        codec::put_u64_le(&mut buf, 7);
        assert_eq!(&buf[..4], [0xDD, 0xCC, 0xBB, 0xAA]);

        let mut pos = 0;
        assert_eq!(codec::read_u32_le(&buf, &mut pos).unwrap(), 0xAABBCCDD);
        assert_eq!(codec::read_u64_le(&buf, &mut pos).unwrap(), 7);
    }
}
