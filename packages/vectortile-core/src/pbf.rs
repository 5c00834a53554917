// Zero-copy protobuf reader; offsets are absolute into the shared buffer

use std::ops::Range;

use crate::error::{DecodeError, DecodeResult};

/// Longest varint that still fits in 64 bits.
const MAX_VARINT_LEN: usize = 10;

/// Field numbers reserved by the protobuf implementation.
const RESERVED_FIELDS: Range<u64> = 19_000..20_000;

/// Protobuf wire types used by vector tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    Bytes,
    Fixed32,
    /// Groups (3, 4) and the unassigned codes 6, 7.
    Undefined(u8),
}

impl WireType {
    pub const VARINT: u8 = 0;
    pub const FIXED64: u8 = 1;
    pub const BYTES: u8 = 2;
    pub const FIXED32: u8 = 5;

    pub fn code(self) -> u8 {
        match self {
            WireType::Varint => Self::VARINT,
            WireType::Fixed64 => Self::FIXED64,
            WireType::Bytes => Self::BYTES,
            WireType::Fixed32 => Self::FIXED32,
            WireType::Undefined(code) => code,
        }
    }
}

impl From<u8> for WireType {
    fn from(code: u8) -> Self {
        match code {
            Self::VARINT => WireType::Varint,
            Self::FIXED64 => WireType::Fixed64,
            Self::BYTES => WireType::Bytes,
            Self::FIXED32 => WireType::Fixed32,
            other => WireType::Undefined(other),
        }
    }
}

/// Scalars that can appear in a packed repeated field.
///
/// Signed implementations zig-zag decode, which is how every signed packed
/// field in the vector tile format is encoded. 32-bit targets reject raw
/// values that do not fit instead of truncating them.
pub trait PackedScalar: Sized {
    fn from_varint(raw: u64, offset: usize) -> DecodeResult<Self>;
}

fn narrow(raw: u64, offset: usize) -> DecodeResult<u32> {
    u32::try_from(raw).map_err(|_| DecodeError::VarintOverflow {
        value: raw,
        bits: 32,
        offset,
    })
}

impl PackedScalar for u32 {
    fn from_varint(raw: u64, offset: usize) -> DecodeResult<Self> {
        narrow(raw, offset)
    }
}

impl PackedScalar for u64 {
    fn from_varint(raw: u64, _offset: usize) -> DecodeResult<Self> {
        Ok(raw)
    }
}

impl PackedScalar for i32 {
    fn from_varint(raw: u64, offset: usize) -> DecodeResult<Self> {
        narrow(raw, offset).map(decode_zigzag32)
    }
}

impl PackedScalar for i64 {
    fn from_varint(raw: u64, _offset: usize) -> DecodeResult<Self> {
        Ok(decode_zigzag64(raw))
    }
}

pub fn decode_zigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn decode_zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn encode_zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn encode_zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Append `value` to `out` as a base-128 varint.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Append a field key (field number + wire type) to `out`.
pub fn encode_key(field: u32, wire_type: WireType, out: &mut Vec<u8>) {
    encode_varint((u64::from(field) << 3) | u64::from(wire_type.code()), out);
}

/// Cursor over a protobuf message.
#[derive(Debug, Clone)]
pub struct PbfReader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    field: u32,
    wire_type: WireType,
}

impl<'a> PbfReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_range(data, 0..data.len())
    }

    /// Reader restricted to `range` of `data`; reported offsets stay absolute.
    pub fn with_range(data: &'a [u8], range: Range<usize>) -> Self {
        let end = range.end.min(data.len());
        Self {
            data,
            pos: range.start.min(end),
            end,
            field: 0,
            wire_type: WireType::Varint,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Field number of the current field.
    pub fn field(&self) -> u32 {
        self.field
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Advance to the next field key. Returns `false` at the end of the message.
    pub fn next_field(&mut self) -> DecodeResult<bool> {
        if self.pos >= self.end {
            return Ok(false);
        }
        let offset = self.pos;
        let key = self.varint()?;
        let field = key >> 3;
        if key > u64::from(u32::MAX) || field == 0 || RESERVED_FIELDS.contains(&field) {
            return Err(DecodeError::TagOutOfRange { tag: key, offset });
        }
        self.field = field as u32;
        self.wire_type = WireType::from((key & 0x7) as u8);
        Ok(true)
    }

    pub fn varint(&mut self) -> DecodeResult<u64> {
        let start = self.pos;
        let mut result = 0u64;
        for i in 0..MAX_VARINT_LEN {
            if self.pos >= self.end {
                return Err(DecodeError::BufferOverrun {
                    offset: start,
                    requested: i + 1,
                    len: self.end,
                });
            }
            let byte = self.data[self.pos];
            self.pos += 1;
            // The tenth byte only has room for bit 63.
            if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
                return Err(DecodeError::MalformedVarint { offset: start });
            }
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::MalformedVarint { offset: start })
    }

    pub fn varint32(&mut self) -> DecodeResult<u32> {
        let offset = self.pos;
        narrow(self.varint()?, offset)
    }

    /// Plain `int64`: two's complement, no zig-zag.
    pub fn int64(&mut self) -> DecodeResult<i64> {
        Ok(self.varint()? as i64)
    }

    pub fn sint64(&mut self) -> DecodeResult<i64> {
        Ok(decode_zigzag64(self.varint()?))
    }

    pub fn bool(&mut self) -> DecodeResult<bool> {
        Ok(self.varint()? != 0)
    }

    pub fn fixed32(&mut self) -> DecodeResult<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn fixed64(&mut self) -> DecodeResult<f64> {
        let bytes = self.take(8)?;
        Ok(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Absolute range of the current length-delimited field; moves past it.
    pub fn view_range(&mut self) -> DecodeResult<Range<usize>> {
        let offset = self.pos;
        let len = self.varint()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.remaining())
            .ok_or(DecodeError::BufferOverrun {
                offset,
                requested: usize::try_from(len).unwrap_or(usize::MAX),
                len: self.end,
            })?;
        let start = self.pos;
        self.pos += len;
        Ok(start..self.pos)
    }

    /// Zero-copy slice of the current length-delimited field.
    pub fn view(&mut self) -> DecodeResult<&'a [u8]> {
        let range = self.view_range()?;
        Ok(&self.data[range])
    }

    pub fn string(&mut self) -> DecodeResult<&'a str> {
        let offset = self.pos;
        let bytes = self.view()?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    /// Decode the current length-delimited field as back-to-back varints.
    pub fn packed_varints<T: PackedScalar>(&mut self) -> DecodeResult<Vec<T>> {
        let range = self.view_range()?;
        let mut inner = PbfReader::with_range(self.data, range);
        // Every varint is at least one byte, so this never over-allocates.
        let mut out = Vec::with_capacity(inner.remaining());
        while inner.remaining() > 0 {
            let offset = inner.position();
            out.push(T::from_varint(inner.varint()?, offset)?);
        }
        Ok(out)
    }

    /// Move past the current field's value without interpreting it.
    pub fn skip(&mut self) -> DecodeResult<usize> {
        match self.wire_type {
            WireType::Varint => {
                self.varint()?;
            }
            WireType::Bytes => {
                self.view_range()?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::Undefined(wire_type) => {
                return Err(DecodeError::UndefinedWireType {
                    wire_type,
                    offset: self.pos,
                });
            }
        }
        Ok(self.pos)
    }

    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(DecodeError::BufferOverrun {
                offset: self.pos,
                requested: len,
                len: self.end,
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(not(target_arch = "wasm32"))]
    use proptest::prelude::*;

    fn varint_bytes(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_varint(value, &mut out);
        out
    }

    #[test]
    fn varint_round_trips_boundary_values() {
        for value in [0, 1, 127, 128, 300, u64::from(u32::MAX), i64::MAX as u64] {
            let bytes = varint_bytes(value);
            let mut reader = PbfReader::new(&bytes);
            assert_eq!(reader.varint().unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn varint_uses_little_endian_groups() {
        assert_eq!(varint_bytes(300), vec![0xac, 0x02]);
        assert_eq!(varint_bytes(1), vec![0x01]);
    }

    #[test]
    fn zigzag_round_trips_boundary_values() {
        for value in [0, -1, 1, -64, 64, i32::MIN, i32::MAX] {
            assert_eq!(decode_zigzag32(encode_zigzag32(value)), value);
        }
        for value in [0, -1, 1, -64, 64, i64::MIN, i64::MAX] {
            assert_eq!(decode_zigzag64(encode_zigzag64(value)), value);
        }
        assert_eq!(encode_zigzag32(-1), 1);
        assert_eq!(encode_zigzag32(1), 2);
    }

    #[cfg(not(target_arch = "wasm32"))]
    proptest! {
        #[test]
        fn varint_round_trips(value in any::<u64>()) {
            let bytes = varint_bytes(value);
            prop_assert!(bytes.len() <= MAX_VARINT_LEN);
            prop_assert_eq!(PbfReader::new(&bytes).varint().unwrap(), value);
        }

        #[test]
        fn zigzag64_round_trips(value in any::<i64>()) {
            prop_assert_eq!(decode_zigzag64(encode_zigzag64(value)), value);
        }
    }

    #[test]
    fn unterminated_varint_is_malformed() {
        let bytes = [0xff; 11];
        let err = PbfReader::new(&bytes).varint().unwrap_err();
        assert_eq!(err, DecodeError::MalformedVarint { offset: 0 });
    }

    #[test]
    fn tenth_varint_byte_carries_one_bit() {
        assert_eq!(varint_bytes(u64::MAX).last(), Some(&0x01));

        let mut bytes = [0xff; 10];
        bytes[9] = 0x02;
        assert_eq!(
            PbfReader::new(&bytes).varint(),
            Err(DecodeError::MalformedVarint { offset: 0 })
        );
    }

    #[test]
    fn varint32_rejects_wide_values() {
        let bytes = varint_bytes((1 << 32) + 9);
        assert_eq!(
            PbfReader::new(&bytes).varint32(),
            Err(DecodeError::VarintOverflow {
                value: (1 << 32) + 9,
                bits: 32,
                offset: 0
            })
        );

        let bytes = varint_bytes(u64::from(u32::MAX));
        assert_eq!(PbfReader::new(&bytes).varint32(), Ok(u32::MAX));
    }

    #[test]
    fn truncated_varint_overruns() {
        let bytes = [0x80, 0x80];
        let err = PbfReader::new(&bytes).varint().unwrap_err();
        assert!(matches!(err, DecodeError::BufferOverrun { offset: 0, .. }));
    }

    #[test]
    fn next_field_splits_tag() {
        let mut bytes = Vec::new();
        encode_key(15, WireType::Varint, &mut bytes);
        encode_varint(2, &mut bytes);
        encode_key(1, WireType::Bytes, &mut bytes);
        encode_varint(3, &mut bytes);
        bytes.extend_from_slice(b"abc");

        let mut reader = PbfReader::new(&bytes);
        assert!(reader.next_field().unwrap());
        assert_eq!((reader.field(), reader.wire_type()), (15, WireType::Varint));
        assert_eq!(reader.varint().unwrap(), 2);
        assert!(reader.next_field().unwrap());
        assert_eq!((reader.field(), reader.wire_type()), (1, WireType::Bytes));
        assert_eq!(reader.string().unwrap(), "abc");
        assert!(!reader.next_field().unwrap());
    }

    #[test]
    fn zero_and_reserved_tags_are_rejected() {
        let zero = [0x00];
        assert!(matches!(
            PbfReader::new(&zero).next_field(),
            Err(DecodeError::TagOutOfRange { tag: 0, .. })
        ));

        let mut reserved = Vec::new();
        encode_key(19_500, WireType::Varint, &mut reserved);
        assert!(matches!(
            PbfReader::new(&reserved).next_field(),
            Err(DecodeError::TagOutOfRange { .. })
        ));
    }

    #[test]
    fn skip_moves_past_each_wire_type() {
        let mut bytes = Vec::new();
        encode_key(1, WireType::Varint, &mut bytes);
        encode_varint(300, &mut bytes);
        encode_key(2, WireType::Fixed32, &mut bytes);
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        encode_key(3, WireType::Fixed64, &mut bytes);
        bytes.extend_from_slice(&2.5f64.to_le_bytes());
        encode_key(4, WireType::Bytes, &mut bytes);
        encode_varint(2, &mut bytes);
        bytes.extend_from_slice(&[9, 9]);

        let mut reader = PbfReader::new(&bytes);
        let mut fields = Vec::new();
        while reader.next_field().unwrap() {
            fields.push(reader.field());
            reader.skip().unwrap();
        }
        assert_eq!(fields, vec![1, 2, 3, 4]);
        assert_eq!(reader.position(), bytes.len());
    }

    #[test]
    fn skip_rejects_group_wire_type() {
        let mut bytes = Vec::new();
        encode_key(1, WireType::Undefined(3), &mut bytes);
        let mut reader = PbfReader::new(&bytes);
        assert!(reader.next_field().unwrap());
        assert!(matches!(
            reader.skip(),
            Err(DecodeError::UndefinedWireType { wire_type: 3, .. })
        ));
    }

    #[test]
    fn fixed_width_values_are_little_endian_ieee() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        bytes.extend_from_slice(&1234.5678f64.to_le_bytes());
        let mut reader = PbfReader::new(&bytes);
        assert_eq!(reader.fixed32().unwrap(), -0.25);
        assert_eq!(reader.fixed64().unwrap(), 1234.5678);
        assert!(matches!(
            reader.fixed32(),
            Err(DecodeError::BufferOverrun { requested: 4, .. })
        ));
    }

    #[test]
    fn view_is_bounded_by_buffer() {
        let bytes = [0x05, 1, 2];
        assert!(matches!(
            PbfReader::new(&bytes).view(),
            Err(DecodeError::BufferOverrun { offset: 0, requested: 5, .. })
        ));
    }

    #[test]
    fn packed_varints_decode_unsigned_and_zigzag() {
        let mut payload = Vec::new();
        for v in [9u64, 300, 0] {
            encode_varint(v, &mut payload);
        }
        let mut bytes = Vec::new();
        encode_varint(payload.len() as u64, &mut bytes);
        bytes.extend_from_slice(&payload);

        let unsigned: Vec<u32> = PbfReader::new(&bytes).packed_varints().unwrap();
        assert_eq!(unsigned, vec![9, 300, 0]);

        let signed: Vec<i32> = PbfReader::new(&bytes).packed_varints().unwrap();
        assert_eq!(signed, vec![-5, 150, 0]);
    }

    #[test]
    fn packed_u32_rejects_wide_entries() {
        let mut payload = Vec::new();
        encode_varint(3, &mut payload);
        encode_varint(1 << 32, &mut payload);
        let mut bytes = Vec::new();
        encode_varint(payload.len() as u64, &mut bytes);
        bytes.extend_from_slice(&payload);

        let result: DecodeResult<Vec<u32>> = PbfReader::new(&bytes).packed_varints();
        assert_eq!(
            result,
            Err(DecodeError::VarintOverflow {
                value: 1 << 32,
                bits: 32,
                offset: 2
            })
        );

        let wide: Vec<u64> = PbfReader::new(&bytes).packed_varints().unwrap();
        assert_eq!(wide, vec![3, 1 << 32]);
    }

    #[test]
    fn ranged_reader_reports_absolute_offsets() {
        let bytes = [0xff, 0xff, 0x03, b'h', b'e', b'y'];
        let mut reader = PbfReader::with_range(&bytes, 2..6);
        assert_eq!(reader.view_range().unwrap(), 3..6);
        assert_eq!(reader.remaining(), 0);
    }
}
