//
// binary.rs
// dicom-decompress
//
// Endian-aware byte cursor and append-only writer used by the meta parser, data-set decoder and serializer.
//
// Thales Matheus Mendonça Santos - November 2025

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use dicom_core::{Tag, VR};

use crate::error::{DecompressError, Result};

/// Byte order of multi-byte primitives in a stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Endianness {
    Little,
    Big,
}

/// Whether value representations are written in the stream or looked up by tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VrMode {
    Explicit,
    Implicit,
}

/// The two runtime switches that govern how a data set is laid out in bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Encoding {
    pub vr_mode: VrMode,
    pub endianness: Endianness,
}

impl Encoding {
    pub const EXPLICIT_LE: Encoding = Encoding {
        vr_mode: VrMode::Explicit,
        endianness: Endianness::Little,
    };

    pub const IMPLICIT_LE: Encoding = Encoding {
        vr_mode: VrMode::Implicit,
        endianness: Endianness::Little,
    };

    pub const EXPLICIT_BE: Encoding = Encoding {
        vr_mode: VrMode::Explicit,
        endianness: Endianness::Big,
    };
}

/// Read cursor over an immutable buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    // absolute offset of `data[0]` in the original file, for error messages
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        ByteReader { data, pos: 0, base }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position relative to the start of the file the buffer was cut from.
    pub fn absolute_position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything that has not been consumed yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecompressError::TruncatedInput {
                offset: self.absolute_position(),
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u16(&mut self, endianness: Endianness) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn read_u32(&mut self, endianness: Endianness) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn read_tag(&mut self, endianness: Endianness) -> Result<Tag> {
        let group = self.read_u16(endianness)?;
        let element = self.read_u16(endianness)?;
        Ok(Tag(group, element))
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self, endianness: Endianness) -> Result<Tag> {
        self.clone().read_tag(endianness)
    }

    /// Read a two-letter VR code. `None` when the characters do not name a known VR.
    pub fn read_vr(&mut self) -> Result<(Option<VR>, [u8; 2])> {
        let bytes = self.read_bytes(2)?;
        let code = [bytes[0], bytes[1]];
        Ok((VR::from_binary(code), code))
    }
}

/// Handle to a 4-byte placeholder written by [`ByteWriter::reserve_u32`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LengthSlot(usize);

/// Append-only little- or big-endian writer with length back-patching.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u16(&mut self, value: u16, endianness: Endianness) {
        let mut bytes = [0; 2];
        match endianness {
            Endianness::Little => LittleEndian::write_u16(&mut bytes, value),
            Endianness::Big => BigEndian::write_u16(&mut bytes, value),
        }
        self.write_bytes(&bytes);
    }

    pub fn write_u32(&mut self, value: u32, endianness: Endianness) {
        let mut bytes = [0; 4];
        match endianness {
            Endianness::Little => LittleEndian::write_u32(&mut bytes, value),
            Endianness::Big => BigEndian::write_u32(&mut bytes, value),
        }
        self.write_bytes(&bytes);
    }

    pub fn write_tag(&mut self, tag: Tag, endianness: Endianness) {
        self.write_u16(tag.group(), endianness);
        self.write_u16(tag.element(), endianness);
    }

    pub fn write_vr(&mut self, vr: VR) {
        self.write_bytes(&vr.to_bytes());
    }

    /// Write a zeroed 32-bit length to be filled in once the value has been written.
    pub fn reserve_u32(&mut self) -> LengthSlot {
        let slot = LengthSlot(self.buf.len());
        self.write_bytes(&[0; 4]);
        slot
    }

    pub fn patch_u32(&mut self, slot: LengthSlot, value: u32, endianness: Endianness) {
        let target = &mut self.buf[slot.0..slot.0 + 4];
        match endianness {
            Endianness::Little => LittleEndian::write_u32(target, value),
            Endianness::Big => BigEndian::write_u32(target, value),
        }
    }

    /// Number of bytes written since `slot` was reserved, excluding the slot itself.
    pub fn bytes_since(&self, slot: LengthSlot) -> usize {
        self.buf.len() - slot.0 - 4
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_primitives_in_both_byte_orders() {
        let bytes = [0xE0, 0x12, 0x01, 0x22];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u16(Endianness::Big).unwrap(), 0xE012);
        assert_eq!(reader.read_u16(Endianness::Little).unwrap(), 0x2201);
        assert!(reader.is_empty());

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u32(Endianness::Little).unwrap(), 0x2201_12E0);
    }

    #[test]
    fn reads_tags_and_vr_codes() {
        let bytes = [0xE0, 0x7F, 0x10, 0x00, b'O', b'W', b'z', b'z'];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.peek_tag(Endianness::Little).unwrap(), Tag(0x7FE0, 0x0010));
        assert_eq!(reader.read_tag(Endianness::Little).unwrap(), Tag(0x7FE0, 0x0010));
        assert_eq!(reader.read_vr().unwrap().0, Some(VR::OW));
        let (vr, code) = reader.read_vr().unwrap();
        assert_eq!(vr, None);
        assert_eq!(&code, b"zz");
    }

    #[test]
    fn short_buffer_is_truncated_input() {
        let bytes = [0x01, 0x02, 0x03];
        let mut reader = ByteReader::with_base(&bytes, 100);
        reader.skip(2).unwrap();
        match reader.read_u16(Endianness::Little) {
            Err(DecompressError::TruncatedInput {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 102);
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn writer_back_patches_lengths() {
        let mut writer = ByteWriter::new();
        writer.write_tag(Tag(0x0008, 0x1140), Endianness::Little);
        let slot = writer.reserve_u32();
        writer.write_bytes(b"abcdef");
        let len = writer.bytes_since(slot) as u32;
        writer.patch_u32(slot, len, Endianness::Little);

        assert_eq!(
            writer.into_inner(),
            vec![0x08, 0x00, 0x40, 0x11, 6, 0, 0, 0, b'a', b'b', b'c', b'd', b'e', b'f']
        );
    }

    #[test]
    fn writer_honours_big_endian() {
        let mut writer = ByteWriter::new();
        writer.write_u16(0x0102, Endianness::Big);
        writer.write_u32(0x0304_0506, Endianness::Big);
        writer.write_vr(VR::UL);
        assert_eq!(writer.into_inner(), vec![1, 2, 3, 4, 5, 6, b'U', b'L']);
    }
}
