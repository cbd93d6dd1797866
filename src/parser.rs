//
// parser.rs
// dicom-decompress
//
// Data-set decoder: walks explicit/implicit, little/big endian streams into the element model,
// recursing into sequences and splitting encapsulated pixel data into fragments.
//
// Thales Matheus Mendonça Santos - November 2025

use std::io::Read;

use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use flate2::read::DeflateDecoder;

use crate::binary::{ByteReader, Encoding, Endianness, VrMode};
use crate::dictionary::{
    format_tag, has_long_length, implicit_vr, swap_words, ITEM, ITEM_DELIMITATION,
    SEQUENCE_DELIMITATION,
};
use crate::element::{Appended, DataElement, DataSet, Item, Length, PixelFragments, Value};
use crate::error::{DecompressError, Result};

/// Tag plus the shortest length field, in every encoding.
const MIN_HEADER_LEN: usize = 8;

/// Decode a whole data set from `bytes`.
pub fn parse_data_set(
    bytes: &[u8],
    encoding: Encoding,
    warnings: &mut Vec<String>,
) -> Result<DataSet> {
    parse_data_set_at(bytes, encoding, 0, warnings)
}

/// Like [`parse_data_set`], with `base` being the file offset of `bytes[0]` for error reporting.
pub fn parse_data_set_at(
    bytes: &[u8],
    encoding: Encoding,
    base: usize,
    warnings: &mut Vec<String>,
) -> Result<DataSet> {
    let mut reader = ByteReader::with_base(bytes, base);
    let mut data_set = DataSet::new();
    while !reader.is_empty() {
        if reader.rest().iter().all(|&b| b == 0) {
            warnings.push(format!(
                "ignored {} byte(s) of zero padding after the last element",
                reader.remaining()
            ));
            break;
        }
        // too short for any element header
        if reader.remaining() < MIN_HEADER_LEN {
            warnings.push(format!(
                "ignored {} trailing byte(s) after the last element",
                reader.remaining()
            ));
            break;
        }
        let element = read_element(&mut reader, encoding, warnings)?;
        append(&mut data_set, element, warnings)?;
    }
    Ok(data_set)
}

fn append(data_set: &mut DataSet, element: DataElement, warnings: &mut Vec<String>) -> Result<()> {
    let tag = element.tag;
    if data_set.push(element)? == Appended::OutOfOrder {
        warnings.push(format!(
            "element {} is out of ascending tag order; kept at its original position",
            format_tag(tag)
        ));
    }
    Ok(())
}

/// Read one data element (header and value) at the reader's position.
pub fn read_element(
    reader: &mut ByteReader<'_>,
    encoding: Encoding,
    warnings: &mut Vec<String>,
) -> Result<DataElement> {
    let endianness = encoding.endianness;
    let tag = reader.read_tag(endianness)?;
    if tag.group() == 0xFFFE {
        return Err(DecompressError::malformed(
            tag,
            "item or delimiter found outside of a sequence",
        ));
    }

    let (mut vr, raw_length) = read_vr_and_length(reader, tag, encoding)?;
    let length = Length::from_raw(raw_length);

    let value = match length {
        Length::Undefined if tag == tags::PIXEL_DATA => {
            Value::Fragments(read_fragments(reader, tag, endianness)?)
        }
        Length::Undefined if vr == VR::SQ => {
            Value::Sequence(read_undefined_sequence(reader, tag, encoding, warnings)?)
        }
        Length::Undefined if vr == VR::UN => {
            // UN with undefined length holds an implicit VR little endian sequence
            warnings.push(format!(
                "element {} (UN, undefined length) decoded as a sequence",
                format_tag(tag)
            ));
            vr = VR::SQ;
            Value::Sequence(read_undefined_sequence(
                reader,
                tag,
                Encoding::IMPLICIT_LE,
                warnings,
            )?)
        }
        Length::Undefined => {
            return Err(DecompressError::malformed(
                tag,
                format!("undefined length is not valid for VR {}", vr.to_string()),
            ));
        }
        Length::Defined(len) => {
            let base = reader.absolute_position();
            let bytes = reader.read_bytes(len as usize)?;
            if vr == VR::SQ {
                Value::Sequence(read_defined_sequence(bytes, base, tag, encoding, warnings)?)
            } else {
                let mut value = bytes.to_vec();
                if endianness == Endianness::Big {
                    swap_words(vr, &mut value);
                }
                Value::Bytes(value)
            }
        }
    };

    Ok(DataElement {
        tag,
        vr,
        length,
        value,
    })
}

fn read_vr_and_length(
    reader: &mut ByteReader<'_>,
    tag: Tag,
    encoding: Encoding,
) -> Result<(VR, u32)> {
    let endianness = encoding.endianness;
    match encoding.vr_mode {
        VrMode::Implicit => {
            let length = reader.read_u32(endianness)?;
            Ok((implicit_vr(tag), length))
        }
        VrMode::Explicit => {
            let (vr, code) = reader.read_vr()?;
            let vr = vr.ok_or_else(|| {
                DecompressError::malformed(
                    tag,
                    format!("unknown value representation {:?}", String::from_utf8_lossy(&code)),
                )
            })?;
            let length = if has_long_length(vr) {
                reader.skip(2)?;
                reader.read_u32(endianness)?
            } else {
                u32::from(reader.read_u16(endianness)?)
            };
            Ok((vr, length))
        }
    }
}

fn read_item_header(reader: &mut ByteReader<'_>, endianness: Endianness) -> Result<(Tag, Length)> {
    let tag = reader.read_tag(endianness)?;
    let length = reader.read_u32(endianness)?;
    Ok((tag, Length::from_raw(length)))
}

fn read_undefined_sequence(
    reader: &mut ByteReader<'_>,
    seq_tag: Tag,
    encoding: Encoding,
    warnings: &mut Vec<String>,
) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    loop {
        let (tag, length) = read_item_header(reader, encoding.endianness)?;
        match tag {
            ITEM => items.push(read_item(reader, seq_tag, length, encoding, warnings)?),
            SEQUENCE_DELIMITATION => {
                check_delimiter_length(seq_tag, length, warnings);
                return Ok(items);
            }
            other => {
                return Err(DecompressError::malformed(
                    seq_tag,
                    format!("expected an item in the sequence, found {}", format_tag(other)),
                ));
            }
        }
    }
}

fn read_defined_sequence(
    bytes: &[u8],
    base: usize,
    seq_tag: Tag,
    encoding: Encoding,
    warnings: &mut Vec<String>,
) -> Result<Vec<Item>> {
    let mut reader = ByteReader::with_base(bytes, base);
    let mut items = Vec::new();
    while !reader.is_empty() {
        let (tag, length) =
            read_item_header(&mut reader, encoding.endianness).map_err(|e| overrun(seq_tag, e))?;
        match tag {
            ITEM => items.push(
                read_item(&mut reader, seq_tag, length, encoding, warnings)
                    .map_err(|e| overrun(seq_tag, e))?,
            ),
            SEQUENCE_DELIMITATION => {
                warnings.push(format!(
                    "sequence {} has a defined length but ends with a delimiter",
                    format_tag(seq_tag)
                ));
                break;
            }
            other => {
                return Err(DecompressError::malformed(
                    seq_tag,
                    format!("expected an item in the sequence, found {}", format_tag(other)),
                ));
            }
        }
    }
    Ok(items)
}

fn read_item(
    reader: &mut ByteReader<'_>,
    seq_tag: Tag,
    length: Length,
    encoding: Encoding,
    warnings: &mut Vec<String>,
) -> Result<Item> {
    let data_set = match length {
        Length::Defined(len) => {
            let base = reader.absolute_position();
            let bytes = reader.read_bytes(len as usize)?;
            parse_data_set_at(bytes, encoding, base, warnings).map_err(|e| overrun(seq_tag, e))?
        }
        Length::Undefined => {
            let mut data_set = DataSet::new();
            loop {
                if reader.peek_tag(encoding.endianness)? == ITEM_DELIMITATION {
                    let (_, length) = read_item_header(reader, encoding.endianness)?;
                    check_delimiter_length(seq_tag, length, warnings);
                    break;
                }
                let element = read_element(reader, encoding, warnings)?;
                append(&mut data_set, element, warnings)?;
            }
            data_set
        }
    };
    Ok(Item { length, data_set })
}

fn check_delimiter_length(seq_tag: Tag, length: Length, warnings: &mut Vec<String>) {
    if length != Length::Defined(0) {
        warnings.push(format!(
            "delimiter in {} has a non-zero length",
            format_tag(seq_tag)
        ));
    }
}

/// Content of a defined-length container ran past its end.
fn overrun(seq_tag: Tag, err: DecompressError) -> DecompressError {
    match err {
        DecompressError::TruncatedInput { offset, .. } => DecompressError::malformed(
            seq_tag,
            format!("nested content overruns its declared length at offset {offset}"),
        ),
        other => other,
    }
}

fn read_fragments(
    reader: &mut ByteReader<'_>,
    tag: Tag,
    endianness: Endianness,
) -> Result<PixelFragments> {
    let (first, table_length) = read_item_header(reader, endianness)?;
    if first != ITEM {
        return Err(DecompressError::malformed(
            tag,
            "encapsulated pixel data must start with the Basic Offset Table item",
        ));
    }
    let table_length = match table_length {
        Length::Defined(len) if len % 4 == 0 => len as usize,
        _ => {
            return Err(DecompressError::malformed(
                tag,
                "Basic Offset Table length must be a multiple of 4",
            ));
        }
    };
    let offset_table = reader
        .read_bytes(table_length)?
        .chunks_exact(4)
        .map(|c| match endianness {
            Endianness::Little => u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            Endianness::Big => u32::from_be_bytes([c[0], c[1], c[2], c[3]]),
        })
        .collect();

    let mut fragments = Vec::new();
    loop {
        let (item, length) = read_item_header(reader, endianness)?;
        match (item, length) {
            (ITEM, Length::Defined(len)) => {
                fragments.push(reader.read_bytes(len as usize)?.to_vec());
            }
            (ITEM, Length::Undefined) => {
                return Err(DecompressError::malformed(
                    tag,
                    "pixel data fragments must have a defined length",
                ));
            }
            (SEQUENCE_DELIMITATION, _) => break,
            (other, _) => {
                return Err(DecompressError::malformed(
                    tag,
                    format!("unexpected {} among pixel data fragments", format_tag(other)),
                ));
            }
        }
    }

    Ok(PixelFragments {
        offset_table,
        fragments,
    })
}

/// Inflate the raw DEFLATE stream of a Deflated Explicit VR Little Endian data set.
pub fn inflate_data_set(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut inflated = Vec::with_capacity(bytes.len() * 4);
    DeflateDecoder::new(bytes)
        .read_to_end(&mut inflated)
        .map_err(|e| {
            DecompressError::malformed(None::<Tag>, format!("cannot inflate data set: {e}"))
        })?;
    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::ByteWriter;

    fn explicit_le(tag: Tag, vr: &[u8; 2], value: &[u8]) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_tag(tag, Endianness::Little);
        w.write_bytes(vr);
        w.write_u16(value.len() as u16, Endianness::Little);
        w.write_bytes(value);
        w.into_inner()
    }

    fn header(tag: Tag, vr: Option<&[u8; 2]>, len: u32, e: Endianness) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_tag(tag, e);
        match vr {
            Some(vr) => {
                w.write_bytes(vr);
                w.write_u16(0, e);
                w.write_u32(len, e);
            }
            None => w.write_u32(len, e),
        }
        w.into_inner()
    }

    #[test]
    fn explicit_little_endian_elements() {
        let mut bytes = explicit_le(Tag(0x0008, 0x0060), b"CS", b"OT");
        bytes.extend(explicit_le(Tag(0x0028, 0x0010), b"US", &[0x00, 0x02]));

        let mut warnings = Vec::new();
        let ds = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut warnings).unwrap();
        assert_eq!(ds.tags(), vec![Tag(0x0008, 0x0060), Tag(0x0028, 0x0010)]);
        assert_eq!(ds.str_value(Tag(0x0008, 0x0060)).as_deref(), Some("OT"));
        assert_eq!(ds.u16_value(Tag(0x0028, 0x0010)), Some(512));
        assert!(warnings.is_empty());
    }

    #[test]
    fn implicit_vr_uses_the_dictionary() {
        let mut bytes = header(Tag(0x0028, 0x0011), None, 2, Endianness::Little);
        bytes.extend([0x10, 0x00]);
        bytes.extend(header(Tag(0x0009, 0x1010), None, 2, Endianness::Little));
        bytes.extend([0xAB, 0xCD]);

        let ds = parse_data_set(&bytes, Encoding::IMPLICIT_LE, &mut Vec::new()).unwrap();
        let columns = ds.get(Tag(0x0028, 0x0011)).unwrap();
        assert_eq!(columns.vr, VR::US);
        assert_eq!(columns.to_u16(), Some(16));
        assert_eq!(ds.get(Tag(0x0009, 0x1010)).unwrap().vr, VR::UN);
    }

    #[test]
    fn big_endian_values_are_normalised() {
        let mut w = ByteWriter::new();
        w.write_tag(Tag(0x0028, 0x0010), Endianness::Big);
        w.write_vr(VR::US);
        w.write_u16(2, Endianness::Big);
        w.write_u16(0x0200, Endianness::Big);

        let ds = parse_data_set(&w.into_inner(), Encoding::EXPLICIT_BE, &mut Vec::new()).unwrap();
        let rows = ds.get(Tag(0x0028, 0x0010)).unwrap();
        assert_eq!(rows.bytes(), Some(&[0x00, 0x02][..]));
        assert_eq!(rows.to_u16(), Some(512));
    }

    #[test]
    fn nested_sequences_with_both_length_forms() {
        let e = Endianness::Little;
        let inner = explicit_le(Tag(0x0008, 0x1150), b"UI", b"1.2.3\0");

        // undefined-length sequence with one undefined-length item
        let mut bytes = header(Tag(0x0008, 0x1115), Some(b"SQ"), 0xFFFF_FFFF, e);
        bytes.extend(header(ITEM, None, 0xFFFF_FFFF, e));
        bytes.extend(&inner);
        bytes.extend(header(ITEM_DELIMITATION, None, 0, e));
        bytes.extend(header(SEQUENCE_DELIMITATION, None, 0, e));

        // defined-length sequence with one defined-length item
        let item_len = inner.len() as u32;
        bytes.extend(header(Tag(0x0008, 0x1140), Some(b"SQ"), item_len + 8, e));
        bytes.extend(header(ITEM, None, item_len, e));
        bytes.extend(&inner);

        let ds = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut Vec::new()).unwrap();
        let undefined = ds.get(Tag(0x0008, 0x1115)).unwrap();
        assert_eq!(undefined.length, Length::Undefined);
        let items = undefined.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].length, Length::Undefined);
        assert_eq!(
            items[0].data_set.str_value(Tag(0x0008, 0x1150)).as_deref(),
            Some("1.2.3")
        );

        let defined = ds.get(Tag(0x0008, 0x1140)).unwrap();
        assert_eq!(defined.items().unwrap()[0].length, Length::Defined(item_len));
    }

    #[test]
    fn encapsulated_pixel_data_is_split_into_fragments() {
        let e = Endianness::Little;
        let mut bytes = header(tags::PIXEL_DATA, Some(b"OB"), 0xFFFF_FFFF, e);
        bytes.extend(header(ITEM, None, 4, e));
        bytes.extend(0u32.to_le_bytes());
        bytes.extend(header(ITEM, None, 4, e));
        bytes.extend([0xFF, 0xD8, 0xFF, 0xD9]);
        bytes.extend(header(ITEM, None, 2, e));
        bytes.extend([1, 2]);
        bytes.extend(header(SEQUENCE_DELIMITATION, None, 0, e));

        let ds = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut Vec::new()).unwrap();
        let fragments = ds.get(tags::PIXEL_DATA).unwrap().fragments().unwrap();
        assert_eq!(fragments.offset_table, vec![0]);
        assert_eq!(fragments.fragments.len(), 2);
        assert_eq!(fragments.total_len(), 6);
    }

    #[test]
    fn undefined_length_on_a_plain_vr_is_malformed() {
        let bytes = header(Tag(0x0010, 0x4000), Some(b"LT"), 0xFFFF_FFFF, Endianness::Little);
        let err = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), "MalformedElement");
    }

    #[test]
    fn unknown_vr_is_malformed() {
        let bytes = explicit_le(Tag(0x0010, 0x0010), b"ZZ", b"AB");
        let err = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), "MalformedElement");
    }

    #[test]
    fn value_past_the_end_is_truncated_input() {
        let mut bytes = explicit_le(Tag(0x0010, 0x0010), b"PN", b"Doe^John");
        bytes.truncate(bytes.len() - 3);
        let err = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), "TruncatedInput");
    }

    #[test]
    fn item_overrunning_its_sequence_is_malformed() {
        let e = Endianness::Little;
        let inner = explicit_le(Tag(0x0008, 0x1150), b"UI", b"1.2.3\0");
        let mut bytes = header(Tag(0x0008, 0x1140), Some(b"SQ"), 8 + 4, e);
        bytes.extend(header(ITEM, None, inner.len() as u32, e));
        bytes.extend(&inner[..4]);
        bytes.extend(&inner[4..]);
        let err = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), "MalformedElement");
    }

    #[test]
    fn trailing_zero_padding_is_tolerated() {
        let mut bytes = explicit_le(Tag(0x0008, 0x0060), b"CS", b"OT");
        bytes.extend([0u8; 6]);
        let mut warnings = Vec::new();
        let ds = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut warnings).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn short_trailing_bytes_are_ignored_with_a_warning() {
        let mut bytes = explicit_le(Tag(0x0008, 0x0060), b"CS", b"OT");
        bytes.extend([0x20, 0x20]);
        let mut warnings = Vec::new();
        let ds = parse_data_set(&bytes, Encoding::EXPLICIT_LE, &mut warnings).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(warnings, vec!["ignored 2 trailing byte(s) after the last element"]);
    }

    #[test]
    fn inflates_raw_deflate_streams() {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let plain = explicit_le(Tag(0x0008, 0x0060), b"CS", b"OT");
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        let deflated = encoder.finish().unwrap();

        assert_eq!(inflate_data_set(&deflated).unwrap(), plain);
    }
}
