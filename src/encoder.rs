//
// encoder.rs
// dicom-decompress
//
// Explicit VR Little Endian serializer and the re-encoding step that swaps in decoded pixel data.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::binary::{ByteWriter, Endianness};
use crate::codec::{DecodedImage, ImageShape};
use crate::dictionary::{
    format_tag, has_long_length, ITEM, ITEM_DELIMITATION, SEQUENCE_DELIMITATION,
};
use crate::element::{padding_byte, DataElement, DataSet, Item, Length, PixelFragments, Value};
use crate::error::{DecompressError, Result};
use crate::meta::FileMeta;
use crate::transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN;

const LE: Endianness = Endianness::Little;

/// Write every element of a data set in order.
pub fn write_data_set(
    writer: &mut ByteWriter,
    data_set: &DataSet,
    warnings: &mut Vec<String>,
) -> Result<()> {
    for element in data_set {
        write_element(writer, element, warnings)?;
    }
    Ok(())
}

/// Write one element as Explicit VR Little Endian.
///
/// Odd values get one pad byte; values too long for a 16-bit length field are written as UN.
pub fn write_element(
    writer: &mut ByteWriter,
    element: &DataElement,
    warnings: &mut Vec<String>,
) -> Result<()> {
    match &element.value {
        Value::Bytes(bytes) => write_primitive(writer, element.tag, element.vr, bytes, warnings),
        Value::Sequence(items) => {
            writer.write_tag(element.tag, LE);
            writer.write_vr(VR::SQ);
            writer.write_bytes(&[0, 0]);
            match element.length {
                Length::Undefined => {
                    writer.write_u32(Length::UNDEFINED_RAW, LE);
                    for item in items {
                        write_item(writer, item, warnings)?;
                    }
                    write_delimiter(writer, SEQUENCE_DELIMITATION);
                }
                Length::Defined(_) => {
                    let slot = writer.reserve_u32();
                    for item in items {
                        write_item(writer, item, warnings)?;
                    }
                    let length = checked_length(element.tag, writer.bytes_since(slot))?;
                    writer.patch_u32(slot, length, LE);
                }
            }
            Ok(())
        }
        Value::Fragments(pixel) => write_fragments(writer, element.tag, element.vr, pixel),
    }
}

fn write_primitive(
    writer: &mut ByteWriter,
    tag: Tag,
    vr: VR,
    bytes: &[u8],
    warnings: &mut Vec<String>,
) -> Result<()> {
    let padded = bytes.len() + bytes.len() % 2;
    let mut written_vr = vr;
    if !has_long_length(vr) && padded > usize::from(u16::MAX) {
        warnings.push(format!(
            "{} value of {padded} bytes does not fit a {vr} length field; written as UN",
            format_tag(tag)
        ));
        written_vr = VR::UN;
    }
    let length = checked_length(tag, padded)?;

    writer.write_tag(tag, LE);
    writer.write_vr(written_vr);
    if has_long_length(written_vr) {
        writer.write_bytes(&[0, 0]);
        writer.write_u32(length, LE);
    } else {
        writer.write_u16(length as u16, LE);
    }
    writer.write_bytes(bytes);
    if bytes.len() % 2 == 1 {
        writer.write_bytes(&[padding_byte(vr)]);
        warnings.push(format!(
            "{} had odd length {}; padded to {padded}",
            format_tag(tag),
            bytes.len()
        ));
    }
    Ok(())
}

fn write_item(writer: &mut ByteWriter, item: &Item, warnings: &mut Vec<String>) -> Result<()> {
    writer.write_tag(ITEM, LE);
    match item.length {
        Length::Undefined => {
            writer.write_u32(Length::UNDEFINED_RAW, LE);
            write_data_set(writer, &item.data_set, warnings)?;
            write_delimiter(writer, ITEM_DELIMITATION);
        }
        Length::Defined(_) => {
            let slot = writer.reserve_u32();
            write_data_set(writer, &item.data_set, warnings)?;
            let length = checked_length(ITEM, writer.bytes_since(slot))?;
            writer.patch_u32(slot, length, LE);
        }
    }
    Ok(())
}

fn write_fragments(writer: &mut ByteWriter, tag: Tag, vr: VR, pixel: &PixelFragments) -> Result<()> {
    writer.write_tag(tag, LE);
    writer.write_vr(vr);
    writer.write_bytes(&[0, 0]);
    writer.write_u32(Length::UNDEFINED_RAW, LE);

    writer.write_tag(ITEM, LE);
    writer.write_u32(checked_length(tag, pixel.offset_table.len() * 4)?, LE);
    for offset in &pixel.offset_table {
        writer.write_u32(*offset, LE);
    }
    for fragment in &pixel.fragments {
        let padded = fragment.len() + fragment.len() % 2;
        writer.write_tag(ITEM, LE);
        writer.write_u32(checked_length(tag, padded)?, LE);
        writer.write_bytes(fragment);
        if fragment.len() % 2 == 1 {
            writer.write_bytes(&[0]);
        }
    }
    write_delimiter(writer, SEQUENCE_DELIMITATION);
    Ok(())
}

fn write_delimiter(writer: &mut ByteWriter, tag: Tag) {
    writer.write_tag(tag, LE);
    writer.write_u32(0, LE);
}

fn checked_length(tag: Tag, length: usize) -> Result<u32> {
    u32::try_from(length)
        .ok()
        .filter(|&l| l != Length::UNDEFINED_RAW)
        .ok_or_else(|| {
            DecompressError::Reencode(format!(
                "{} value of {length} bytes exceeds the 32-bit length field",
                format_tag(tag)
            ))
        })
}

/// Serialize a complete Part 10 file: preamble, meta group and data set.
pub fn write_file(
    meta: &FileMeta,
    data_set: &DataSet,
    warnings: &mut Vec<String>,
) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::with_capacity(1024);
    meta.write(&mut writer, warnings)?;
    write_data_set(&mut writer, data_set, warnings)?;
    Ok(writer.into_inner())
}

/// Check a decoded image against the layout its data set declares.
pub fn validate_decoded(image: &DecodedImage, declared: &ImageShape) -> Result<()> {
    if image.rows != declared.rows
        || image.columns != declared.columns
        || image.samples_per_pixel != declared.samples_per_pixel
        || image.bits_allocated != declared.bits_allocated
    {
        return Err(DecompressError::Reencode(format!(
            "decoded image is {}x{}x{} at {} bits, data set declares {}x{}x{} at {} bits",
            image.columns,
            image.rows,
            image.samples_per_pixel,
            image.bits_allocated,
            declared.columns,
            declared.rows,
            declared.samples_per_pixel,
            declared.bits_allocated
        )));
    }
    if image.frames != declared.frames {
        return Err(DecompressError::Reencode(format!(
            "decoded {} frame(s), NumberOfFrames is {}",
            image.frames, declared.frames
        )));
    }
    let expected = declared.expected_len();
    // native sources may carry the even-length pad byte
    if image.data.len() != expected && image.data.len() != expected.saturating_add(expected % 2) {
        return Err(DecompressError::Reencode(format!(
            "decoded pixel buffer has {} bytes, expected {expected}",
            image.data.len()
        )));
    }
    Ok(())
}

/// A data set and meta rewritten for Explicit VR Little Endian.
#[derive(Debug, Clone)]
pub struct Reencoded {
    pub meta: FileMeta,
    pub data_set: DataSet,
}

/// Build the uncompressed counterpart of a data set.
///
/// The input is left untouched. Pixel data is replaced by `image` (when there is one), the
/// extended offset table is dropped, PlanarConfiguration and PhotometricInterpretation follow
/// the decoder output, group lengths are recomputed and the meta announces Explicit VR Little
/// Endian. Every other element keeps its value and position.
pub fn reencode(
    meta: &FileMeta,
    data_set: &DataSet,
    image: Option<&DecodedImage>,
    warnings: &mut Vec<String>,
) -> Result<Reencoded> {
    let pixel_element = image.map(native_pixel_element).transpose()?;
    let mut notes = Vec::new();

    let mapped = data_set.map_elements(|element| match element.tag {
        tags::EXTENDED_OFFSET_TABLE | tags::EXTENDED_OFFSET_TABLE_LENGTHS => {
            notes.push(format!(
                "dropped {} (only meaningful for encapsulated pixel data)",
                format_tag(element.tag)
            ));
            None
        }
        tags::PIXEL_DATA => match &pixel_element {
            Some(pixel) => Some(pixel.clone()),
            None => Some(element.clone()),
        },
        tags::PLANAR_CONFIGURATION => match image {
            Some(image) if element.to_u16() != Some(image.planar_configuration) => {
                notes.push(format!(
                    "PlanarConfiguration changed to {} to match the decoded pixel layout",
                    image.planar_configuration
                ));
                Some(DataElement::new_bytes(
                    element.tag,
                    VR::US,
                    image.planar_configuration.to_le_bytes().to_vec(),
                ))
            }
            _ => Some(element.clone()),
        },
        tags::PHOTOMETRIC_INTERPRETATION => {
            match image.and_then(|i| i.photometric_interpretation.as_deref()) {
                Some(pi) if element.to_str().as_deref() != Some(pi) => {
                    notes.push(format!(
                        "PhotometricInterpretation changed from {} to {pi} by the decoder",
                        element.to_str().unwrap_or_default()
                    ));
                    Some(DataElement::new_str(element.tag, VR::CS, pi))
                }
                _ => Some(element.clone()),
            }
        }
        _ => Some(element.clone()),
    })?;
    warnings.append(&mut notes);

    let data_set = with_group_lengths(&mapped)?;
    let meta = meta.with_transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)?;
    Ok(Reencoded { meta, data_set })
}

/// Native Pixel Data element: OW above 8 bits allocated, OB otherwise, even length.
fn native_pixel_element(image: &DecodedImage) -> Result<DataElement> {
    let vr = if image.bits_allocated > 8 { VR::OW } else { VR::OB };
    let mut bytes = image.data.clone();
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    checked_length(tags::PIXEL_DATA, bytes.len())?;
    Ok(DataElement::new_bytes(tags::PIXEL_DATA, vr, bytes))
}

/// Recompute any (gggg,0000) group length element of the top-level data set.
fn with_group_lengths(data_set: &DataSet) -> Result<DataSet> {
    let mut lengths = Vec::new();
    for element in data_set.iter().filter(|e| e.tag.element() == 0x0000) {
        let group = element.tag.group();
        let mut writer = ByteWriter::new();
        let mut scratch = Vec::new();
        for member in data_set
            .iter()
            .filter(|e| e.tag.group() == group && e.tag.element() != 0x0000)
        {
            write_element(&mut writer, member, &mut scratch)?;
        }
        lengths.push((element.tag, checked_length(element.tag, writer.len())?));
    }
    if lengths.is_empty() {
        return Ok(data_set.clone());
    }

    data_set.map_elements(|element| {
        match lengths.iter().find(|(tag, _)| *tag == element.tag) {
            Some((tag, length)) => Some(DataElement::new_bytes(
                *tag,
                VR::UL,
                length.to_le_bytes().to_vec(),
            )),
            None => Some(element.clone()),
        }
    })
}
