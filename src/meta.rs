//
// meta.rs
// dicom-decompress
//
// Parses and rebuilds the Part 10 header: 128-byte preamble, DICM magic and the group 0002 file meta elements.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::binary::{ByteReader, ByteWriter, Encoding, Endianness};
use crate::element::{DataElement, DataSet};
use crate::error::{DecompressError, Result};
use crate::parser;
use crate::transfer_syntax::trim_uid;

pub const PREAMBLE_LEN: usize = 128;
pub const MAGIC: &[u8; 4] = b"DICM";

/// File meta information: the preamble and the group 0002 elements.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    preamble: [u8; PREAMBLE_LEN],
    group: DataSet,
}

/// Result of reading the Part 10 header.
#[derive(Debug)]
pub struct ParsedMeta {
    pub meta: FileMeta,
    /// Offset of the first byte of the main data set.
    pub data_set_offset: usize,
    pub warnings: Vec<String>,
}

impl FileMeta {
    pub fn new(preamble: [u8; PREAMBLE_LEN], group: DataSet) -> Self {
        FileMeta { preamble, group }
    }

    pub fn preamble(&self) -> &[u8; PREAMBLE_LEN] {
        &self.preamble
    }

    pub fn elements(&self) -> &DataSet {
        &self.group
    }

    pub fn transfer_syntax(&self) -> Option<String> {
        self.uid(tags::TRANSFER_SYNTAX_UID)
    }

    pub fn media_storage_sop_class_uid(&self) -> Option<String> {
        self.uid(tags::MEDIA_STORAGE_SOP_CLASS_UID)
    }

    pub fn media_storage_sop_instance_uid(&self) -> Option<String> {
        self.uid(tags::MEDIA_STORAGE_SOP_INSTANCE_UID)
    }

    pub fn implementation_class_uid(&self) -> Option<String> {
        self.uid(tags::IMPLEMENTATION_CLASS_UID)
    }

    pub fn implementation_version_name(&self) -> Option<String> {
        self.group.str_value(tags::IMPLEMENTATION_VERSION_NAME)
    }

    fn uid(&self, tag: Tag) -> Option<String> {
        self.group
            .str_value(tag)
            .map(|s| trim_uid(&s).to_string())
    }

    /// A copy of this meta with the transfer syntax replaced and the group length recomputed.
    pub fn with_transfer_syntax(&self, uid: &str) -> Result<FileMeta> {
        let group = self.group.map_elements(|e| {
            if e.tag == tags::TRANSFER_SYNTAX_UID {
                Some(DataElement::new_str(e.tag, VR::UI, uid))
            } else {
                Some(e.clone())
            }
        })?;
        Ok(FileMeta {
            preamble: self.preamble,
            group: with_group_length(&group)?,
        })
    }

    /// Write preamble, magic and the meta group, always as Explicit VR Little Endian.
    pub fn write(&self, writer: &mut ByteWriter, warnings: &mut Vec<String>) -> Result<()> {
        writer.write_bytes(&self.preamble);
        writer.write_bytes(MAGIC);
        crate::encoder::write_data_set(writer, &self.group, warnings)
    }
}

/// Byte count of the meta elements following (0002,0000) once written.
fn group_length(group: &DataSet) -> Result<u32> {
    let mut writer = ByteWriter::new();
    let mut scratch = Vec::new();
    for element in group
        .iter()
        .filter(|e| e.tag != tags::FILE_META_INFORMATION_GROUP_LENGTH)
    {
        crate::encoder::write_element(&mut writer, element, &mut scratch)?;
    }
    Ok(writer.len() as u32)
}

/// Rebuild the group with an up to date (0002,0000) in first position.
fn with_group_length(group: &DataSet) -> Result<DataSet> {
    let length = group_length(group)?;
    let mut out = DataSet::new();
    out.push(DataElement::new_bytes(
        tags::FILE_META_INFORMATION_GROUP_LENGTH,
        VR::UL,
        length.to_le_bytes().to_vec(),
    ))?;
    for element in group
        .iter()
        .filter(|e| e.tag != tags::FILE_META_INFORMATION_GROUP_LENGTH)
    {
        out.push(element.clone())?;
    }
    Ok(out)
}

/// Parse the Part 10 header from the start of a file.
pub fn parse_meta(bytes: &[u8]) -> Result<ParsedMeta> {
    if bytes.len() < PREAMBLE_LEN + MAGIC.len() {
        return Err(DecompressError::NotADicomFile(format!(
            "file is only {} byte(s) long",
            bytes.len()
        )));
    }
    if &bytes[PREAMBLE_LEN..PREAMBLE_LEN + 4] != MAGIC {
        return Err(DecompressError::NotADicomFile(
            "missing DICM magic after the 128-byte preamble".to_string(),
        ));
    }

    let mut preamble = [0u8; PREAMBLE_LEN];
    preamble.copy_from_slice(&bytes[..PREAMBLE_LEN]);

    let start = PREAMBLE_LEN + MAGIC.len();
    let mut warnings = Vec::new();
    let mut reader = ByteReader::with_base(&bytes[start..], start);

    let declared = read_group_length(&reader)?;
    let group = match declared {
        Some(length) => {
            // (0002,0000) UL 4 plus the counted bytes
            let total = 12 + length as usize;
            let slice = reader.read_bytes(total)?;
            parser::parse_data_set_at(slice, Encoding::EXPLICIT_LE, start, &mut warnings)?
        }
        None => {
            warnings.push(
                "file meta group length (0002,0000) is missing; reading group 0002 by tag"
                    .to_string(),
            );
            let mut group = DataSet::new();
            while reader.remaining() >= 4 && reader.peek_tag(Endianness::Little)?.group() == 0x0002
            {
                let element =
                    parser::read_element(&mut reader, Encoding::EXPLICIT_LE, &mut warnings)?;
                group.push(element)?;
            }
            group
        }
    };

    if let Some(other) = group.iter().find(|e| e.tag.group() != 0x0002) {
        return Err(DecompressError::malformed(
            other.tag,
            "element outside group 0002 inside the file meta group",
        ));
    }
    if !group.contains(tags::TRANSFER_SYNTAX_UID) {
        return Err(DecompressError::MissingTransferSyntax);
    }

    Ok(ParsedMeta {
        meta: FileMeta { preamble, group },
        data_set_offset: start + reader.position(),
        warnings,
    })
}

fn read_group_length(reader: &ByteReader<'_>) -> Result<Option<u32>> {
    let mut peek = reader.clone();
    let tag = peek.read_tag(Endianness::Little)?;
    if tag != tags::FILE_META_INFORMATION_GROUP_LENGTH {
        return Ok(None);
    }
    let (vr, _) = peek.read_vr()?;
    if vr != Some(VR::UL) {
        return Err(DecompressError::malformed(
            tag,
            "file meta group length must be UL",
        ));
    }
    let length = peek.read_u16(Endianness::Little)?;
    if length != 4 {
        return Err(DecompressError::malformed(
            tag,
            "file meta group length value must be 4 bytes",
        ));
    }
    Ok(Some(peek.read_u32(Endianness::Little)?))
}

/// Build a fresh file meta group (used by tests and by callers writing new files).
pub fn build_meta(
    sop_class_uid: &str,
    sop_instance_uid: &str,
    transfer_syntax_uid: &str,
) -> Result<FileMeta> {
    let mut group = DataSet::new();
    group.push(DataElement::new_bytes(
        tags::FILE_META_INFORMATION_VERSION,
        VR::OB,
        vec![0x00, 0x01],
    ))?;
    group.push(DataElement::new_str(
        tags::MEDIA_STORAGE_SOP_CLASS_UID,
        VR::UI,
        sop_class_uid,
    ))?;
    group.push(DataElement::new_str(
        tags::MEDIA_STORAGE_SOP_INSTANCE_UID,
        VR::UI,
        sop_instance_uid,
    ))?;
    group.push(DataElement::new_str(
        tags::TRANSFER_SYNTAX_UID,
        VR::UI,
        transfer_syntax_uid,
    ))?;
    group.push(DataElement::new_str(
        tags::IMPLEMENTATION_CLASS_UID,
        VR::UI,
        IMPLEMENTATION_CLASS_UID,
    ))?;
    group.push(DataElement::new_str(
        tags::IMPLEMENTATION_VERSION_NAME,
        VR::SH,
        IMPLEMENTATION_VERSION_NAME,
    ))?;
    Ok(FileMeta {
        preamble: [0; PREAMBLE_LEN],
        group: with_group_length(&group)?,
    })
}

pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.10.1337.1";
pub const IMPLEMENTATION_VERSION_NAME: &str = "DCMDECOMP_100";
