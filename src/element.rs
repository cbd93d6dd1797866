//
// element.rs
// dicom-decompress
//
// In-memory data-element model: ordered data sets, nested sequence items and encapsulated pixel fragments.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::HashMap;

use dicom_core::{Tag, VR};

use crate::error::{DecompressError, Result};

/// Declared length of an element or item as found on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Length {
    Defined(u32),
    Undefined,
}

impl Length {
    pub const UNDEFINED_RAW: u32 = 0xFFFF_FFFF;

    pub fn from_raw(raw: u32) -> Self {
        if raw == Self::UNDEFINED_RAW {
            Length::Undefined
        } else {
            Length::Defined(raw)
        }
    }

    pub fn is_undefined(self) -> bool {
        self == Length::Undefined
    }
}

/// Encapsulated pixel data: the Basic Offset Table followed by the compressed fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelFragments {
    pub offset_table: Vec<u32>,
    pub fragments: Vec<Vec<u8>>,
}

impl PixelFragments {
    pub fn total_len(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }
}

/// One item of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub length: Length,
    pub data_set: DataSet,
}

/// The payload of a data element.
///
/// Primitive values are kept in little-endian byte order regardless of the source encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Sequence(Vec<Item>),
    Fragments(PixelFragments),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    pub tag: Tag,
    pub vr: VR,
    pub length: Length,
    pub value: Value,
}

impl DataElement {
    /// A defined-length element holding raw bytes.
    pub fn new_bytes(tag: Tag, vr: VR, bytes: Vec<u8>) -> Self {
        DataElement {
            tag,
            vr,
            length: Length::Defined(bytes.len() as u32),
            value: Value::Bytes(bytes),
        }
    }

    /// A defined-length string element, padded to even length with the VR's pad byte.
    pub fn new_str(tag: Tag, vr: VR, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(padding_byte(vr));
        }
        DataElement::new_bytes(tag, vr, bytes)
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Item]> {
        match &self.value {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn fragments(&self) -> Option<&PixelFragments> {
        match &self.value {
            Value::Fragments(fragments) => Some(fragments),
            _ => None,
        }
    }

    /// Text value with trailing NUL / space padding removed.
    pub fn to_str(&self) -> Option<String> {
        let bytes = self.bytes()?;
        let text = String::from_utf8_lossy(bytes);
        Some(text.trim_end_matches(|c| c == '\0' || c == ' ').to_string())
    }

    /// First value of a US element.
    pub fn to_u16(&self) -> Option<u16> {
        let bytes = self.bytes()?;
        match bytes {
            [a, b, ..] => Some(u16::from_le_bytes([*a, *b])),
            _ => None,
        }
    }

    /// First value of a UL element.
    pub fn to_u32(&self) -> Option<u32> {
        let bytes = self.bytes()?;
        match bytes {
            [a, b, c, d, ..] => Some(u32::from_le_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }

    /// First value of an IS element (or a binary integer, depending on VR).
    pub fn to_int(&self) -> Option<i64> {
        match self.vr {
            VR::US => self.to_u16().map(i64::from),
            VR::UL => self.to_u32().map(i64::from),
            VR::SS => self.to_u16().map(|v| i64::from(v as i16)),
            VR::SL => self.to_u32().map(|v| i64::from(v as i32)),
            _ => {
                let text = self.to_str()?;
                text.split('\\').next()?.trim().parse().ok()
            }
        }
    }
}

/// Byte used to pad odd-length values of the given VR.
pub fn padding_byte(vr: VR) -> u8 {
    match vr {
        VR::AE
        | VR::AS
        | VR::CS
        | VR::DA
        | VR::DS
        | VR::DT
        | VR::IS
        | VR::LO
        | VR::LT
        | VR::PN
        | VR::SH
        | VR::ST
        | VR::TM
        | VR::UC
        | VR::UR
        | VR::UT => b' ',
        _ => 0,
    }
}

/// An ordered collection of data elements, unique by tag.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    elements: Vec<DataElement>,
    index: HashMap<Tag, usize>,
}

impl PartialEq for DataSet {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

/// Outcome of appending an element to a data set.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Appended {
    InOrder,
    OutOfOrder,
}

impl DataSet {
    pub fn new() -> Self {
        DataSet::default()
    }

    /// Append an element at the end, keeping the read order.
    ///
    /// Fails on duplicate tags; reports whether the ascending-tag order still holds.
    pub fn push(&mut self, element: DataElement) -> Result<Appended> {
        if self.index.contains_key(&element.tag) {
            return Err(DecompressError::malformed(
                element.tag,
                "duplicate tag in data set",
            ));
        }
        let order = match self.elements.last() {
            Some(last) if last.tag > element.tag => Appended::OutOfOrder,
            _ => Appended::InOrder,
        };
        self.index.insert(element.tag, self.elements.len());
        self.elements.push(element);
        Ok(order)
    }

    pub fn get(&self, tag: Tag) -> Option<&DataElement> {
        self.index.get(&tag).map(|&i| &self.elements[i])
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.index.contains_key(&tag)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataElement> {
        self.elements.iter()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.elements.iter().map(|e| e.tag).collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Build a new data set by mapping every element; `None` drops it.
    ///
    /// The original is left untouched and the element order is kept.
    pub fn map_elements<F>(&self, mut f: F) -> Result<DataSet>
    where
        F: FnMut(&DataElement) -> Option<DataElement>,
    {
        let mut out = DataSet::new();
        for element in &self.elements {
            if let Some(mapped) = f(element) {
                out.push(mapped)?;
            }
        }
        Ok(out)
    }

    pub fn str_value(&self, tag: Tag) -> Option<String> {
        self.get(tag).and_then(DataElement::to_str)
    }

    pub fn u16_value(&self, tag: Tag) -> Option<u16> {
        self.get(tag).and_then(DataElement::to_u16)
    }

    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        self.get(tag).and_then(DataElement::to_int)
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a DataElement;
    type IntoIter = std::slice::Iter<'a, DataElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_read_order_and_flags_disorder() {
        let mut ds = DataSet::new();
        let a = DataElement::new_str(Tag(0x0010, 0x0010), VR::PN, "Doe^John");
        let b = DataElement::new_str(Tag(0x0008, 0x0060), VR::CS, "OT");
        assert_eq!(ds.push(a).unwrap(), Appended::InOrder);
        assert_eq!(ds.push(b).unwrap(), Appended::OutOfOrder);
        assert_eq!(ds.tags(), vec![Tag(0x0010, 0x0010), Tag(0x0008, 0x0060)]);
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let mut ds = DataSet::new();
        ds.push(DataElement::new_str(Tag(0x0008, 0x0060), VR::CS, "OT"))
            .unwrap();
        let err = ds
            .push(DataElement::new_str(Tag(0x0008, 0x0060), VR::CS, "MR"))
            .unwrap_err();
        assert_eq!(err.kind(), "MalformedElement");
    }

    #[test]
    fn string_values_are_padded_and_trimmed() {
        let elem = DataElement::new_str(Tag(0x0008, 0x0060), VR::CS, "CT ");
        assert_eq!(elem.bytes().unwrap().len(), 4);
        assert_eq!(elem.to_str().as_deref(), Some("CT"));

        let uid = DataElement::new_str(Tag(0x0002, 0x0010), VR::UI, "1.2.840.10008.1.2");
        assert_eq!(uid.bytes().unwrap().last(), Some(&0));
        assert_eq!(uid.to_str().as_deref(), Some("1.2.840.10008.1.2"));
    }

    #[test]
    fn numeric_accessors_follow_vr() {
        let rows = DataElement::new_bytes(Tag(0x0028, 0x0010), VR::US, vec![0x00, 0x02]);
        assert_eq!(rows.to_int(), Some(512));

        let frames = DataElement::new_str(Tag(0x0028, 0x0008), VR::IS, "12");
        assert_eq!(frames.to_int(), Some(12));

        let signed = DataElement::new_bytes(Tag(0x0028, 0x0106), VR::SS, vec![0xFF, 0xFF]);
        assert_eq!(signed.to_int(), Some(-1));
    }

    #[test]
    fn map_elements_builds_a_new_set() {
        let mut ds = DataSet::new();
        ds.push(DataElement::new_str(Tag(0x0008, 0x0060), VR::CS, "OT"))
            .unwrap();
        ds.push(DataElement::new_str(Tag(0x0010, 0x0010), VR::PN, "A^B"))
            .unwrap();

        let mapped = ds
            .map_elements(|e| (e.tag != Tag(0x0008, 0x0060)).then(|| e.clone()))
            .unwrap();
        assert_eq!(mapped.tags(), vec![Tag(0x0010, 0x0010)]);
        assert_eq!(ds.len(), 2);
    }
}
