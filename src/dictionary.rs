//
// dictionary.rs
// dicom-decompress
//
// VR lookups for implicit VR data sets and VR classification used by the decoder and serializer.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom_core::dictionary::{DataDictionary, DataDictionaryEntry};
use dicom_core::{Tag, VR};
use dicom_dictionary_std::{tags, StandardDataDictionary};

pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
pub const ITEM_DELIMITATION: Tag = Tag(0xFFFE, 0xE00D);
pub const SEQUENCE_DELIMITATION: Tag = Tag(0xFFFE, 0xE0DD);

/// VR of an element in an implicit VR data set, looked up by tag.
pub fn implicit_vr(tag: Tag) -> VR {
    if tag.element() == 0x0000 {
        // group length
        return VR::UL;
    }
    if tag == tags::PIXEL_DATA {
        return VR::OW;
    }
    StandardDataDictionary
        .by_tag(tag)
        .map(|entry| entry.vr().relaxed())
        .unwrap_or(VR::UN)
}

pub fn format_tag(tag: Tag) -> String {
    format!("({:04X},{:04X})", tag.group(), tag.element())
}

/// Keyword of a tag in the standard dictionary, if it has one.
pub fn tag_name(tag: Tag) -> Option<&'static str> {
    StandardDataDictionary.by_tag(tag).map(|e| e.alias)
}

/// Whether the VR uses the 2 reserved bytes + 32-bit length form in explicit VR.
pub fn has_long_length(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB
            | VR::OD
            | VR::OF
            | VR::OL
            | VR::OV
            | VR::OW
            | VR::SQ
            | VR::SV
            | VR::UC
            | VR::UN
            | VR::UR
            | VR::UT
            | VR::UV
    )
}

/// Size in bytes of the words that need swapping when changing byte order.
pub fn word_size(vr: VR) -> usize {
    match vr {
        VR::US | VR::SS | VR::OW | VR::AT => 2,
        VR::UL | VR::SL | VR::FL | VR::OF | VR::OL => 4,
        VR::FD | VR::OD | VR::SV | VR::UV | VR::OV => 8,
        _ => 1,
    }
}

/// Reverse each `word_size(vr)` chunk of a value in place.
pub fn swap_words(vr: VR, bytes: &mut [u8]) {
    let size = word_size(vr);
    if size > 1 {
        for word in bytes.chunks_exact_mut(size) {
            word.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_vr_comes_from_the_standard_dictionary() {
        assert_eq!(implicit_vr(tags::ROWS), VR::US);
        assert_eq!(implicit_vr(tags::PATIENT_NAME), VR::PN);
        assert_eq!(implicit_vr(tags::PIXEL_DATA), VR::OW);
        assert_eq!(implicit_vr(Tag(0x0009, 0x1001)), VR::UN);
        assert_eq!(implicit_vr(Tag(0x0008, 0x0000)), VR::UL);
    }

    #[test]
    fn long_length_vrs() {
        assert!(has_long_length(VR::OB));
        assert!(has_long_length(VR::SQ));
        assert!(has_long_length(VR::UT));
        assert!(!has_long_length(VR::US));
        assert!(!has_long_length(VR::UI));
    }

    #[test]
    fn swapping_follows_word_size() {
        let mut us = [0x01, 0x02, 0x03, 0x04];
        swap_words(VR::US, &mut us);
        assert_eq!(us, [0x02, 0x01, 0x04, 0x03]);

        let mut text = *b"ABCD";
        swap_words(VR::CS, &mut text);
        assert_eq!(&text, b"ABCD");

        let mut fd = [1, 2, 3, 4, 5, 6, 7, 8];
        swap_words(VR::FD, &mut fd);
        assert_eq!(fd, [8, 7, 6, 5, 4, 3, 2, 1]);
    }
}
