//
// frames.rs
// dicom-decompress
//
// Splits encapsulated pixel data fragments into per-frame codestreams using the offset tables.
//
// Thales Matheus Mendonça Santos - November 2025

use std::borrow::Cow;

use dicom_dictionary_std::tags;

use crate::element::{DataSet, PixelFragments};
use crate::error::{DecompressError, Result};

/// Size of the item header (tag + length) preceding every fragment.
const ITEM_HEADER_LEN: u64 = 8;

/// Extended Offset Table (7FE0,0001) and its lengths (7FE0,0002).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedOffsets {
    pub offsets: Vec<u64>,
    pub lengths: Vec<u64>,
}

impl ExtendedOffsets {
    /// Read the extended offset table from a data set, if present.
    pub fn from_data_set(data_set: &DataSet) -> Result<Option<ExtendedOffsets>> {
        let Some(offsets) = data_set.get(tags::EXTENDED_OFFSET_TABLE) else {
            return Ok(None);
        };
        let offsets = read_u64s(offsets.bytes(), "ExtendedOffsetTable")?;
        let lengths = match data_set.get(tags::EXTENDED_OFFSET_TABLE_LENGTHS) {
            Some(lengths) => read_u64s(lengths.bytes(), "ExtendedOffsetTableLengths")?,
            None => Vec::new(),
        };
        if !lengths.is_empty() && lengths.len() != offsets.len() {
            return Err(DecompressError::malformed(
                tags::EXTENDED_OFFSET_TABLE_LENGTHS,
                format!(
                    "{} lengths for {} extended offsets",
                    lengths.len(),
                    offsets.len()
                ),
            ));
        }
        Ok(Some(ExtendedOffsets { offsets, lengths }))
    }
}

fn read_u64s(bytes: Option<&[u8]>, name: &str) -> Result<Vec<u64>> {
    let bytes = bytes.ok_or_else(|| {
        DecompressError::malformed(tags::EXTENDED_OFFSET_TABLE, format!("{name} is not a binary value"))
    })?;
    if bytes.len() % 8 != 0 {
        return Err(DecompressError::malformed(
            tags::EXTENDED_OFFSET_TABLE,
            format!("{name} length {} is not a multiple of 8", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}

/// Group fragments into `frames` compressed frames.
///
/// Boundaries come from, in order: the extended offset table, the single-frame case,
/// a one-fragment-per-frame layout, the basic offset table, and finally the codec's
/// start-of-codestream marker.
pub fn split_frames<'a>(
    pixel: &'a PixelFragments,
    extended: Option<&ExtendedOffsets>,
    frames: u32,
    marker: Option<&[u8]>,
) -> Result<Vec<Cow<'a, [u8]>>> {
    let fragments = &pixel.fragments;
    if fragments.is_empty() {
        return Err(DecompressError::malformed(
            tags::PIXEL_DATA,
            "encapsulated pixel data has no fragments",
        ));
    }
    let frames = frames.max(1) as usize;

    if let Some(extended) = extended {
        let mut out = group_by_offsets(fragments, &extended.offsets)?;
        for (frame, length) in out.iter_mut().zip(&extended.lengths) {
            let length = *length as usize;
            if length < frame.len() {
                *frame = match std::mem::take(frame) {
                    Cow::Borrowed(data) => Cow::Borrowed(&data[..length]),
                    Cow::Owned(mut data) => {
                        data.truncate(length);
                        Cow::Owned(data)
                    }
                };
            }
        }
        return check_count(out, frames, "extended offset table");
    }

    if frames == 1 {
        return Ok(vec![concat(fragments)]);
    }

    if fragments.len() == frames {
        return Ok(fragments.iter().map(|f| Cow::Borrowed(f.as_slice())).collect());
    }

    if !pixel.offset_table.is_empty() {
        let offsets: Vec<u64> = pixel.offset_table.iter().map(|&o| u64::from(o)).collect();
        let out = group_by_offsets(fragments, &offsets)?;
        return check_count(out, frames, "basic offset table");
    }

    if let Some(marker) = marker {
        let mut groups: Vec<Vec<&[u8]>> = Vec::new();
        for fragment in fragments.iter().map(Vec::as_slice) {
            match groups.last_mut() {
                Some(group) if !fragment.starts_with(marker) => group.push(fragment),
                _ => groups.push(vec![fragment]),
            }
        }
        let out = groups
            .into_iter()
            .map(|group| match group.as_slice() {
                [single] => Cow::Borrowed(*single),
                parts => Cow::Owned(parts.concat()),
            })
            .collect();
        return check_count(out, frames, "codestream markers");
    }

    Err(DecompressError::malformed(
        tags::PIXEL_DATA,
        format!(
            "cannot map {} fragments onto {} frames without an offset table",
            fragments.len(),
            frames
        ),
    ))
}

fn concat(fragments: &[Vec<u8>]) -> Cow<'_, [u8]> {
    match fragments {
        [single] => Cow::Borrowed(single.as_slice()),
        parts => Cow::Owned(parts.concat()),
    }
}

fn check_count<'a>(
    out: Vec<Cow<'a, [u8]>>,
    frames: usize,
    source: &str,
) -> Result<Vec<Cow<'a, [u8]>>> {
    if out.len() != frames {
        return Err(DecompressError::malformed(
            tags::PIXEL_DATA,
            format!(
                "{source} describes {} frames, NumberOfFrames is {frames}",
                out.len()
            ),
        ));
    }
    Ok(out)
}

/// Offsets are measured from the first fragment's item tag, header bytes included.
fn group_by_offsets<'a>(fragments: &'a [Vec<u8>], offsets: &[u64]) -> Result<Vec<Cow<'a, [u8]>>> {
    let mut starts = Vec::with_capacity(fragments.len());
    let mut position = 0u64;
    for fragment in fragments {
        starts.push(position);
        position += ITEM_HEADER_LEN + fragment.len() as u64;
    }

    let mut out = Vec::with_capacity(offsets.len());
    for (index, &offset) in offsets.iter().enumerate() {
        let end = offsets.get(index + 1).copied().unwrap_or(u64::MAX);
        if end <= offset {
            return Err(DecompressError::malformed(
                tags::PIXEL_DATA,
                format!("frame offsets are not ascending at frame {index}"),
            ));
        }
        let first = starts.iter().position(|&s| s == offset).ok_or_else(|| {
            DecompressError::malformed(
                tags::PIXEL_DATA,
                format!("offset {offset} of frame {index} does not point at a fragment"),
            )
        })?;
        let last = starts.iter().rposition(|&s| s < end).unwrap_or(first);
        out.push(concat(&fragments[first..=last]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DataElement;
    use dicom_core::VR;

    fn pixel(offset_table: Vec<u32>, fragments: Vec<Vec<u8>>) -> PixelFragments {
        PixelFragments {
            offset_table,
            fragments,
        }
    }

    #[test]
    fn single_frame_concatenates_all_fragments() {
        let data = pixel(vec![], vec![vec![1, 2], vec![3, 4]]);
        let frames = split_frames(&data, None, 1, None).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn one_fragment_per_frame() {
        let data = pixel(vec![], vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        let frames = split_frames(&data, None, 3, None).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].as_ref(), &[5, 6]);
    }

    #[test]
    fn basic_offset_table_groups_fragments() {
        // frame 0 = fragments 0+1, frame 1 = fragment 2
        let fragments = vec![vec![1, 2], vec![3, 4, 5, 6], vec![7, 8]];
        let data = pixel(vec![0, 8 + 2 + 8 + 4], fragments);
        let frames = split_frames(&data, None, 2, None).unwrap();
        assert_eq!(frames[0].as_ref(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frames[1].as_ref(), &[7, 8]);
    }

    #[test]
    fn markers_split_frames_without_offset_table() {
        let fragments = vec![
            vec![0xFF, 0xD8, 1, 2],
            vec![3, 4],
            vec![0xFF, 0xD8, 5, 6],
        ];
        let data = pixel(vec![], fragments);
        let frames = split_frames(&data, None, 2, Some(&[0xFF, 0xD8])).unwrap();
        assert_eq!(frames[0].as_ref(), &[0xFF, 0xD8, 1, 2, 3, 4]);
        assert_eq!(frames[1].as_ref(), &[0xFF, 0xD8, 5, 6]);
    }

    #[test]
    fn ambiguous_layout_is_malformed() {
        let data = pixel(vec![], vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        let err = split_frames(&data, None, 2, None).unwrap_err();
        assert_eq!(err.kind(), "MalformedElement");
    }

    #[test]
    fn offset_table_must_match_frame_count() {
        let data = pixel(vec![0], vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        let err = split_frames(&data, None, 2, None).unwrap_err();
        assert_eq!(err.kind(), "MalformedElement");
    }

    #[test]
    fn extended_offsets_take_precedence() {
        let data = pixel(vec![], vec![vec![1, 2, 0], vec![3, 4, 0]]);
        let extended = ExtendedOffsets {
            offsets: vec![0, 8 + 3],
            lengths: vec![2, 2],
        };
        let frames = split_frames(&data, Some(&extended), 2, None).unwrap();
        assert_eq!(frames[0].as_ref(), &[1, 2]);
        assert_eq!(frames[1].as_ref(), &[3, 4]);
    }

    #[test]
    fn extended_offsets_are_read_from_the_data_set() {
        let mut ds = DataSet::new();
        let offsets: Vec<u8> = [0u64, 16].iter().flat_map(|v| v.to_le_bytes()).collect();
        let lengths: Vec<u8> = [6u64, 6].iter().flat_map(|v| v.to_le_bytes()).collect();
        ds.push(DataElement::new_bytes(tags::EXTENDED_OFFSET_TABLE, VR::OV, offsets))
            .unwrap();
        ds.push(DataElement::new_bytes(
            tags::EXTENDED_OFFSET_TABLE_LENGTHS,
            VR::OV,
            lengths,
        ))
        .unwrap();

        let extended = ExtendedOffsets::from_data_set(&ds).unwrap().unwrap();
        assert_eq!(extended.offsets, vec![0, 16]);
        assert_eq!(extended.lengths, vec![6, 6]);
        assert!(ExtendedOffsets::from_data_set(&DataSet::new())
            .unwrap()
            .is_none());
    }
}
