//
// dump.rs
// dicom-decompress
//
// Renders a human-readable dump of a parsed file (meta group and data set, sequences included),
// with configurable depth and value previews.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt::Write;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use dicom_core::VR;

use crate::dictionary::{format_tag, tag_name};
use crate::element::{DataElement, DataSet, Value};
use crate::transcode::parse_file;

/// Print a textual dump of all elements in the file, resolving names via the standard dictionary.
pub fn dump_file(path: &Path, max_depth: usize, max_value_len: usize) -> Result<()> {
    let output = dump_to_string(path, max_depth, max_value_len)?;
    println!("{output}");
    Ok(())
}

pub fn dump_to_string(path: &Path, max_depth: usize, max_value_len: usize) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut warnings = Vec::new();
    let parsed = parse_file(&bytes, &mut warnings).context("Failed to parse DICOM file")?;

    // Writing into a String cannot fail; the fmt results are dropped.
    let mut out = String::new();
    let _ = writeln!(out, "# File meta ({})", parsed.transfer_syntax);
    dump_data_set(parsed.meta.elements(), 0, max_depth, max_value_len, &mut out);
    let _ = writeln!(out, "# Data set");
    dump_data_set(&parsed.data_set, 0, max_depth, max_value_len, &mut out);
    for warning in &warnings {
        let _ = writeln!(out, "# warning: {warning}");
    }
    Ok(out)
}

pub fn dump_data_set(
    data_set: &DataSet,
    depth: usize,
    max_depth: usize,
    max_value_len: usize,
    out: &mut String,
) {
    for element in data_set {
        let indent = "  ".repeat(depth);
        let head = format!(
            "{}{} {} {}",
            indent,
            format_tag(element.tag),
            tag_name(element.tag).unwrap_or("UnknownTag"),
            element.vr
        );
        match &element.value {
            Value::Bytes(_) => {
                // Primitive values can be long; we surface a preview only.
                let _ = writeln!(out, "{head} {}", preview(element, max_value_len));
            }
            Value::Sequence(items) => {
                let _ = writeln!(out, "{head} [sequence: {} item(s)]", items.len());
                // Past max_depth only the item count is shown.
                if depth < max_depth {
                    for (idx, item) in items.iter().enumerate() {
                        let _ = writeln!(out, "{}  Item {}", indent, idx + 1);
                        dump_data_set(&item.data_set, depth + 2, max_depth, max_value_len, out);
                    }
                }
            }
            Value::Fragments(pixel) => {
                let _ = writeln!(
                    out,
                    "{head} [encapsulated: {} fragment(s), {} bytes, offset table {} entries]",
                    pixel.fragments.len(),
                    pixel.total_len(),
                    pixel.offset_table.len()
                );
            }
        }
    }
}

fn preview(element: &DataElement, max_value_len: usize) -> String {
    let bytes = element.bytes().unwrap_or_default();
    // Binary numbers are shown as backslash-separated values, the way DICOM writes multi-valued text.
    let numbers = |size: usize, read: &dyn Fn(&[u8]) -> String| {
        let values: Vec<String> = bytes.chunks_exact(size).take(16).map(read).collect();
        truncate(&values.join("\\"), max_value_len)
    };
    match element.vr {
        VR::US => numbers(2, &|c| LittleEndian::read_u16(c).to_string()),
        VR::SS => numbers(2, &|c| LittleEndian::read_i16(c).to_string()),
        VR::UL => numbers(4, &|c| LittleEndian::read_u32(c).to_string()),
        VR::SL => numbers(4, &|c| LittleEndian::read_i32(c).to_string()),
        VR::FL => numbers(4, &|c| LittleEndian::read_f32(c).to_string()),
        VR::FD => numbers(8, &|c| LittleEndian::read_f64(c).to_string()),
        VR::AT => numbers(4, &|c| {
            format!(
                "({:04X},{:04X})",
                LittleEndian::read_u16(&c[..2]),
                LittleEndian::read_u16(&c[2..])
            )
        }),
        // Bulk data: size only.
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN => {
            format!("{} bytes", bytes.len())
        }
        _ => truncate(&element.to_str().unwrap_or_default(), max_value_len),
    }
}

fn truncate(input: &str, limit: usize) -> String {
    if input.chars().count() <= limit {
        input.to_string()
    } else {
        let mut truncated: String = input.chars().take(limit).collect();
        truncated.push('…');
        truncated
    }
}
