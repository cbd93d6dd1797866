//
// metadata.rs
// dicom-decompress
//
// Extracts the file summary behind the `info` verb: meta, transfer syntax, decoder availability and image shape.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dicom_dictionary_std::tags;

use crate::codec::CodecRegistry;
use crate::models::FileInfo;
use crate::transcode::{parse_file, ParsedFile};

pub fn extract_info(parsed: &ParsedFile, registry: &CodecRegistry, warnings: Vec<String>) -> FileInfo {
    let ds = &parsed.data_set;
    // Empty strings are reported as missing.
    let text = |tag| ds.str_value(tag).filter(|s| !s.is_empty());
    let pixel = ds.get(tags::PIXEL_DATA);

    FileInfo {
        transfer_syntax: parsed.transfer_syntax.uid().to_string(),
        transfer_syntax_name: parsed.transfer_syntax.name().to_string(),
        encapsulated: parsed.transfer_syntax.is_encapsulated(),
        decoder_available: registry.supports(parsed.transfer_syntax.uid()),
        media_storage_sop_class_uid: parsed.meta.media_storage_sop_class_uid(),
        media_storage_sop_instance_uid: parsed.meta.media_storage_sop_instance_uid(),
        implementation_class_uid: parsed.meta.implementation_class_uid(),
        implementation_version_name: parsed.meta.implementation_version_name(),
        patient_name: text(tags::PATIENT_NAME),
        patient_id: text(tags::PATIENT_ID),
        study_date: text(tags::STUDY_DATE),
        modality: text(tags::MODALITY),
        has_pixel_data: pixel.is_some(),
        rows: ds.u16_value(tags::ROWS),
        columns: ds.u16_value(tags::COLUMNS),
        number_of_frames: ds
            .int_value(tags::NUMBER_OF_FRAMES)
            .and_then(|n| u32::try_from(n).ok()),
        samples_per_pixel: ds.u16_value(tags::SAMPLES_PER_PIXEL),
        bits_allocated: ds.u16_value(tags::BITS_ALLOCATED),
        photometric_interpretation: text(tags::PHOTOMETRIC_INTERPRETATION),
        // Only meaningful for encapsulated pixel data.
        fragments: pixel
            .and_then(|p| p.fragments())
            .map(|f| f.fragments.len()),
        element_count: ds.len(),
        warnings,
    }
}

pub fn read_info(path: &Path) -> Result<FileInfo> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut warnings = Vec::new();
    let parsed = parse_file(&bytes, &mut warnings).context("Failed to parse DICOM file")?;
    Ok(extract_info(
        &parsed,
        &CodecRegistry::with_defaults(),
        warnings,
    ))
}

pub fn print_info(path: &Path, json: bool) -> Result<()> {
    let info = read_info(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    // Missing attributes print as N/A.
    let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
    let num = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string());

    println!("{}", "=".repeat(80));
    println!("DICOM File Information: {}", path.display());
    println!("{}", "=".repeat(80));

    println!("TRANSFER SYNTAX");
    println!("  UID:      {}", info.transfer_syntax);
    println!("  Name:     {}", info.transfer_syntax_name);
    println!(
        "  Pixels:   {}",
        if info.encapsulated { "encapsulated" } else { "native" }
    );
    println!(
        "  Decoder:  {}",
        if info.decoder_available { "available" } else { "not available in this build" }
    );

    println!("\nFILE META");
    println!("  SOP Class:      {}", na(&info.media_storage_sop_class_uid));
    println!("  SOP Instance:   {}", na(&info.media_storage_sop_instance_uid));
    println!("  Implementation: {}", na(&info.implementation_class_uid));

    println!("\nPATIENT / STUDY");
    println!("  Name:     {}", na(&info.patient_name));
    println!("  ID:       {}", na(&info.patient_id));
    println!("  Date:     {}", na(&info.study_date));
    println!("  Modality: {}", na(&info.modality));

    // Image attributes as declared; nothing here is decoded.
    println!("\nIMAGE");
    println!(
        "  Pixel Data: {}",
        if info.has_pixel_data { "present" } else { "absent" }
    );
    println!(
        "  Size:       {} x {}",
        num(info.columns.map(u32::from)),
        num(info.rows.map(u32::from))
    );
    println!("  Frames:     {}", num(info.number_of_frames));
    println!("  Samples:    {}", num(info.samples_per_pixel.map(u32::from)));
    println!("  Bits:       {}", num(info.bits_allocated.map(u32::from)));
    println!("  Photometric: {}", na(&info.photometric_interpretation));
    if let Some(fragments) = info.fragments {
        println!("  Fragments:  {fragments}");
    }
    println!("  Elements:   {}", info.element_count);

    for warning in &info.warnings {
        println!("\nwarning: {warning}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{DataElement, DataSet};
    use crate::encoder::write_file;
    use crate::meta::build_meta;
    use crate::transfer_syntax as ts;
    use dicom_core::VR;

    #[test]
    fn info_reports_transfer_syntax_and_shape() {
        let mut ds = DataSet::new();
        ds.push(DataElement::new_str(tags::MODALITY, VR::CS, "CT"))
            .unwrap();
        ds.push(DataElement::new_bytes(tags::ROWS, VR::US, vec![4, 0]))
            .unwrap();
        ds.push(DataElement::new_bytes(tags::COLUMNS, VR::US, vec![8, 0]))
            .unwrap();
        let meta = build_meta("1.2.840.10008.5.1.4.1.1.2", "1.2.3", ts::RLE_LOSSLESS).unwrap();
        let bytes = write_file(&meta, &ds, &mut Vec::new()).unwrap();

        let mut warnings = Vec::new();
        let parsed = parse_file(&bytes, &mut warnings).unwrap();
        let info = extract_info(&parsed, &CodecRegistry::with_defaults(), warnings);
        assert_eq!(info.transfer_syntax, ts::RLE_LOSSLESS);
        assert!(info.encapsulated);
        assert!(info.decoder_available);
        assert_eq!(info.modality.as_deref(), Some("CT"));
        assert_eq!(info.rows, Some(4));
        assert_eq!(info.columns, Some(8));
        assert!(!info.has_pixel_data);
        assert_eq!(
            info.media_storage_sop_instance_uid.as_deref(),
            Some("1.2.3")
        );
    }
}
