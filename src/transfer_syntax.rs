//
// transfer_syntax.rs
// dicom-decompress
//
// Well-known transfer syntaxes and the data-set encoding / pixel encoding each one implies.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;

use crate::binary::{Encoding, Endianness, VrMode};

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
pub const JPEG_EXTENDED: &str = "1.2.840.10008.1.2.4.51";
pub const JPEG_LOSSLESS: &str = "1.2.840.10008.1.2.4.57";
pub const JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";
pub const JPEG_LS_LOSSLESS: &str = "1.2.840.10008.1.2.4.80";
pub const JPEG_LS_NEAR_LOSSLESS: &str = "1.2.840.10008.1.2.4.81";
pub const JPEG_2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";
pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
pub const HTJ2K_LOSSLESS: &str = "1.2.840.10008.1.2.4.201";
pub const HTJ2K_LOSSLESS_RPCL: &str = "1.2.840.10008.1.2.4.202";
pub const HTJ2K: &str = "1.2.840.10008.1.2.4.203";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

/// How the pixel data of a transfer syntax is stored.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PixelEncoding {
    Native,
    JpegBaseline,
    JpegExtended,
    JpegLossless,
    JpegLs,
    Jpeg2000,
    Rle,
    /// Encapsulated with a codec this crate does not know about.
    Unknown,
}

impl PixelEncoding {
    pub fn is_encapsulated(self) -> bool {
        self != PixelEncoding::Native
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferSyntax {
    uid: String,
    name: &'static str,
    encoding: Encoding,
    deflated: bool,
    pixel_encoding: PixelEncoding,
}

struct Entry {
    uid: &'static str,
    name: &'static str,
    encoding: Encoding,
    deflated: bool,
    pixel_encoding: PixelEncoding,
}

const fn entry(
    uid: &'static str,
    name: &'static str,
    encoding: Encoding,
    pixel_encoding: PixelEncoding,
) -> Entry {
    Entry {
        uid,
        name,
        encoding,
        deflated: false,
        pixel_encoding,
    }
}

const KNOWN: &[Entry] = &[
    entry(
        IMPLICIT_VR_LITTLE_ENDIAN,
        "Implicit VR Little Endian",
        Encoding::IMPLICIT_LE,
        PixelEncoding::Native,
    ),
    entry(
        EXPLICIT_VR_LITTLE_ENDIAN,
        "Explicit VR Little Endian",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Native,
    ),
    Entry {
        uid: DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
        name: "Deflated Explicit VR Little Endian",
        encoding: Encoding::EXPLICIT_LE,
        deflated: true,
        pixel_encoding: PixelEncoding::Native,
    },
    entry(
        EXPLICIT_VR_BIG_ENDIAN,
        "Explicit VR Big Endian",
        Encoding::EXPLICIT_BE,
        PixelEncoding::Native,
    ),
    entry(
        JPEG_BASELINE,
        "JPEG Baseline (Process 1)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::JpegBaseline,
    ),
    entry(
        JPEG_EXTENDED,
        "JPEG Extended (Process 2 & 4)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::JpegExtended,
    ),
    entry(
        JPEG_LOSSLESS,
        "JPEG Lossless, Non-Hierarchical (Process 14)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::JpegLossless,
    ),
    entry(
        JPEG_LOSSLESS_SV1,
        "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
        Encoding::EXPLICIT_LE,
        PixelEncoding::JpegLossless,
    ),
    entry(
        JPEG_LS_LOSSLESS,
        "JPEG-LS Lossless",
        Encoding::EXPLICIT_LE,
        PixelEncoding::JpegLs,
    ),
    entry(
        JPEG_LS_NEAR_LOSSLESS,
        "JPEG-LS Lossy (Near-Lossless)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::JpegLs,
    ),
    entry(
        JPEG_2000_LOSSLESS,
        "JPEG 2000 (Lossless Only)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Jpeg2000,
    ),
    entry(
        JPEG_2000,
        "JPEG 2000",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Jpeg2000,
    ),
    entry(
        HTJ2K_LOSSLESS,
        "High-Throughput JPEG 2000 (Lossless Only)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Jpeg2000,
    ),
    entry(
        HTJ2K_LOSSLESS_RPCL,
        "High-Throughput JPEG 2000 with RPCL Options (Lossless Only)",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Jpeg2000,
    ),
    entry(
        HTJ2K,
        "High-Throughput JPEG 2000",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Jpeg2000,
    ),
    entry(
        RLE_LOSSLESS,
        "RLE Lossless",
        Encoding::EXPLICIT_LE,
        PixelEncoding::Rle,
    ),
];

impl TransferSyntax {
    /// Resolve a transfer syntax UID.
    ///
    /// Unknown UIDs resolve to an encapsulated Explicit VR Little Endian syntax,
    /// which is how every non-native transfer syntax encodes its data set.
    pub fn from_uid(uid: &str) -> TransferSyntax {
        let uid = trim_uid(uid);
        match KNOWN.iter().find(|e| e.uid == uid) {
            Some(e) => TransferSyntax {
                uid: e.uid.to_string(),
                name: e.name,
                encoding: e.encoding,
                deflated: e.deflated,
                pixel_encoding: e.pixel_encoding,
            },
            None => TransferSyntax {
                uid: uid.to_string(),
                name: "Unknown",
                encoding: Encoding::EXPLICIT_LE,
                deflated: false,
                pixel_encoding: PixelEncoding::Unknown,
            },
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn vr_mode(&self) -> VrMode {
        self.encoding.vr_mode
    }

    pub fn endianness(&self) -> Endianness {
        self.encoding.endianness
    }

    pub fn is_deflated(&self) -> bool {
        self.deflated
    }

    pub fn pixel_encoding(&self) -> PixelEncoding {
        self.pixel_encoding
    }

    pub fn is_encapsulated(&self) -> bool {
        self.pixel_encoding.is_encapsulated()
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}

/// Strip the NUL / space padding UIDs carry on the wire.
pub fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(|c| c == '\0' || c == ' ').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_syntaxes() {
        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2.2");
        assert_eq!(ts.endianness(), Endianness::Big);
        assert_eq!(ts.vr_mode(), VrMode::Explicit);
        assert!(!ts.is_encapsulated());

        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2\0");
        assert_eq!(ts.uid(), IMPLICIT_VR_LITTLE_ENDIAN);
        assert_eq!(ts.vr_mode(), VrMode::Implicit);

        let ts = TransferSyntax::from_uid(RLE_LOSSLESS);
        assert_eq!(ts.pixel_encoding(), PixelEncoding::Rle);
        assert!(ts.is_encapsulated());

        assert!(TransferSyntax::from_uid(DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN).is_deflated());
    }

    #[test]
    fn unknown_uid_is_encapsulated_explicit_le() {
        let ts = TransferSyntax::from_uid("1.2.3.4.5");
        assert_eq!(ts.pixel_encoding(), PixelEncoding::Unknown);
        assert!(ts.is_encapsulated());
        assert_eq!(ts.encoding(), Encoding::EXPLICIT_LE);
        assert_eq!(ts.to_string(), "Unknown (1.2.3.4.5)");
    }
}
