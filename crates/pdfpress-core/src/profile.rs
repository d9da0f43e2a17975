//! Named compression profiles and their Ghostscript parameter sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Flags shared by every profile's render stage.
const COMMON_ARGS: &[&str] = &[
    "-sDEVICE=pdfwrite",
    "-dCompatibilityLevel=1.4",
    "-dNOPAUSE",
    "-dQUIET",
    "-dBATCH",
    "-dDetectDuplicateImages=true",
    "-dCompressFonts=true",
    "-dSubsetFonts=true",
    "-dRemoveUnusedResources=true",
    "-dColorImageDownsampleType=/Bicubic",
    "-dDiscardPageThumbnails=true",
];

const DROP_ANNOTATIONS: &[&str] = &["-dDiscardPageAnnotations=true", "-dPreserveAnnots=false"];
const KEEP_ANNOTATIONS: &[&str] = &["-dPreserveAnnots=true"];

const SCREEN_ARGS: &[&str] = &[
    "-dPDFSETTINGS=/screen",
    "-dColorImageResolution=72",
    "-dGrayImageResolution=72",
    "-dMonoImageResolution=72",
    "-r72",
    "-dDiscardBookmarks=true",
];

const EBOOK_ARGS: &[&str] = &[
    "-dPDFSETTINGS=/ebook",
    "-dColorImageResolution=150",
    "-dGrayImageResolution=150",
    "-dMonoImageResolution=150",
    "-r150",
];

const PRINTER_ARGS: &[&str] = &[
    "-dPDFSETTINGS=/printer",
    "-dColorImageResolution=300",
    "-dGrayImageResolution=300",
    "-dMonoImageResolution=300",
    "-r300",
];

// Forces decode and re-encode of images that are already JPEG compressed.
const EXTREME_ARGS: &[&str] = &[
    "-dPDFSETTINGS=/screen",
    "-dPassThroughJPEGImages=false",
    "-dDownsampleColorImages=true",
    "-dDownsampleGrayImages=true",
    "-dDownsampleMonoImages=true",
    "-dColorImageResolution=72",
    "-dGrayImageResolution=72",
    "-dMonoImageResolution=72",
    "-r72",
    "-sColorConversionStrategy=RGB",
    "-sProcessColorModel=DeviceRGB",
    "-dAutoFilterColorImages=false",
    "-dAutoFilterGrayImages=false",
    "-dEncodeColorImages=true",
    "-dColorImageFilter=/DCTEncode",
    "-dGrayImageFilter=/DCTEncode",
    "-dDiscardBookmarks=true",
    "-dDiscardDocumentInfo=true",
];

/// Quality/size trade-off applied to every item of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// 72 dpi, downsampled, bookmarks dropped.
    Screen,
    /// 150 dpi balanced output.
    #[default]
    Ebook,
    /// 300 dpi, annotations retained.
    Printer,
    /// 72 dpi with forced downsampling, RGB conversion, and JPEG re-encoding.
    Extreme,
}

impl Profile {
    /// Every profile, from least to most aggressive.
    pub const ALL: [Self; 4] = [Self::Printer, Self::Ebook, Self::Screen, Self::Extreme];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Ebook => "ebook",
            Self::Printer => "printer",
            Self::Extreme => "extreme",
        }
    }

    /// Nominal image resolution in dots per inch.
    #[must_use]
    pub const fn resolution_dpi(self) -> u32 {
        match self {
            Self::Screen | Self::Extreme => 72,
            Self::Ebook => 150,
            Self::Printer => 300,
        }
    }

    /// Whether page annotations survive the render stage.
    #[must_use]
    pub const fn keeps_annotations(self) -> bool {
        matches!(self, Self::Printer)
    }

    /// Full Ghostscript flag list for this profile, excluding input and output paths.
    #[must_use]
    pub fn ghostscript_args(self) -> Vec<&'static str> {
        let annotations = if self.keeps_annotations() {
            KEEP_ANNOTATIONS
        } else {
            DROP_ANNOTATIONS
        };
        let extras = match self {
            Self::Screen => SCREEN_ARGS,
            Self::Ebook => EBOOK_ARGS,
            Self::Printer => PRINTER_ARGS,
            Self::Extreme => EXTREME_ARGS,
        };
        COMMON_ARGS
            .iter()
            .chain(annotations)
            .chain(extras)
            .copied()
            .collect()
    }

    /// Parse an optional selector, defaulting to [`Profile::Ebook`] when absent or blank.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for unknown profile names.
    pub fn parse_selector(value: Option<&str>) -> Result<Self, PipelineError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(name) => name.parse(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "screen" => Ok(Self::Screen),
            "ebook" => Ok(Self::Ebook),
            "printer" => Ok(Self::Printer),
            "extreme" => Ok(Self::Extreme),
            _ => Err(PipelineError::invalid(
                "level",
                "unknown_profile",
                Some(value.to_string()),
            )),
        }
    }
}
