//! Ingest inputs and format detection.

use cadastre_core::IngestError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where the bytes of a source come from.
#[derive(Clone, Debug)]
pub enum Source {
    /// An in-memory upload.
    Bytes {
        /// Raw file contents.
        data: Vec<u8>,
        /// Original file name, used for extension-based detection.
        filename: Option<String>,
    },
    /// A file on disk. Shapefile sidecars next to a `.shp` are read too.
    Path(PathBuf),
}

impl Source {
    /// In-memory source with an optional file name.
    pub fn bytes(data: impl Into<Vec<u8>>, filename: Option<&str>) -> Self {
        Self::Bytes {
            data: data.into(),
            filename: filename.map(str::to_owned),
        }
    }

    /// Source read from `path`.
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }
}

/// Caller-supplied format, overriding detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatHint {
    /// GeoJSON document.
    GeoJson,
    /// Shapefile `.shp` (sidecars read when available).
    Shapefile,
    /// GeoPackage database.
    GeoPackage,
    /// KML document.
    Kml,
    /// Zip archive, including `.kmz`.
    Zip,
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GeoJson => "geojson",
            Self::Shapefile => "shapefile",
            Self::GeoPackage => "geopackage",
            Self::Kml => "kml",
            Self::Zip => "zip",
        };
        f.write_str(name)
    }
}

impl FromStr for FormatHint {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(Self::GeoJson),
            "shp" | "shapefile" => Ok(Self::Shapefile),
            "gpkg" | "geopackage" => Ok(Self::GeoPackage),
            "kml" => Ok(Self::Kml),
            "kmz" | "zip" => Ok(Self::Zip),
            other => Err(IngestError::format(format!("unknown format hint {other:?}"))),
        }
    }
}

const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const SHP_FILE_CODE: i32 = 9994;
const XML_SNIFF_LEN: usize = 4096;

/// Guess the format from leading bytes, then from the file extension.
pub(crate) fn detect(data: &[u8], filename: Option<&str>) -> Option<FormatHint> {
    sniff(data).or_else(|| filename.and_then(from_extension))
}

fn sniff(data: &[u8]) -> Option<FormatHint> {
    if ZIP_MAGICS.iter().any(|m| data.starts_with(m)) {
        return Some(FormatHint::Zip);
    }
    if data.starts_with(SQLITE_MAGIC) {
        return Some(FormatHint::GeoPackage);
    }
    if data.len() >= 100 {
        let code = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if code == SHP_FILE_CODE {
            return Some(FormatHint::Shapefile);
        }
    }
    let text = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let start = text.iter().position(|b| !b.is_ascii_whitespace())?;
    match text[start] {
        b'{' => Some(FormatHint::GeoJson),
        b'<' => {
            let head = &text[start..text.len().min(start + XML_SNIFF_LEN)];
            let head = String::from_utf8_lossy(head).to_ascii_lowercase();
            head.contains("<kml").then_some(FormatHint::Kml)
        }
        _ => None,
    }
}

/// Format implied by a file name's extension.
pub(crate) fn from_extension(name: &str) -> Option<FormatHint> {
    let ext = Path::new(name).extension()?.to_str()?;
    ext.parse().ok()
}
