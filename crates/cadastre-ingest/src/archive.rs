//! Zip archive scanning: find the first readable vector layer.

use crate::extract::{read_layer, ReadContext};
use crate::raw::RawLayer;
use crate::readers::shapefile::ShapefileParts;
use crate::source::FormatHint;
use cadastre_core::{IngestError, Warning};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// A layer candidate found in the archive listing.
#[derive(Clone, Debug)]
enum Candidate {
    /// A single-file format.
    File { name: String, format: FormatHint },
    /// A `.shp` plus whichever sidecars share its stem.
    Shapefile {
        shp: String,
        dbf: Option<String>,
        prj: Option<String>,
        cpg: Option<String>,
    },
    /// A zip inside the zip.
    Nested { name: String },
}

impl Candidate {
    fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Nested { name } => name,
            Self::Shapefile { shp, .. } => shp,
        }
    }
}

fn is_ignored(name: &str) -> bool {
    if name.ends_with('/') {
        return true;
    }
    let mut components = name.split('/');
    if components.clone().any(|c| c == "__MACOSX") {
        return true;
    }
    components
        .next_back()
        .is_some_and(|base| base.starts_with('.') || base.is_empty())
}

fn split_ext(name: &str) -> (String, String) {
    let path = Path::new(name);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let stem_len = if ext.is_empty() {
        name.len()
    } else {
        name.len() - ext.len() - 1
    };
    (name[..stem_len].to_ascii_lowercase(), ext)
}

fn candidates(names: &[String]) -> Vec<Candidate> {
    let mut sidecars: HashMap<(String, String), String> = HashMap::new();
    for name in names {
        let (stem, ext) = split_ext(name);
        if matches!(ext.as_str(), "dbf" | "prj" | "cpg") {
            sidecars.entry((stem, ext)).or_insert_with(|| name.clone());
        }
    }
    let sidecar = |stem: &str, ext: &str| sidecars.get(&(stem.to_owned(), ext.to_owned())).cloned();

    let mut out = Vec::new();
    for name in names {
        let (stem, ext) = split_ext(name);
        let candidate = match ext.as_str() {
            "geojson" | "json" => Candidate::File {
                name: name.clone(),
                format: FormatHint::GeoJson,
            },
            "gpkg" => Candidate::File {
                name: name.clone(),
                format: FormatHint::GeoPackage,
            },
            "kml" => Candidate::File {
                name: name.clone(),
                format: FormatHint::Kml,
            },
            "shp" => Candidate::Shapefile {
                shp: name.clone(),
                dbf: sidecar(&stem, "dbf"),
                prj: sidecar(&stem, "prj"),
                cpg: sidecar(&stem, "cpg"),
            },
            "zip" | "kmz" => Candidate::Nested { name: name.clone() },
            _ => continue,
        };
        out.push(candidate);
    }
    out
}

/// Read one entry fully.
///
/// The outer `Err` aborts the whole ingest (decompression budget
/// exhausted, cancellation); the inner one only disqualifies this entry.
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    ctx: &ReadContext<'_>,
) -> Result<Result<Vec<u8>, String>, IngestError> {
    ctx.cancel.check()?;
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(e) => return Ok(Err(e.to_string())),
    };
    let remaining = ctx
        .config
        .max_uncompressed_bytes
        .saturating_sub(ctx.decompressed.get());
    let mut buf = Vec::new();
    let read = (&mut file).take(remaining.saturating_add(1)).read_to_end(&mut buf);
    ctx.decompressed.set(ctx.decompressed.get() + buf.len() as u64);
    if buf.len() as u64 > remaining {
        return Err(IngestError::corrupt_archive(format!(
            "archive decompresses to more than {} bytes",
            ctx.config.max_uncompressed_bytes
        )));
    }
    Ok(read.map(|_| buf).map_err(|e| e.to_string()))
}

/// Scan a zip archive and read its first usable layer.
pub(crate) fn read(data: &[u8], ctx: &ReadContext<'_>) -> Result<RawLayer, IngestError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| IngestError::corrupt_archive(e.to_string()))?;
    if archive.len() > ctx.config.max_archive_entries {
        return Err(IngestError::corrupt_archive(format!(
            "archive lists {} entries, limit is {}",
            archive.len(),
            ctx.config.max_archive_entries
        )));
    }

    let mut names = Vec::with_capacity(archive.len());
    let mut declared: u64 = 0;
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| IngestError::corrupt_archive(e.to_string()))?;
        declared = declared.saturating_add(entry.size());
        let name = entry.name().to_owned();
        if !entry.is_dir() && !is_ignored(&name) {
            names.push(name);
        }
    }
    if declared > ctx.config.max_uncompressed_bytes {
        return Err(IngestError::corrupt_archive(format!(
            "archive declares {declared} uncompressed bytes, limit is {}",
            ctx.config.max_uncompressed_bytes
        )));
    }

    let found = candidates(&names);
    if found.is_empty() {
        return Err(IngestError::format(
            "archive contains no GeoJSON, Shapefile, GeoPackage or KML entry",
        ));
    }

    let mut failures: Vec<Warning> = Vec::new();
    for (pos, candidate) in found.iter().enumerate() {
        tracing::debug!(entry = candidate.name(), depth = ctx.depth, "trying archive entry");
        let attempt = match candidate {
            Candidate::File { name, format } => match read_entry(&mut archive, name, ctx)? {
                Ok(bytes) => read_layer(*format, &bytes, Some(name), ctx),
                Err(reason) => Err(IngestError::format(reason)),
            },
            Candidate::Shapefile { shp, dbf, prj, cpg } => {
                read_shapefile_set(&mut archive, shp, dbf, prj, cpg, ctx)?
            }
            Candidate::Nested { name } => {
                if ctx.depth + 1 >= ctx.config.max_archive_depth {
                    failures.push(Warning::source(format!(
                        "nested archive {name} not opened: nesting limit reached"
                    )));
                    continue;
                }
                match read_entry(&mut archive, name, ctx)? {
                    Ok(bytes) => read(&bytes, &ctx.nested()),
                    Err(reason) => Err(IngestError::corrupt_archive(reason)),
                }
            }
        };

        match attempt {
            Ok(mut layer) => {
                if layer.filename.is_none() {
                    layer.filename = Some(candidate.name().to_owned());
                }
                let rest: Vec<&str> = found[pos + 1..].iter().map(Candidate::name).collect();
                if !rest.is_empty() {
                    layer.warnings.push(Warning::source(format!(
                        "archive holds further layers that were not loaded: {}",
                        rest.join(", ")
                    )));
                }
                let mut warnings = failures;
                warnings.append(&mut layer.warnings);
                layer.warnings = warnings;
                tracing::debug!(entry = candidate.name(), "archive entry selected");
                return Ok(layer);
            }
            Err(IngestError::Cancelled) => return Err(IngestError::Cancelled),
            Err(err) if ctx.budget_exhausted() => return Err(err),
            Err(err) => {
                tracing::debug!(entry = candidate.name(), error = %err, "archive entry rejected");
                failures.push(Warning::source(format!("{} skipped: {err}", candidate.name())));
            }
        }
    }

    let reasons: Vec<String> = failures.iter().map(|w| w.message.clone()).collect();
    Err(IngestError::format(format!(
        "no archive entry could be read ({})",
        reasons.join("; ")
    )))
}

fn read_shapefile_set<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    shp: &str,
    dbf: &Option<String>,
    prj: &Option<String>,
    cpg: &Option<String>,
    ctx: &ReadContext<'_>,
) -> Result<Result<RawLayer, IngestError>, IngestError> {
    let shp_bytes = match read_entry(archive, shp, ctx)? {
        Ok(bytes) => bytes,
        Err(reason) => return Ok(Err(IngestError::format(reason))),
    };
    let mut sidecar = |name: &Option<String>| -> Result<Option<Vec<u8>>, IngestError> {
        match name {
            Some(name) => Ok(read_entry(archive, name, ctx)?.ok()),
            None => Ok(None),
        }
    };
    let parts = ShapefileParts {
        shp: shp_bytes,
        dbf: sidecar(dbf)?,
        prj: sidecar(prj)?,
        cpg: sidecar(cpg)?,
    };
    Ok(crate::readers::shapefile::read(&parts, ctx.cancel).map(|mut layer| {
        layer.filename = Some(shp.to_owned());
        layer
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_mac_metadata_and_dotfiles() {
        assert!(is_ignored("__MACOSX/._parcels.shp"));
        assert!(is_ignored("data/__MACOSX/x.geojson"));
        assert!(is_ignored("data/.hidden.geojson"));
        assert!(is_ignored("data/"));
        assert!(!is_ignored("data/parcels.geojson"));
    }

    #[test]
    fn groups_shapefile_sidecars_by_stem() {
        let names: Vec<String> = ["a/Lots.SHP", "a/lots.dbf", "a/LOTS.prj", "b/lots.dbf", "readme.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let found = candidates(&names);
        assert_eq!(found.len(), 1);
        match &found[0] {
            Candidate::Shapefile { shp, dbf, prj, cpg } => {
                assert_eq!(shp, "a/Lots.SHP");
                assert_eq!(dbf.as_deref(), Some("a/lots.dbf"));
                assert_eq!(prj.as_deref(), Some("a/LOTS.prj"));
                assert!(cpg.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn candidates_keep_archive_order() {
        let names: Vec<String> = ["z.kml", "inner.zip", "a.geojson", "m.gpkg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let found = candidates(&names);
        let names_in_order: Vec<&str> = found.iter().map(Candidate::name).collect();
        assert_eq!(names_in_order, vec!["z.kml", "inner.zip", "a.geojson", "m.gpkg"]);
    }
}
