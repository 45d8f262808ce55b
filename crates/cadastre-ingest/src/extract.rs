//! Ingest entry point: resolve the source, pick a reader, assemble.

use crate::archive;
use crate::assemble::assemble;
use crate::config::{IngestConfig, IngestConfigError};
use crate::raw::RawLayer;
use crate::readers::shapefile::ShapefileParts;
use crate::readers::{geojson, gpkg, kml, shapefile};
use crate::source::{detect, FormatHint, Source};
use cadastre_core::{CancelToken, Dataset, IngestError, Warning};
use std::cell::Cell;
use std::fs;
use std::path::Path;

/// A successfully ingested source.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The features, normalized to the working CRS where possible.
    pub dataset: Dataset,
    /// Everything that was skipped, guessed or left unnormalized.
    pub warnings: Vec<Warning>,
}

/// Per-call state shared by the readers of one ingest.
pub(crate) struct ReadContext<'a> {
    pub config: &'a IngestConfig,
    pub cancel: &'a CancelToken,
    /// Archive nesting level of the bytes being read; 0 for the outermost.
    pub depth: usize,
    /// Bytes decompressed so far, across every archive level.
    pub decompressed: &'a Cell<u64>,
}

impl ReadContext<'_> {
    /// Context for an archive nested one level deeper.
    pub fn nested(&self) -> Self {
        ReadContext {
            config: self.config,
            cancel: self.cancel,
            depth: self.depth + 1,
            decompressed: self.decompressed,
        }
    }

    /// Whether the decompression budget has been overrun.
    pub fn budget_exhausted(&self) -> bool {
        self.decompressed.get() > self.config.max_uncompressed_bytes
    }
}

/// Decode `data` as `format`.
pub(crate) fn read_layer(
    format: FormatHint,
    data: &[u8],
    filename: Option<&str>,
    ctx: &ReadContext<'_>,
) -> Result<RawLayer, IngestError> {
    ctx.cancel.check()?;
    let mut layer = match format {
        FormatHint::GeoJson => geojson::read(data)?,
        FormatHint::Shapefile => shapefile::read(
            &ShapefileParts {
                shp: data.to_vec(),
                ..ShapefileParts::default()
            },
            ctx.cancel,
        )?,
        FormatHint::GeoPackage => gpkg::read(data, ctx.cancel)?,
        FormatHint::Kml => kml::read(data, ctx.cancel)?,
        FormatHint::Zip => archive::read(data, ctx)?,
    };
    if layer.filename.is_none() {
        layer.filename = filename.map(str::to_owned);
    }
    Ok(layer)
}

/// Reads vector sources into [`Dataset`]s.
///
/// An `Ingestor` holds only its limits; every call is independent and
/// the same instance may be used from several threads at once.
#[derive(Clone, Debug, Default)]
pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    /// Create an ingestor, validating the limits.
    pub fn new(config: IngestConfig) -> Result<Self, IngestConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The limits in effect.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Read `source`, using `hint` instead of detection when given.
    pub fn extract(
        &self,
        source: Source,
        hint: Option<FormatHint>,
    ) -> Result<Extraction, IngestError> {
        self.extract_with_cancel(source, hint, &CancelToken::new())
    }

    /// As [`extract`](Self::extract), stopping with
    /// [`IngestError::Cancelled`] once `cancel` is set.
    pub fn extract_with_cancel(
        &self,
        source: Source,
        hint: Option<FormatHint>,
        cancel: &CancelToken,
    ) -> Result<Extraction, IngestError> {
        let decompressed = Cell::new(0);
        let ctx = ReadContext {
            config: &self.config,
            cancel,
            depth: 0,
            decompressed: &decompressed,
        };

        let layer = match source {
            Source::Bytes { data, filename } => {
                let format = resolve(hint, &data, filename.as_deref())?;
                read_layer(format, &data, filename.as_deref(), &ctx)?
            }
            Source::Path(path) => {
                let data = fs::read(&path)?;
                let filename = path.file_name().and_then(|n| n.to_str()).map(str::to_owned);
                let format = resolve(hint, &data, filename.as_deref())?;
                if format == FormatHint::Shapefile {
                    let parts = shapefile_with_sidecars(&path, data)?;
                    let mut layer = shapefile::read(&parts, cancel)?;
                    layer.filename = filename;
                    layer
                } else {
                    read_layer(format, &data, filename.as_deref(), &ctx)?
                }
            }
        };

        let format = layer.format;
        let (dataset, warnings) = assemble(layer, cancel)?;
        tracing::debug!(
            format = %format,
            features = dataset.len(),
            warnings = warnings.len(),
            crs = %dataset.crs(),
            "source ingested"
        );
        Ok(Extraction { dataset, warnings })
    }
}

/// Read `source` with default limits.
pub fn extract(source: Source, hint: Option<FormatHint>) -> Result<Extraction, IngestError> {
    Ingestor::default().extract(source, hint)
}

fn resolve(
    hint: Option<FormatHint>,
    data: &[u8],
    filename: Option<&str>,
) -> Result<FormatHint, IngestError> {
    hint.or_else(|| detect(data, filename)).ok_or_else(|| {
        IngestError::format(match filename {
            Some(name) => format!("{name} is not GeoJSON, Shapefile, GeoPackage, KML or zip"),
            None => "source is not GeoJSON, Shapefile, GeoPackage, KML or zip".to_owned(),
        })
    })
}

/// Load `.dbf`, `.prj` and `.cpg` files sharing the `.shp` file's stem.
fn shapefile_with_sidecars(shp_path: &Path, shp: Vec<u8>) -> Result<ShapefileParts, IngestError> {
    let sidecar = |ext: &str| -> Result<Option<Vec<u8>>, IngestError> {
        for candidate in [ext.to_owned(), ext.to_ascii_uppercase()] {
            let path = shp_path.with_extension(candidate);
            if path.is_file() {
                return Ok(Some(fs::read(path)?));
            }
        }
        Ok(None)
    };
    Ok(ShapefileParts {
        shp,
        dbf: sidecar("dbf")?,
        prj: sidecar("prj")?,
        cpg: sidecar("cpg")?,
    })
}
