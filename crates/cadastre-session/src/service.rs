//! Serving-layer API: bytes in, serializable summaries out.

use crate::config::{ConfigError, SessionConfig};
use crate::error::SessionError;
use crate::session::DatasetSession;
use crate::snapshot::{AttributeRow, FeatureRecord, Snapshot};
use cadastre_adjacency::{AdjacencyEngine, Relation};
use cadastre_core::{AdjacencyError, CancelToken, FeatureId, Warning};
use cadastre_ingest::{FormatHint, Ingestor, Source};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

// ── DTOs ─────────────────────────────────────────────────────────

/// Response to [`CadastreService::load`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadSummary {
    /// Features in the new dataset.
    pub feature_count: usize,
    /// `[min_x, min_y, max_x, max_y]` of the dataset, `None` when empty.
    pub bbox: Option<[f64; 4]>,
    /// Everything skipped or left unnormalized.
    pub warnings: Vec<String>,
}

/// Response to [`CadastreService::append`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppendSummary {
    /// Features in the merged dataset.
    pub feature_count: usize,
    /// Ingest and merge warnings.
    pub warnings: Vec<String>,
}

/// Response to [`CadastreService::find_adjacent`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdjacencyResponse {
    /// The relation evaluated.
    pub relation: Relation,
    /// The selected features, ascending by id.
    pub selected: Vec<FeatureRecord>,
    /// Features related to the selection, ascending by id.
    pub adjacent: Vec<FeatureRecord>,
    /// Feature pairs that could not be evaluated.
    pub warnings: Vec<String>,
}

/// Outcome of a load or append, as reported by the worker.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IngestSummary {
    /// A [`CadastreService::load`] finished.
    Loaded(LoadSummary),
    /// A [`CadastreService::append`] finished.
    Appended(AppendSummary),
}

fn messages(warnings: &[Warning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}

fn parse_hint(hint: Option<&str>) -> Result<Option<FormatHint>, SessionError> {
    hint.map(str::parse::<FormatHint>).transpose().map_err(SessionError::from)
}

// ── CadastreService ──────────────────────────────────────────────

/// One user session as the serving layer sees it.
///
/// Owns a [`DatasetSession`] plus the ingestor and adjacency engine that
/// feed and query it. Every method takes `&self`; share the service as
/// `Arc<CadastreService>` between request handlers.
#[derive(Debug)]
pub struct CadastreService {
    session: DatasetSession,
    ingestor: Ingestor,
    engine: AdjacencyEngine,
    config: SessionConfig,
}

// Compile-time assertion: CadastreService must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<CadastreService>();
};

impl CadastreService {
    /// Create a service with an empty session.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ingestor = Ingestor::new(config.ingest.clone()).map_err(ConfigError::Ingest)?;
        Ok(Self {
            session: DatasetSession::new(config.index.clone()),
            ingestor,
            engine: AdjacencyEngine::new(&config.adjacency),
            config,
        })
    }

    /// The configuration in effect.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying session.
    pub fn session(&self) -> &DatasetSession {
        &self.session
    }

    /// The current snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.session.snapshot()
    }

    /// Ingest `bytes` and publish them in place of the current dataset.
    ///
    /// `hint` is a format name or extension (`"geojson"`, `"shp"`,
    /// `"gpkg"`, `"kml"`, `"kmz"`, `"zip"`); without it the format is
    /// detected from content.
    pub fn load(&self, bytes: Vec<u8>, hint: Option<&str>) -> Result<LoadSummary, SessionError> {
        self.load_with_cancel(bytes, hint, &CancelToken::new())
    }

    /// [`load`](Self::load) with cooperative cancellation.
    pub fn load_with_cancel(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<LoadSummary, SessionError> {
        let hint = parse_hint(hint)?;
        let extraction = self
            .ingestor
            .extract_with_cancel(Source::bytes(bytes, None), hint, cancel)?;
        let snapshot = self
            .session
            .replace_with_cancel(extraction.dataset, cancel)?;
        let dataset = snapshot.dataset();
        Ok(LoadSummary {
            feature_count: dataset.len(),
            bbox: dataset.bbox().map(|b| b.to_array()),
            warnings: messages(&extraction.warnings),
        })
    }

    /// Ingest `bytes` and merge them into the current dataset.
    pub fn append(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<AppendSummary, SessionError> {
        self.append_with_cancel(bytes, hint, &CancelToken::new())
    }

    /// [`append`](Self::append) with cooperative cancellation.
    pub fn append_with_cancel(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<AppendSummary, SessionError> {
        let hint = parse_hint(hint)?;
        let extraction = self
            .ingestor
            .extract_with_cancel(Source::bytes(bytes, None), hint, cancel)?;
        let outcome = self
            .session
            .append_with_cancel(extraction.dataset, cancel)?;
        let mut warnings = messages(&extraction.warnings);
        warnings.extend(messages(&outcome.warnings));
        Ok(AppendSummary {
            feature_count: outcome.snapshot.dataset().len(),
            warnings,
        })
    }

    /// Attribute table of the current dataset; empty when nothing is loaded.
    pub fn attributes(&self) -> Vec<AttributeRow> {
        self.session
            .snapshot()
            .map(|s| s.attributes())
            .unwrap_or_default()
    }

    /// Features that stand in `relation` to any of `selected`.
    pub fn find_adjacent(
        &self,
        selected: &[u64],
        relation: &str,
    ) -> Result<AdjacencyResponse, SessionError> {
        let relation: Relation = relation.parse()?;
        let ids: Vec<FeatureId> = selected.iter().copied().map(FeatureId).collect();
        let Some(snapshot) = self.session.snapshot() else {
            if ids.is_empty() {
                return Ok(AdjacencyResponse {
                    relation,
                    selected: Vec::new(),
                    adjacent: Vec::new(),
                    warnings: Vec::new(),
                });
            }
            let missing: BTreeSet<FeatureId> = ids.into_iter().collect();
            return Err(AdjacencyError::NotFound {
                ids: missing.into_iter().collect(),
            }
            .into());
        };

        let result =
            self.engine
                .find_adjacent(snapshot.dataset(), snapshot.index(), &ids, relation)?;
        let records = |ids: &[FeatureId]| -> Vec<FeatureRecord> {
            ids.iter().filter_map(|&id| snapshot.record(id)).collect()
        };
        Ok(AdjacencyResponse {
            relation,
            selected: records(&result.selected),
            adjacent: records(&result.adjacent),
            warnings: messages(&result.warnings),
        })
    }

    /// Discard the current dataset.
    pub fn clear(&self) {
        self.session.clear();
    }
}

impl Default for CadastreService {
    fn default() -> Self {
        Self {
            session: DatasetSession::default(),
            ingestor: Ingestor::default(),
            engine: AdjacencyEngine::default(),
            config: SessionConfig::default(),
        }
    }
}
