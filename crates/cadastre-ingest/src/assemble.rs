//! Turn a decoded layer into a validated, normalized [`Dataset`].

use crate::crs::plan;
use crate::raw::RawLayer;
use cadastre_core::{
    CancelToken, Dataset, Feature, FeatureId, IngestError, PropertyValue, SourceMetadata, Warning,
};
use std::collections::HashSet;

const CANCEL_POLL_INTERVAL: usize = 256;

/// Validate, reproject and number the features of `layer`.
///
/// Returns the dataset and every warning raised while reading and
/// assembling it, in the order they arose.
pub(crate) fn assemble(
    layer: RawLayer,
    cancel: &CancelToken,
) -> Result<(Dataset, Vec<Warning>), IngestError> {
    let RawLayer {
        format,
        filename,
        layer: layer_name,
        crs,
        features: raw,
        mut warnings,
    } = layer;

    let normalization = plan(&crs);
    if let Some(w) = normalization.warning {
        tracing::warn!(format = %format, "{w}");
        warnings.push(w);
    }

    let total = raw.len();
    let mut accepted: Vec<(Feature, Option<PropertyValue>)> = Vec::with_capacity(total);
    for (n, item) in raw.into_iter().enumerate() {
        if n % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        let mut geometry = match item.geometry {
            Ok(g) => g,
            Err(e) => {
                warnings.push(Warning::feature(item.key, format!("skipped: {e}")));
                continue;
            }
        };
        if let Some(transform) = &normalization.transform {
            transform.apply_to(&mut geometry);
        }
        match Feature::new(FeatureId(0), geometry, item.properties) {
            Ok(feature) => accepted.push((feature, item.source_id)),
            Err(e) => warnings.push(Warning::feature(item.key, format!("skipped: {e}"))),
        }
    }
    cancel.check()?;

    let skipped = total - accepted.len();
    if skipped > 0 {
        tracing::warn!(skipped, total, "features skipped during ingest");
    }

    let (features, id_warning) = assign_ids(accepted);
    warnings.extend(id_warning);

    let source = SourceMetadata {
        filename,
        layer: layer_name,
        format,
    };
    let dataset = Dataset::new(features, normalization.crs, Some(source))
        .map_err(|e| IngestError::format(e.to_string()))?;
    Ok((dataset, warnings))
}

/// Use source ids when every feature has a usable, unique one; otherwise
/// number features sequentially from 0 in source order.
fn assign_ids(accepted: Vec<(Feature, Option<PropertyValue>)>) -> (Vec<Feature>, Option<Warning>) {
    let any_present = accepted.iter().any(|(_, id)| id.is_some());
    let source_ids: Option<Vec<u64>> = accepted
        .iter()
        .map(|(_, id)| id.as_ref().and_then(PropertyValue::as_u64))
        .collect();
    let usable = source_ids.filter(|ids| {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter().all(|id| seen.insert(*id))
    });

    match usable {
        Some(ids) if !ids.is_empty() => {
            let features = accepted
                .into_iter()
                .zip(ids)
                .map(|((f, _), id)| f.with_id(FeatureId(id)))
                .collect();
            (features, None)
        }
        _ => {
            let features = accepted
                .into_iter()
                .enumerate()
                .map(|(i, (f, _))| f.with_id(FeatureId(i as u64)))
                .collect();
            let warning = any_present.then(|| {
                Warning::source(
                    "source feature ids are missing, non-integer or duplicated; ids assigned sequentially",
                )
            });
            (features, warning)
        }
    }
}
