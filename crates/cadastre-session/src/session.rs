//! [`DatasetSession`]: owner of the live `(Dataset, SpatialIndex)` pair.
//!
//! # Publication protocol
//!
//! ```text
//! Writer (replace/append)              Readers
//!   lock writer mutex                    |
//!   build dataset + index aside          |--snapshot()--> clone Arc under
//!   cancel.check()                       |                read lock, release
//!   write-lock, swap Arc, unlock         |
//!   unlock writer mutex                  |  keep using the old Arc freely
//! ```
//!
//! The expensive work happens while only the writer mutex is held, so
//! readers never wait on an index build. The published pointer is locked
//! only for the duration of one `Arc` clone or one swap.

use crate::error::SessionError;
use crate::snapshot::Snapshot;
use cadastre_core::{CancelToken, Dataset, FeatureId, Warning};
use cadastre_index::{IndexConfig, SpatialIndex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Whether a dataset is published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet, or cleared.
    Empty,
    /// A snapshot is published.
    Loaded,
}

/// Result of [`DatasetSession::append`].
#[derive(Clone, Debug)]
pub struct AppendOutcome {
    /// The newly published snapshot.
    pub snapshot: Arc<Snapshot>,
    /// Number of features the append contributed.
    pub added: usize,
    /// `(original, assigned)` ids of appended features that were
    /// renumbered to avoid a collision.
    pub renumbered: Vec<(FeatureId, FeatureId)>,
    /// Merge warnings (renumbering, CRS mismatch).
    pub warnings: Vec<Warning>,
}

/// The session's single published snapshot and the writers that replace it.
///
/// State machine: `Empty -> Loaded` on the first successful
/// [`replace`](Self::replace) or [`append`](Self::append), `Loaded ->
/// Loaded` on every later one, `-> Empty` on [`clear`](Self::clear).
/// A write that fails or is cancelled publishes nothing.
#[derive(Debug, Default)]
pub struct DatasetSession {
    published: RwLock<Option<Arc<Snapshot>>>,
    writer: Mutex<()>,
    epoch: AtomicU64,
    index_config: IndexConfig,
}

// Compile-time assertion: DatasetSession must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<DatasetSession>();
    assert::<Snapshot>();
};

impl DatasetSession {
    /// An empty session using `index_config` for appends.
    pub fn new(index_config: IndexConfig) -> Self {
        Self {
            index_config,
            ..Self::default()
        }
    }

    /// The current snapshot, if any. Never blocks on a running write.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// [`SessionState::Loaded`] iff a snapshot is published.
    pub fn state(&self) -> SessionState {
        match self.snapshot() {
            Some(_) => SessionState::Loaded,
            None => SessionState::Empty,
        }
    }

    /// Number of publications so far, clears included.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Publish `dataset` in place of whatever is loaded.
    pub fn replace(&self, dataset: Dataset) -> Result<Arc<Snapshot>, SessionError> {
        self.replace_with_cancel(dataset, &CancelToken::new())
    }

    /// [`replace`](Self::replace), abandoned without publishing once
    /// `cancel` is set.
    pub fn replace_with_cancel(
        &self,
        dataset: Dataset,
        cancel: &CancelToken,
    ) -> Result<Arc<Snapshot>, SessionError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let index = SpatialIndex::build_with_cancel(&dataset, cancel)?;
        cancel.check()?;
        Ok(self.publish(dataset, index))
    }

    /// Merge `dataset` into the loaded one and publish the result.
    ///
    /// Appending to an empty session loads `dataset` as is.
    pub fn append(&self, dataset: Dataset) -> Result<AppendOutcome, SessionError> {
        self.append_with_cancel(dataset, &CancelToken::new())
    }

    /// [`append`](Self::append), abandoned without publishing once
    /// `cancel` is set.
    pub fn append_with_cancel(
        &self,
        dataset: Dataset,
        cancel: &CancelToken,
    ) -> Result<AppendOutcome, SessionError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let added = dataset.len();
        let (merged, index, renumbered, warnings) = match self.snapshot() {
            None => {
                let index = SpatialIndex::build_with_cancel(&dataset, cancel)?;
                (dataset, index, Vec::new(), Vec::new())
            }
            Some(current) => {
                let merged = current.dataset().merge(&dataset);
                let appended = &merged.dataset.features()[current.dataset().len()..];
                let index = current.index().extend_with_cancel(
                    &merged.dataset,
                    appended,
                    &self.index_config,
                    cancel,
                )?;
                tracing::debug!(strategy = ?index.strategy(), "index updated for append");
                (merged.dataset, index, merged.renumbered, merged.warnings)
            }
        };
        cancel.check()?;
        let snapshot = self.publish(merged, index);
        Ok(AppendOutcome {
            snapshot,
            added,
            renumbered,
            warnings,
        })
    }

    /// Discard the loaded dataset.
    pub fn clear(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let epoch = self.epoch() + 1;
        let previous = self.swap(None, epoch);
        tracing::info!(
            epoch,
            dropped = previous.as_ref().map_or(0, |s| s.dataset().len()),
            "session cleared"
        );
    }

    /// Wrap and publish a built pair. Caller holds the writer mutex.
    fn publish(&self, dataset: Dataset, index: SpatialIndex) -> Arc<Snapshot> {
        let epoch = self.epoch() + 1;
        let snapshot = Arc::new(Snapshot::new(dataset, index, epoch));
        self.swap(Some(Arc::clone(&snapshot)), epoch);
        tracing::info!(
            epoch,
            features = snapshot.dataset().len(),
            crs = %snapshot.dataset().crs(),
            "snapshot published"
        );
        snapshot
    }

    fn swap(&self, next: Option<Arc<Snapshot>>, epoch: u64) -> Option<Arc<Snapshot>> {
        let previous = {
            let mut slot = self
                .published
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, next)
        };
        self.epoch.store(epoch, Ordering::Release);
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastre_test_utils::{dataset_of, square_grid, unit_square};

    #[test]
    fn starts_empty() {
        let session = DatasetSession::default();
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.snapshot().is_none());
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn replace_publishes_and_bumps_epoch() {
        let session = DatasetSession::default();
        let first = session.replace(square_grid(2, 2)).unwrap();
        assert_eq!(first.epoch(), 1);
        assert_eq!(session.state(), SessionState::Loaded);

        let second = session.replace(square_grid(3, 3)).unwrap();
        assert_eq!(second.epoch(), 2);
        assert_eq!(session.snapshot().unwrap().dataset().len(), 9);
        // The old snapshot is untouched.
        assert_eq!(first.dataset().len(), 4);
        assert!(first.index().is_valid_for(first.dataset()));
    }

    #[test]
    fn append_renumbers_collisions() {
        let session = DatasetSession::default();
        session.replace(square_grid(2, 5)).unwrap();
        let extra = dataset_of((0..5).map(|i| (i, unit_square(i as f64, 10.0))).collect());
        let outcome = session.append(extra).unwrap();
        assert_eq!(outcome.added, 5);
        assert_eq!(outcome.renumbered.len(), 5);
        let ds = outcome.snapshot.dataset();
        assert_eq!(ds.len(), 15);
        assert!(outcome.snapshot.index().is_valid_for(ds));
        assert_eq!(outcome.snapshot.index().len(), 15);
    }

    #[test]
    fn append_to_empty_loads() {
        let session = DatasetSession::default();
        let outcome = session.append(square_grid(1, 3)).unwrap();
        assert!(outcome.renumbered.is_empty());
        assert_eq!(session.state(), SessionState::Loaded);
        assert_eq!(outcome.snapshot.dataset().len(), 3);
    }

    #[test]
    fn cancelled_write_publishes_nothing() {
        let session = DatasetSession::default();
        let before = session.replace(square_grid(2, 2)).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = session
            .replace_with_cancel(square_grid(4, 4), &token)
            .unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        let err = session
            .append_with_cancel(square_grid(1, 1), &token)
            .unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        let after = session.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(session.epoch(), 1);
    }

    #[test]
    fn clear_returns_to_empty() {
        let session = DatasetSession::default();
        session.replace(square_grid(2, 2)).unwrap();
        session.clear();
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.epoch(), 2);
    }
}
