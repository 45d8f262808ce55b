//! Background ingest: keep large uploads off the request path.
//!
//! ```text
//! Request thread                    Ingest thread
//!     |                                 |
//!     |--submit_load()----------------->| job_rx.recv()
//!     |   [job_tx: bounded(capacity)]   | service.load_with_cancel()
//!     |<--PendingIngest                 |   ingest, build index,
//!     |                                 |   publish on success
//!     |--wait_timeout(d)                |
//!     |   reply_rx.recv_timeout(d)  <---| reply_tx.send(result)
//!     |   on timeout: cancel, then      |
//!     |   collect the final result      |
//! ```

use crate::error::SessionError;
use crate::service::{CadastreService, IngestSummary};
use cadastre_core::CancelToken;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobKind {
    Load,
    Append,
}

struct Job {
    kind: JobKind,
    bytes: Vec<u8>,
    hint: Option<String>,
    cancel: CancelToken,
    reply: Sender<Result<IngestSummary, SessionError>>,
}

/// Handle to a submitted load or append.
///
/// Dropping the handle does not cancel the job; call
/// [`cancel`](Self::cancel) for that.
#[derive(Debug)]
pub struct PendingIngest {
    reply: Receiver<Result<IngestSummary, SessionError>>,
    cancel: CancelToken,
}

impl PendingIngest {
    /// Ask the job to stop. It publishes nothing once it observes this.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the job finishes.
    pub fn wait(self) -> Result<IngestSummary, SessionError> {
        self.reply.recv().map_err(|_| SessionError::WorkerShutdown)?
    }

    /// Block for at most `timeout`, then cancel.
    ///
    /// After cancelling, this waits for the job to acknowledge so the
    /// answer is exact: [`SessionError::Timeout`] means nothing was
    /// published. A job that finished between the deadline and the
    /// cancellation reports its real result.
    ///
    /// # Blocking
    ///
    /// `timeout` bounds the wait before cancelling, not the whole call.
    /// The acknowledgement arrives only once the worker reaches this job
    /// and observes the token: a job still queued behind a long load
    /// acknowledges after that load, and a running job only at its next
    /// cancellation check (between archive entries, every 256 features,
    /// before publishing). A single large zip entry or SQLite read is not
    /// interrupted. Callers that must not block past the deadline should
    /// [`cancel`](Self::cancel) and drop the handle instead.
    pub fn wait_timeout(self, timeout: Duration) -> Result<IngestSummary, SessionError> {
        match self.reply.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::WorkerShutdown),
            Err(RecvTimeoutError::Timeout) => {
                self.cancel.cancel();
                match self.reply.recv() {
                    Ok(Err(SessionError::Cancelled)) => Err(SessionError::Timeout { after: timeout }),
                    Ok(result) => result,
                    Err(_) => Err(SessionError::WorkerShutdown),
                }
            }
        }
    }
}

/// A named background thread running loads and appends one at a time.
///
/// Jobs run in submission order. Dropping the worker closes the queue,
/// lets queued jobs finish, and joins the thread.
#[derive(Debug)]
pub struct IngestWorker {
    jobs: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

// Compile-time assertion: worker handles must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<IngestWorker>();
    assert::<PendingIngest>();
};

impl IngestWorker {
    /// Start the worker thread for `service`, with the queue capacity
    /// from the service's configuration.
    pub fn spawn(service: Arc<CadastreService>) -> Result<Self, SessionError> {
        let capacity = service.config().worker.queue_capacity.max(1);
        let (jobs, job_rx) = crossbeam_channel::bounded::<Job>(capacity);
        let thread = thread::Builder::new()
            .name("cadastre-ingest".into())
            .spawn(move || worker_loop(&service, &job_rx))
            .map_err(SessionError::Spawn)?;
        Ok(Self {
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }

    /// Queue a [`CadastreService::load`].
    pub fn submit_load(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<PendingIngest, SessionError> {
        self.submit(JobKind::Load, bytes, hint, CancelToken::new())
    }

    /// [`submit_load`](Self::submit_load) observing a caller-held token,
    /// e.g. one shared with a request that may go away.
    pub fn submit_load_with_cancel(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
        cancel: CancelToken,
    ) -> Result<PendingIngest, SessionError> {
        self.submit(JobKind::Load, bytes, hint, cancel)
    }

    /// Queue a [`CadastreService::append`].
    pub fn submit_append(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<PendingIngest, SessionError> {
        self.submit(JobKind::Append, bytes, hint, CancelToken::new())
    }

    /// [`submit_append`](Self::submit_append) observing a caller-held token.
    pub fn submit_append_with_cancel(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
        cancel: CancelToken,
    ) -> Result<PendingIngest, SessionError> {
        self.submit(JobKind::Append, bytes, hint, cancel)
    }

    fn submit(
        &self,
        kind: JobKind,
        bytes: Vec<u8>,
        hint: Option<&str>,
        cancel: CancelToken,
    ) -> Result<PendingIngest, SessionError> {
        let jobs = self.jobs.as_ref().ok_or(SessionError::WorkerShutdown)?;
        let (reply, reply_rx) = crossbeam_channel::bounded(1);
        let job = Job {
            kind,
            bytes,
            hint: hint.map(str::to_owned),
            cancel: cancel.clone(),
            reply,
        };
        jobs.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::QueueFull,
            TrySendError::Disconnected(_) => SessionError::WorkerShutdown,
        })?;
        Ok(PendingIngest {
            reply: reply_rx,
            cancel,
        })
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::warn!("ingest worker thread panicked");
            }
        }
    }
}

fn worker_loop(service: &CadastreService, jobs: &Receiver<Job>) {
    for job in jobs.iter() {
        let result = if job.cancel.is_cancelled() {
            Err(SessionError::Cancelled)
        } else {
            let hint = job.hint.as_deref();
            match job.kind {
                JobKind::Load => service
                    .load_with_cancel(job.bytes, hint, &job.cancel)
                    .map(IngestSummary::Loaded),
                JobKind::Append => service
                    .append_with_cancel(job.bytes, hint, &job.cancel)
                    .map(IngestSummary::Appended),
            }
        };
        if let Err(e) = &result {
            tracing::warn!(kind = ?job.kind, error = %e, "background ingest failed");
        }
        // The submitter may have dropped its handle.
        let _ = job.reply.send(result);
    }
    tracing::debug!("ingest worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastre_test_utils::fixtures::feature_collection;
    use cadastre_test_utils::square_grid;

    fn grid_bytes(rows: usize, cols: usize) -> Vec<u8> {
        feature_collection(&square_grid(rows, cols)).into_bytes()
    }

    #[test]
    fn load_then_append_in_order() {
        let service = Arc::new(CadastreService::default());
        let worker = IngestWorker::spawn(Arc::clone(&service)).unwrap();
        let load = worker.submit_load(grid_bytes(2, 5), None).unwrap();
        let append = worker.submit_append(grid_bytes(1, 5), None).unwrap();
        assert!(matches!(load.wait().unwrap(), IngestSummary::Loaded(s) if s.feature_count == 10));
        match append.wait().unwrap() {
            IngestSummary::Appended(s) => assert_eq!(s.feature_count, 15),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(service.attributes().len(), 15);
    }

    #[test]
    fn cancelled_before_start_publishes_nothing() {
        let service = Arc::new(CadastreService::default());
        let worker = IngestWorker::spawn(Arc::clone(&service)).unwrap();
        let first = worker.submit_load(grid_bytes(3, 3), None).unwrap();
        // Cancelled before it is even queued, so the worker can only
        // ever see it cancelled.
        let token = CancelToken::new();
        token.cancel();
        let second = worker
            .submit_append_with_cancel(grid_bytes(2, 2), None, token)
            .unwrap();
        let third = worker.submit_append(grid_bytes(1, 1), None).unwrap();
        first.wait().unwrap();
        let err = second.wait().unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        // The worker keeps serving after a cancelled job.
        assert!(matches!(third.wait().unwrap(), IngestSummary::Appended(s) if s.feature_count == 10));
        assert_eq!(service.attributes().len(), 10);
    }

    #[test]
    fn caller_token_cancels_without_partial_publication() {
        let service = Arc::new(CadastreService::default());
        service.load(grid_bytes(2, 2), None).unwrap();
        let worker = IngestWorker::spawn(Arc::clone(&service)).unwrap();
        let token = CancelToken::new();
        let pending = worker
            .submit_load_with_cancel(grid_bytes(40, 40), None, token.clone())
            .unwrap();
        token.cancel();
        // Either cancelled in flight or, if it already finished, loaded whole.
        match pending.wait() {
            Err(SessionError::Cancelled) => assert_eq!(service.attributes().len(), 4),
            Ok(_) => assert_eq!(service.attributes().len(), 1600),
            Err(other) => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failures_are_reported_to_the_submitter() {
        let service = Arc::new(CadastreService::default());
        let worker = IngestWorker::spawn(Arc::clone(&service)).unwrap();
        let pending = worker.submit_load(b"PK\x03\x04 truncated".to_vec(), None).unwrap();
        let err = pending.wait_timeout(Duration::from_secs(30)).unwrap_err();
        assert!(matches!(err, SessionError::Ingest(_)));
        assert!(service.snapshot().is_none());
    }

    #[test]
    fn drop_joins_after_draining() {
        let service = Arc::new(CadastreService::default());
        let pending = {
            let worker = IngestWorker::spawn(Arc::clone(&service)).unwrap();
            worker.submit_load(grid_bytes(3, 3), None).unwrap()
        };
        assert!(pending.wait().is_ok());
        assert_eq!(service.attributes().len(), 9);
    }
}
