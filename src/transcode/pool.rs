//! Bounded transcode worker pool.
//!
//! Transcoding is CPU-bound, so it runs on the blocking thread pool behind two
//! semaphores:
//!
//! - **Admission** (`workers + queue_depth` permits): one permit per import
//!   request. When none is free the request is rejected immediately with
//!   [`ImportError::Overloaded`] instead of piling up.
//! - **Workers** (`workers` permits): one permit per file being transcoded.
//!   Admitted requests wait here for a free worker.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{ImportError, ProcessingError};

use super::encoder::{Transcoded, Transcoder};

/// Default admission queue depth beyond the worker count.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Default worker count: available parallelism, or 4 if unknown.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// One uploaded file awaiting transcode.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub filename: String,
    pub data: Bytes,
}

/// Bounded pool running [`Transcoder`] jobs.
#[derive(Clone)]
pub struct TranscodePool {
    transcoder: Arc<Transcoder>,
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    admission_capacity: usize,
    worker_count: usize,
}

impl TranscodePool {
    /// Create a pool with `workers` concurrent transcodes and room for
    /// `queue_depth` additional waiting requests.
    pub fn new(transcoder: Transcoder, workers: usize, queue_depth: usize) -> Self {
        let worker_count = workers.max(1);
        let admission_capacity = worker_count + queue_depth;
        Self {
            transcoder: Arc::new(transcoder),
            admission: Arc::new(Semaphore::new(admission_capacity)),
            workers: Arc::new(Semaphore::new(worker_count)),
            admission_capacity,
            worker_count,
        }
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    /// Requests currently admitted (running or queued).
    pub fn in_flight(&self) -> usize {
        self.admission_capacity - self.admission.available_permits()
    }

    /// Files currently being transcoded.
    pub fn busy_workers(&self) -> usize {
        self.worker_count - self.workers.available_permits()
    }

    /// Admit one request, or reject it if the queue is full.
    pub fn admit(&self) -> Result<OwnedSemaphorePermit, ImportError> {
        Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| {
                let in_flight = self.in_flight();
                warn!(in_flight, "Transcode queue full, rejecting request");
                ImportError::Overloaded { in_flight }
            })
    }

    /// Transcode every file of a batch. All-or-nothing: the first failure
    /// abandons the remaining jobs and is returned with the file's index.
    ///
    /// The returned encodings are in input order.
    ///
    /// Jobs still waiting for a worker are cancelled on failure. Jobs already
    /// transcoding cannot be interrupted, so they keep their worker permit and
    /// the request's admission permit until the blocking work ends.
    pub async fn transcode_batch(
        &self,
        files: Vec<SourceImage>,
    ) -> Result<Vec<Transcoded>, ImportError> {
        let admission = Arc::new(self.admit()?);
        let count = files.len();

        let mut jobs = JoinSet::new();
        let mut filenames = Vec::with_capacity(count);

        for (index, file) in files.into_iter().enumerate() {
            filenames.push(file.filename.clone());
            let job = Job {
                transcoder: Arc::clone(&self.transcoder),
                workers: Arc::clone(&self.workers),
                admission: Arc::clone(&admission),
                data: file.data,
            };

            jobs.spawn(async move { (index, job.run().await) });
        }
        drop(admission);

        let mut results: Vec<Option<Transcoded>> = vec![None; count];

        while let Some(joined) = jobs.join_next().await {
            let (index, result) = joined.map_err(|e| ImportError::Worker {
                message: e.to_string(),
            })?;

            match result {
                Ok(transcoded) => results[index] = Some(transcoded),
                Err(source) => {
                    jobs.abort_all();
                    return Err(ImportError::Processing {
                        index,
                        filename: filenames[index].clone(),
                        source,
                    });
                }
            }
        }

        debug!(files = count, "Transcoded batch");
        Ok(results.into_iter().flatten().collect())
    }
}

/// One file of an admitted batch.
struct Job {
    transcoder: Arc<Transcoder>,
    workers: Arc<Semaphore>,
    admission: Arc<OwnedSemaphorePermit>,
    data: Bytes,
}

impl Job {
    async fn run(self) -> Result<Transcoded, ProcessingError> {
        let worker = self
            .workers
            .acquire_owned()
            .await
            .map_err(|e| ProcessingError::Worker {
                message: e.to_string(),
            })?;

        let Job {
            transcoder,
            admission,
            data,
            ..
        } = self;

        // Both permits live until the transcode returns, even if the awaiting
        // task is aborted.
        tokio::task::spawn_blocking(move || {
            let _permits = (worker, admission);
            transcoder.transcode(&data)
        })
        .await
        .map_err(|e| ProcessingError::Worker {
            message: e.to_string(),
        })?
    }
}
