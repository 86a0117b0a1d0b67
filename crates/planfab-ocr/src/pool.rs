//! Bounded OCR worker pool.
//!
//! Tesseract handles are not reentrant, so page-level OCR requests are
//! queued against a small fixed pool of worker threads, one engine per
//! worker, instead of spawning an engine per page. The jobs channel is
//! bounded by the pool size, which also bounds the number of raster
//! crops held in memory at any moment.
//!
//! Thread safety follows from owned job data (no shared mutable state),
//! crossbeam channels for message passing, and explicit error responses
//! from workers that could not bring up an engine.

use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use image::GrayImage;
use tracing::{debug, warn};

use crate::{OcrConfig, OcrEngine, OcrError};

/// A recognition request for one page.
#[derive(Debug)]
pub struct OcrJob {
    /// Caller-chosen identifier, echoed back in the outcome.
    pub id: usize,
    /// Preprocessed region to recognize.
    pub image: GrayImage,
}

/// The outcome of one recognition request.
#[derive(Debug)]
pub struct OcrOutcome {
    /// Identifier of the originating job.
    pub id: usize,
    /// Recognized fragments, or the failure that produced none.
    pub fragments: Result<Vec<String>, OcrError>,
}

/// Fixed-size pool of OCR workers fed over a bounded queue.
pub struct OcrPool {
    jobs: Option<Sender<OcrJob>>,
    results: Receiver<OcrOutcome>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl OcrPool {
    /// Start `workers` threads, each owning one Tesseract engine.
    ///
    /// An engine is probed on the calling thread first so that a missing
    /// language pack fails the request up front instead of surfacing as
    /// per-page failures.
    ///
    /// # Errors
    ///
    /// Returns [`OcrError::Init`] when no engine can be created.
    pub fn new(workers: usize, config: &OcrConfig) -> Result<Self, OcrError> {
        let workers = workers.max(1);

        // Fail fast before spawning anything.
        drop(OcrEngine::new(config)?);

        let (job_tx, job_rx) = bounded::<OcrJob>(workers);
        let (result_tx, result_rx) = unbounded::<OcrOutcome>();

        let handles = (0..workers)
            .map(|worker_id| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let config = config.clone();
                thread::spawn(move || worker_loop(worker_id, &config, &job_rx, &result_tx))
            })
            .collect();

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            workers: handles,
        })
    }

    /// Try to enqueue a job without blocking.
    ///
    /// Returns the job back when the queue is full so the caller can
    /// drain a result first and retry; the bounded queue is what caps
    /// raster memory.
    ///
    /// # Errors
    ///
    /// Returns the job on a full or disconnected queue.
    pub fn try_submit(&self, job: OcrJob) -> Result<(), OcrJob> {
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(job);
        };
        match jobs.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job) | TrySendError::Disconnected(job)) => Err(job),
        }
    }

    /// Wait for the next outcome until `deadline`.
    ///
    /// Returns `None` when the deadline passes or every worker has
    /// stopped.
    #[must_use = "a dropped outcome loses a page's OCR result"]
    pub fn recv_deadline(&self, deadline: std::time::Instant) -> Option<OcrOutcome> {
        self.results.recv_deadline(deadline).ok()
    }

    /// Collect an already-available outcome, if any.
    #[must_use = "a dropped outcome loses a page's OCR result"]
    pub fn try_recv(&self) -> Option<OcrOutcome> {
        self.results.try_recv().ok()
    }
}

impl Drop for OcrPool {
    fn drop(&mut self) {
        // Closing the jobs channel lets workers drain and exit.
        drop(self.jobs.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("OCR worker panicked during shutdown");
            }
        }
    }
}

/// Worker body: bring up an engine, then serve jobs until the queue
/// closes. A worker whose engine failed to start answers every job with
/// the initialization error instead of going dark.
fn worker_loop(
    worker_id: usize,
    config: &OcrConfig,
    jobs: &Receiver<OcrJob>,
    results: &Sender<OcrOutcome>,
) {
    let mut engine = match OcrEngine::new(config) {
        Ok(engine) => {
            debug!(worker_id, "OCR worker ready");
            Some(engine)
        }
        Err(e) => {
            warn!(worker_id, error = %e, "OCR worker failed to start engine");
            None
        }
    };

    for job in jobs.iter() {
        let outcome = match engine.as_mut() {
            Some(engine) => OcrOutcome {
                id: job.id,
                fragments: engine.recognize(&job.image),
            },
            None => OcrOutcome {
                id: job.id,
                fragments: Err(OcrError::Init {
                    language: config.language.clone(),
                    message: "engine unavailable on this worker".to_string(),
                }),
            },
        };

        // A send failure means the pool was dropped; nothing left to do.
        if results.send(outcome).is_err() {
            break;
        }
    }

    debug!(worker_id, "OCR worker stopped");
}
