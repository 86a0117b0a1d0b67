//! Pipeline orchestration: raster -> extract -> score -> rank.
//!
//! One document is processed per call. Pdfium work (rasterization,
//! native text) stays on the calling thread while OCR runs on the worker
//! pool, so page N's recognition overlaps page N+1's rasterization. Each
//! in-flight OCR job carries a deadline; a page that misses it is scored
//! at the floor and recorded as a timeout instead of stalling the
//! document. One bad page never aborts the request.
//!
//! The orchestrator is generic over [`PageSource`] and [`OcrScheduler`]
//! so tests drive it with deterministic fakes instead of pdfium and
//! Tesseract.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use planfab_backend::{line_features, PageRenderError, PdfiumDocument, PdfiumRasterizer, RasterPage};
use planfab_core::{
    rank_pages, DetectError, DetectionConfig, DetectionResult, FeatureScorer, LineFeatures,
    PageFailure, PageText, Result, ScoredPage,
};
use planfab_ocr::pool::{OcrJob, OcrOutcome, OcrPool};
use planfab_ocr::OcrConfig;

use crate::extract::{plan_extraction, Extraction};

/// Supplies rasterized pages for one document.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Rasterize one page and gather its native text candidate.
    ///
    /// # Errors
    ///
    /// Returns a page-scoped error; the orchestrator records it and
    /// continues with the remaining pages.
    fn acquire_page(&self, index: usize) -> std::result::Result<RasterPage, PageRenderError>;
}

/// Accepts OCR jobs and yields their outcomes.
///
/// `recv_deadline` must block until an outcome arrives or the deadline
/// passes; returning `None` before the deadline means the engine is gone
/// and no further outcomes will ever arrive.
pub trait OcrScheduler {
    /// Enqueue a job, or hand it back when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the job on a full or closed queue.
    fn try_submit(&self, job: OcrJob) -> std::result::Result<(), OcrJob>;

    /// Wait for the next outcome until `deadline`.
    fn recv_deadline(&self, deadline: Instant) -> Option<OcrOutcome>;

    /// Collect an already-available outcome, if any.
    fn try_recv(&self) -> Option<OcrOutcome>;
}

impl OcrScheduler for OcrPool {
    fn try_submit(&self, job: OcrJob) -> std::result::Result<(), OcrJob> {
        Self::try_submit(self, job)
    }

    fn recv_deadline(&self, deadline: Instant) -> Option<OcrOutcome> {
        Self::recv_deadline(self, deadline)
    }

    fn try_recv(&self) -> Option<OcrOutcome> {
        Self::try_recv(self)
    }
}

/// [`PageSource`] over one open pdfium document.
pub struct PdfiumPageSource<'a> {
    document: PdfiumDocument<'a>,
    dpi: f32,
}

impl PageSource for PdfiumPageSource<'_> {
    fn page_count(&self) -> usize {
        self.document.page_count()
    }

    fn acquire_page(&self, index: usize) -> std::result::Result<RasterPage, PageRenderError> {
        self.document.acquire_page(index, self.dpi)
    }
}

/// Everything known about one page once its processing finished.
struct PageOutcome {
    text: PageText,
    lines: LineFeatures,
    failure: Option<PageFailure>,
}

impl PageOutcome {
    fn render_failed() -> Self {
        Self {
            text: PageText::ocr_failed(),
            lines: LineFeatures::default(),
            failure: Some(PageFailure::Render),
        }
    }
}

/// Mutable state of one document's run: settled outcomes plus the
/// in-flight OCR bookkeeping.
struct DocumentRun<'a, Q: OcrScheduler> {
    ocr: &'a Q,
    timeout: Duration,
    outcomes: Vec<Option<PageOutcome>>,
    pending: HashMap<usize, Instant>,
    lines: HashMap<usize, LineFeatures>,
}

impl<'a, Q: OcrScheduler> DocumentRun<'a, Q> {
    fn new(ocr: &'a Q, timeout: Duration, page_count: usize) -> Self {
        Self {
            ocr,
            timeout,
            outcomes: (0..page_count).map(|_| None).collect(),
            pending: HashMap::new(),
            lines: HashMap::new(),
        }
    }

    fn record(&mut self, page: usize, outcome: PageOutcome) {
        if let Some(slot) = self.outcomes.get_mut(page) {
            *slot = Some(outcome);
        }
    }

    /// Submit an OCR job, making room by draining results or expiring
    /// deadlines while the bounded queue is full.
    fn submit(&mut self, page: usize, image: image::GrayImage, lines: LineFeatures) {
        self.lines.insert(page, lines);
        let mut job = OcrJob { id: page, image };
        loop {
            match self.ocr.try_submit(job) {
                Ok(()) => {
                    self.pending.insert(page, Instant::now() + self.timeout);
                    return;
                }
                Err(returned) => {
                    job = returned;
                    if !self.make_progress() {
                        warn!(page, "OCR scheduler unavailable, marking page failed");
                        let lines = self.lines.remove(&page).unwrap_or_default();
                        self.record(
                            page,
                            PageOutcome {
                                text: PageText::ocr_failed(),
                                lines,
                                failure: Some(PageFailure::OcrFailed),
                            },
                        );
                        return;
                    }
                }
            }
        }
    }

    /// Fold one OCR response into the run. Responses for pages that
    /// already timed out are discarded.
    fn settle(&mut self, response: OcrOutcome) {
        if self.pending.remove(&response.id).is_none() {
            debug!(page = response.id, "Discarding late OCR result for timed-out page");
            return;
        }
        let lines = self.lines.remove(&response.id).unwrap_or_default();
        let outcome = match response.fragments {
            Ok(fragments) => PageOutcome {
                text: PageText::ocr(fragments),
                lines,
                failure: None,
            },
            Err(e) => {
                warn!(page = response.id, error = %e, "OCR failed on page");
                PageOutcome {
                    text: PageText::ocr_failed(),
                    lines,
                    failure: Some(PageFailure::OcrFailed),
                }
            }
        };
        self.record(response.id, outcome);
    }

    /// Score a page that missed its deadline at the floor.
    fn expire(&mut self, page: usize) {
        warn!(page, "Page OCR missed its deadline");
        self.pending.remove(&page);
        let lines = self.lines.remove(&page).unwrap_or_default();
        self.record(
            page,
            PageOutcome {
                text: PageText::ocr_failed(),
                lines,
                failure: Some(PageFailure::Timeout),
            },
        );
    }

    fn earliest_pending(&self) -> Option<(usize, Instant)> {
        self.pending
            .iter()
            .map(|(&page, &deadline)| (page, deadline))
            .min_by_key(|&(_, deadline)| deadline)
    }

    /// Wait for one result or expire the earliest deadline.
    ///
    /// Returns false when no progress is possible: nothing is pending,
    /// or the scheduler returned early, meaning the engine is gone.
    fn make_progress(&mut self) -> bool {
        if let Some(outcome) = self.ocr.try_recv() {
            self.settle(outcome);
            return true;
        }
        let Some((page, deadline)) = self.earliest_pending() else {
            return false;
        };
        if Instant::now() >= deadline {
            self.expire(page);
            return true;
        }
        match self.ocr.recv_deadline(deadline) {
            Some(outcome) => {
                self.settle(outcome);
                true
            }
            None if Instant::now() >= deadline => {
                self.expire(page);
                true
            }
            None => false,
        }
    }

    /// Resolve every in-flight job: results, timeouts, or engine loss.
    fn drain(&mut self) {
        while !self.pending.is_empty() {
            if !self.make_progress() {
                let remaining: Vec<usize> = self.pending.keys().copied().collect();
                warn!(
                    pages = remaining.len(),
                    "OCR engine gone, failing remaining pages"
                );
                for page in remaining {
                    self.pending.remove(&page);
                    let lines = self.lines.remove(&page).unwrap_or_default();
                    self.record(
                        page,
                        PageOutcome {
                            text: PageText::ocr_failed(),
                            lines,
                            failure: Some(PageFailure::OcrFailed),
                        },
                    );
                }
            }
        }
    }

    /// Score all outcomes in page-index order.
    fn finish(self, scorer: &FeatureScorer) -> (Vec<ScoredPage>, Vec<usize>) {
        let mut scored = Vec::with_capacity(self.outcomes.len());
        let mut failed = Vec::new();
        for (page, slot) in self.outcomes.into_iter().enumerate() {
            let outcome = slot.unwrap_or_else(|| {
                debug_assert!(false, "page {page} finished without an outcome");
                PageOutcome::render_failed()
            });
            if let Some(failure) = outcome.failure {
                debug!(page, ?failure, "Page recorded as failed");
                failed.push(page);
            }
            let (score, features) = scorer.score_page(&outcome.text, &outcome.lines);
            scored.push(ScoredPage {
                page,
                score,
                features,
            });
        }
        (scored, failed)
    }
}

/// Run the per-page pipeline over an opened document and assemble the
/// ranked result.
///
/// Never fails: page-scoped problems degrade that page's score and land
/// in `failed_pages`. Fatal conditions (size limit, unparsable document)
/// are rejected by the caller before this point.
#[must_use = "the assembled detection result should be returned to the caller"]
pub fn run_detection<S, Q>(
    source: &S,
    ocr: &Q,
    scorer: &FeatureScorer,
    config: &DetectionConfig,
    started: Instant,
) -> DetectionResult
where
    S: PageSource,
    Q: OcrScheduler,
{
    let page_count = source.page_count();
    info!(page_count, "Processing document");

    let mut run = DocumentRun::new(ocr, config.page_timeout, page_count);

    for index in 0..page_count {
        let raster = match source.acquire_page(index) {
            Ok(raster) => raster,
            Err(e) => {
                warn!(page = index, error = %e, "Page failed to render");
                run.record(index, PageOutcome::render_failed());
                continue;
            }
        };

        let lines = line_features(&raster.image);

        match plan_extraction(&raster, config.min_text_density) {
            Extraction::Native(fragments) => {
                run.record(
                    index,
                    PageOutcome {
                        text: PageText::native(fragments),
                        lines,
                        failure: None,
                    },
                );
            }
            Extraction::NeedsOcr(region) => {
                // The full raster is released here; only the title-block
                // crop travels to the pool.
                run.submit(index, region, lines);
            }
        }

        while let Some(outcome) = ocr.try_recv() {
            run.settle(outcome);
        }
    }

    run.drain();

    let (scored, failed) = run.finish(scorer);
    let processing_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    rank_pages(scored, failed, page_count, config, processing_ms)
}

/// Reject oversized documents before any parsing.
fn enforce_size_limit(size_bytes: usize, config: &DetectionConfig) -> Result<()> {
    let limit_bytes = config.max_bytes();
    if size_bytes > limit_bytes {
        return Err(DetectError::DocumentTooLarge {
            size_bytes,
            limit_bytes,
        });
    }
    Ok(())
}

/// Fabrication-plan detector: the public entry point of the pipeline.
///
/// Owns the pdfium binding, the scorer and the OCR pool; one instance
/// serves many documents sequentially. Not `Sync`: use one detector per
/// thread for parallel batch work.
pub struct PlanDetector {
    config: DetectionConfig,
    scorer: FeatureScorer,
    rasterizer: PdfiumRasterizer,
    ocr: OcrPool,
}

impl PlanDetector {
    /// Create a detector for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration, pdfium binding, or OCR pool startup
    /// error. All of these are fatal; nothing is processed.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        let rasterizer = PdfiumRasterizer::new()?;
        let ocr_config = OcrConfig {
            language: config.ocr_language.clone(),
            ..OcrConfig::default()
        };
        let ocr = OcrPool::new(config.ocr_workers, &ocr_config)
            .map_err(|e| DetectError::OcrUnavailable(e.to_string()))?;

        Ok(Self {
            config,
            scorer: FeatureScorer::new(),
            rasterizer,
            ocr,
        })
    }

    /// The configuration this detector runs with.
    #[must_use = "configuration is returned but not used"]
    pub const fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect fabrication-plan pages in an in-memory PDF.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::DocumentTooLarge`] before any parsing when
    /// the byte length exceeds the limit, or
    /// [`DetectError::InvalidPdf`] when the stream is not a PDF.
    /// Page-scoped failures never surface here; they are listed in the
    /// result's `failed_pages`.
    pub fn detect(&self, bytes: &[u8]) -> Result<DetectionResult> {
        let started = Instant::now();
        enforce_size_limit(bytes.len(), &self.config)?;

        let document = self.rasterizer.open(bytes)?;
        let source = PdfiumPageSource {
            document,
            dpi: self.config.render_dpi,
        };

        Ok(run_detection(
            &source,
            &self.ocr,
            &self.scorer,
            &self.config,
            started,
        ))
    }

    /// Detect fabrication-plan pages in a PDF file.
    ///
    /// # Errors
    ///
    /// As [`detect`](Self::detect), plus I/O errors reading the file.
    pub fn detect_file(&self, path: &Path) -> Result<DetectionResult> {
        let bytes = std::fs::read(path)?;
        self.detect(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_rejects_oversized_document() {
        let config = DetectionConfig::default().with_max_pdf_mb(1.0);
        let result = enforce_size_limit(2 * 1024 * 1024, &config);
        match result {
            Err(DetectError::DocumentTooLarge {
                size_bytes,
                limit_bytes,
            }) => {
                assert_eq!(size_bytes, 2 * 1024 * 1024);
                assert_eq!(limit_bytes, 1024 * 1024);
            }
            _ => panic!("expected DocumentTooLarge"),
        }
    }

    #[test]
    fn test_size_limit_accepts_exact_limit() {
        let config = DetectionConfig::default().with_max_pdf_mb(1.0);
        assert!(enforce_size_limit(1024 * 1024, &config).is_ok());
    }
}
