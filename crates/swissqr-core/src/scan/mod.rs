//! Scan orchestration: candidates → decoder chain → SPC parser → artifact.
//!
//! A scan walks an explicit state machine:
//!
//! ```text
//! SearchingPhase1 ─▶ SearchingPhase2 ─▶ ExhaustedNoHeuristic ─▶ HeuristicSearch ─▶ Done
//!        └──────────────────┴──▶ Found ───────────────────────────────────────────▶ Done
//! ```
//!
//! The first candidate whose decoded text parses ends the search. Every
//! terminal branch leaves exactly one result artifact for the document.

pub mod candidates;
pub mod preprocess;

pub use candidates::{Candidate, CandidateGenerator, Phase, Region};
pub use preprocess::CandidatePreprocessor;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::artifact::{self, ArtifactKind, ErrorArtifact, FallbackArtifact, QrArtifact};
use crate::decoder::{Decoded, DecoderChain};
use crate::error::Result;
use crate::heuristic;
use crate::models::config::ScanConfig;
use crate::models::invoice::{Invoice, InvoiceStub};
use crate::models::scan::{ScanMethod, ScanResult, ScannedInvoice};
use crate::payload::parse_swiss_qr;
use crate::pdf::{PageSource, PdfDocument};

/// A decoded and parsed payload.
#[derive(Debug, Clone)]
struct Hit {
    decoded: Decoded,
    invoice: Invoice,
    page: usize,
    region: Region,
}

/// Scan state. Search states own the candidate iterator of their phase.
enum ScanState<S: PageSource> {
    SearchingPhase1(CandidateGenerator<S>),
    SearchingPhase2(CandidateGenerator<S>),
    Found(Hit),
    ExhaustedNoHeuristic,
    HeuristicSearch(ScanResult),
    Done(ScanResult),
}

/// Document scanner.
///
/// Holds the decoder chain and configuration; both are read-only, so one
/// scanner can be shared across threads for concurrent scans.
pub struct Scanner {
    chain: DecoderChain,
    config: ScanConfig,
}

impl Scanner {
    /// Create a scanner, building the decoder chain from configuration.
    pub fn new(config: ScanConfig) -> Self {
        let chain = DecoderChain::from_config(&config.decoders);
        Self { chain, config }
    }

    /// Create a scanner with an explicit decoder chain.
    pub fn with_chain(chain: DecoderChain, config: ScanConfig) -> Self {
        Self { chain, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn chain(&self) -> &DecoderChain {
        &self.chain
    }

    /// Scan a PDF file and write the result artifact into `output_dir`.
    pub fn scan(&self, document: &Path, output_dir: &Path, heuristic: bool) -> Result<ScanResult> {
        let pdf = PdfDocument::open(document, &self.config.pdf)?;
        let stem = document_stem(document);
        self.scan_source(&pdf, &stem, output_dir, heuristic)
    }

    /// Scan an already-open document.
    pub fn scan_source<S: PageSource>(
        &self,
        source: &S,
        stem: &str,
        output_dir: &Path,
        heuristic: bool,
    ) -> Result<ScanResult> {
        std::fs::create_dir_all(output_dir)?;
        info!("Scanning {} ({} pages)", stem, source.page_count());

        let zooms = &self.config.scan.zoom_levels;
        let preprocessor = CandidatePreprocessor::from_config(&self.config.scan);
        let mut examined = 0usize;

        let mut state = ScanState::SearchingPhase1(CandidateGenerator::lower_half(
            source,
            zooms,
            preprocessor.clone(),
        ));

        loop {
            state = match state {
                ScanState::SearchingPhase1(mut candidates) => {
                    match self.next_candidate(&mut candidates, &mut examined) {
                        Some(candidate) => match self.try_candidate(candidate) {
                            Some(hit) => ScanState::Found(hit),
                            None => ScanState::SearchingPhase1(candidates),
                        },
                        None if self.budget_spent(examined) => ScanState::ExhaustedNoHeuristic,
                        None => {
                            debug!("Lower-half scan of {} exhausted", stem);
                            ScanState::SearchingPhase2(CandidateGenerator::exhaustive(
                                source,
                                zooms,
                                preprocessor.clone(),
                            ))
                        }
                    }
                }
                ScanState::SearchingPhase2(mut candidates) => {
                    match self.next_candidate(&mut candidates, &mut examined) {
                        Some(candidate) => match self.try_candidate(candidate) {
                            Some(hit) => ScanState::Found(hit),
                            None => ScanState::SearchingPhase2(candidates),
                        },
                        None => ScanState::ExhaustedNoHeuristic,
                    }
                }
                ScanState::Found(hit) => ScanState::Done(self.write_found(hit, stem, output_dir)?),
                ScanState::ExhaustedNoHeuristic => {
                    let result = self.write_no_code(stem, output_dir)?;
                    if heuristic {
                        ScanState::HeuristicSearch(result)
                    } else {
                        ScanState::Done(result)
                    }
                }
                ScanState::HeuristicSearch(no_code) => {
                    let patterns = &self.config.heuristic.artifact_patterns;
                    match heuristic::find_iban_in_dir(output_dir, patterns) {
                        Some(iban) => ScanState::Done(self.write_fallback(&iban, stem, output_dir)?),
                        None => {
                            debug!("Heuristic found no IBAN for {}", stem);
                            ScanState::Done(no_code)
                        }
                    }
                }
                ScanState::Done(result) => {
                    info!(
                        "Scan of {} finished: method={}, candidates={}",
                        stem, result.method, examined
                    );
                    return Ok(result);
                }
            };
        }
    }

    fn budget_spent(&self, examined: usize) -> bool {
        self.config
            .scan
            .max_candidates
            .is_some_and(|max| examined >= max)
    }

    /// Next candidate, unless the candidate budget is spent.
    fn next_candidate<S: PageSource>(
        &self,
        candidates: &mut CandidateGenerator<S>,
        examined: &mut usize,
    ) -> Option<Candidate> {
        if self.budget_spent(*examined) {
            debug!("Candidate budget of {} reached", examined);
            return None;
        }
        let candidate = candidates.next()?;
        *examined += 1;
        Some(candidate)
    }

    /// Decode and parse one candidate. A payload that does not parse is a
    /// non-match.
    fn try_candidate(&self, candidate: Candidate) -> Option<Hit> {
        let decoded = self.chain.decode(&candidate.image)?;
        match parse_swiss_qr(&decoded.text) {
            Ok(invoice) => {
                debug!(
                    "Decoded SPC payload on page {} ({}) with {:?}",
                    candidate.page, candidate.region, decoded.kind
                );
                Some(Hit {
                    decoded,
                    invoice,
                    page: candidate.page,
                    region: candidate.region,
                })
            }
            Err(e) => {
                warn!(
                    "SPC payload on page {} ({}) did not parse: {}",
                    candidate.page, candidate.region, e
                );
                None
            }
        }
    }

    fn write_found(&self, hit: Hit, stem: &str, output_dir: &Path) -> Result<ScanResult> {
        let method = ScanMethod::from(hit.decoded.kind);
        info!("QR-bill found on page {} ({}) via {}", hit.page, hit.region, method);

        let path = ArtifactKind::Qr.path(output_dir, stem);
        artifact::write_json(
            &path,
            &QrArtifact {
                raw_qr_text: hit.decoded.text.clone(),
                parsed_invoice: hit.invoice.clone(),
            },
        )?;
        clear_stale(output_dir, stem, ArtifactKind::Qr);

        Ok(ScanResult {
            qr_text: Some(hit.decoded.text),
            method,
            invoice: Some(ScannedInvoice::Parsed(hit.invoice)),
            output_file: path,
        })
    }

    fn write_no_code(&self, stem: &str, output_dir: &Path) -> Result<ScanResult> {
        info!("No QR code found in {}", stem);

        let path = ArtifactKind::Error.path(output_dir, stem);
        artifact::write_json(&path, &ErrorArtifact::no_code_found())?;
        clear_stale(output_dir, stem, ArtifactKind::Error);

        Ok(ScanResult {
            qr_text: None,
            method: ScanMethod::None,
            invoice: None,
            output_file: path,
        })
    }

    fn write_fallback(&self, iban: &str, stem: &str, output_dir: &Path) -> Result<ScanResult> {
        info!("Heuristic IBAN {} found for {}", heuristic::format_iban(iban), stem);

        let path = ArtifactKind::Fallback.path(output_dir, stem);
        artifact::write_json(&path, &FallbackArtifact::from_iban(iban))?;
        clear_stale(output_dir, stem, ArtifactKind::Fallback);

        Ok(ScanResult {
            qr_text: None,
            method: ScanMethod::Heuristic,
            invoice: Some(ScannedInvoice::Heuristic(InvoiceStub::from_iban(iban))),
            output_file: path,
        })
    }
}

/// Remove this document's artifacts other than `keep`.
fn clear_stale(output_dir: &Path, stem: &str, keep: ArtifactKind) {
    for kind in [ArtifactKind::Qr, ArtifactKind::Error, ArtifactKind::Fallback] {
        if kind == keep {
            continue;
        }
        let path = kind.path(output_dir, stem);
        if path.exists() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) => warn!("Failed to remove stale {}: {}", path.display(), e),
            }
        }
    }
}

/// Base file name without extension.
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
