//! Ordered, lazy enumeration of page images to decode.
//!
//! Two phases:
//! - lower-half scan: pages last to first, each zoom level ascending, bottom
//!   half of the rendered page;
//! - exhaustive scan: pages last to first, every embedded raster image on the
//!   page, then the full page at each zoom level.
//!
//! Every image is preprocessed before it is yielded. A candidate that fails
//! to render is skipped; a page whose embedded images cannot be enumerated
//! loses only those candidates.

use image::{DynamicImage, GenericImageView, GrayImage};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

use super::preprocess::CandidatePreprocessor;
use crate::pdf::PageSource;

/// Which of the two search phases a candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LowerHalf,
    Exhaustive,
}

/// Where on a page a candidate image came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// Bottom half of the page rendered at `zoom`.
    LowerHalf { zoom: f32 },
    /// The `index`-th embedded raster image of the page.
    Embedded { index: usize },
    /// Whole page rendered at `zoom`.
    FullPage { zoom: f32 },
}

impl Region {
    pub fn phase(&self) -> Phase {
        match self {
            Region::LowerHalf { .. } => Phase::LowerHalf,
            Region::Embedded { .. } | Region::FullPage { .. } => Phase::Exhaustive,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::LowerHalf { zoom } => write!(f, "lower half @ {}x", zoom),
            Region::Embedded { index } => write!(f, "embedded image #{}", index),
            Region::FullPage { zoom } => write!(f, "full page @ {}x", zoom),
        }
    }
}

/// A preprocessed image ready for the decoder chain.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 0-based page index.
    pub page: usize,
    pub region: Region,
    pub image: GrayImage,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    LowerHalf { page: usize, zoom: f32 },
    Embedded { page: usize },
    FullPage { page: usize, zoom: f32 },
}

/// Lazy iterator over [`Candidate`]s for one phase.
pub struct CandidateGenerator<S: PageSource> {
    source: S,
    preprocessor: CandidatePreprocessor,
    steps: VecDeque<Step>,
    /// Embedded images of the current page not yet yielded.
    pending: VecDeque<(usize, usize, DynamicImage)>,
}

impl<S: PageSource> CandidateGenerator<S> {
    /// Create a generator for one phase over `source`.
    pub fn new(
        source: S,
        phase: Phase,
        zoom_levels: &[f32],
        preprocessor: CandidatePreprocessor,
    ) -> Self {
        let pages = source.page_count();
        let mut steps = VecDeque::new();

        for page in (0..pages).rev() {
            match phase {
                Phase::LowerHalf => {
                    steps.extend(zoom_levels.iter().map(|&zoom| Step::LowerHalf { page, zoom }));
                }
                Phase::Exhaustive => {
                    steps.push_back(Step::Embedded { page });
                    steps.extend(zoom_levels.iter().map(|&zoom| Step::FullPage { page, zoom }));
                }
            }
        }

        debug!("{:?} phase planned with {} steps over {} pages", phase, steps.len(), pages);
        Self {
            source,
            preprocessor,
            steps,
            pending: VecDeque::new(),
        }
    }

    /// Lower-half phase.
    pub fn lower_half(source: S, zoom_levels: &[f32], preprocessor: CandidatePreprocessor) -> Self {
        Self::new(source, Phase::LowerHalf, zoom_levels, preprocessor)
    }

    /// Exhaustive phase.
    pub fn exhaustive(source: S, zoom_levels: &[f32], preprocessor: CandidatePreprocessor) -> Self {
        Self::new(source, Phase::Exhaustive, zoom_levels, preprocessor)
    }

    fn candidate(&self, page: usize, region: Region, image: &DynamicImage) -> Candidate {
        Candidate {
            page,
            region,
            image: self.preprocessor.prepare(image),
        }
    }
}

impl<S: PageSource> Iterator for CandidateGenerator<S> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some((page, index, image)) = self.pending.pop_front() {
                return Some(self.candidate(page, Region::Embedded { index }, &image));
            }

            match self.steps.pop_front()? {
                Step::LowerHalf { page, zoom } => match self.source.render(page, zoom) {
                    Ok(rendered) => {
                        let half = lower_half(&rendered);
                        return Some(self.candidate(page, Region::LowerHalf { zoom }, &half));
                    }
                    Err(e) => debug!("Skipping page {} lower half at zoom {}: {}", page, zoom, e),
                },
                Step::Embedded { page } => match self.source.embedded_images(page) {
                    Ok(images) => {
                        trace!("Page {} has {} embedded images", page, images.len());
                        self.pending.extend(
                            images.into_iter().enumerate().map(|(index, img)| (page, index, img)),
                        );
                    }
                    Err(e) => debug!("Skipping embedded images of page {}: {}", page, e),
                },
                Step::FullPage { page, zoom } => match self.source.render(page, zoom) {
                    Ok(rendered) => {
                        return Some(self.candidate(page, Region::FullPage { zoom }, &rendered));
                    }
                    Err(e) => debug!("Skipping page {} at zoom {}: {}", page, zoom, e),
                },
            }
        }
    }
}

/// Bottom half of an image: rows from `height / 2` to the end, full width.
pub fn lower_half(image: &DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    let top = height / 2;
    image.crop_imm(0, top, width, height - top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::pdf;
    use image::Luma;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    const ZOOMS: [f32; 3] = [4.0, 6.0, 8.0];

    /// Page source that records calls and serves blank pages.
    struct RecordingSource {
        pages: usize,
        embedded: Vec<usize>,
        fail_render: Vec<(usize, f32)>,
        fail_embedded: Vec<usize>,
        calls: RefCell<Vec<String>>,
    }

    impl RecordingSource {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                embedded: vec![0; pages],
                fail_render: Vec::new(),
                fail_embedded: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PageSource for RecordingSource {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render(&self, page: usize, zoom: f32) -> pdf::Result<DynamicImage> {
            self.calls.borrow_mut().push(format!("render {} {}", page, zoom));
            if self.fail_render.contains(&(page, zoom)) {
                return Err(PdfError::Render {
                    page,
                    zoom,
                    reason: "boom".to_string(),
                });
            }
            Ok(DynamicImage::ImageLuma8(GrayImage::new(10, 7)))
        }

        fn embedded_images(&self, page: usize) -> pdf::Result<Vec<DynamicImage>> {
            self.calls.borrow_mut().push(format!("embedded {}", page));
            if self.fail_embedded.contains(&page) {
                return Err(PdfError::ImageExtraction("broken".to_string()));
            }
            Ok((0..self.embedded[page])
                .map(|_| DynamicImage::ImageLuma8(GrayImage::new(3, 3)))
                .collect())
        }
    }

    fn order<S: PageSource>(generator: CandidateGenerator<S>) -> Vec<(usize, Region)> {
        generator.map(|c| (c.page, c.region)).collect()
    }

    #[test]
    fn test_lower_half_visits_pages_last_first() {
        let source = RecordingSource::new(3);
        let got = order(CandidateGenerator::lower_half(
            &source,
            &ZOOMS,
            CandidatePreprocessor::new(),
        ));

        let mut expected = Vec::new();
        for page in [2, 1, 0] {
            for zoom in ZOOMS {
                expected.push((page, Region::LowerHalf { zoom }));
            }
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_exhaustive_embedded_before_full_page() {
        let mut source = RecordingSource::new(2);
        source.embedded = vec![1, 2];
        let got = order(CandidateGenerator::exhaustive(
            &source,
            &ZOOMS,
            CandidatePreprocessor::new(),
        ));

        assert_eq!(
            got,
            vec![
                (1, Region::Embedded { index: 0 }),
                (1, Region::Embedded { index: 1 }),
                (1, Region::FullPage { zoom: 4.0 }),
                (1, Region::FullPage { zoom: 6.0 }),
                (1, Region::FullPage { zoom: 8.0 }),
                (0, Region::Embedded { index: 0 }),
                (0, Region::FullPage { zoom: 4.0 }),
                (0, Region::FullPage { zoom: 6.0 }),
                (0, Region::FullPage { zoom: 8.0 }),
            ]
        );
    }

    #[test]
    fn test_failures_skip_only_the_affected_candidates() {
        let mut source = RecordingSource::new(2);
        source.embedded = vec![1, 1];
        source.fail_render = vec![(1, 6.0)];
        source.fail_embedded = vec![1];

        let got = order(CandidateGenerator::exhaustive(
            &source,
            &ZOOMS,
            CandidatePreprocessor::new(),
        ));

        assert_eq!(
            got,
            vec![
                (1, Region::FullPage { zoom: 4.0 }),
                (1, Region::FullPage { zoom: 8.0 }),
                (0, Region::Embedded { index: 0 }),
                (0, Region::FullPage { zoom: 4.0 }),
                (0, Region::FullPage { zoom: 6.0 }),
                (0, Region::FullPage { zoom: 8.0 }),
            ]
        );
    }

    #[test]
    fn test_generation_is_lazy() {
        let source = RecordingSource::new(3);
        let mut generator =
            CandidateGenerator::lower_half(&source, &ZOOMS, CandidatePreprocessor::new());

        let first = generator.next().unwrap();
        assert_eq!(first.page, 2);
        assert_eq!(source.calls.borrow().clone(), vec!["render 2 4".to_string()]);
    }

    #[test]
    fn test_candidates_are_preprocessed() {
        let source = RecordingSource::new(1);
        let first = CandidateGenerator::lower_half(&source, &ZOOMS, CandidatePreprocessor::new())
            .next()
            .unwrap();
        // 10x7 page -> 10x4 lower half -> 20x8 after 2x upscale
        assert_eq!(first.image.dimensions(), (20, 8));
    }

    #[test]
    fn test_lower_half_crop_uses_integer_midpoint() {
        let mut img = GrayImage::new(4, 5);
        for y in 2..5 {
            for x in 0..4 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let half = lower_half(&DynamicImage::ImageLuma8(img)).to_luma8();

        assert_eq!(half.dimensions(), (4, 3));
        assert!(half.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_empty_document_yields_nothing() {
        let source = RecordingSource::new(0);
        assert_eq!(
            CandidateGenerator::exhaustive(&source, &ZOOMS, CandidatePreprocessor::new()).count(),
            0
        );
    }
}
