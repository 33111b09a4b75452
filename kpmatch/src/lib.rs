//! # `kpmatch`
//!
//! Finds the image in a gallery that best matches a query image.
//!
//! Keypoints are detected and described in the query and in every gallery
//! ("train") image, each query descriptor is matched to its nearest train
//! descriptor, and the train image that collects the most matches wins. The
//! winner is shown with the system image viewer and a side-by-side match
//! image is written for every train image that could be loaded.
//!
//! Detectors, extractors and matchers are looked up by name in a
//! [`Registry`], so the whole run is driven by a [`Settings`] value:
//!
//! ```no_run
//! let settings = kpmatch::Settings::default();
//! let report = kpmatch::run(&settings, &mut kpmatch::NoDisplay).unwrap();
//! println!("best match: {}", report.best_name);
//! ```

mod akaze;
mod brief;
mod brute_force;
mod display;
mod error;
mod fast;
mod features;
mod flann;
mod ingest;
mod matching;
mod pipeline;
mod registry;
mod render;
mod selection;
mod settings;

pub use crate::akaze::{Akaze, AkazeDetector, AkazeExtractor};
pub use bitarray::BitArray;
pub use brief::BriefExtractor;
pub use brute_force::BruteForceMatcher;
pub use display::{Display, NoDisplay, SystemViewer};
pub use error::{AlgorithmKind, Error, Result};
pub use fast::FastDetector;
pub use features::{extract_features, Features};
pub use flann::FlannMatcher;
pub use ingest::{read_images, read_train_filenames, ImageSet, Manifest};
pub use matching::match_descriptors;
pub use pipeline::{run, run_with_registry, save_result_images, show_best_match, MatchReport};
pub use registry::{
    Capabilities, DescriptorExtractor, DescriptorMatcher, KeypointDetector, Registry,
};
pub use render::{draw_matches, RenderStyle};
pub use selection::{mask_matches, select_best, tally_matches};
pub use settings::Settings;

/// A binary descriptor.
///
/// All extractors produce 512 bit strings so that any extractor can be paired
/// with any matcher. Extractors that need fewer bits leave the rest zeroed.
pub type Descriptor = BitArray<64>;

/// A point of interest in an image.
/// This follows OpenCV conventions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    /// Pixel coordinates in the source image, +x right and +y down,
    /// starting from the top left corner.
    pub point: (f32, f32),
    /// The magnitude of response from the detector.
    pub response: f32,
    /// The diameter of the meaningful keypoint neighborhood, in pixels.
    pub size: f32,
    /// The orientation angle in radians.
    pub angle: f32,
    /// The level of scale space in which the keypoint was detected.
    pub octave: usize,
}

/// The nearest train descriptor of one query descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Row of the query descriptor.
    pub query_index: usize,
    /// Index of the train image (and of its descriptor collection).
    pub image_index: usize,
    /// Row of the descriptor within that train image.
    pub train_index: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}
