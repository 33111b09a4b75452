//! AKAZE features: a nonlinear scale space built by fast explicit
//! diffusion, the scale normalized Hessian determinant as detector response,
//! and the M-LDB binary descriptor.

mod descriptor;
mod detector;
mod filter;
mod scale_space;

use crate::{Descriptor, DescriptorExtractor, KeyPoint, KeypointDetector};
use image::GrayImage;
use log::*;
use scale_space::ScaleSpace;

/// Contains the configuration parameters of AKAZE.
///
/// The most important parameter to pay attention to is `detector_threshold`.
/// [`Akaze::new`] sets it and leaves everything else at its default.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Akaze {
    /// Number of sublevels per octave.
    pub num_sublevels: u32,
    /// Maximum number of octaves.
    pub max_octave_evolution: u32,
    /// Scale of the first level, in pixels.
    pub base_scale_offset: f64,
    /// Percentile of the gradient histogram that sets the contrast factor.
    pub contrast_percentile: f64,
    /// Number of bins of the gradient histogram.
    pub contrast_bins: usize,
    /// Ratio of the derivative filter scale to the level scale.
    pub derivative_factor: f64,
    /// Minimum detector response of a keypoint.
    pub detector_threshold: f64,
    /// Half width of the descriptor pattern in keypoint radii.
    pub pattern_size: usize,
}

impl Akaze {
    pub fn new(threshold: f64) -> Self {
        Self {
            detector_threshold: threshold,
            ..Default::default()
        }
    }
}

impl Default for Akaze {
    fn default() -> Self {
        Self {
            num_sublevels: 4,
            max_octave_evolution: 4,
            base_scale_offset: 1.6,
            contrast_percentile: 0.7,
            contrast_bins: 300,
            derivative_factor: 1.5,
            detector_threshold: 0.001,
            pattern_size: 10,
        }
    }
}

/// The AKAZE detector: extrema of the Hessian response in a nonlinear scale space.
#[derive(Debug, Clone, Copy)]
pub struct AkazeDetector {
    akaze: Akaze,
}

impl AkazeDetector {
    pub fn new(threshold: f64) -> Self {
        Self::with_config(Akaze::new(threshold))
    }

    pub fn with_config(akaze: Akaze) -> Self {
        Self { akaze }
    }
}

impl KeypointDetector for AkazeDetector {
    fn name(&self) -> &str {
        "AKAZE"
    }

    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let space = ScaleSpace::new(&self.akaze, image);
        if space.is_empty() {
            return vec![];
        }
        let keypoints = detector::detect(&self.akaze, &space);
        trace!("AKAZE found {} keypoints", keypoints.len());
        keypoints
    }
}

/// The AKAZE M-LDB binary descriptor.
///
/// Each keypoint is described on the scale space level whose keypoint size is
/// closest to its own. The sampling pattern spans `pattern_size` keypoint
/// radii on each side and must lie inside that level, which every keypoint
/// [`AkazeDetector`] reports does. Keypoints from other detectors are usually
/// much larger (FAST reports 31 pixels) and are mostly dropped.
#[derive(Debug, Clone, Copy)]
pub struct AkazeExtractor {
    akaze: Akaze,
}

impl AkazeExtractor {
    pub fn new(threshold: f64) -> Self {
        Self::with_config(Akaze::new(threshold))
    }

    pub fn with_config(akaze: Akaze) -> Self {
        Self { akaze }
    }
}

impl DescriptorExtractor for AkazeExtractor {
    fn name(&self) -> &str {
        "AKAZE"
    }

    fn compute(&self, image: &GrayImage, keypoints: &mut Vec<KeyPoint>) -> Vec<Descriptor> {
        let space = ScaleSpace::new(&self.akaze, image);
        let requested = keypoints.len();
        let mut descriptors = Vec::with_capacity(requested);
        keypoints.retain(|keypoint| {
            let described = space
                .level_for(&self.akaze, keypoint.size)
                .and_then(|level| {
                    descriptor::describe(&self.akaze, &space.evolutions[level], keypoint)
                });
            match described {
                Some(descriptor) => {
                    descriptors.push(descriptor);
                    true
                }
                None => false,
            }
        });
        if keypoints.len() != requested {
            warn!(
                "AKAZE dropped {} of {} keypoints whose descriptor pattern leaves the image; \
                 AKAZE descriptors only support keypoints of AKAZE's own sizes",
                requested - keypoints.len(),
                requested
            );
        }
        descriptors
    }
}
