use crate::{Descriptor, DescriptorExtractor, KeyPoint};
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use log::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Test points are drawn from a square of this half width around the keypoint.
const PATCH_RADIUS: i32 = 15;
/// Rotated test points stay within this distance of the keypoint.
const BORDER: i32 = 22;
/// Number of intensity comparisons, one per descriptor bit.
const NUM_TESTS: usize = 512;
const SMOOTHING_SIGMA: f32 = 2.0;

/// Steered BRIEF: binary intensity comparisons on a smoothed patch, rotated
/// by the keypoint angle.
///
/// The comparison pattern is drawn from a seeded PRNG so that descriptors are
/// comparable across images and runs with the same seed.
#[derive(Debug, Clone)]
pub struct BriefExtractor {
    pattern: Vec<[(i32, i32); 2]>,
}

impl BriefExtractor {
    pub fn new(seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut offset = || {
            (
                rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
                rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS),
            )
        };
        let pattern = (0..NUM_TESTS).map(|_| [offset(), offset()]).collect();
        Self { pattern }
    }

    fn describe(&self, smoothed: &GrayImage, keypoint: &KeyPoint) -> Descriptor {
        let (x, y) = pixel(keypoint);
        let (sin, cos) = keypoint.angle.sin_cos();
        let sample = |(dx, dy): (i32, i32)| {
            let (dx, dy) = (dx as f32, dy as f32);
            let rx = (dx * cos - dy * sin).round() as i32;
            let ry = (dx * sin + dy * cos).round() as i32;
            smoothed.get_pixel((x + rx) as u32, (y + ry) as u32)[0]
        };
        let mut descriptor = Descriptor::zeros();
        let bytes = descriptor.bytes_mut();
        for (bit, &[a, b]) in self.pattern.iter().enumerate() {
            if sample(a) < sample(b) {
                bytes[bit >> 3] |= 1 << (bit & 7);
            }
        }
        descriptor
    }
}

fn pixel(keypoint: &KeyPoint) -> (i32, i32) {
    (
        keypoint.point.0.round() as i32,
        keypoint.point.1.round() as i32,
    )
}

impl DescriptorExtractor for BriefExtractor {
    fn name(&self) -> &str {
        "BRIEF"
    }

    fn compute(&self, image: &GrayImage, keypoints: &mut Vec<KeyPoint>) -> Vec<Descriptor> {
        let (width, height) = (image.width() as i32, image.height() as i32);
        let requested = keypoints.len();
        keypoints.retain(|keypoint| {
            let (x, y) = pixel(keypoint);
            x >= BORDER && y >= BORDER && x + BORDER < width && y + BORDER < height
        });
        if keypoints.len() != requested {
            debug!(
                "BRIEF dropped {} keypoints too close to the border",
                requested - keypoints.len()
            );
        }
        if keypoints.is_empty() {
            return vec![];
        }
        let smoothed = gaussian_blur_f32(image, SMOOTHING_SIGMA);
        keypoints
            .iter()
            .map(|keypoint| self.describe(&smoothed, keypoint))
            .collect()
    }
}
