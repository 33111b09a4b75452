use crate::{Descriptor, DescriptorExtractor, ImageSet, KeyPoint, KeypointDetector};
use log::*;

/// Keypoints and descriptors of the query and of every train slot.
///
/// Descriptor `i` of an image always belongs to keypoint `i` of that image.
/// Train vectors have one entry per slot; empty slots have no features.
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub query_keypoints: Vec<KeyPoint>,
    pub query_descriptors: Vec<Descriptor>,
    pub train_keypoints: Vec<Vec<KeyPoint>>,
    pub train_descriptors: Vec<Vec<Descriptor>>,
}

impl Features {
    pub fn total_train_descriptors(&self) -> usize {
        self.train_descriptors.iter().map(Vec::len).sum()
    }
}

/// Detect keypoints in every image, then describe them.
pub fn extract_features(
    images: &ImageSet,
    detector: &dyn KeypointDetector,
    extractor: &dyn DescriptorExtractor,
) -> Features {
    info!("extracting keypoints from images with {}", detector.name());
    let mut query_keypoints = detector.detect(&images.query);
    let mut train_keypoints = detector.detect_batch(&images.train_images);
    for (name, keypoints) in images.train_names.iter().zip(&train_keypoints) {
        debug!("detected {} keypoints in {}", keypoints.len(), name);
    }

    info!(
        "computing descriptors for keypoints with {}",
        extractor.name()
    );
    let query_descriptors = extractor.compute(&images.query, &mut query_keypoints);
    let train_descriptors = extractor.compute_batch(&images.train_images, &mut train_keypoints);

    let features = Features {
        query_keypoints,
        query_descriptors,
        train_keypoints,
        train_descriptors,
    };
    info!(
        "query descriptors count: {}; total train descriptors count: {}",
        features.query_descriptors.len(),
        features.total_train_descriptors()
    );
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BriefExtractor, FastDetector};
    use image::{GrayImage, Luma};
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    fn blocks() -> GrayImage {
        let mut image = GrayImage::from_pixel(120, 100, Luma([30]));
        draw_filled_rect_mut(&mut image, Rect::at(30, 30).of_size(25, 20), Luma([220]));
        draw_filled_rect_mut(&mut image, Rect::at(70, 45).of_size(20, 30), Luma([150]));
        image
    }

    #[test]
    fn one_entry_per_slot_and_aligned() {
        let images = ImageSet {
            query: blocks(),
            train_images: vec![Some(blocks()), None, Some(GrayImage::new(10, 10))],
            train_names: vec!["a.png".into(), "b.png".into(), "c.png".into()],
        };
        let features = extract_features(
            &images,
            &FastDetector::new(20, 500),
            &BriefExtractor::new(0),
        );
        assert!(!features.query_descriptors.is_empty());
        assert_eq!(
            features.query_descriptors.len(),
            features.query_keypoints.len()
        );
        assert_eq!(features.train_keypoints.len(), 3);
        assert_eq!(features.train_descriptors.len(), 3);
        let train = features.train_keypoints.iter().zip(&features.train_descriptors);
        for (keypoints, descriptors) in train {
            assert_eq!(keypoints.len(), descriptors.len());
        }
        assert_eq!(
            features.train_descriptors[0].len(),
            features.query_descriptors.len()
        );
        assert!(features.train_descriptors[1].is_empty());
        assert!(features.train_descriptors[2].is_empty());
        assert_eq!(
            features.total_train_descriptors(),
            features.train_descriptors[0].len()
        );
    }
}
