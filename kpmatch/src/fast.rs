use crate::{KeyPoint, KeypointDetector};
use float_ord::FloatOrd;
use image::GrayImage;
use imageproc::corners::corners_fast9;

/// Radius of the disc used to compute the intensity centroid orientation.
const ORIENTATION_RADIUS: i32 = 15;

/// FAST-9 corners, strongest first, oriented by intensity centroid.
///
/// Every keypoint gets the size of the orientation patch, since FAST itself
/// has no notion of scale.
#[derive(Debug, Clone, Copy)]
pub struct FastDetector {
    pub threshold: u8,
    pub max_keypoints: usize,
}

impl FastDetector {
    pub fn new(threshold: u8, max_keypoints: usize) -> Self {
        Self {
            threshold,
            max_keypoints,
        }
    }
}

impl KeypointDetector for FastDetector {
    fn name(&self) -> &str {
        "FAST"
    }

    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let mut corners = corners_fast9(image, self.threshold);
        // Stable, so equal scores keep raster order.
        corners.sort_by_key(|corner| std::cmp::Reverse(FloatOrd(corner.score)));
        corners.truncate(self.max_keypoints);
        corners
            .iter()
            .map(|corner| KeyPoint {
                point: (corner.x as f32, corner.y as f32),
                response: corner.score,
                size: (2 * ORIENTATION_RADIUS + 1) as f32,
                angle: intensity_centroid_angle(image, corner.x as i32, corner.y as i32),
                octave: 0,
            })
            .collect()
    }
}

/// The angle from the keypoint to the intensity centroid of the disc around it.
fn intensity_centroid_angle(image: &GrayImage, x: i32, y: i32) -> f32 {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            let (px, py) = (x + dx, y + dy);
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS
                || !(0..width).contains(&px)
                || !(0..height).contains(&py)
            {
                continue;
            }
            let intensity = f32::from(image.get_pixel(px as u32, py as u32)[0]);
            m01 += intensity * dy as f32;
            m10 += intensity * dx as f32;
        }
    }
    m01.atan2(m10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

    fn square() -> GrayImage {
        let mut image = GrayImage::from_pixel(64, 64, Luma([0]));
        draw_filled_rect_mut(&mut image, Rect::at(20, 20).of_size(24, 24), Luma([255]));
        image
    }

    #[test]
    fn finds_square_corners() {
        let keypoints = FastDetector::new(40, 100).detect(&square());
        assert!(!keypoints.is_empty());
        for keypoint in &keypoints {
            let (x, y) = keypoint.point;
            let near = |v: f32, a: f32| (v - a).abs() <= 3.0;
            assert!((near(x, 20.0) || near(x, 43.0)) && (near(y, 20.0) || near(y, 43.0)));
        }
    }

    #[test]
    fn keeps_strongest() {
        let all = FastDetector::new(40, 1000).detect(&square());
        let few = FastDetector::new(40, 2).detect(&square());
        assert_eq!(few.len(), 2.min(all.len()));
        assert!(all.windows(2).all(|w| w[0].response >= w[1].response));
    }

    #[test]
    fn flat_image_has_no_corners() {
        let image = GrayImage::from_pixel(64, 64, Luma([128]));
        assert!(FastDetector::new(20, 100).detect(&image).is_empty());
    }

    #[test]
    fn centroid_points_to_bright_side() {
        let mut image = GrayImage::from_pixel(41, 41, Luma([0]));
        draw_filled_rect_mut(&mut image, Rect::at(21, 0).of_size(20, 41), Luma([255]));
        let angle = intensity_centroid_angle(&image, 20, 20);
        assert!(angle.abs() < 0.1, "angle was {}", angle);
    }
}
