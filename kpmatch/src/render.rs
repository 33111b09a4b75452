use crate::{KeyPoint, Match, Settings};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::{drawing, pixelops};
use itertools::Itertools;

/// Radius of the circle drawn around every keypoint.
const KEYPOINT_RADIUS: i32 = 3;

/// Colors of a match image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStyle {
    /// Color of drawn match lines and of the keypoints they join.
    pub match_color: Rgb<u8>,
    /// Color of every other keypoint.
    pub single_point_color: Rgb<u8>,
}

impl RenderStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            match_color: Rgb(settings.match_color),
            single_point_color: Rgb(settings.single_point_color),
        }
    }
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn copy_gray_onto(canvas: &mut RgbImage, image: &GrayImage, x_offset: u32) {
    let (width, height) = image.dimensions();
    for (x, y) in (0..width).cartesian_product(0..height) {
        let value = image.get_pixel(x, y)[0];
        canvas.put_pixel(x + x_offset, y, Rgb([value, value, value]));
    }
}

fn pixel_of(keypoint: &KeyPoint, x_offset: u32) -> (i32, i32) {
    (
        keypoint.point.0.round() as i32 + x_offset as i32,
        keypoint.point.1.round() as i32,
    )
}

/// Draw the query and a train image side by side and connect their matches.
///
/// The query sits in the top left and the train image to its right on a black
/// canvas. Every keypoint gets a circle in the single point color. Each match
/// whose `mask` entry is set gets both of its keypoints redrawn in the match
/// color and a line joining them. Matches that refer to keypoints outside of
/// the given slices are skipped.
pub fn draw_matches(
    query: &GrayImage,
    query_keypoints: &[KeyPoint],
    train: &GrayImage,
    train_keypoints: &[KeyPoint],
    matches: &[Match],
    mask: &[bool],
    style: &RenderStyle,
) -> RgbImage {
    let train_offset = query.width();
    let mut canvas = RgbImage::from_pixel(
        query.width() + train.width(),
        query.height().max(train.height()),
        Rgb([0, 0, 0]),
    );
    copy_gray_onto(&mut canvas, query, 0);
    copy_gray_onto(&mut canvas, train, train_offset);

    let keypoints = query_keypoints
        .iter()
        .map(|keypoint| pixel_of(keypoint, 0))
        .chain(
            train_keypoints
                .iter()
                .map(|keypoint| pixel_of(keypoint, train_offset)),
        );
    for center in keypoints {
        drawing::draw_hollow_circle_mut(
            &mut canvas,
            center,
            KEYPOINT_RADIUS,
            style.single_point_color,
        );
    }

    for (m, _) in matches.iter().zip(mask).filter(|&(_, &masked)| masked) {
        let (query_keypoint, train_keypoint) = match (
            query_keypoints.get(m.query_index),
            train_keypoints.get(m.train_index),
        ) {
            (Some(query_keypoint), Some(train_keypoint)) => (query_keypoint, train_keypoint),
            _ => continue,
        };
        let start = pixel_of(query_keypoint, 0);
        let end = pixel_of(train_keypoint, train_offset);
        drawing::draw_hollow_circle_mut(&mut canvas, start, KEYPOINT_RADIUS, style.match_color);
        drawing::draw_hollow_circle_mut(&mut canvas, end, KEYPOINT_RADIUS, style.match_color);
        drawing::draw_antialiased_line_segment_mut(
            &mut canvas,
            start,
            end,
            style.match_color,
            pixelops::interpolate,
        );
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn keypoint(x: f32, y: f32) -> KeyPoint {
        KeyPoint {
            point: (x, y),
            response: 1.0,
            size: 7.0,
            angle: 0.0,
            octave: 0,
        }
    }

    fn draw(masked: bool) -> RgbImage {
        let query = GrayImage::from_pixel(20, 10, Luma([0]));
        let train = GrayImage::from_pixel(30, 16, Luma([0]));
        let matches = [Match {
            query_index: 0,
            image_index: 0,
            train_index: 0,
            distance: 3,
        }];
        draw_matches(
            &query,
            &[keypoint(5.0, 5.0)],
            &train,
            &[keypoint(10.0, 5.0)],
            &matches,
            &[masked],
            &RenderStyle::default(),
        )
    }

    #[test]
    fn side_by_side_canvas() {
        let query = GrayImage::from_pixel(20, 10, Luma([200]));
        let train = GrayImage::from_pixel(30, 16, Luma([100]));
        let canvas = draw_matches(&query, &[], &train, &[], &[], &[], &RenderStyle::default());
        assert_eq!(canvas.dimensions(), (50, 16));
        assert_eq!(*canvas.get_pixel(3, 3), Rgb([200, 200, 200]));
        assert_eq!(*canvas.get_pixel(25, 12), Rgb([100, 100, 100]));
        // Below the shorter query image.
        assert_eq!(*canvas.get_pixel(3, 12), Rgb([0, 0, 0]));
    }

    #[test]
    fn masked_match_is_joined() {
        let canvas = draw(true);
        let style = RenderStyle::default();
        let midpoint = canvas.get_pixel(17, 5);
        assert!(midpoint[2] > 200 && midpoint[0] < 50, "{:?}", midpoint);
        assert_eq!(*canvas.get_pixel(8, 5), style.match_color);
        assert_eq!(*canvas.get_pixel(33, 5), style.match_color);
    }

    #[test]
    fn unmasked_match_is_not_joined() {
        let canvas = draw(false);
        let style = RenderStyle::default();
        assert_eq!(*canvas.get_pixel(17, 5), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(8, 5), style.single_point_color);
        assert_eq!(*canvas.get_pixel(33, 5), style.single_point_color);
    }
}
