use super::filter::{self, FloatImage};
use super::scale_space::{Evolution, ScaleSpace};
use super::Akaze;
use crate::KeyPoint;
use image::{ImageBuffer, Luma};
use log::*;
use std::f32::consts::{PI, TAU};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Reach of the descriptor pattern in units of the level's filter scale.
const SMAX: f32 = 10.0 * std::f32::consts::SQRT_2;

/// A response maximum at integer coordinates of one level.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    level: usize,
    x: usize,
    y: usize,
    response: f32,
    size: f32,
    /// Position in input image pixels.
    point: (f32, f32),
}

fn to_input(level_coordinate: f32, ratio: f32) -> f32 {
    level_coordinate * ratio + 0.5 * (ratio - 1.0)
}

fn distance_squared(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

/// Scale normalized determinant of the Hessian.
fn detector_response(evolution: &Evolution) -> FloatImage {
    let scale = evolution.scale;
    let lxx = filter::scharr_horizontal(&evolution.lx, scale);
    let lyy = filter::scharr_vertical(&evolution.ly, scale);
    let lxy = filter::scharr_vertical(&evolution.lx, scale);
    let norm = (scale as f32).powi(4);
    ImageBuffer::from_fn(lxx.width(), lxx.height(), |x, y| {
        let (dxx, dyy, dxy) = (lxx[(x, y)][0], lyy[(x, y)][0], lxy[(x, y)][0]);
        Luma([(dxx * dyy - dxy * dxy) * norm])
    })
}

/// Detect AKAZE keypoints: scale space maxima of the Hessian response with
/// sub-pixel positions and a dominant orientation.
pub fn detect(akaze: &Akaze, space: &ScaleSpace) -> Vec<KeyPoint> {
    #[cfg(not(feature = "rayon"))]
    let responses: Vec<FloatImage> = space.evolutions.iter().map(detector_response).collect();
    #[cfg(feature = "rayon")]
    let responses: Vec<FloatImage> = space
        .evolutions
        .par_iter()
        .map(detector_response)
        .collect();

    let candidates = find_extrema(akaze, space, &responses);
    let keypoints: Vec<KeyPoint> = candidates
        .iter()
        .filter_map(|candidate| refine(candidate, &space.evolutions, &responses))
        .collect();
    debug!(
        "{} of {} extrema remain after sub-pixel refinement",
        keypoints.len(),
        candidates.len()
    );
    keypoints
}

fn find_extrema(akaze: &Akaze, space: &ScaleSpace, responses: &[FloatImage]) -> Vec<Candidate> {
    let threshold = akaze.detector_threshold as f32;
    let mut cache: Vec<Candidate> = vec![];
    for (level, (evolution, response)) in space.evolutions.iter().zip(responses).enumerate() {
        let (width, height) = (response.width() as usize, response.height() as usize);
        let ratio = evolution.ratio();
        let size = evolution.keypoint_size(akaze);
        let reach = SMAX * (size / ratio).round();
        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let value = filter::at(response, x, y);
                if value <= threshold
                    || value <= filter::at(response, x - 1, y)
                    || value <= filter::at(response, x + 1, y)
                    || value <= filter::at(response, x, y - 1)
                    || value <= filter::at(response, x, y + 1)
                {
                    continue;
                }
                let candidate = Candidate {
                    level,
                    x,
                    y,
                    response: value.abs(),
                    size,
                    point: (to_input(x as f32, ratio), to_input(y as f32, ratio)),
                };

                // A close candidate on this or the previous level suppresses
                // the weaker of the two.
                let close = cache.iter().position(|previous| {
                    (previous.level == level || previous.level + 1 == level)
                        && distance_squared(previous.point, candidate.point) <= size * size
                });
                if let Some(k) = close {
                    if candidate.response <= cache[k].response {
                        continue;
                    }
                }

                let (xf, yf) = (x as f32, y as f32);
                let inside = (xf - reach).round() - 1.0 >= 0.0
                    && (xf + reach).round() + 1.0 < width as f32
                    && (yf - reach).round() - 1.0 >= 0.0
                    && (yf + reach).round() + 1.0 < height as f32;
                if !inside {
                    continue;
                }
                match close {
                    Some(k) => cache[k] = candidate,
                    None => cache.push(candidate),
                }
            }
        }
    }

    // Drop candidates that reappear on the next level.
    let extrema: Vec<Candidate> = cache
        .iter()
        .filter(|candidate| {
            !cache.iter().any(|upper| {
                upper.level == candidate.level + 1
                    && distance_squared(upper.point, candidate.point)
                        <= candidate.size * candidate.size
            })
        })
        .copied()
        .collect();
    debug!("{} scale space extrema", extrema.len());
    extrema
}

/// Fit a quadratic to the 3x3 response neighborhood. Candidates whose peak
/// moves by more than a pixel are dropped.
fn refine(
    candidate: &Candidate,
    evolutions: &[Evolution],
    responses: &[FloatImage],
) -> Option<KeyPoint> {
    let evolution = &evolutions[candidate.level];
    let response = &responses[candidate.level];
    let (x, y) = (candidate.x, candidate.y);
    let r = |dx: isize, dy: isize| {
        let (sx, sy) = (x as isize + dx, y as isize + dy);
        filter::at(response, sx as usize, sy as usize)
    };
    let center = r(0, 0);
    let d_x = 0.5 * (r(1, 0) - r(-1, 0));
    let d_y = 0.5 * (r(0, 1) - r(0, -1));
    let d_xx = r(1, 0) + r(-1, 0) - 2.0 * center;
    let d_yy = r(0, 1) + r(0, -1) - 2.0 * center;
    let d_xy = 0.25 * (r(1, 1) + r(-1, -1)) - 0.25 * (r(1, -1) + r(-1, 1));
    let inverse_det = (d_xx * d_yy - d_xy * d_xy).recip();
    let offset_x = -inverse_det * (d_yy * d_x - d_xy * d_y);
    let offset_y = -inverse_det * (d_xx * d_y - d_xy * d_x);
    // NaN offsets fail these comparisons too.
    if !(offset_x.abs() <= 1.0 && offset_y.abs() <= 1.0) {
        return None;
    }

    let ratio = evolution.ratio();
    let (level_x, level_y) = (x as f32 + offset_x, y as f32 + offset_y);
    Some(KeyPoint {
        point: (to_input(level_x, ratio), to_input(level_y, ratio)),
        response: candidate.response,
        size: candidate.size,
        angle: main_orientation(evolution, level_x, level_y, candidate.size),
        octave: evolution.octave as usize,
    })
}

/// Angle of `(x, y)` in `[0, 2 pi)`.
fn angle_of(x: f32, y: f32) -> f32 {
    let angle = y.atan2(x);
    if angle < 0.0 {
        // Tiny negative angles round up to a full turn.
        (angle + TAU) % TAU
    } else {
        angle
    }
}

/// Weight of a sample `(i, j)` steps from the center, a Gaussian with sigma 2.5.
fn gauss25(i: i32, j: i32) -> f32 {
    let variance = 2.5f32 * 2.5;
    (-((i * i + j * j) as f32) / (2.0 * variance)).exp() / (2.0 * PI * variance)
}

/// Dominant gradient direction around a level position: the longest sum of
/// weighted gradients inside a sliding pi/3 window.
fn main_orientation(evolution: &Evolution, x: f32, y: f32, size: f32) -> f32 {
    let step = (0.5 * size / evolution.ratio()).round();
    let mut samples = vec![];
    for i in -6i32..=6 {
        for j in -6i32..=6 {
            if i * i + j * j >= 36 {
                continue;
            }
            let (sx, sy) = (x + i as f32 * step, y + j as f32 * step);
            if let (Some(gx), Some(gy)) = (
                filter::sample(&evolution.lx, sx, sy),
                filter::sample(&evolution.ly, sx, sy),
            ) {
                let weight = gauss25(i, j);
                let (rx, ry) = (weight * gx, weight * gy);
                samples.push((angle_of(rx, ry), rx, ry));
            }
        }
    }

    let mut longest = 0.0;
    let mut orientation = 0.0;
    let mut start = 0.0f32;
    while start < TAU {
        let end = if start + PI / 3.0 > TAU {
            start - 5.0 * PI / 3.0
        } else {
            start + PI / 3.0
        };
        let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);
        for &(angle, rx, ry) in &samples {
            let inside = if start < end {
                start < angle && angle < end
            } else {
                (angle > 0.0 && angle < end) || angle > start
            };
            if inside {
                sum_x += rx;
                sum_y += ry;
            }
        }
        let length = sum_x * sum_x + sum_y * sum_y;
        if length > longest {
            longest = length;
            orientation = angle_of(sum_x, sum_y);
        }
        start += 0.15;
    }
    orientation
}
