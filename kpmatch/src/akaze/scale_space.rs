use super::filter::{self, FloatImage};
use super::Akaze;
use float_ord::FloatOrd;
use image::{GrayImage, ImageBuffer, Luma};
use log::*;
use std::f64::consts::PI;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// No octave is built once its smaller side drops below this.
pub const MIN_DIMENSION: u32 = 40;

/// Octaves smaller than this get a single sublevel.
const FULL_SUBLEVELS_DIMENSION: u32 = 80;

/// Contrast factor used when the gradient histogram is degenerate.
const FALLBACK_CONTRAST: f32 = 0.03;

/// Largest stable explicit diffusion step.
const MAX_STEP: f64 = 0.25;

/// One level of the nonlinear scale space.
#[derive(Debug)]
pub struct Evolution {
    pub octave: u32,
    /// Scale in pixels of the input image.
    pub esigma: f64,
    /// Diffusion time, `esigma^2 / 2`.
    etime: f64,
    /// Width of the derivative filters at this level's resolution.
    pub scale: u32,
    /// Diffused image.
    pub lt: FloatImage,
    /// `lt` smoothed before taking derivatives.
    lsmooth: FloatImage,
    /// First derivatives of `lsmooth` at `scale`.
    pub lx: FloatImage,
    pub ly: FloatImage,
    steps: Vec<f32>,
}

impl Evolution {
    fn new(akaze: &Akaze, octave: u32, sublevel: u32) -> Self {
        let exponent = f64::from(sublevel) / f64::from(akaze.num_sublevels) + f64::from(octave);
        let esigma = akaze.base_scale_offset * 2.0f64.powf(exponent);
        let ratio = f64::from(1u32 << octave);
        Self {
            octave,
            esigma,
            etime: 0.5 * esigma * esigma,
            scale: (esigma * akaze.derivative_factor / ratio).round() as u32,
            lt: FloatImage::new(0, 0),
            lsmooth: FloatImage::new(0, 0),
            lx: FloatImage::new(0, 0),
            ly: FloatImage::new(0, 0),
            steps: vec![],
        }
    }

    /// Downsampling factor of this level.
    pub fn ratio(&self) -> f32 {
        (1u32 << self.octave) as f32
    }

    /// Diameter of keypoints found at this level.
    pub fn keypoint_size(&self, akaze: &Akaze) -> f32 {
        (self.esigma * akaze.derivative_factor) as f32
    }
}

/// The nonlinear scale space of one image.
#[derive(Debug)]
pub struct ScaleSpace {
    pub evolutions: Vec<Evolution>,
}

impl ScaleSpace {
    /// Diffuse `image` through every level and take the first derivatives.
    ///
    /// Images whose smaller side is below [`MIN_DIMENSION`] get no levels.
    pub fn new(akaze: &Akaze, image: &GrayImage) -> Self {
        let mut evolutions = allocate(akaze, image.width(), image.height());
        if evolutions.is_empty() {
            debug!(
                "{}x{} image is too small for a scale space",
                image.width(),
                image.height()
            );
            return Self { evolutions };
        }

        let base = filter::gaussian_blur(&filter::to_float(image), akaze.base_scale_offset as f32);
        let mut contrast = contrast_factor(&base, akaze.contrast_percentile, akaze.contrast_bins);
        debug!("initial contrast factor {}", contrast);
        evolutions[0].lsmooth = base.clone();
        evolutions[0].lt = base;

        for i in 1..evolutions.len() {
            let (built, rest) = evolutions.split_at_mut(i);
            let previous = &built[i - 1];
            let evolution = &mut rest[0];
            evolution.lt = if evolution.octave > previous.octave {
                contrast *= 0.75;
                filter::half_size(&previous.lt)
            } else {
                previous.lt.clone()
            };
            evolution.lsmooth = filter::gaussian_blur(&evolution.lt, 1.0);
            let flow = conductance(
                &filter::scharr_horizontal(&evolution.lsmooth, 1),
                &filter::scharr_vertical(&evolution.lsmooth, 1),
                contrast,
            );
            for &step in &evolution.steps {
                diffusion_step(&mut evolution.lt, &flow, step);
            }
            let steps = evolution.steps.len();
            trace!("evolution {} diffused in {} steps", i, steps);
        }

        let derivatives = |evolution: &mut Evolution| {
            evolution.lx = filter::scharr_horizontal(&evolution.lsmooth, evolution.scale);
            evolution.ly = filter::scharr_vertical(&evolution.lsmooth, evolution.scale);
        };
        #[cfg(not(feature = "rayon"))]
        evolutions.iter_mut().for_each(derivatives);
        #[cfg(feature = "rayon")]
        evolutions.par_iter_mut().for_each(derivatives);

        Self { evolutions }
    }

    pub fn is_empty(&self) -> bool {
        self.evolutions.is_empty()
    }

    /// The level whose keypoint size is closest to `size`, in log scale.
    pub fn level_for(&self, akaze: &Akaze, size: f32) -> Option<usize> {
        self.evolutions
            .iter()
            .enumerate()
            .min_by_key(|(_, evolution)| {
                FloatOrd((evolution.keypoint_size(akaze) / size).ln().abs())
            })
            .map(|(level, _)| level)
    }
}

fn allocate(akaze: &Akaze, width: u32, height: u32) -> Vec<Evolution> {
    let mut evolutions: Vec<Evolution> = (0..akaze.max_octave_evolution)
        .filter_map(|octave| {
            let smallest = width.min(height) >> octave;
            if smallest < MIN_DIMENSION {
                return None;
            }
            let sublevels = if smallest < FULL_SUBLEVELS_DIMENSION {
                1
            } else {
                akaze.num_sublevels
            };
            Some((0..sublevels).map(move |sublevel| Evolution::new(akaze, octave, sublevel)))
        })
        .flatten()
        .collect();
    for i in 1..evolutions.len() {
        let time = evolutions[i].etime - evolutions[i - 1].etime;
        evolutions[i].steps = fed_steps(time, MAX_STEP);
        debug!("{} steps in evolution {}", evolutions[i].steps.len(), i);
    }
    evolutions
}

/// Fast explicit diffusion: step sizes that together cover `time`.
///
/// Early steps are small and later ones exceed `max_step`; the cycle is
/// stable as a whole. Steps are reordered to limit rounding error.
pub fn fed_steps(time: f64, max_step: f64) -> Vec<f32> {
    let n = ((3.0 * time / max_step + 0.25).sqrt() - 0.5 - 1.0e-8).ceil();
    if n < 1.0 {
        return vec![];
    }
    let scale = 3.0 * time / (max_step * n * (n + 1.0));
    let c = 1.0 / (4.0 * n + 2.0);
    let d = scale * max_step / 2.0;
    let n = n as usize;
    let steps: Vec<f64> = (0..n)
        .map(|k| {
            let h = (PI * (2 * k + 1) as f64 * c).cos();
            d / (h * h)
        })
        .collect();

    let kappa = (n / 2).max(1);
    let prime = (n + 1..)
        .find(|&p| primal::is_prime(p as u64))
        .unwrap_or(n + 1);
    let mut k = 0;
    (0..n)
        .map(|_| loop {
            k += 1;
            let index = (k * kappa) % prime;
            if (1..=n).contains(&index) {
                break steps[index - 1] as f32;
            }
        })
        .collect()
}

/// The gradient magnitude below which `percentile` of the nonzero gradients
/// of `image` fall, from a histogram of `bins` bins.
pub fn contrast_factor(image: &FloatImage, percentile: f64, bins: usize) -> f32 {
    let smooth = filter::gaussian_blur(image, 1.0);
    let (lx, ly) = (
        &filter::scharr_horizontal(&smooth, 1),
        &filter::scharr_vertical(&smooth, 1),
    );
    let (width, height) = (image.width() as usize, image.height() as usize);
    let magnitudes: Vec<f32> = (1..height.saturating_sub(1))
        .flat_map(|y| (1..width.saturating_sub(1)).map(move |x| (x, y)))
        .map(|(x, y)| filter::at(lx, x, y).hypot(filter::at(ly, x, y)))
        .filter(|&magnitude| magnitude != 0.0)
        .collect();
    let hmax = magnitudes
        .iter()
        .copied()
        .map(FloatOrd)
        .max()
        .map_or(0.0, |max| max.0);
    if hmax <= 0.0 || bins == 0 {
        return FALLBACK_CONTRAST;
    }

    let mut histogram = vec![0usize; bins];
    for magnitude in &magnitudes {
        let bin = ((bins as f32 * magnitude / hmax) as usize).min(bins - 1);
        histogram[bin] += 1;
    }
    let threshold = (magnitudes.len() as f64 * percentile) as usize;
    let mut below = 0;
    let mut k = 0;
    while below < threshold && k < bins {
        below += histogram[k];
        k += 1;
    }
    let contrast = hmax * k as f32 / bins as f32;
    if below >= threshold && contrast > 0.0 {
        contrast
    } else {
        FALLBACK_CONTRAST
    }
}

/// Perona-Malik g2 diffusivity, `1 / (1 + |grad|^2 / k^2)`.
fn conductance(lx: &FloatImage, ly: &FloatImage, k: f32) -> FloatImage {
    let inverse = 1.0 / (k * k);
    ImageBuffer::from_fn(lx.width(), lx.height(), |x, y| {
        let (gx, gy) = (lx[(x, y)][0], ly[(x, y)][0]);
        Luma([1.0 / (1.0 + inverse * (gx * gx + gy * gy))])
    })
}

/// One explicit step of nonlinear diffusion with a 3x3 stencil. No flow
/// crosses the image border.
fn diffusion_step(lt: &mut FloatImage, flow: &FloatImage, step: f32) {
    let (width, height) = lt.dimensions();
    let current = lt.clone();
    let flux = |a: (u32, u32), b: (u32, u32)| {
        0.5 * step * (flow[a][0] + flow[b][0]) * (current[b][0] - current[a][0])
    };
    for y in 0..height {
        for x in 0..width {
            let mut delta = 0.0;
            if x + 1 < width {
                delta += flux((x, y), (x + 1, y));
            }
            if x > 0 {
                delta -= flux((x - 1, y), (x, y));
            }
            if y + 1 < height {
                delta += flux((x, y), (x, y + 1));
            }
            if y > 0 {
                delta -= flux((x, y - 1), (x, y));
            }
            lt[(x, y)][0] += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fed_steps_cover_the_time() {
        for &time in &[0.1, 1.28, 5.0, 20.5] {
            let steps = fed_steps(time, MAX_STEP);
            assert!(!steps.is_empty());
            let total: f32 = steps.iter().sum();
            let error = (f64::from(total) - time).abs();
            assert!(error < 1e-3 * time, "{} vs {}", total, time);
        }
        assert!(fed_steps(0.0, MAX_STEP).is_empty());
    }

    #[test]
    fn fed_reordering_is_a_permutation() {
        let mut steps = fed_steps(20.5, MAX_STEP);
        let n = steps.len();
        assert!(n > 2);
        steps.sort_by_key(|&step| FloatOrd(step));
        steps.dedup();
        assert_eq!(steps.len(), n);
    }

    #[test]
    fn levels_follow_image_size() {
        let akaze = Akaze::default();
        let count = |w, h| allocate(&akaze, w, h).len();
        assert_eq!(count(39, 300), 0);
        // 320x240 has two full octaves and a single sublevel at 80x60.
        assert_eq!(count(320, 240), 9);
        let evolutions = allocate(&akaze, 320, 240);
        assert!(evolutions[0].steps.is_empty());
        assert!(evolutions.iter().skip(1).all(|e| !e.steps.is_empty()));
        assert!(evolutions.windows(2).all(|w| w[0].esigma < w[1].esigma));
    }

    #[test]
    fn flat_images_use_the_fallback_contrast() {
        let flat = FloatImage::from_pixel(50, 50, Luma([0.5]));
        assert_eq!(contrast_factor(&flat, 0.7, 300), FALLBACK_CONTRAST);
    }

    #[test]
    fn diffusion_preserves_total_intensity() {
        let mut image = ImageBuffer::from_fn(12, 9, |x, y| Luma([((x * 7 + y * 3) % 5) as f32]));
        let before: f32 = image.iter().sum();
        let flow = FloatImage::from_pixel(12, 9, Luma([1.0]));
        diffusion_step(&mut image, &flow, 0.25);
        let after: f32 = image.iter().sum();
        assert!((before - after).abs() < 1e-3);
    }
}
