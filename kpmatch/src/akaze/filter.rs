use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::{separable_filter, separable_filter_equal};

/// Single channel float image. The input level holds intensities in `[0, 1]`.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

pub fn to_float(image: &GrayImage) -> FloatImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        Luma([f32::from(image[(x, y)][0]) / 255.0])
    })
}

pub fn at(image: &FloatImage, x: usize, y: usize) -> f32 {
    image[(x as u32, y as u32)][0]
}

/// The pixel nearest to `(x, y)`, or `None` outside the image.
pub fn sample(image: &FloatImage, x: f32, y: f32) -> Option<f32> {
    let (x, y) = (x.round(), y.round());
    if x < 0.0 || y < 0.0 || x >= image.width() as f32 || y >= image.height() as f32 {
        return None;
    }
    Some(image[(x as u32, y as u32)][0])
}

/// Normalized Gaussian kernel of `size` taps (odd).
pub fn gaussian_kernel(sigma: f32, size: usize) -> Vec<f32> {
    debug_assert!(size % 2 == 1, "kernel size must be odd");
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|tap| *tap /= sum);
    kernel
}

/// Separable Gaussian blur with a kernel radius of `ceil(2 sigma)`.
pub fn gaussian_blur(image: &FloatImage, sigma: f32) -> FloatImage {
    let radius = (2.0 * sigma).ceil() as usize;
    separable_filter_equal(image, &gaussian_kernel(sigma, 2 * radius + 1))
}

/// Scharr kernels (derivative, smoothing) widened to `scale`.
///
/// Scale 1 is the plain 3x3 Scharr operator; larger scales are normalized.
fn scharr_kernels(scale: u32) -> (Vec<f32>, Vec<f32>) {
    if scale <= 1 {
        return (vec![-1.0, 0.0, 1.0], vec![3.0, 10.0, 3.0]);
    }
    let w = 10.0 / 3.0;
    let norm = 1.0 / (2.0 * scale as f32 * (w + 2.0));
    let size = (2 * scale + 1) as usize;
    let mut derivative = vec![0.0; size];
    derivative[0] = -1.0;
    derivative[size - 1] = 1.0;
    let mut smoothing = vec![0.0; size];
    smoothing[0] = norm;
    smoothing[size / 2] = norm * w;
    smoothing[size - 1] = norm;
    (derivative, smoothing)
}

pub fn scharr_horizontal(image: &FloatImage, scale: u32) -> FloatImage {
    let (derivative, smoothing) = scharr_kernels(scale);
    separable_filter(image, &derivative, &smoothing)
}

pub fn scharr_vertical(image: &FloatImage, scale: u32) -> FloatImage {
    let (derivative, smoothing) = scharr_kernels(scale);
    separable_filter(image, &smoothing, &derivative)
}

/// Halve both dimensions by averaging 2x2 blocks. An odd last row or column
/// is dropped.
pub fn half_size(image: &FloatImage) -> FloatImage {
    ImageBuffer::from_fn(image.width() / 2, image.height() / 2, |x, y| {
        let (x, y) = (2 * x, 2 * y);
        let sum = image[(x, y)][0]
            + image[(x + 1, y)][0]
            + image[(x, y + 1)][0]
            + image[(x + 1, y + 1)][0];
        Luma([0.25 * sum])
    })
}
