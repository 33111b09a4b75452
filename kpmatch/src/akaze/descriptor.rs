use super::filter;
use super::scale_space::Evolution;
use super::Akaze;
use crate::{Descriptor, KeyPoint};

/// Grid sizes of the three M-LDB levels and the matching cell width as a
/// fraction of the pattern size.
const GRIDS: [(usize, f32); 3] = [(2, 1.0), (3, 2.0 / 3.0), (4, 0.5)];

/// Bits set by one descriptor: intensity, and the two rotated derivatives,
/// compared pairwise over the cells of each grid.
pub const DESCRIPTOR_BITS: usize = 3 * (6 + 36 + 120);

/// Mean intensity and rotated derivatives of one grid cell.
type Cell = [f32; 3];

/// The rotation invariant M-LDB descriptor of `keypoint` on `evolution`.
///
/// Returns `None` when part of the sampling pattern falls outside the level.
pub fn describe(akaze: &Akaze, evolution: &Evolution, keypoint: &KeyPoint) -> Option<Descriptor> {
    let ratio = evolution.ratio();
    let scale = (0.5 * keypoint.size / ratio).round();
    let center = (keypoint.point.0 / ratio, keypoint.point.1 / ratio);
    let (si, co) = keypoint.angle.sin_cos();
    let pattern = akaze.pattern_size as i32;

    let mut bytes = [0u8; 64];
    let mut bit = 0;
    for &(grid, fraction) in &GRIDS {
        let step = (akaze.pattern_size as f32 * fraction).ceil() as i32;
        let mut cells: Vec<Cell> = Vec::with_capacity(grid * grid);
        for i in (-pattern..pattern).step_by(step as usize) {
            for j in (-pattern..pattern).step_by(step as usize) {
                cells.push(cell(evolution, center, (co, si), scale, (i, j), step)?);
            }
        }
        debug_assert_eq!(cells.len(), grid * grid);
        for channel in 0..3 {
            for (a, first) in cells.iter().enumerate() {
                for second in &cells[a + 1..] {
                    if first[channel] > second[channel] {
                        bytes[bit >> 3] |= 1 << (bit & 7);
                    }
                    bit += 1;
                }
            }
        }
    }
    Some(Descriptor::new(bytes))
}

/// Average the `step` x `step` samples of the cell whose corner is `(i, j)`
/// pattern units from the keypoint, rotated by the keypoint angle.
fn cell(
    evolution: &Evolution,
    center: (f32, f32),
    (co, si): (f32, f32),
    scale: f32,
    (i, j): (i32, i32),
    step: i32,
) -> Option<Cell> {
    let mut sum = [0.0f32; 3];
    for k in i..i + step {
        for l in j..j + step {
            let (k, l) = (k as f32, l as f32);
            let y = center.1 + (l * co * scale + k * si * scale);
            let x = center.0 + (-l * si * scale + k * co * scale);
            let intensity = filter::sample(&evolution.lt, x, y)?;
            let rx = filter::sample(&evolution.lx, x, y)?;
            let ry = filter::sample(&evolution.ly, x, y)?;
            sum[0] += intensity;
            sum[1] += -rx * si + ry * co;
            sum[2] += rx * co + ry * si;
        }
    }
    let count = (step * step) as f32;
    Some(sum.map(|total| total / count))
}
