use image::{GrayImage, Luma};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_filled_rect_mut},
    rect::Rect,
};
use kpmatch::Settings;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::PathBuf;
use tempfile::TempDir;

/// A cluttered scene of random rectangles and discs, fixed by `seed`.
pub fn scene(seed: u64, width: u32, height: u32) -> GrayImage {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut image = GrayImage::from_pixel(width, height, Luma([rng.gen_range(0..64)]));
    for _ in 0..40 {
        let (w, h) = (rng.gen_range(8..48), rng.gen_range(8..48));
        let x = rng.gen_range(0..(width - w) as i32);
        let y = rng.gen_range(0..(height - h) as i32);
        draw_filled_rect_mut(&mut image, Rect::at(x, y).of_size(w, h), Luma([rng.gen()]));
    }
    for _ in 0..15 {
        let center = (
            rng.gen_range(0..width as i32),
            rng.gen_range(0..height as i32),
        );
        draw_filled_circle_mut(&mut image, center, rng.gen_range(4..20), Luma([rng.gen()]));
    }
    image
}

/// A temporary gallery on disk with settings pointing into it.
pub struct Gallery {
    pub dir: TempDir,
    pub settings: Settings,
}

impl Gallery {
    /// Write `query`, every train image that is `Some` and a manifest naming
    /// all of them. The results directory exists and is empty.
    pub fn new(query: &GrayImage, train: &[(&str, Option<GrayImage>)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        query.save(root.join("query.png")).unwrap();
        let mut manifest = String::new();
        for (name, image) in train {
            if let Some(image) = image {
                image.save(root.join(name)).unwrap();
            }
            manifest.push_str(name);
            manifest.push('\n');
        }
        std::fs::write(root.join("trainImages.txt"), manifest).unwrap();
        std::fs::create_dir(root.join("results")).unwrap();
        let settings = Settings {
            query_image: root.join("query.png"),
            train_manifest: root.join("trainImages.txt"),
            results_dir: root.join("results"),
            display: false,
            ..Settings::default()
        };
        Self { dir, settings }
    }

    pub fn results(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path().join("results"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
