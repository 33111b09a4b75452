use crate::{
    draw_matches, extract_features, mask_matches, match_descriptors, read_images, select_best,
    tally_matches, Capabilities, Display, Features, ImageSet, Match, Registry, RenderStyle, Result,
    Settings,
};
use image::RgbImage;
use log::*;
use std::path::{Path, PathBuf};

/// The outcome of a matching run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    /// Train slot with the most matches.
    pub best_index: usize,
    /// Manifest name of the best train image.
    pub best_name: String,
    /// Number of matches per train slot.
    pub tallies: Vec<usize>,
    /// Total number of matches, one per query descriptor or zero.
    pub match_count: usize,
    /// Result images that were written.
    pub saved: Vec<PathBuf>,
}

/// Run the whole pipeline with the built in algorithms.
pub fn run(settings: &Settings, display: &mut dyn Display) -> Result<MatchReport> {
    run_with_registry(&Registry::default(), settings, display)
}

/// Run the whole pipeline, looking up algorithms in `registry`.
///
/// The algorithms are resolved before any file is touched.
pub fn run_with_registry(
    registry: &Registry,
    settings: &Settings,
    display: &mut dyn Display,
) -> Result<MatchReport> {
    let Capabilities {
        detector,
        extractor,
        mut matcher,
    } = registry.create(settings)?;
    let images = read_images(&settings.query_image, &settings.train_manifest)?;
    let features = extract_features(&images, detector.as_ref(), extractor.as_ref());
    let matches = match_descriptors(&features, matcher.as_mut())?;

    let style = RenderStyle::from_settings(settings);
    let best_index = show_best_match(&images, &features, &matches, &style, display);
    let saved = save_result_images(&images, &features, &matches, &style, &settings.results_dir);

    Ok(MatchReport {
        best_index,
        best_name: images.train_names[best_index].clone(),
        tallies: tally_matches(&matches, images.train_images.len()),
        match_count: matches.len(),
        saved,
    })
}

fn render_slot(
    images: &ImageSet,
    features: &Features,
    matches: &[Match],
    style: &RenderStyle,
    index: usize,
) -> Option<RgbImage> {
    let train = images.train_images[index].as_ref()?;
    Some(draw_matches(
        &images.query,
        &features.query_keypoints,
        train,
        &features.train_keypoints[index],
        matches,
        &mask_matches(matches, index),
        style,
    ))
}

/// Pick the train image with the most matches and show it next to the query.
///
/// Returns the index of the best train image. The display is titled with the
/// train image name; a display failure is only logged.
pub fn show_best_match(
    images: &ImageSet,
    features: &Features,
    matches: &[Match],
    style: &RenderStyle,
    display: &mut dyn Display,
) -> usize {
    info!("showing best match");
    let tallies = tally_matches(matches, images.train_images.len());
    let best = select_best(&tallies);
    let name = &images.train_names[best];
    match render_slot(images, features, matches, style, best) {
        Some(image) => {
            if let Err(e) = display.show(name, &image) {
                warn!("failed to show {}: {}", name, e);
            }
        }
        None => warn!("best match {} was never loaded, nothing to show", name),
    }
    info!(
        "image {} is the best match ({} matches)",
        name, tallies[best]
    );
    best
}

/// Render every loaded train image against the query and write it to
/// `<results_dir>/res_<name>`, in the format its extension names.
///
/// The directory is not created. Images that can't be written are logged and
/// skipped; the paths that were written are returned.
pub fn save_result_images(
    images: &ImageSet,
    features: &Features,
    matches: &[Match],
    style: &RenderStyle,
    results_dir: &Path,
) -> Vec<PathBuf> {
    info!("saving results to {}", results_dir.display());
    let mut saved = vec![];
    for (index, name) in images.train_names.iter().enumerate() {
        let image = match render_slot(images, features, matches, style, index) {
            Some(image) => image,
            None => continue,
        };
        let path = results_dir.join(format!("res_{}", name));
        match image.save(&path) {
            Ok(()) => {
                debug!("saved {}", path.display());
                saved.push(path);
            }
            Err(e) => warn!(
                "image {} can not be saved (may be because directory {} does not exist): {}",
                path.display(),
                results_dir.display(),
                e
            ),
        }
    }
    info!("{} result images were saved", saved.len());
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::io;

    #[derive(Default)]
    struct Recorder(Vec<(String, (u32, u32))>);

    impl Display for Recorder {
        fn show(&mut self, title: &str, image: &RgbImage) -> io::Result<()> {
            self.0.push((title.to_owned(), image.dimensions()));
            Ok(())
        }
    }

    struct Broken;

    impl Display for Broken {
        fn show(&mut self, _: &str, _: &RgbImage) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "no viewer"))
        }
    }

    fn vote(query_index: usize, image_index: usize) -> Match {
        Match {
            query_index,
            image_index,
            train_index: 0,
            distance: 0,
        }
    }

    fn scene() -> (ImageSet, Features) {
        let images = ImageSet {
            query: GrayImage::new(10, 10),
            train_images: vec![
                None,
                Some(GrayImage::new(20, 5)),
                Some(GrayImage::new(6, 12)),
            ],
            train_names: vec!["a.png".into(), "b.png".into(), "c.png".into()],
        };
        let features = Features {
            train_keypoints: vec![vec![]; 3],
            train_descriptors: vec![vec![]; 3],
            ..Features::default()
        };
        (images, features)
    }

    #[test]
    fn best_match_is_shown_with_its_name() {
        let (images, features) = scene();
        let matches = [vote(0, 2), vote(1, 1), vote(2, 2)];
        let style = RenderStyle::default();
        let mut recorder = Recorder::default();
        let best = show_best_match(&images, &features, &matches, &style, &mut recorder);
        assert_eq!(best, 2);
        assert_eq!(recorder.0, vec![("c.png".to_owned(), (16, 12))]);
    }

    #[test]
    fn unloaded_or_failing_display_is_not_fatal() {
        let (images, features) = scene();
        let style = RenderStyle::default();
        let mut recorder = Recorder::default();
        let best = show_best_match(&images, &features, &[], &style, &mut recorder);
        assert_eq!(best, 0);
        assert!(recorder.0.is_empty());
        let matches = [vote(0, 1)];
        let best = show_best_match(&images, &features, &matches, &style, &mut Broken);
        assert_eq!(best, 1);
    }

    #[test]
    fn saves_loaded_slots_only() {
        let (images, features) = scene();
        let dir = tempfile::tempdir().unwrap();
        let style = RenderStyle::default();
        let saved = save_result_images(&images, &features, &[], &style, dir.path());
        let expected = vec![dir.path().join("res_b.png"), dir.path().join("res_c.png")];
        assert_eq!(saved, expected);
        assert!(!dir.path().join("res_a.png").exists());
        let written = image::open(&saved[0]).unwrap();
        assert_eq!((written.width(), written.height()), (30, 10));
    }

    #[test]
    fn missing_results_dir_is_not_created() {
        let (images, features) = scene();
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let style = RenderStyle::default();
        let saved = save_result_images(&images, &features, &[], &style, &results);
        assert!(saved.is_empty());
        assert!(!results.exists());
    }
}
