use crate::{Error, Result};
use log::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The settings for a matching run.
///
/// Every field has a default, so a settings file only needs to mention the
/// fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Name of the keypoint detector in the [`Registry`](crate::Registry)
    #[serde(default = "default_detector")]
    pub detector: String,
    /// Name of the descriptor extractor in the [`Registry`](crate::Registry)
    #[serde(default = "default_extractor")]
    pub extractor: String,
    /// Name of the descriptor matcher in the [`Registry`](crate::Registry)
    #[serde(default = "default_matcher")]
    pub matcher: String,
    /// The image searched for in the gallery
    #[serde(default = "default_query_image")]
    pub query_image: PathBuf,
    /// Text file listing the gallery images, one per line
    #[serde(default = "default_train_manifest")]
    pub train_manifest: PathBuf,
    /// Directory that receives the `res_*` images; it is not created
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Detector response threshold for AKAZE
    #[serde(default = "default_akaze_threshold")]
    pub akaze_threshold: f64,
    /// Intensity threshold for FAST-9
    #[serde(default = "default_fast_threshold")]
    pub fast_threshold: u8,
    /// FAST keeps only this many of its strongest corners
    #[serde(default = "default_fast_max_keypoints")]
    pub fast_max_keypoints: usize,
    /// Seed of the BRIEF sampling pattern
    #[serde(default = "default_brief_seed")]
    pub brief_seed: u64,
    /// Size of the dynamic candidate list of the HNSW search
    #[serde(default = "default_hnsw_ef")]
    pub hnsw_ef: usize,
    /// Show the best match with the system image viewer
    #[serde(default = "default_display")]
    pub display: bool,
    /// How long to keep the temporary image alive for the viewer
    #[serde(default = "default_display_seconds")]
    pub display_seconds: u64,
    /// RGB color of match lines and matched keypoints
    #[serde(default = "default_match_color")]
    pub match_color: [u8; 3],
    /// RGB color of keypoints without a drawn match
    #[serde(default = "default_single_point_color")]
    pub single_point_color: [u8; 3],
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::File::open(path) {
            Ok(file) => {
                let settings = serde_json::from_reader(std::io::BufReader::new(file)).map_err(
                    |source| Error::Settings {
                        path: path.to_owned(),
                        source,
                    },
                )?;
                info!("loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) => {
                info!("used default settings ({}: {})", path.display(), e);
                Ok(Self::default())
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detector: default_detector(),
            extractor: default_extractor(),
            matcher: default_matcher(),
            query_image: default_query_image(),
            train_manifest: default_train_manifest(),
            results_dir: default_results_dir(),
            akaze_threshold: default_akaze_threshold(),
            fast_threshold: default_fast_threshold(),
            fast_max_keypoints: default_fast_max_keypoints(),
            brief_seed: default_brief_seed(),
            hnsw_ef: default_hnsw_ef(),
            display: default_display(),
            display_seconds: default_display_seconds(),
            match_color: default_match_color(),
            single_point_color: default_single_point_color(),
        }
    }
}

fn default_detector() -> String {
    "AKAZE".into()
}

fn default_extractor() -> String {
    "AKAZE".into()
}

fn default_matcher() -> String {
    "FlannBased".into()
}

fn default_query_image() -> PathBuf {
    "data/query.jpg".into()
}

fn default_train_manifest() -> PathBuf {
    "data/trainImages.txt".into()
}

fn default_results_dir() -> PathBuf {
    "data/results".into()
}

fn default_akaze_threshold() -> f64 {
    0.001
}

fn default_fast_threshold() -> u8 {
    20
}

fn default_fast_max_keypoints() -> usize {
    1000
}

fn default_brief_seed() -> u64 {
    0
}

fn default_hnsw_ef() -> usize {
    64
}

fn default_display() -> bool {
    true
}

fn default_display_seconds() -> u64 {
    5
}

fn default_match_color() -> [u8; 3] {
    [0, 0, 255]
}

fn default_single_point_color() -> [u8; 3] {
    [255, 255, 0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "detector": "FAST", "extractor": "BRIEF" }"#).unwrap();
        assert_eq!(settings.detector, "FAST");
        assert_eq!(settings.extractor, "BRIEF");
        assert_eq!(settings.matcher, "FlannBased");
        assert_eq!(settings.results_dir, PathBuf::from("data/results"));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ \"detector\": ").unwrap();
        assert!(matches!(
            Settings::load(file.path()),
            Err(Error::Settings { .. })
        ));
    }
}
