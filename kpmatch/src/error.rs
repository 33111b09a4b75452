use image::ImageError;
use std::path::PathBuf;
use thiserror::Error;

/// The capability an algorithm name was looked up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    Detector,
    Extractor,
    Matcher,
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AlgorithmKind::Detector => "feature detector",
            AlgorithmKind::Extractor => "descriptor extractor",
            AlgorithmKind::Matcher => "descriptor matcher",
        })
    }
}

/// Everything that can abort a matching run.
///
/// Recoverable problems (a single unreadable train image, a result image
/// that can't be written, a viewer that fails to open) are logged where they
/// happen and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("can not create {kind} of type {name:?} (available: {available:?})")]
    UnknownAlgorithm {
        kind: AlgorithmKind,
        name: String,
        available: Vec<String>,
    },
    #[error("settings file {path:?} is invalid")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("query image {path:?} can not be read")]
    QueryImage {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("train image filenames can not be read from {path:?}")]
    NoTrainFilenames { path: PathBuf },
    #[error("all {count} train images can not be read")]
    NoTrainImages { count: usize },
    #[error("matcher returned {matches} matches for {queries} query descriptors")]
    MatchCount { queries: usize, matches: usize },
}

impl Error {
    /// The process exit status a command line front end should report.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnknownAlgorithm { .. } | Error::Settings { .. } => 2,
            Error::QueryImage { .. }
            | Error::NoTrainFilenames { .. }
            | Error::NoTrainImages { .. } => 3,
            Error::MatchCount { .. } => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        let unknown = Error::UnknownAlgorithm {
            kind: AlgorithmKind::Detector,
            name: "SURF".into(),
            available: vec!["AKAZE".into()],
        };
        assert_eq!(unknown.exit_code(), 2);
        assert_eq!(Error::NoTrainImages { count: 3 }.exit_code(), 3);
        assert_eq!(
            Error::NoTrainFilenames {
                path: "data/trainImages.txt".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(
            Error::MatchCount {
                queries: 4,
                matches: 2
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn unknown_algorithm_names_the_capability() {
        let message = Error::UnknownAlgorithm {
            kind: AlgorithmKind::Matcher,
            name: "FlannLsh".into(),
            available: vec![],
        }
        .to_string();
        assert!(message.contains("descriptor matcher"));
        assert!(message.contains("FlannLsh"));
    }
}
