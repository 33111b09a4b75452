use crate::{
    AkazeDetector, AkazeExtractor, AlgorithmKind, BriefExtractor, BruteForceMatcher, Descriptor,
    Error, FastDetector, FlannMatcher, KeyPoint, Match, Result, Settings,
};
use image::GrayImage;
use log::*;
use std::collections::BTreeMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Finds keypoints in an image.
pub trait KeypointDetector: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, image: &GrayImage) -> Vec<KeyPoint>;

    /// Detect keypoints in every loaded image of a batch.
    ///
    /// Slots without an image get no keypoints, so the output always has one
    /// entry per slot.
    fn detect_batch(&self, images: &[Option<GrayImage>]) -> Vec<Vec<KeyPoint>> {
        let detect_slot = |slot: &Option<GrayImage>| {
            slot.as_ref()
                .map(|image| self.detect(image))
                .unwrap_or_default()
        };
        #[cfg(not(feature = "rayon"))]
        {
            images.iter().map(detect_slot).collect()
        }
        #[cfg(feature = "rayon")]
        {
            images.par_iter().map(detect_slot).collect()
        }
    }
}

/// Computes one descriptor per keypoint.
pub trait DescriptorExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Describe `keypoints` in `image`.
    ///
    /// Keypoints that can't be described are removed from `keypoints`, so
    /// that descriptor `i` always belongs to keypoint `i` afterwards.
    fn compute(&self, image: &GrayImage, keypoints: &mut Vec<KeyPoint>) -> Vec<Descriptor>;

    /// Describe the keypoints of every slot of a batch.
    ///
    /// Slots without an image get no descriptors and lose their keypoints.
    fn compute_batch(
        &self,
        images: &[Option<GrayImage>],
        keypoints: &mut [Vec<KeyPoint>],
    ) -> Vec<Vec<Descriptor>> {
        assert_eq!(images.len(), keypoints.len());
        let compute_slot = |(slot, keypoints): (&Option<GrayImage>, &mut Vec<KeyPoint>)| {
            if let Some(image) = slot {
                return self.compute(image, keypoints);
            }
            keypoints.clear();
            vec![]
        };
        #[cfg(not(feature = "rayon"))]
        {
            images
                .iter()
                .zip(keypoints.iter_mut())
                .map(compute_slot)
                .collect()
        }
        #[cfg(feature = "rayon")]
        {
            images
                .par_iter()
                .zip(keypoints.par_iter_mut())
                .map(compute_slot)
                .collect()
        }
    }
}

/// Finds the nearest train descriptor for query descriptors.
///
/// Train descriptors are added as collections, one per train image; the
/// position of a collection is the `image_index` reported in each [`Match`].
pub trait DescriptorMatcher {
    fn name(&self) -> &str;

    /// Append train descriptor collections.
    fn add(&mut self, collections: Vec<Vec<Descriptor>>);

    /// The collections added so far.
    fn collections(&self) -> &[Vec<Descriptor>];

    /// Build whatever search structure the matcher needs.
    ///
    /// Must be called after the last [`add`](Self::add) and before matching.
    fn train(&mut self);

    /// Return the single best match for each query descriptor, in query order.
    ///
    /// The result is empty when there are no train descriptors.
    fn match_query(&self, query: &[Descriptor]) -> Vec<Match>;

    /// Forget all collections and any trained state.
    fn clear(&mut self);
}

pub type DetectorFactory = fn(&Settings) -> Box<dyn KeypointDetector>;
pub type ExtractorFactory = fn(&Settings) -> Box<dyn DescriptorExtractor>;
pub type MatcherFactory = fn(&Settings) -> Box<dyn DescriptorMatcher>;

/// The three capabilities a matching run needs.
pub struct Capabilities {
    pub detector: Box<dyn KeypointDetector>,
    pub extractor: Box<dyn DescriptorExtractor>,
    pub matcher: Box<dyn DescriptorMatcher>,
}

/// Looks up detectors, extractors and matchers by name.
///
/// [`Registry::default`] knows about everything this crate implements,
/// [`Registry::new`] starts out empty.
#[derive(Clone)]
pub struct Registry {
    detectors: BTreeMap<String, DetectorFactory>,
    extractors: BTreeMap<String, ExtractorFactory>,
    matchers: BTreeMap<String, MatcherFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            detectors: BTreeMap::new(),
            extractors: BTreeMap::new(),
            matchers: BTreeMap::new(),
        }
    }

    /// A registry with all built-in algorithms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_detector("AKAZE", |settings| {
            Box::new(AkazeDetector::new(settings.akaze_threshold))
        });
        registry.register_detector("FAST", |settings| {
            Box::new(FastDetector::new(
                settings.fast_threshold,
                settings.fast_max_keypoints,
            ))
        });
        registry.register_extractor("AKAZE", |settings| {
            Box::new(AkazeExtractor::new(settings.akaze_threshold))
        });
        registry.register_extractor("BRIEF", |settings| {
            Box::new(BriefExtractor::new(settings.brief_seed))
        });
        registry.register_matcher("BruteForce-Hamming", |_| {
            Box::new(BruteForceMatcher::new())
        });
        registry.register_matcher("FlannBased", |settings| {
            Box::new(FlannMatcher::new(settings.hnsw_ef))
        });
        registry
    }

    pub fn register_detector(&mut self, name: impl Into<String>, factory: DetectorFactory) {
        self.detectors.insert(name.into(), factory);
    }

    pub fn register_extractor(&mut self, name: impl Into<String>, factory: ExtractorFactory) {
        self.extractors.insert(name.into(), factory);
    }

    pub fn register_matcher(&mut self, name: impl Into<String>, factory: MatcherFactory) {
        self.matchers.insert(name.into(), factory);
    }

    pub fn detector(&self, name: &str, settings: &Settings) -> Result<Box<dyn KeypointDetector>> {
        lookup(&self.detectors, AlgorithmKind::Detector, name).map(|factory| factory(settings))
    }

    pub fn extractor(
        &self,
        name: &str,
        settings: &Settings,
    ) -> Result<Box<dyn DescriptorExtractor>> {
        lookup(&self.extractors, AlgorithmKind::Extractor, name).map(|factory| factory(settings))
    }

    pub fn matcher(&self, name: &str, settings: &Settings) -> Result<Box<dyn DescriptorMatcher>> {
        lookup(&self.matchers, AlgorithmKind::Matcher, name).map(|factory| factory(settings))
    }

    /// Create the detector, extractor and matcher named in `settings`.
    ///
    /// Fails if any of the three names is unknown, in which case none of them
    /// is created.
    pub fn create(&self, settings: &Settings) -> Result<Capabilities> {
        info!(
            "creating feature detector {:?}, descriptor extractor {:?} \
             and descriptor matcher {:?}",
            settings.detector, settings.extractor, settings.matcher
        );
        let detector = lookup(&self.detectors, AlgorithmKind::Detector, &settings.detector);
        let extractor = lookup(
            &self.extractors,
            AlgorithmKind::Extractor,
            &settings.extractor,
        );
        let matcher = lookup(&self.matchers, AlgorithmKind::Matcher, &settings.matcher);
        let (detector, extractor, matcher) = (detector?, extractor?, matcher?);
        Ok(Capabilities {
            detector: detector(settings),
            extractor: extractor(settings),
            matcher: matcher(settings),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Errors are returned unlogged; the caller reports them.
fn lookup<F: Copy>(factories: &BTreeMap<String, F>, kind: AlgorithmKind, name: &str) -> Result<F> {
    factories
        .get(name)
        .copied()
        .ok_or_else(|| Error::UnknownAlgorithm {
            kind,
            name: name.to_owned(),
            available: factories.keys().cloned().collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl KeypointDetector for Nothing {
        fn name(&self) -> &str {
            "Nothing"
        }

        fn detect(&self, _: &GrayImage) -> Vec<KeyPoint> {
            vec![]
        }
    }

    #[test]
    fn builtins_resolve() {
        let registry = Registry::with_builtins();
        let settings = Settings {
            detector: "FAST".into(),
            extractor: "BRIEF".into(),
            matcher: "BruteForce-Hamming".into(),
            ..Settings::default()
        };
        let capabilities = registry.create(&settings).unwrap();
        assert_eq!(capabilities.detector.name(), "FAST");
        assert_eq!(capabilities.extractor.name(), "BRIEF");
        assert_eq!(capabilities.matcher.name(), "BruteForce-Hamming");

        let defaults = registry.create(&Settings::default()).unwrap();
        assert_eq!(defaults.detector.name(), "AKAZE");
        assert_eq!(defaults.extractor.name(), "AKAZE");
        assert_eq!(defaults.matcher.name(), "FlannBased");
    }

    #[test]
    fn unknown_name_fails_whole_creation() {
        let settings = Settings {
            detector: "SURF".into(),
            ..Settings::default()
        };
        let error = match Registry::with_builtins().create(&settings) {
            Err(error) => error,
            Ok(_) => panic!("SURF is not a built in detector"),
        };
        // Reported once by the caller, so the message carries everything.
        let message = error.to_string();
        assert!(message.contains("feature detector"));
        assert!(message.contains("\"SURF\""));
        assert!(message.contains("AKAZE"));
        match error {
            Error::UnknownAlgorithm {
                kind,
                name,
                available,
            } => {
                assert_eq!(kind, AlgorithmKind::Detector);
                assert_eq!(name, "SURF");
                assert_eq!(available, vec!["AKAZE".to_owned(), "FAST".to_owned()]);
            }
            other => panic!("expected UnknownAlgorithm, got {:?}", other),
        }
    }

    #[test]
    fn names_are_case_sensitive() {
        let registry = Registry::with_builtins();
        let matcher = registry.matcher("flannbased", &Settings::default());
        assert!(matcher.is_err());
    }

    #[test]
    fn custom_registration() {
        let mut registry = Registry::new();
        registry.register_detector("Nothing", |_| Box::new(Nothing));
        let detector = registry.detector("Nothing", &Settings::default()).unwrap();
        let images = vec![Some(GrayImage::new(8, 8)), None];
        assert_eq!(detector.detect_batch(&images), vec![vec![], vec![]]);
        assert!(registry.extractor("AKAZE", &Settings::default()).is_err());
    }
}
