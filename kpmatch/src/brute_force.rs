use crate::{Descriptor, DescriptorMatcher, Match};
use bitarray::Hamming;
use space::Metric;

/// Exhaustive Hamming distance search over every train descriptor.
///
/// Ties go to the lowest image index, then the lowest descriptor index.
#[derive(Debug, Clone, Default)]
pub struct BruteForceMatcher {
    collections: Vec<Vec<Descriptor>>,
}

impl BruteForceMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn name(&self) -> &str {
        "BruteForce-Hamming"
    }

    fn add(&mut self, collections: Vec<Vec<Descriptor>>) {
        self.collections.extend(collections);
    }

    fn collections(&self) -> &[Vec<Descriptor>] {
        &self.collections
    }

    fn train(&mut self) {}

    fn match_query(&self, query: &[Descriptor]) -> Vec<Match> {
        query
            .iter()
            .enumerate()
            .filter_map(|(query_index, descriptor)| {
                let mut best: Option<Match> = None;
                for (image_index, collection) in self.collections.iter().enumerate() {
                    for (train_index, train) in collection.iter().enumerate() {
                        let distance = Hamming.distance(descriptor, train);
                        if best.map_or(true, |best| distance < best.distance) {
                            best = Some(Match {
                                query_index,
                                image_index,
                                train_index,
                                distance,
                            });
                        }
                    }
                }
                best
            })
            .collect()
    }

    fn clear(&mut self) {
        self.collections.clear();
    }
}
