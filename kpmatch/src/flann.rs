use crate::{Descriptor, DescriptorMatcher, Match};
use bitarray::Hamming;
use hnsw::{Hnsw, Searcher};
use log::*;
use rand_pcg::Pcg64;
use space::Neighbor;

type Index = Hnsw<Hamming, Descriptor, Pcg64, 12, 24>;

/// Neighbors retrieved per query; the best of them is kept.
const CANDIDATES: usize = 4;

/// Approximate nearest neighbor search over the pooled train descriptors
/// with an HNSW index.
///
/// The index is seeded, so results are reproducible for the same input. Among
/// the retrieved candidates at the smallest distance, the lowest image index
/// and then the lowest descriptor index wins.
pub struct FlannMatcher {
    ef: usize,
    collections: Vec<Vec<Descriptor>>,
    /// First pooled index of every collection.
    offsets: Vec<usize>,
    index: Option<Index>,
}

impl FlannMatcher {
    /// `ef` is the size of the candidate list kept during the search; larger
    /// is slower and more accurate.
    pub fn new(ef: usize) -> Self {
        Self {
            ef,
            collections: vec![],
            offsets: vec![],
            index: None,
        }
    }

    /// Map a pooled index back to `(image_index, train_index)`.
    fn locate(&self, pooled: usize) -> (usize, usize) {
        // Empty collections share their offset with the next one, so the last
        // offset not past `pooled` belongs to the collection that holds it.
        let image_index = self.offsets.partition_point(|&start| start <= pooled) - 1;
        (image_index, pooled - self.offsets[image_index])
    }
}

impl DescriptorMatcher for FlannMatcher {
    fn name(&self) -> &str {
        "FlannBased"
    }

    fn add(&mut self, collections: Vec<Vec<Descriptor>>) {
        self.collections.extend(collections);
        self.index = None;
    }

    fn collections(&self) -> &[Vec<Descriptor>] {
        &self.collections
    }

    fn train(&mut self) {
        let mut searcher = Searcher::default();
        let mut index = Index::new(Hamming);
        self.offsets.clear();
        let mut pooled = 0;
        for collection in &self.collections {
            self.offsets.push(pooled);
            for descriptor in collection {
                index.insert(descriptor.clone(), &mut searcher);
            }
            pooled += collection.len();
        }
        debug!("built HNSW index over {} descriptors", pooled);
        self.index = Some(index);
    }

    fn match_query(&self, query: &[Descriptor]) -> Vec<Match> {
        let index = match &self.index {
            Some(index) => index,
            None => {
                warn!("FlannBased matcher used before train(), no matches");
                return vec![];
            }
        };
        if self.collections.iter().all(Vec::is_empty) {
            return vec![];
        }
        let mut searcher = Searcher::default();
        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: !0,
            };
            CANDIDATES
        ];
        query
            .iter()
            .enumerate()
            .filter_map(|(query_index, descriptor)| {
                let found = index.nearest(
                    descriptor,
                    self.ef.max(CANDIDATES),
                    &mut searcher,
                    &mut neighbors,
                );
                let best = found
                    .iter()
                    .min_by_key(|neighbor| (neighbor.distance, neighbor.index))?;
                let (image_index, train_index) = self.locate(best.index);
                Some(Match {
                    query_index,
                    image_index,
                    train_index,
                    distance: best.distance,
                })
            })
            .collect()
    }

    fn clear(&mut self) {
        self.collections.clear();
        self.offsets.clear();
        self.index = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BruteForceMatcher;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn random_descriptors(rng: &mut Xoshiro256PlusPlus, count: usize) -> Vec<Descriptor> {
        (0..count)
            .map(|_| {
                let mut bytes = [0u8; 64];
                rng.fill(&mut bytes[..]);
                Descriptor::new(bytes)
            })
            .collect()
    }

    #[test]
    fn exact_copies_are_found() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let collections: Vec<_> = [30, 0, 50, 20]
            .iter()
            .map(|&count| random_descriptors(&mut rng, count))
            .collect();
        let query = vec![
            collections[2][17].clone(),
            collections[0][0].clone(),
            collections[3][19].clone(),
        ];
        let mut matcher = FlannMatcher::new(64);
        matcher.add(collections);
        matcher.train();
        let found: Vec<_> = matcher
            .match_query(&query)
            .iter()
            .map(|m| (m.query_index, m.image_index, m.train_index, m.distance))
            .collect();
        assert_eq!(found, vec![(0, 2, 17, 0), (1, 0, 0, 0), (2, 3, 19, 0)]);
    }

    #[test]
    fn agrees_with_brute_force_on_small_sets() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let collections: Vec<_> = (0..3).map(|_| random_descriptors(&mut rng, 40)).collect();
        let query = random_descriptors(&mut rng, 25);
        let mut flann = FlannMatcher::new(200);
        let mut brute = BruteForceMatcher::new();
        flann.add(collections.clone());
        brute.add(collections);
        flann.train();
        brute.train();
        let approximate = flann.match_query(&query);
        let exact = brute.match_query(&query);
        assert_eq!(approximate.len(), exact.len());
        for (a, e) in approximate.iter().zip(&exact) {
            assert_eq!(a.distance, e.distance);
        }
    }

    #[test]
    fn untrained_or_empty_gives_no_matches() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let query = random_descriptors(&mut rng, 3);
        let mut matcher = FlannMatcher::new(16);
        matcher.add(vec![random_descriptors(&mut rng, 5)]);
        assert!(matcher.match_query(&query).is_empty());
        matcher.clear();
        matcher.add(vec![vec![], vec![]]);
        matcher.train();
        assert!(matcher.match_query(&query).is_empty());
    }

    #[test]
    fn locate_skips_empty_collections() {
        let mut matcher = FlannMatcher::new(16);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        matcher.add(vec![
            vec![],
            random_descriptors(&mut rng, 2),
            vec![],
            random_descriptors(&mut rng, 1),
        ]);
        matcher.train();
        assert_eq!(matcher.locate(0), (1, 0));
        assert_eq!(matcher.locate(1), (1, 1));
        assert_eq!(matcher.locate(2), (3, 0));
    }
}
