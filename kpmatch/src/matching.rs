use crate::{DescriptorMatcher, Error, Features, Match, Result};
use log::*;
use std::time::Instant;

/// Give the train descriptors to `matcher` and find the nearest train
/// descriptor of every query descriptor.
///
/// Any collections the matcher already held are discarded, so image indices
/// of the matches are train slot indices. A matcher must return exactly one
/// match per query descriptor or none at all; anything else is an error.
pub fn match_descriptors(
    features: &Features,
    matcher: &mut dyn DescriptorMatcher,
) -> Result<Vec<Match>> {
    info!(
        "setting train descriptors collection in the {} matcher \
         and matching query descriptors to them",
        matcher.name()
    );
    matcher.clear();

    let start = Instant::now();
    matcher.add(features.train_descriptors.clone());
    matcher.train();
    let build_time = start.elapsed();

    let start = Instant::now();
    let matches = matcher.match_query(&features.query_descriptors);
    let match_time = start.elapsed();

    let queries = features.query_descriptors.len();
    if matches.len() != queries && !matches.is_empty() {
        return Err(Error::MatchCount {
            queries,
            matches: matches.len(),
        });
    }

    info!("number of matches: {}", matches.len());
    info!(
        "build time: {:.3} ms; match time: {:.3} ms",
        build_time.as_secs_f64() * 1000.0,
        match_time.as_secs_f64() * 1000.0
    );
    Ok(matches)
}
