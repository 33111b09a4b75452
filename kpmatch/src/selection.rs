use crate::Match;

/// Count the matches that landed in each of `image_count` train images.
///
/// Matches with an out of range image index are not counted.
pub fn tally_matches(matches: &[Match], image_count: usize) -> Vec<usize> {
    let mut tallies = vec![0; image_count];
    for m in matches {
        if let Some(tally) = tallies.get_mut(m.image_index) {
            *tally += 1;
        }
    }
    tallies
}

/// The index of the highest tally; the lowest index wins a tie.
///
/// With no votes at all (or no images) this is `0`.
pub fn select_best(tallies: &[usize]) -> usize {
    let mut best = 0;
    for (index, &tally) in tallies.iter().enumerate() {
        if tally > tallies[best] {
            best = index;
        }
    }
    best
}

/// Mark the matches that point into train image `image_index`.
pub fn mask_matches(matches: &[Match], image_index: usize) -> Vec<bool> {
    matches.iter().map(|m| m.image_index == image_index).collect()
}
