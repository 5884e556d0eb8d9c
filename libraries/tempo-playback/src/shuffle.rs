//! Random index selection for shuffle navigation
//!
//! Shuffle here does not reorder the playlist. Each step picks a random
//! index, uniformly among the allowed ones.

use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::HashSet;

/// Pick an index not yet tried in this navigation
///
/// `current` is excluded while the playlist has more than one entry.
/// Returns `None` once every allowed index has been tried.
pub fn pick_untried<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    current: Option<usize>,
    tried: &HashSet<usize>,
) -> Option<usize> {
    (0..len)
        .filter(|index| !tried.contains(index))
        .filter(|index| len <= 1 || Some(*index) != current)
        .choose(rng)
}

/// Pick any index outside `exclude`
///
/// A single-entry playlist always yields index 0, even if excluded.
pub fn random_index_excluding<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    exclude: &[usize],
) -> Option<usize> {
    match len {
        0 => None,
        1 => Some(0),
        _ => (0..len).filter(|index| !exclude.contains(index)).choose(rng),
    }
}
