//! Pure pruning computations.
//!
//! Index selection and batch arithmetic, kept free of I/O so they can be
//! tested exhaustively.

use leasehold_core::SectorRoot;
use std::collections::HashSet;

/// Length of the roots page starting at `offset`.
#[inline]
pub fn page_length(offset: u64, num_sectors: u64, batch_size: u64) -> u64 {
    batch_size.min(num_sectors.saturating_sub(offset))
}

/// Sort and deduplicate prunable indices, rejecting out-of-range ones.
///
/// Returns the first offending index on failure.
pub fn normalize_indices(mut indices: Vec<u64>, root_count: usize) -> Result<Vec<u64>, u64> {
    indices.sort_unstable();
    indices.dedup();
    match indices.last() {
        Some(&last) if usize::try_from(last).map_or(true, |i| i >= root_count) => Err(last),
        _ => Ok(indices),
    }
}

/// Drop indices whose root is still being uploaded.
///
/// Keeps the input order. Indices must be in range for `roots`.
pub fn exclude_pending(
    indices: Vec<u64>,
    roots: &[SectorRoot],
    pending: &HashSet<SectorRoot>,
) -> Vec<u64> {
    if pending.is_empty() {
        return indices;
    }
    indices
        .into_iter()
        .filter(|&index| {
            usize::try_from(index)
                .ok()
                .and_then(|i| roots.get(i))
                .map_or(false, |root| !pending.contains(root))
        })
        .collect()
}

/// Split candidates into the batch to free now and the deferred count.
pub fn cap_batch(mut candidates: Vec<u64>, cap: u64) -> (Vec<u64>, u64) {
    let cap = usize::try_from(cap).unwrap_or(usize::MAX);
    if candidates.len() <= cap {
        return (candidates, 0);
    }
    let deferred = candidates.split_off(cap);
    (candidates, deferred.len() as u64)
}

/// Whole sectors removed between two filesizes.
#[inline]
pub fn freed_sectors(filesize_before: u64, filesize_after: u64) -> u64 {
    leasehold_core::sector_count(filesize_before.saturating_sub(filesize_after))
}
