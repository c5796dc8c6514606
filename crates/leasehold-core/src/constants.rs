//! Protocol constants

/// Size of one sector in bytes (4 MiB)
pub const SECTOR_SIZE: u64 = 1 << 22;

/// Largest number of sectors a single batched RPC may touch
///
/// Bounds both the sector roots page size and the number of sectors freed
/// in one deletion (1 TiB worth of sectors).
pub const MAX_SECTOR_BATCH_SIZE: u64 = (1 << 40) / SECTOR_SIZE;

/// Number of whole sectors held by a contract of the given filesize
pub const fn sector_count(filesize: u64) -> u64 {
    filesize / SECTOR_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_matches_one_tebibyte() {
        assert_eq!(MAX_SECTOR_BATCH_SIZE, 262_144);
        assert_eq!(MAX_SECTOR_BATCH_SIZE * SECTOR_SIZE, 1 << 40);
    }

    #[test]
    fn partial_sectors_are_not_counted() {
        assert_eq!(sector_count(0), 0);
        assert_eq!(sector_count(SECTOR_SIZE - 1), 0);
        assert_eq!(sector_count(3 * SECTOR_SIZE + 5), 3);
    }
}
