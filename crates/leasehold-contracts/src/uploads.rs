//! In-flight upload tracking
//!
//! Sectors that were uploaded to a host but are not yet referenced by any
//! stored object look unreferenced to the store. Pruning consults this
//! registry so it never frees them mid-upload.

use leasehold_core::SectorRoot;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Identifier of a tracked upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(Uuid);

impl UploadId {
    fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

/// Registry of sector roots belonging to uploads in progress
#[derive(Debug, Default)]
pub struct PendingUploads {
    uploads: Mutex<HashMap<UploadId, Vec<SectorRoot>>>,
}

impl PendingUploads {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a new upload
    pub fn start_upload(&self) -> UploadId {
        let id = UploadId::new_v4();
        self.uploads.lock().insert(id, Vec::new());
        debug!(upload = %id, "tracking upload");
        id
    }

    /// Attach roots to an upload
    ///
    /// Returns false if the upload is not being tracked.
    pub fn add_sectors(&self, upload: UploadId, roots: impl IntoIterator<Item = SectorRoot>) -> bool {
        let mut uploads = self.uploads.lock();
        match uploads.get_mut(&upload) {
            Some(sectors) => {
                sectors.extend(roots);
                true
            }
            None => false,
        }
    }

    /// Stop tracking an upload. Unknown ids are ignored.
    pub fn finish_upload(&self, upload: UploadId) {
        if let Some(sectors) = self.uploads.lock().remove(&upload) {
            debug!(upload = %upload, sectors = sectors.len(), "upload finished");
        }
    }

    /// Snapshot of every root currently being uploaded
    pub fn pending_sectors(&self) -> HashSet<SectorRoot> {
        self.uploads
            .lock()
            .values()
            .flat_map(|sectors| sectors.iter().copied())
            .collect()
    }

    /// Number of uploads in progress
    pub fn len(&self) -> usize {
        self.uploads.lock().len()
    }

    /// True when no upload is in progress
    pub fn is_empty(&self) -> bool {
        self.uploads.lock().is_empty()
    }
}
