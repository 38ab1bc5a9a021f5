//! Dataset sanity check after ingestion

use swingline_common::EventStore;
use tracing::{info, warn};

/// Outcome of the dataset check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    Captured(usize),
    Empty,
}

impl DatasetStatus {
    pub fn is_empty(&self) -> bool {
        matches!(self, DatasetStatus::Empty)
    }
}

/// Log the dataset size, or the likely causes when nothing was captured
pub fn check_dataset(store: &EventStore) -> DatasetStatus {
    if !store.is_empty() {
        info!("Captured dataset - records {}", store.len());
        for (category, count) in store.count_by_category() {
            info!("Captured dataset - category \"{}\", records {}", category, count);
        }
        return DatasetStatus::Captured(store.len());
    }

    warn!("Empty dataset - records 0");
    info!("Empty dataset situation 1 - No block storage events exist (storage is NFS or local \"mpx.C#.T#.L#\"?)");
    info!("Empty dataset situation 2 - ESXi vm-support bundle file or directory permissions (rwx on bundle?)");
    info!("Empty dataset situation 3 - ESXi vm-support bundle file or directory match failed");
    DatasetStatus::Empty
}
