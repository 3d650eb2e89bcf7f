use std::collections::HashMap;
use std::sync::Arc;

use crate::{DocumentStatus, JobId, JobRecord, JobStatus, ProgressSnapshot};

/// Merges a snapshot into the job list.
///
/// Every snapshot supersedes all optimistic overrides, and only the
/// currently-processing job keeps page-level progress. Statuses change only
/// for ids the snapshot names, either in `documents` or as the
/// currently-processing job; a counters-only snapshot leaves the last known
/// backend status in place. Only records whose visible state actually
/// changes are copied. When nothing changes the returned `Arc` is the same
/// allocation as `existing`, so callers can use [`Arc::ptr_eq`] to skip
/// re-rendering.
pub fn reconcile(existing: &Arc<Vec<JobRecord>>, snapshot: &ProgressSnapshot) -> Arc<Vec<JobRecord>> {
    let entries: HashMap<&JobId, &DocumentStatus> = snapshot
        .documents
        .iter()
        .map(|entry| (&entry.id, entry))
        .collect();

    let mut updated: Option<Vec<JobRecord>> = None;
    for (index, record) in existing.iter().enumerate() {
        if let Some(next) = reconciled_record(record, entries.get(&record.id).copied(), snapshot) {
            updated.get_or_insert_with(|| existing.as_ref().clone())[index] = next;
        }
    }

    match updated {
        Some(list) => Arc::new(list),
        None => Arc::clone(existing),
    }
}

fn reconciled_record(
    record: &JobRecord,
    entry: Option<&DocumentStatus>,
    snapshot: &ProgressSnapshot,
) -> Option<JobRecord> {
    let current = snapshot
        .currently_processing
        .as_ref()
        .filter(|current| current.job_id == record.id);

    let status = match (entry, current) {
        (Some(entry), _) => entry.status,
        (None, Some(_)) => JobStatus::Processing,
        (None, None) => record.status,
    };

    let error_message = if status == JobStatus::Failed {
        entry
            .and_then(|entry| entry.error_message.clone())
            .or_else(|| record.error_message.clone())
    } else if entry.is_none() && current.is_none() {
        record.error_message.clone()
    } else {
        None
    };

    let next = JobRecord {
        id: record.id.clone(),
        display_name: record.display_name.clone(),
        status,
        error_message,
        progress: current.map(|current| current.unit_progress()),
        local_override: None,
    };

    if next == *record {
        None
    } else {
        Some(next)
    }
}
