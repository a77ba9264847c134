//! Tag propagation through disk and snapshot descriptions.
//!
//! Kubernetes stores a disk's tags as a JSON object in the disk's
//! `description` field. Snapshots carry the same document forward so a
//! restored disk inherits it verbatim.

use std::collections::BTreeMap;

use tracing::{error, warn};

/// Key/value metadata attached to disks and snapshots.
pub type Tags = BTreeMap<String, String>;

/// Builds a snapshot description from the source disk's description and the
/// tags supplied for this backup.
///
/// Supplied tags win on key collisions. A description that is not a JSON
/// string map is dropped with a warning rather than failing the snapshot.
/// Returns an empty string when there is nothing to record.
#[must_use]
pub fn merge_tags(new_tags: &Tags, existing_description: &str) -> String {
    let mut merged = if existing_description.is_empty() {
        Tags::new()
    } else {
        serde_json::from_str::<Tags>(existing_description).unwrap_or_else(|err| {
            warn!(
                error = %err,
                "unable to decode disk description as JSON; applying only the supplied tags"
            );
            Tags::new()
        })
    };
    merged.extend(
        new_tags
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    if merged.is_empty() {
        return String::new();
    }

    serde_json::to_string(&merged).unwrap_or_else(|err| {
        error!(error = %err, "unable to encode snapshot tags as JSON; snapshot will not be tagged");
        String::new()
    })
}
