//! Resource names for snapshots and restored disks.
//!
//! Compute Engine names follow RFC 1035 and are limited to 63 characters.

use uuid::Uuid;

/// Longest name Compute Engine accepts for a disk or snapshot.
pub const MAX_RESOURCE_NAME_LEN: usize = 63;

/// Prefix of disks created from a snapshot.
pub const RESTORED_DISK_PREFIX: &str = "restore-";

/// Length of `-` followed by a hyphenated UUID.
const SUFFIX_LEN: usize = 1 + uuid::fmt::Hyphenated::LENGTH;

const _: () = assert!(SUFFIX_LEN < MAX_RESOURCE_NAME_LEN);

/// Names a snapshot of `volume_id`, truncating the volume ID so the unique
/// suffix always survives.
///
/// The result is `min(volume_id.len() + 37, 63)` bytes long for ASCII IDs.
#[must_use]
pub fn snapshot_name(volume_id: &str, token: Uuid) -> String {
    let suffix = format!("-{}", token.hyphenated());
    let mut keep = volume_id.len().min(MAX_RESOURCE_NAME_LEN - suffix.len());
    while !volume_id.is_char_boundary(keep) {
        keep -= 1;
    }
    let mut name = String::with_capacity(keep + suffix.len());
    name.push_str(volume_id.get(..keep).unwrap_or_default());
    name.push_str(&suffix);
    name
}

/// Names a disk restored from a snapshot.
#[must_use]
pub fn restored_disk_name(token: Uuid) -> String {
    format!("{RESTORED_DISK_PREFIX}{}", token.hyphenated())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn token() -> Uuid {
        Uuid::parse_str("fd9729b5-868b-4544-9568-1c5d9121dabc").expect("valid uuid")
    }

    #[test]
    fn suffix_fits_inside_the_limit() {
        assert_eq!(SUFFIX_LEN, 37);
    }

    #[test]
    fn short_volume_id_is_kept_whole() {
        assert_eq!(
            snapshot_name("pvc-1", token()),
            "pvc-1-fd9729b5-868b-4544-9568-1c5d9121dabc"
        );
    }

    #[rstest]
    #[case(1)]
    #[case(25)]
    #[case(26)]
    #[case(27)]
    #[case(40)]
    #[case(63)]
    #[case(64)]
    #[case(200)]
    fn name_never_exceeds_limit_and_keeps_suffix(#[case] volume_len: usize) {
        let volume_id = "v".repeat(volume_len);
        let name = snapshot_name(&volume_id, token());
        let suffix = format!("-{}", token().hyphenated());

        assert!(name.len() <= MAX_RESOURCE_NAME_LEN, "{name} is too long");
        assert_eq!(
            name.len(),
            (volume_len + suffix.len()).min(MAX_RESOURCE_NAME_LEN)
        );
        assert!(name.ends_with(&suffix), "{name} lost its suffix");
    }

    #[test]
    fn truncation_removes_trailing_volume_characters() {
        let volume_id = "pvc-a970184f-6cc1-4769-85ad-61dcaf8bf51d";
        let name = snapshot_name(volume_id, token());
        assert_eq!(name, "pvc-a970184f-6cc1-4769-85a-fd9729b5-868b-4544-9568-1c5d9121dabc");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let volume_id = format!("{}é", "v".repeat(25));
        let name = snapshot_name(&volume_id, token());
        assert!(name.len() <= MAX_RESOURCE_NAME_LEN);
        assert!(name.starts_with(&"v".repeat(25)));
    }

    #[test]
    fn fresh_tokens_give_distinct_names() {
        let first = snapshot_name("pvc-1", Uuid::new_v4());
        let second = snapshot_name("pvc-1", Uuid::new_v4());
        assert_ne!(first, second);
    }

    #[test]
    fn restored_disk_names_use_prefix() {
        assert_eq!(
            restored_disk_name(token()),
            "restore-fd9729b5-868b-4544-9568-1c5d9121dabc"
        );
    }
}
